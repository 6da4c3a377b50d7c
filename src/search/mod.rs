//! Parallel maximum-common-subgraph search over K labelled graphs.
//!
//! The entry point is [`solve`]: it pre-sorts every graph by descending
//! degree, builds one initial multi-domain per label shared by all graphs,
//! and runs the branch-and-bound kernels with a work-sharing helper pool.
//! The best mapping found (one vertex per graph and tuple) is remapped to
//! the original vertex numbering before it is returned.

pub mod domain;
pub mod incumbent;
pub mod pool;
pub mod settings;

mod parallel;
mod sequential;

use crate::graph::{Graph, Node, MAX_GRAPHS};
use domain::MultiDomain;
use incumbent::{spawn_timeout_thread, AbortFlag, AtomicIncumbent};
use itertools::Itertools;
use log::{debug, info};
use parallel::solve_parallel;
use pool::{HelperPool, Position, VertexTuple, WorkerState};
use settings::Settings;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Result of one solve: the maximum mapping, the number of search-tree nodes
/// visited across all threads, and whether the deadline cut the search short.
#[derive(Debug)]
pub struct Solution {
    pub mapping: Vec<VertexTuple>,
    pub nodes: u64,
    pub timed_out: bool,
}

/// Read-only state shared by every thread of one goal run.
pub(crate) struct SearchContext {
    pub graphs: Arc<Vec<Graph>>,
    pub settings: Settings,
    /// Mappings smaller than this are worthless; 1 for plain optimisation,
    /// the current decision goal in big-first mode.
    pub goal: u32,
    pub incumbent: Arc<AtomicIncumbent>,
    pub abort: Arc<AbortFlag>,
    pub pool: HelperPool,
    positions: AtomicU32,
}

impl SearchContext {
    #[inline]
    pub fn k(&self) -> usize {
        self.graphs.len()
    }

    /// Fresh branch counter value for deriving a child task position.
    pub fn next_position(&self) -> u32 {
        self.positions.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub(crate) fn format_mapping(current: &[VertexTuple]) -> String {
    current
        .iter()
        .map(|tuple| tuple.iter().join("->"))
        .join(" ")
}

/// Finds a maximum common induced subgraph of `graphs`. The settings must
/// have been validated against `graphs.len()` beforehand.
pub fn solve(graphs: &[Graph], settings: &Settings) -> Solution {
    debug_assert!(settings.validate(graphs.len()).is_ok());

    // search runs on graphs re-numbered by descending degree
    let orders: Vec<Vec<Node>> = graphs
        .iter()
        .map(|g| {
            let degrees = g.degrees();
            let mut order: Vec<Node> = (0..g.number_of_nodes() as Node).collect();
            order.sort_by_key(|&v| Reverse(degrees[v as usize]));
            order
        })
        .collect();
    let sorted: Vec<Graph> = graphs
        .iter()
        .zip(&orders)
        .map(|(g, order)| g.induced_subgraph(order))
        .collect();

    let abort = AbortFlag::new();
    let timer = (settings.timeout > 0)
        .then(|| spawn_timeout_thread(&abort, Duration::from_secs(settings.timeout)));

    let (mut mapping, nodes) = mcs(sorted, settings, &abort);

    abort.finish();
    if let Some(handle) = timer {
        handle.join().expect("timeout thread panicked");
    }

    // back to the original vertex numbering
    for tuple in &mut mapping {
        for (i, v) in tuple.iter_mut().enumerate() {
            *v = orders[i][*v as usize];
        }
    }

    Solution {
        mapping,
        nodes,
        timed_out: abort.timed_out(),
    }
}

/// Checks a returned mapping against the input graphs: labels must agree
/// across all K graphs, every vertex pair must carry identical adjacency
/// words, and no vertex may be used twice. A failure here means a search bug.
pub fn verify_mapping(graphs: &[Graph], mapping: &[VertexTuple]) -> bool {
    let k = graphs.len();
    for (idx, tuple) in mapping.iter().enumerate() {
        if tuple.len() != k {
            return false;
        }
        for ng in 1..k {
            if graphs[0].label(tuple[0]) != graphs[ng].label(tuple[ng]) {
                return false;
            }
            for other in &mapping[idx + 1..] {
                if graphs[0].adj(tuple[0], other[0]) != graphs[ng].adj(tuple[ng], other[ng]) {
                    return false;
                }
            }
        }
        for other in &mapping[idx + 1..] {
            if (0..k).any(|i| tuple[i] == other[i]) {
                return false;
            }
        }
    }
    true
}

fn label_set(g: &Graph) -> BTreeSet<u32> {
    (0..g.number_of_nodes() as Node).map(|v| g.label(v)).collect()
}

fn mcs(graphs: Vec<Graph>, settings: &Settings, abort: &Arc<AbortFlag>) -> (Vec<VertexTuple>, u64) {
    let k = graphs.len();

    let mut common = label_set(&graphs[0]);
    for g in &graphs[1..] {
        let other = label_set(g);
        common = common.intersection(&other).copied().collect();
    }

    // one initial multi-domain per label carried by all K graphs
    let mut bufs: Vec<Vec<Node>> = vec![Vec::new(); k];
    let mut domains = Vec::new();
    for &label in &common {
        let mut starts = [0u32; MAX_GRAPHS];
        let mut lens = [0u32; MAX_GRAPHS];
        for (i, g) in graphs.iter().enumerate() {
            starts[i] = bufs[i].len() as u32;
            bufs[i].extend((0..g.number_of_nodes() as Node).filter(|&v| g.label(v) == label));
            lens[i] = bufs[i].len() as u32 - starts[i];
        }
        domains.push(MultiDomain::new(starts, lens, false));
    }

    let n0 = graphs[0].number_of_nodes() as u32;
    let graphs = Arc::new(graphs);
    let incumbent = Arc::new(AtomicIncumbent::new());
    let mut best: Vec<VertexTuple> = Vec::new();
    let mut nodes = 0u64;

    if settings.big_first {
        for goal in (1..=n0).rev() {
            let (mapping, run_nodes) = run_goal(
                &graphs,
                settings,
                &incumbent,
                abort,
                goal,
                domains.clone(),
                bufs.clone(),
            );
            nodes += run_nodes;
            if mapping.len() > best.len() {
                best = mapping;
            }
            if incumbent.get() == goal || abort.is_set() {
                break;
            }
            if !settings.quiet {
                info!("Upper bound: {}", goal - 1);
            }
        }
    } else {
        let (mapping, run_nodes) = run_goal(&graphs, settings, &incumbent, abort, 1, domains, bufs);
        best = mapping;
        nodes = run_nodes;
    }

    (best, nodes)
}

/// One decision run: spawn the helper workers, search from the root on the
/// calling thread, then merge every thread's incumbent and node count.
fn run_goal(
    graphs: &Arc<Vec<Graph>>,
    settings: &Settings,
    incumbent: &Arc<AtomicIncumbent>,
    abort: &Arc<AbortFlag>,
    goal: u32,
    mut domains: Vec<MultiDomain>,
    mut bufs: Vec<Vec<Node>>,
) -> (Vec<VertexTuple>, u64) {
    let ctx = Arc::new(SearchContext {
        graphs: Arc::clone(graphs),
        settings: settings.clone(),
        goal,
        incumbent: Arc::clone(incumbent),
        abort: Arc::clone(abort),
        pool: HelperPool::new(),
        positions: AtomicU32::new(0),
    });

    let helpers = (1..settings.threads)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            thread::Builder::new()
                .name(format!("helper-{}", t))
                .spawn(move || ctx.pool.run_worker())
                .expect("failed to spawn helper thread")
        })
        .collect_vec();

    let mut state = WorkerState::default();
    let mut current = Vec::new();
    solve_parallel(
        &ctx,
        0,
        Position::root(),
        &mut state,
        &mut current,
        &mut domains,
        &mut bufs,
    );

    ctx.pool.shutdown();

    let mut best = std::mem::take(&mut state.incumbent);
    let mut nodes = state.nodes;
    for handle in helpers {
        let worker = handle.join().expect("helper thread panicked");
        debug!(
            "helper finished: {} nodes, busy {:?}",
            worker.nodes, worker.busy
        );
        nodes += worker.nodes;
        if worker.incumbent.len() > best.len() {
            best = worker.incumbent;
        }
    }

    (best, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::generate_labelled_gnp;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn solve_plain(graphs: &[Graph]) -> Solution {
        solve(graphs, &Settings::default())
    }

    fn triangle() -> Graph {
        Graph::from_edges(3, &[(0, 1), (1, 2), (0, 2)])
    }

    fn cycle(n: usize) -> Graph {
        let edges = (0..n as Node)
            .map(|v| (v, (v + 1) % n as Node))
            .collect_vec();
        Graph::from_edges(n, &edges)
    }

    fn path(n: usize) -> Graph {
        let edges = (0..n as Node - 1).map(|v| (v, v + 1)).collect_vec();
        Graph::from_edges(n, &edges)
    }

    fn complete(n: usize) -> Graph {
        let mut edges = Vec::new();
        for v in 0..n as Node {
            for w in v + 1..n as Node {
                edges.push((v, w));
            }
        }
        Graph::from_edges(n, &edges)
    }

    #[test]
    fn identical_triangles_map_completely() {
        let graphs = vec![triangle(), triangle()];
        let solution = solve_plain(&graphs);
        assert_eq!(solution.mapping.len(), 3);
        assert!(verify_mapping(&graphs, &solution.mapping));
        assert!(!solution.timed_out);
    }

    #[test]
    fn k4_against_k3() {
        let graphs = vec![complete(4), complete(3)];
        let solution = solve_plain(&graphs);
        assert_eq!(solution.mapping.len(), 3);
        assert!(verify_mapping(&graphs, &solution.mapping));
    }

    #[test]
    fn p4_against_p3() {
        let graphs = vec![path(4), path(3)];
        let solution = solve_plain(&graphs);
        assert_eq!(solution.mapping.len(), 3);
        assert!(verify_mapping(&graphs, &solution.mapping));
    }

    #[test]
    fn disjoint_edges_against_one_edge() {
        let two_k2 = Graph::from_edges(4, &[(0, 1), (2, 3)]);
        let k2 = Graph::from_edges(2, &[(0, 1)]);
        let graphs = vec![two_k2, k2];
        let solution = solve_plain(&graphs);
        assert_eq!(solution.mapping.len(), 2);
        assert!(verify_mapping(&graphs, &solution.mapping));
    }

    #[test]
    fn disjoint_label_sets_have_no_common_subgraph() {
        let mut a = triangle();
        let mut b = triangle();
        for v in 0..3 {
            a.add_label(v, 1);
            b.add_label(v, 2);
        }
        let settings = Settings {
            vertex_labelled: true,
            ..Settings::default()
        };
        let solution = solve(&[a, b], &settings);
        assert_eq!(solution.mapping.len(), 0);
    }

    #[test]
    fn three_way_squares() {
        let graphs = vec![cycle(4), cycle(4), cycle(4)];
        let solution = solve_plain(&graphs);
        assert_eq!(solution.mapping.len(), 4);
        assert!(verify_mapping(&graphs, &solution.mapping));
    }

    #[test]
    fn vertex_labels_restrict_the_mapping() {
        let mut a = triangle();
        let mut b = triangle();
        for v in 0..3 {
            a.add_label(v, v + 1);
            b.add_label(v, v + 1);
        }
        let graphs = vec![a, b];
        let settings = Settings {
            vertex_labelled: true,
            ..Settings::default()
        };
        let solution = solve(&graphs, &settings);
        assert_eq!(solution.mapping.len(), 3);
        assert!(verify_mapping(&graphs, &solution.mapping));
    }

    #[test]
    fn connected_mode_limits_to_one_component() {
        // every connected common induced subgraph of P4 and K2+K2 fits
        // inside a single edge
        let p4 = path(4);
        let two_k2 = Graph::from_edges(4, &[(0, 1), (2, 3)]);
        let settings = Settings {
            connected: true,
            ..Settings::default()
        };
        let solution = solve(&[p4, two_k2], &settings);
        assert_eq!(solution.mapping.len(), 2);
    }

    #[test]
    fn directed_cycle_against_directed_path() {
        let mut cycle3 = Graph::new(3);
        for v in 0..3 {
            cycle3.add_edge(v, (v + 1) % 3, true, 1);
        }
        let mut path3 = Graph::new(3);
        path3.add_edge(0, 1, true, 1);
        path3.add_edge(1, 2, true, 1);

        let settings = Settings {
            directed: true,
            ..Settings::default()
        };
        let graphs = vec![cycle3, path3];
        let solution = solve(&graphs, &settings);
        assert_eq!(solution.mapping.len(), 2);
        assert!(verify_mapping(&graphs, &solution.mapping));
    }

    #[test]
    fn empty_graph_yields_empty_mapping() {
        let solution = solve_plain(&[Graph::new(0), triangle()]);
        assert_eq!(solution.mapping.len(), 0);
        assert_eq!(solution.nodes, 1);
    }

    #[test]
    fn all_heuristics_agree_on_the_cardinality() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let a = generate_labelled_gnp(&mut rng, 9, 0.4, 2);
        let b = generate_labelled_gnp(&mut rng, 9, 0.4, 2);
        let graphs = vec![a, b];

        let sizes = [
            settings::Heuristic::MinMax,
            settings::Heuristic::MinMin,
            settings::Heuristic::MinSum,
            settings::Heuristic::MinProduct,
        ]
        .iter()
        .map(|&heuristic| {
            let settings = Settings {
                heuristic,
                vertex_labelled: true,
                ..Settings::default()
            };
            let solution = solve(&graphs, &settings);
            assert!(verify_mapping(&graphs, &solution.mapping));
            solution.mapping.len()
        })
        .collect_vec();

        assert!(sizes.iter().all(|&s| s == sizes[0]));
    }

    #[test]
    fn parallel_and_sequential_cardinalities_agree() {
        let mut rng = Pcg64Mcg::seed_from_u64(42);
        for _ in 0..4 {
            let a = generate_labelled_gnp(&mut rng, 10, 0.35, 2);
            let b = generate_labelled_gnp(&mut rng, 10, 0.35, 2);
            let graphs = vec![a, b];

            let single = Settings {
                threads: 1,
                vertex_labelled: true,
                ..Settings::default()
            };
            let multi = Settings {
                threads: 4,
                vertex_labelled: true,
                ..Settings::default()
            };

            let sequential = solve(&graphs, &single);
            let parallel = solve(&graphs, &multi);

            assert!(verify_mapping(&graphs, &sequential.mapping));
            assert!(verify_mapping(&graphs, &parallel.mapping));
            assert_eq!(sequential.mapping.len(), parallel.mapping.len());
        }
    }

    #[test]
    fn big_first_matches_plain_optimisation() {
        let mut rng = Pcg64Mcg::seed_from_u64(11);
        for _ in 0..3 {
            let a = generate_labelled_gnp(&mut rng, 8, 0.4, 2);
            let b = generate_labelled_gnp(&mut rng, 8, 0.4, 2);
            let graphs = vec![a, b];

            let plain = Settings {
                vertex_labelled: true,
                ..Settings::default()
            };
            let big_first = Settings {
                big_first: true,
                quiet: true,
                vertex_labelled: true,
                ..Settings::default()
            };

            let expected = solve(&graphs, &plain).mapping.len();
            let solution = solve(&graphs, &big_first);
            assert_eq!(solution.mapping.len(), expected);
            assert!(verify_mapping(&graphs, &solution.mapping));
        }
    }

    #[test]
    fn mapping_round_trips_through_its_induced_subgraphs() {
        let mut rng = Pcg64Mcg::seed_from_u64(23);
        let a = generate_labelled_gnp(&mut rng, 9, 0.4, 2);
        let b = generate_labelled_gnp(&mut rng, 9, 0.4, 2);
        let graphs = vec![a, b];
        let settings = Settings {
            vertex_labelled: true,
            ..Settings::default()
        };

        let solution = solve(&graphs, &settings);
        if solution.mapping.is_empty() {
            return;
        }

        // re-solving on the induced subgraphs must reproduce the cardinality
        let induced = (0..2)
            .map(|i| {
                let vertices = solution.mapping.iter().map(|t| t[i]).collect_vec();
                graphs[i].induced_subgraph(&vertices)
            })
            .collect_vec();
        let again = solve(&induced, &settings);
        assert_eq!(again.mapping.len(), solution.mapping.len());
    }

    #[test]
    fn generous_timeout_does_not_disturb_the_result() {
        let graphs = vec![triangle(), triangle()];
        let settings = Settings {
            timeout: 3600,
            ..Settings::default()
        };
        let solution = solve(&graphs, &settings);
        assert_eq!(solution.mapping.len(), 3);
        assert!(!solution.timed_out);
    }
}
