use crate::graph::{Graph, Node, MAX_GRAPHS};
use crate::search::settings::{AxisOrder, Heuristic};
use arrayvec::ArrayVec;
use std::cmp::Reverse;

/// Axis permutation over the K graph positions of one branching step.
pub type AxisPerm = ArrayVec<usize, MAX_GRAPHS>;

/// Partner slots under construction while the odometer runs; `None` marks an
/// axis not yet bound.
pub type PartialTuple = [Option<Node>; MAX_GRAPHS];

/// A K-tuple of candidate windows, one per graph, into the per-graph vertex
/// buffers. Any tuple drawn one-per-window is a legal next mapping element
/// with respect to the constraints accumulated so far.
#[derive(Debug, Clone, Copy)]
pub struct MultiDomain {
    starts: [u32; MAX_GRAPHS],
    lens: [u32; MAX_GRAPHS],
    /// Set when the windows were carved out of the neighbourhood of an
    /// already-chosen vertex; consulted only in connected mode.
    pub is_adjacent: bool,
}

impl MultiDomain {
    pub fn new(starts: [u32; MAX_GRAPHS], lens: [u32; MAX_GRAPHS], is_adjacent: bool) -> Self {
        Self {
            starts,
            lens,
            is_adjacent,
        }
    }

    #[inline]
    pub fn start(&self, i: usize) -> usize {
        self.starts[i] as usize
    }

    #[inline]
    pub fn len(&self, i: usize) -> usize {
        self.lens[i] as usize
    }

    /// Reserves the trailing slot of window `i` (used to stage chosen
    /// partners during enumeration).
    #[inline]
    pub fn shrink(&mut self, i: usize) {
        self.lens[i] -= 1;
    }

    #[inline]
    pub fn grow(&mut self, i: usize) {
        self.lens[i] += 1;
    }

    pub fn min_len(&self, k: usize) -> usize {
        self.lens[..k].iter().copied().min().unwrap_or(0) as usize
    }

    pub fn max_len(&self, k: usize) -> usize {
        self.lens[..k].iter().copied().max().unwrap_or(0) as usize
    }

    fn score(&self, k: usize, heuristic: Heuristic) -> u64 {
        match heuristic {
            Heuristic::MinMax => self.max_len(k) as u64,
            Heuristic::MinMin => self.min_len(k) as u64,
            Heuristic::MinSum => self.lens[..k].iter().map(|&l| l as u64).sum(),
            Heuristic::MinProduct => self.lens[..k]
                .iter()
                .fold(1u64, |acc, &l| acc.saturating_mul(l as u64)),
        }
    }
}

/// Admissible upper bound on how many tuples the given domains can still
/// contribute: each domain is worth at most its smallest window.
pub fn calc_bound(domains: &[MultiDomain], k: usize) -> usize {
    domains.iter().map(|bd| bd.min_len(k)).sum()
}

/// Picks the next domain to branch on: smallest heuristic score, ties broken
/// by the smallest vertex index in the graph-0 window. In connected mode only
/// adjacent domains qualify once the mapping is non-empty.
pub fn select_domain(
    domains: &[MultiDomain],
    buf0: &[Node],
    k: usize,
    heuristic: Heuristic,
    connected: bool,
    current_size: usize,
) -> Option<usize> {
    let mut best = None;
    let mut best_score = u64::MAX;
    let mut best_tie = Node::MAX;

    for (idx, bd) in domains.iter().enumerate() {
        if connected && current_size > 0 && !bd.is_adjacent {
            continue;
        }
        let score = bd.score(k, heuristic);
        if score > best_score {
            continue;
        }
        let tie = min_in_window(buf0, bd.start(0), bd.len(0));
        if score < best_score || tie < best_tie {
            best_score = score;
            best_tie = tie;
            best = Some(idx);
        }
    }
    best
}

/// Smallest vertex index inside a window. Windows of live domains are never
/// empty.
fn min_in_window(buf: &[Node], start: usize, len: usize) -> Node {
    buf[start..start + len]
        .iter()
        .copied()
        .min()
        .expect("empty domain window")
}

/// Moves the vertices matched by `adjrow` to the front of the window and
/// returns how many there are.
fn partition(buf: &mut [Node], start: usize, len: usize, adjrow: &[u32]) -> usize {
    let mut boundary = 0;
    for j in 0..len {
        if adjrow[buf[start + j] as usize] != 0 {
            buf.swap(start + boundary, start + j);
            boundary += 1;
        }
    }
    boundary
}

/// Refines every domain against the freshly chosen tuple `vertex` and returns
/// the refined list. Buffer windows are partitioned in place; shallower
/// frames stay valid because reordering never leaves a window.
///
/// In the multiway case (directed or edge-labelled graphs) the neighbour
/// halves are split further into one domain per shared adjacency label.
pub fn filter_domains(
    domains: &[MultiDomain],
    bufs: &mut [Vec<Node>],
    graphs: &[Graph],
    vertex: &[Node],
    multiway: bool,
) -> Vec<MultiDomain> {
    let k = vertex.len();
    let mut refined = Vec::with_capacity(domains.len());

    for old in domains {
        let mut edge_len = [0u32; MAX_GRAPHS];
        let mut noedge_len = [0u32; MAX_GRAPHS];
        for i in 0..k {
            let row = graphs[i].adj_row(vertex[i]);
            edge_len[i] = partition(&mut bufs[i], old.start(i), old.len(i), row) as u32;
            noedge_len[i] = old.lens[i] - edge_len[i];
        }

        if (0..k).all(|i| noedge_len[i] > 0) {
            let mut starts = [0u32; MAX_GRAPHS];
            for i in 0..k {
                starts[i] = old.starts[i] + edge_len[i];
            }
            refined.push(MultiDomain::new(starts, noedge_len, old.is_adjacent));
        }

        let have_edges = (0..k).all(|i| edge_len[i] > 0);
        if multiway && have_edges {
            multiway_split(&mut refined, bufs, graphs, vertex, old, &edge_len);
        } else if have_edges {
            refined.push(MultiDomain::new(old.starts, edge_len, true));
        }
    }
    refined
}

/// Splits the neighbour halves of `old` into label-homogeneous groups: each
/// window is sorted by the adjacency word from the chosen vertex, then the K
/// cursors sweep in lockstep emitting one domain whenever all agree.
fn multiway_split(
    refined: &mut Vec<MultiDomain>,
    bufs: &mut [Vec<Node>],
    graphs: &[Graph],
    vertex: &[Node],
    old: &MultiDomain,
    edge_len: &[u32; MAX_GRAPHS],
) {
    let k = vertex.len();
    let mut cursors = [0usize; MAX_GRAPHS];
    let mut tops = [0usize; MAX_GRAPHS];

    for i in 0..k {
        let start = old.start(i);
        let top = start + edge_len[i] as usize;
        let row = graphs[i].adj_row(vertex[i]);
        bufs[i][start..top].sort_by_key(|&u| row[u as usize]);
        cursors[i] = start;
        tops[i] = top;
    }

    while (0..k).all(|i| cursors[i] < tops[i]) {
        let mut labels = [0u32; MAX_GRAPHS];
        for i in 0..k {
            labels[i] = graphs[i].adj(vertex[i], bufs[i][cursors[i]]);
        }
        let top_label = labels[..k].iter().copied().max().expect("k >= 1");

        if (0..k).all(|i| labels[i] == top_label) {
            // all cursors sit on the same label; emit its group
            let mut starts = [0u32; MAX_GRAPHS];
            let mut lens = [0u32; MAX_GRAPHS];
            for i in 0..k {
                starts[i] = cursors[i] as u32;
                loop {
                    cursors[i] += 1;
                    if cursors[i] >= tops[i]
                        || graphs[i].adj(vertex[i], bufs[i][cursors[i]]) != top_label
                    {
                        break;
                    }
                }
                lens[i] = cursors[i] as u32 - starts[i];
            }
            refined.push(MultiDomain::new(starts, lens, true));
        } else {
            for i in 0..k {
                if labels[i] != top_label {
                    cursors[i] += 1;
                }
            }
        }
    }
}

/// Index (relative to `start`) of the smallest value in the window that is
/// strictly greater than `w`; any value qualifies when `w` is `None`.
fn index_of_next_smallest(
    buf: &[Node],
    start: usize,
    len: usize,
    w: Option<Node>,
) -> Option<usize> {
    let mut best: Option<(usize, Node)> = None;
    for (i, &value) in buf[start..start + len].iter().enumerate() {
        if w.map_or(true, |w| value > w) && best.map_or(true, |(_, b)| value < b) {
            best = Some((i, value));
        }
    }
    best.map(|(i, _)| i)
}

/// Drops `v` from window `pos` by swapping it onto the trailing slot.
fn remove_vertex(buf: &mut [Node], bd: &mut MultiDomain, pos: usize, v: Node) {
    let start = bd.start(pos);
    let len = bd.len(pos);
    let idx = buf[start..start + len]
        .iter()
        .position(|&u| u == v)
        .expect("vertex missing from its window");
    buf.swap(start + idx, start + len - 1);
    bd.lens[pos] -= 1;
}

/// Orders the K graph positions of `bd` for branching; position 0 is the
/// pivot graph.
pub fn axis_permutation(bd: &MultiDomain, k: usize, order: AxisOrder) -> AxisPerm {
    let mut perm: AxisPerm = (0..k).collect();
    match order {
        AxisOrder::Ascending => perm.sort_by_key(|&g| bd.len(g)),
        AxisOrder::Descending => perm.sort_by_key(|&g| Reverse(bd.len(g))),
        AxisOrder::Oscillating => {
            let mut ascending = perm.clone();
            ascending.sort_by_key(|&g| bd.len(g));
            for i in 0..k {
                perm[i] = if i % 2 == 0 {
                    ascending[i / 2]
                } else {
                    ascending[k - 1 - i / 2]
                };
            }
        }
    }
    perm
}

/// Fixes the branching pivot: shrinks every non-pivot window by one (staging
/// room for partner enumeration), removes the smallest vertex of the pivot
/// window, and binds it into the returned partial tuple.
pub fn fix_pivot(bufs: &mut [Vec<Node>], bd: &mut MultiDomain, perm: &AxisPerm) -> PartialTuple {
    for &g in &perm[1..] {
        bd.shrink(g);
    }

    let pivot_graph = perm[0];
    let v = min_in_window(&bufs[pivot_graph], bd.start(pivot_graph), bd.len(pivot_graph));
    remove_vertex(&mut bufs[pivot_graph], bd, pivot_graph, v);

    let mut partial = [None; MAX_GRAPHS];
    partial[pivot_graph] = Some(v);
    partial
}

/// Advances the partner slot of graph `pos` to the next-larger candidate,
/// parking it on the staged trailing slot of the window. Returns false when
/// the axis is exhausted. Enumeration is therefore strictly increasing in
/// vertex index.
pub fn advance_partner(
    buf: &mut [Node],
    bd: &MultiDomain,
    pos: usize,
    slot: &mut Option<Node>,
) -> bool {
    let start = bd.start(pos);
    let len = bd.len(pos);
    match index_of_next_smallest(buf, start, len + 1, *slot) {
        None => false,
        Some(idx) => {
            let w = buf[start + idx];
            buf[start + idx] = buf[start + len];
            buf[start + len] = w;
            *slot = Some(w);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain2(l0: &[(u32, u32)], adjacent: bool) -> MultiDomain {
        let mut starts = [0u32; MAX_GRAPHS];
        let mut lens = [0u32; MAX_GRAPHS];
        for (i, &(s, l)) in l0.iter().enumerate() {
            starts[i] = s;
            lens[i] = l;
        }
        MultiDomain::new(starts, lens, adjacent)
    }

    #[test]
    fn bound_sums_the_smallest_windows() {
        let domains = vec![
            domain2(&[(0, 3), (0, 5)], false),
            domain2(&[(3, 2), (5, 1)], false),
        ];
        assert_eq!(calc_bound(&domains, 2), 3 + 1);
        assert_eq!(calc_bound(&[], 2), 0);
    }

    #[test]
    fn selection_scores_and_breaks_ties_on_graph0_vertices() {
        let buf0 = vec![7, 8, 2, 4];
        let domains = vec![
            domain2(&[(0, 2), (0, 4)], false), // max 4, min vertex 7
            domain2(&[(2, 2), (4, 2)], false), // max 2, min vertex 2
        ];
        assert_eq!(
            select_domain(&domains, &buf0, 2, Heuristic::MinMax, false, 0),
            Some(1)
        );

        // same score, second domain holds the smaller graph-0 vertex
        let tied = vec![
            domain2(&[(0, 2), (0, 2)], false),
            domain2(&[(2, 2), (4, 2)], false),
        ];
        assert_eq!(
            select_domain(&tied, &buf0, 2, Heuristic::MinMax, false, 0),
            Some(1)
        );
    }

    #[test]
    fn connected_mode_only_branches_on_adjacent_domains() {
        let buf0 = vec![0, 1];
        let domains = vec![domain2(&[(0, 1), (0, 1)], false)];
        assert_eq!(
            select_domain(&domains, &buf0, 2, Heuristic::MinMax, true, 1),
            None
        );
        // with an empty mapping the restriction does not apply yet
        assert_eq!(
            select_domain(&domains, &buf0, 2, Heuristic::MinMax, true, 0),
            Some(0)
        );
    }

    #[test]
    fn partition_moves_neighbours_first() {
        let mut buf = vec![0, 1, 2, 3];
        let adjrow = vec![0, 1, 0, 1];
        let edges = partition(&mut buf, 0, 4, &adjrow);
        assert_eq!(edges, 2);
        let (front, back) = buf.split_at(2);
        assert!(front.iter().all(|&v| adjrow[v as usize] != 0));
        assert!(back.iter().all(|&v| adjrow[v as usize] == 0));
    }

    #[test]
    fn next_smallest_walks_in_increasing_order() {
        let buf = vec![5, 1, 9, 3];
        let mut picked = Vec::new();
        let mut w = None;
        while let Some(idx) = index_of_next_smallest(&buf, 0, 4, w) {
            w = Some(buf[idx]);
            picked.push(buf[idx]);
        }
        assert_eq!(picked, vec![1, 3, 5, 9]);
    }

    #[test]
    fn filtering_splits_into_neighbour_and_non_neighbour_halves() {
        // path 0-1-2 in both graphs; choose (1, 1)
        let g = Graph::from_edges(3, &[(0, 1), (1, 2)]);
        let graphs = vec![g.clone(), g];
        let mut bufs = vec![vec![0, 1, 2], vec![0, 1, 2]];
        let domains = vec![domain2(&[(0, 3), (0, 3)], false)];

        // pretend (1,1) was chosen and removed from the windows
        let mut bd = domains[0];
        remove_vertex(&mut bufs[0], &mut bd, 0, 1);
        remove_vertex(&mut bufs[1], &mut bd, 1, 1);

        let refined = filter_domains(&[bd], &mut bufs, &graphs, &[1, 1], false);
        // both 0 and 2 neighbour vertex 1: one adjacent domain, no rest
        assert_eq!(refined.len(), 1);
        assert!(refined[0].is_adjacent);
        assert_eq!(refined[0].len(0), 2);
        assert_eq!(refined[0].len(1), 2);
    }

    #[test]
    fn multiway_filtering_groups_by_edge_label() {
        // star with differently labelled spokes in both graphs
        let mut g = Graph::new(3);
        g.add_edge(0, 1, false, 2);
        g.add_edge(0, 2, false, 3);
        let graphs = vec![g.clone(), g];
        let mut bufs = vec![vec![1, 2], vec![1, 2]];
        let bd = domain2(&[(0, 2), (0, 2)], false);

        let refined = filter_domains(&[bd], &mut bufs, &graphs, &[0, 0], true);
        // one domain per spoke label, each of width 1
        assert_eq!(refined.len(), 2);
        for domain in &refined {
            assert!(domain.is_adjacent);
            assert_eq!(domain.len(0), 1);
            assert_eq!(domain.len(1), 1);
        }
        // groups pair equal labels across the two graphs
        for domain in &refined {
            let v0 = bufs[0][domain.start(0)];
            let v1 = bufs[1][domain.start(1)];
            assert_eq!(graphs[0].adj(0, v0), graphs[1].adj(0, v1));
        }
    }

    #[test]
    fn pivot_fixing_stages_the_trailing_slots() {
        let mut bufs = vec![vec![4, 2, 7], vec![0, 1, 2]];
        let mut bd = domain2(&[(0, 3), (0, 3)], false);
        let perm: AxisPerm = [0usize, 1].iter().copied().collect();

        let partial = fix_pivot(&mut bufs, &mut bd, &perm);
        assert_eq!(partial[0], Some(2));
        assert_eq!(bd.len(0), 2); // pivot window lost its minimum
        assert_eq!(bd.len(1), 2); // partner window shrunk for staging
        assert!(!bufs[0][..bd.len(0)].contains(&2));

        // partner enumeration sees all three original vertices
        let mut slot = None;
        let mut seen = Vec::new();
        while advance_partner(&mut bufs[1], &bd, 1, &mut slot) {
            seen.push(slot.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
