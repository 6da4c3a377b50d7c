use super::{Graph, Node};
use rand::Rng;

/// Generates a Gilbert G(n,p) graph: each of the n(n-1)/2 undirected edges
/// exists independently with probability p.
pub fn generate_gnp<R: Rng>(rng: &mut R, n: usize, p: f64) -> Graph {
    assert!((0.0..=1.0).contains(&p));
    let mut g = Graph::new(n);
    for v in 0..n as Node {
        for w in v + 1..n as Node {
            if rng.gen_bool(p) {
                g.add_edge(v, w, false, 1);
            }
        }
    }
    g
}

/// Same as [`generate_gnp`], with every vertex additionally assigned a label
/// drawn uniformly from `0..label_count`.
pub fn generate_labelled_gnp<R: Rng>(
    rng: &mut R,
    n: usize,
    p: f64,
    label_count: u32,
) -> Graph {
    let mut g = generate_gnp(rng, n, p);
    for v in 0..n as Node {
        g.add_label(v, rng.gen_range(0..label_count));
    }
    g
}
