pub mod generators;
pub mod io;

pub type Node = u32;

/// Cap on the number of input graphs of one search. Keeps vertex tuples and
/// axis permutations in fixed-capacity storage on the hot path.
pub const MAX_GRAPHS: usize = 10;

/// Mask selecting the forward-edge half of an adjacency cell.
pub const FORWARD_MASK: u32 = 0xFFFF;

/// A vertex with a self-loop is marked by the top bit of its label.
pub const LOOP_FLAG: u32 = 1 << 31;

/// A labelled graph over a dense adjacency matrix.
///
/// Each cell packs two half-words: the low 16 bits carry the forward-edge
/// label, the high 16 bits the reverse-edge label (populated for directed
/// graphs only). Stored edge labels are offset by one, so a cell value of
/// zero always means "no edge". The structure is read-only for the whole
/// duration of a search.
#[derive(Clone, Default)]
pub struct Graph {
    n: usize,
    adjmat: Vec<u32>,
    label: Vec<u32>,
}

impl Graph {
    /// Creates an unlabelled graph with `n` vertices and no edges.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            adjmat: vec![0; n * n],
            label: vec![0; n],
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        self.n
    }

    /// The packed adjacency cell for the ordered pair `(v, w)`.
    #[inline]
    pub fn adj(&self, v: Node, w: Node) -> u32 {
        self.adjmat[v as usize * self.n + w as usize]
    }

    /// The adjacency row of `v` as a slice of packed cells.
    #[inline]
    pub fn adj_row(&self, v: Node) -> &[u32] {
        &self.adjmat[v as usize * self.n..(v as usize + 1) * self.n]
    }

    #[inline]
    pub fn label(&self, v: Node) -> u32 {
        self.label[v as usize]
    }

    pub fn has_loop(&self, v: Node) -> bool {
        self.label[v as usize] & LOOP_FLAG != 0
    }

    /// Merges `value` into the label bits of `v` (the loop flag lives in the
    /// top bit and is preserved).
    pub fn add_label(&mut self, v: Node, value: u32) {
        self.label[v as usize] |= value;
    }

    /// Inserts the edge `(v, w)` carrying `value` as its forward label.
    /// `value` must already include the +1 offset; zero cells mean absence.
    /// A loop `(v, v)` is recorded as a flag on the vertex label instead of
    /// occupying the diagonal.
    pub fn add_edge(&mut self, v: Node, w: Node, directed: bool, value: u32) {
        if v == w {
            self.label[v as usize] |= LOOP_FLAG;
        } else if directed {
            self.adjmat[v as usize * self.n + w as usize] |= value;
            self.adjmat[w as usize * self.n + v as usize] |= value << 16;
        } else {
            self.adjmat[v as usize * self.n + w as usize] = value;
            self.adjmat[w as usize * self.n + v as usize] = value;
        }
    }

    /// Builds an undirected, unlabelled graph from an edge list. Intended for
    /// tests and small examples.
    pub fn from_edges(n: usize, edges: &[(Node, Node)]) -> Self {
        let mut g = Self::new(n);
        for &(v, w) in edges {
            g.add_edge(v, w, false, 1);
        }
        g
    }

    /// Number of adjacency half-words set per vertex, counting forward and
    /// reverse edges separately so that directed graphs weigh both
    /// orientations.
    pub fn degrees(&self) -> Vec<u32> {
        (0..self.n as Node)
            .map(|v| {
                self.adj_row(v)
                    .iter()
                    .map(|&cell| {
                        (cell & FORWARD_MASK != 0) as u32 + (cell & !FORWARD_MASK != 0) as u32
                    })
                    .sum()
            })
            .collect()
    }

    /// The subgraph induced by `order`, whose i-th vertex is `order[i]` of
    /// `self`. `order` is typically a permutation; duplicates are not checked.
    pub fn induced_subgraph(&self, order: &[Node]) -> Graph {
        let mut sub = Graph::new(order.len());
        for (i, &v) in order.iter().enumerate() {
            sub.label[i] = self.label[v as usize];
            for (j, &w) in order.iter().enumerate() {
                sub.adjmat[i * sub.n + j] = self.adj(v, w);
            }
        }
        sub
    }
}
