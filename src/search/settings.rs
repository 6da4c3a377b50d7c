use crate::graph::MAX_GRAPHS;
use std::convert::TryFrom;

/// Scoring rule used to pick the next multi-domain to branch on. All four
/// minimise their score; smaller domains are branched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// Largest window length.
    MinMax,
    /// Smallest window length.
    MinMin,
    /// Sum of window lengths.
    MinSum,
    /// Product of window lengths.
    MinProduct,
}

impl Default for Heuristic {
    fn default() -> Self {
        Heuristic::MinMax
    }
}

impl TryFrom<&str> for Heuristic {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "min_max" => Ok(Heuristic::MinMax),
            "min_min" => Ok(Heuristic::MinMin),
            "min_sum" => Ok(Heuristic::MinSum),
            "min_product" => Ok(Heuristic::MinProduct),
            _ => Err(format!("'{}' is an invalid heuristic.", value)),
        }
    }
}

/// Order in which the K graph positions of the branching domain are visited.
/// Position 0 of the permutation is the graph whose smallest vertex is fixed
/// as the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Shortest window first.
    Ascending,
    /// Longest window first.
    Descending,
    /// Shortest, longest, second-shortest, second-longest, ...
    Oscillating,
}

impl Default for AxisOrder {
    fn default() -> Self {
        AxisOrder::Ascending
    }
}

impl TryFrom<&str> for AxisOrder {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "ascending" => Ok(AxisOrder::Ascending),
            "descending" => Ok(AxisOrder::Descending),
            "oscillating" => Ok(AxisOrder::Oscillating),
            _ => Err(format!("'{}' is an invalid axis order.", value)),
        }
    }
}

/// Search configuration shared by every worker of one solve.
#[derive(Debug, Clone)]
pub struct Settings {
    pub heuristic: Heuristic,
    pub axis_order: AxisOrder,
    /// Only enumerate connected common subgraphs.
    pub connected: bool,
    pub directed: bool,
    pub edge_labelled: bool,
    pub vertex_labelled: bool,
    /// Solve a descending sequence of decision problems instead of a single
    /// optimisation run.
    pub big_first: bool,
    /// Suppress goal progress reporting.
    pub quiet: bool,
    /// Wall-clock limit in seconds; 0 disables the limit.
    pub timeout: u64,
    pub threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heuristic: Heuristic::default(),
            axis_order: AxisOrder::default(),
            connected: false,
            directed: false,
            edge_labelled: false,
            vertex_labelled: false,
            big_first: false,
            quiet: false,
            timeout: 0,
            threads: num_cpus::get(),
        }
    }
}

impl Settings {
    /// The domain filter must split neighbour windows per label whenever edges
    /// carry more than presence information.
    pub fn multiway(&self) -> bool {
        self.directed || self.edge_labelled
    }

    /// Checks this configuration against a K-graph instance.
    pub fn validate(&self, k: usize) -> Result<(), String> {
        if !(2..=MAX_GRAPHS).contains(&k) {
            return Err(format!(
                "Expected between 2 and {} input graphs, got {}.",
                MAX_GRAPHS, k
            ));
        }
        if self.connected && self.directed {
            return Err("The connected and directed options are mutually exclusive.".to_string());
        }
        if self.threads == 0 {
            return Err("At least one thread is required.".to_string());
        }
        Ok(())
    }
}
