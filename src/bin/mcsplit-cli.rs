#![deny(warnings)]

use itertools::Itertools;
use log::{info, LevelFilter};
use mcsplit::graph::io::{read_graph_file, FileFormat, LoadOptions};
use mcsplit::graph::Graph;
use mcsplit::search::settings::{AxisOrder, Heuristic, Settings};
use mcsplit::search::{solve, verify_mapping};
use std::convert::TryFrom;
use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::time::Instant;
use structopt::StructOpt;

#[cfg(feature = "jemallocator")]
#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(feature = "jemallocator")]
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mcsplit-cli",
    about = "Computes a maximum common induced subgraph of two or more labelled graphs."
)]
struct Opt {
    /// Input format: 'dimacs', 'lad', 'bin' or 'ioi'.
    #[structopt(short, long, default_value = "bin")]
    format: String,

    /// Branching heuristic: 'min_max', 'min_min', 'min_sum' or 'min_product'.
    #[structopt(long, default_value = "min_max")]
    heuristic: String,

    /// Axis order: 'ascending', 'descending' or 'oscillating'.
    #[structopt(long, default_value = "ascending")]
    axis_order: String,

    /// Only search for connected common subgraphs.
    #[structopt(short, long)]
    connected: bool,

    /// Treat the graphs as directed.
    #[structopt(short, long)]
    directed: bool,

    /// Use edge and vertex labels.
    #[structopt(short, long)]
    labelled: bool,

    /// Use vertex labels only.
    #[structopt(long)]
    vertex_labelled: bool,

    /// Search by decreasing target size instead of increasing incumbent.
    #[structopt(short, long)]
    big_first: bool,

    /// Suppress progress reporting.
    #[structopt(short, long)]
    quiet: bool,

    /// Wall-clock limit in seconds; 0 disables the limit.
    #[structopt(short, long, default_value = "0")]
    timeout: u64,

    /// Number of threads. Defaults to the available hardware parallelism.
    #[structopt(short = "p", long)]
    threads: Option<usize>,

    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Input graph files (two or more).
    #[structopt(required = true)]
    input: Vec<PathBuf>,
}

fn main() -> std::io::Result<()> {
    let opt = Opt::from_args();
    mcsplit::log::build_logger_for_verbosity(LevelFilter::Warn, opt.verbose);

    let format =
        FileFormat::try_from(opt.format.as_str()).expect("Failed parsing 'format' parameter: ");
    let heuristic = Heuristic::try_from(opt.heuristic.as_str())
        .expect("Failed parsing 'heuristic' parameter: ");
    let axis_order = AxisOrder::try_from(opt.axis_order.as_str())
        .expect("Failed parsing 'axis_order' parameter: ");

    let settings = Settings {
        heuristic,
        axis_order,
        connected: opt.connected,
        directed: opt.directed,
        edge_labelled: opt.labelled,
        vertex_labelled: opt.labelled || opt.vertex_labelled,
        big_first: opt.big_first,
        quiet: opt.quiet,
        timeout: opt.timeout,
        threads: opt.threads.unwrap_or_else(num_cpus::get),
    };
    settings
        .validate(opt.input.len())
        .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg))?;

    let load = LoadOptions {
        directed: settings.directed,
        edge_labelled: settings.edge_labelled,
        vertex_labelled: settings.vertex_labelled,
    };
    let graphs = opt
        .input
        .iter()
        .map(|path| {
            info!("Reading {:?}", path);
            read_graph_file(path, format, load)
        })
        .collect::<std::io::Result<Vec<Graph>>>()?;

    let started = Instant::now();
    let solution = solve(&graphs, &settings);
    let elapsed = started.elapsed();

    println!("Solution size {}", solution.mapping.len());
    let line = solution
        .mapping
        .iter()
        .sorted_by_key(|tuple| tuple[0])
        .map(|tuple| format!("({})", tuple.iter().join(" -> ")))
        .join(" ");
    println!("{}", line);

    println!("Nodes:                      {}", solution.nodes);
    println!("CPU time (ms):              {}", elapsed.as_millis());
    if solution.timed_out {
        println!("TIMEOUT");
    }

    if !verify_mapping(&graphs, &solution.mapping) {
        eprintln!("*** Error: Invalid solution");
        std::process::exit(1);
    }

    println!(
        ">>> {} - {} - {}",
        solution.mapping.len(),
        solution.nodes,
        elapsed.as_secs_f64()
    );

    Ok(())
}
