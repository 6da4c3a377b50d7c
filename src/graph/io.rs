use super::{Graph, Node};
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind, Read, Result};
use std::path::Path;

/// On-disk graph encodings accepted by the readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// DIMACS text: `p edge n m`, `e v w` (one-based), `n v label`.
    Dimacs,
    /// LAD text: vertex count, then per vertex its degree and neighbours
    /// (zero-based).
    Lad,
    /// Little-endian two-byte word stream with compressed labels.
    Binary,
    /// Plain text: `n m`, n vertex labels, m zero-based edges.
    Ioi,
}

impl TryFrom<&str> for FileFormat {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "dimacs" => Ok(FileFormat::Dimacs),
            "lad" => Ok(FileFormat::Lad),
            "bin" => Ok(FileFormat::Binary),
            "ioi" => Ok(FileFormat::Ioi),
            _ => Err(format!("'{}' is an invalid graph format.", value)),
        }
    }
}

/// Interpretation switches applied while loading a graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub directed: bool,
    pub edge_labelled: bool,
    pub vertex_labelled: bool,
}

/// Reads a graph file in the given format.
pub fn read_graph_file<P: AsRef<Path>>(
    path: P,
    format: FileFormat,
    opts: LoadOptions,
) -> Result<Graph> {
    let file = File::open(path)?;
    match format {
        FileFormat::Dimacs => read_dimacs(BufReader::new(file), opts),
        FileFormat::Lad => read_lad(BufReader::new(file), opts),
        FileFormat::Binary => read_binary(BufReader::new(file), opts),
        FileFormat::Ioi => read_ioi(BufReader::new(file), opts),
    }
}

fn invalid<T>(msg: &str) -> Result<T> {
    Err(Error::new(ErrorKind::InvalidData, msg.to_string()))
}

/// Number of bits a binary-format label word is shifted right by. The low
/// `k1 = ceil(log2(0.33 n))` bits survive, capped at 16.
fn label_shift(n: usize) -> u32 {
    let m = n * 33 / 100;
    let mut p = 1;
    let mut k1 = 0;
    let mut k2 = 0;
    while p < m && k1 < 16 {
        p *= 2;
        k1 = k2;
        k2 += 1;
    }
    16 - k1
}

pub fn read_dimacs<R: BufRead>(reader: R, opts: LoadOptions) -> Result<Graph> {
    let mut graph: Option<Graph> = None;
    let mut declared_edges = 0usize;
    let mut edges_read = 0usize;

    for line in reader.lines() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("p") => {
                // "p edge n m"
                if tokens.next() != Some("edge") {
                    return invalid("Expected 'edge' on the problem line");
                }
                let n = parse_token(tokens.next(), "vertex count")?;
                declared_edges = parse_token(tokens.next(), "edge count")?;
                graph = Some(Graph::new(n));
            }
            Some("e") => {
                let g = match graph.as_mut() {
                    Some(g) => g,
                    None => return invalid("Edge line before the problem line"),
                };
                let v: Node = parse_token(tokens.next(), "edge endpoint")?;
                let w: Node = parse_token(tokens.next(), "edge endpoint")?;
                if v == 0 || w == 0 {
                    return invalid("DIMACS vertices are one-based");
                }
                if v as usize > g.number_of_nodes() || w as usize > g.number_of_nodes() {
                    return invalid("Edge endpoint out of range");
                }
                g.add_edge(v - 1, w - 1, opts.directed, 1);
                edges_read += 1;
            }
            Some("n") => {
                let g = match graph.as_mut() {
                    Some(g) => g,
                    None => return invalid("Label line before the problem line"),
                };
                let v: Node = parse_token(tokens.next(), "labelled vertex")?;
                let label: u32 = parse_token(tokens.next(), "vertex label")?;
                if v == 0 || v as usize > g.number_of_nodes() {
                    return invalid("Labelled vertex out of range");
                }
                if opts.vertex_labelled {
                    g.add_label(v - 1, label);
                }
            }
            _ => {}
        }
    }

    if declared_edges > 0 && edges_read != declared_edges {
        return invalid("Unexpected number of edges");
    }
    match graph {
        Some(g) => Ok(g),
        None => invalid("No problem line found"),
    }
}

pub fn read_lad<R: BufRead>(reader: R, opts: LoadOptions) -> Result<Graph> {
    let mut scanner = TokenScanner::new(reader)?;
    let n: usize = scanner.next("vertex count")?;
    let mut g = Graph::new(n);

    for v in 0..n as Node {
        let degree: usize = scanner.next("vertex degree")?;
        for _ in 0..degree {
            let w: Node = scanner.next("neighbour index")?;
            if w as usize >= n {
                return invalid("Neighbour index out of range");
            }
            g.add_edge(v, w, opts.directed, 1);
        }
    }
    Ok(g)
}

pub fn read_ioi<R: BufRead>(reader: R, opts: LoadOptions) -> Result<Graph> {
    let mut scanner = TokenScanner::new(reader)?;
    let n: usize = scanner.next("vertex count")?;
    let m: usize = scanner.next("edge count")?;
    let mut g = Graph::new(n);

    for v in 0..n as Node {
        let label: u32 = scanner.next("vertex label")?;
        if opts.vertex_labelled {
            g.add_label(v, label);
        }
    }
    for _ in 0..m {
        let v: Node = scanner.next("edge endpoint")?;
        let w: Node = scanner.next("edge endpoint")?;
        if v as usize >= n || w as usize >= n {
            return invalid("Edge endpoint out of range");
        }
        g.add_edge(v, w, opts.directed, 1);
    }
    Ok(g)
}

pub fn read_binary<R: Read>(mut reader: R, opts: LoadOptions) -> Result<Graph> {
    let n = read_word(&mut reader)? as usize;
    let shift = label_shift(n);
    let mut g = Graph::new(n);

    for v in 0..n as Node {
        let label = read_word(&mut reader)? >> shift;
        if opts.vertex_labelled {
            g.add_label(v, label);
        }
    }

    for v in 0..n as Node {
        let len = read_word(&mut reader)?;
        for _ in 0..len {
            let target = read_word(&mut reader)?;
            if target as usize >= n {
                return invalid("Edge target out of range");
            }
            let label = (read_word(&mut reader)? >> shift) + 1;
            g.add_edge(v, target, opts.directed, if opts.edge_labelled { label } else { 1 });
        }
    }
    Ok(g)
}

fn read_word<R: Read>(reader: &mut R) -> Result<u32> {
    let mut word = [0u8; 2];
    reader.read_exact(&mut word)?;
    Ok(u32::from(word[0]) | (u32::from(word[1]) << 8))
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>, what: &str) -> Result<T> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, format!("Cannot parse {}", what)))
}

/// Pulls whitespace-separated integers out of a text stream.
struct TokenScanner {
    tokens: std::vec::IntoIter<String>,
}

impl TokenScanner {
    fn new<R: BufRead>(mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let tokens = content
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into_iter();
        Ok(Self { tokens })
    }

    fn next<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        parse_token(self.tokens.next().as_deref(), what)
    }
}
