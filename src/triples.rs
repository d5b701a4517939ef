//! Flattening graphs into `(subject, predicate, object)` triples and the
//! header-less CSV form used to exchange them.
//!
//! The CSV form does no quoting or escaping: ids and predicates never contain
//! commas in practice, and a field that does will not read back intact.

use crate::error::{Result, StixError};
use crate::graph::StixGraph;
use crate::types::{stix_type_from_id, Triple};
use rustc_hash::FxHashSet;
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripleOptions {
    /// Emit each distinct triple once
    pub deduplicate: bool,
    /// With `deduplicate`, treat `(s, p, o)` and `(o, p, s)` as the same triple
    pub undirected: bool,
    /// Replace subject and object ids by their STIX types
    pub reduce_to_types: bool,
}

/// One triple per edge, in edge insertion order.
pub fn graph_to_triples(graph: &StixGraph, options: TripleOptions) -> Vec<Triple> {
    let mut seen: FxHashSet<Triple> = FxHashSet::default();
    let mut triples = Vec::with_capacity(graph.edge_count());

    for edge in graph.edges() {
        let mut triple = edge.to_triple();
        if options.reduce_to_types {
            triple = Triple::new(
                stix_type_from_id(&triple.subject),
                triple.predicate.as_str(),
                stix_type_from_id(&triple.object),
            );
        }

        if options.deduplicate {
            if seen.contains(&triple) {
                continue;
            }
            if options.undirected {
                seen.insert(triple.reversed());
            }
            seen.insert(triple.clone());
        }
        triples.push(triple);
    }

    triples
}

/// Render triples as `s,p,o` lines.
pub fn to_csv(triples: &[Triple]) -> String {
    let mut out = String::new();
    for t in triples {
        out.push_str(&t.to_string());
        out.push('\n');
    }
    out
}

pub fn write_csv<W: Write>(mut writer: W, triples: &[Triple]) -> io::Result<()> {
    for t in triples {
        writeln!(writer, "{}", t)?;
    }
    writer.flush()
}

/// Parse `s,p,o` lines. Blank lines are skipped; the object keeps any
/// further commas.
pub fn parse_csv(text: &str) -> Result<Vec<Triple>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| parse_line(n + 1, line))
        .collect()
}

pub fn read_csv<R: BufRead>(reader: R) -> Result<Vec<Triple>> {
    let mut triples = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StixError::io("<stdin>", e))?;
        if line.trim().is_empty() {
            continue;
        }
        triples.push(parse_line(n + 1, &line)?);
    }
    Ok(triples)
}

fn parse_line(line_number: usize, line: &str) -> Result<Triple> {
    let mut fields = line.trim_end_matches(['\r', '\n']).splitn(3, ',').map(str::trim);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(s), Some(p), Some(o)) if !s.is_empty() && !p.is_empty() && !o.is_empty() => {
            Ok(Triple::new(s, p, o))
        }
        _ => Err(StixError::malformed_triple(line_number, line)),
    }
}
