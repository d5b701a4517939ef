//! The `summary` command.

use crate::decoders::Decoder;
use crate::graph::{build_graph, GraphOptions};
use crate::loader::CompositeSource;
use crate::output;
use anyhow::Result;

/// Node and edge totals for the whole graph, as pretty-printed JSON.
pub(crate) fn run(sources: &CompositeSource, decoders: &[Decoder], graph_options: GraphOptions) -> Result<String> {
    let graph = build_graph(&sources.query(), decoders, graph_options);
    output::format_summary(&graph.summary())
}
