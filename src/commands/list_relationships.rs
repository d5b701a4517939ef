//! The `list-relationships` command: flatten the relationship graph into
//! triples.

use crate::cli::{FilterArgs, SubgraphArgs, TripleFormat};
use crate::decoders::Decoder;
use crate::graph::GraphOptions;
use crate::loader::CompositeSource;
use crate::output;
use crate::triples::{self, TripleOptions};
use anyhow::Result;

/// How the graph is projected before it is flattened.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Projection {
    /// Rename nodes to their external ids, dropping the rest
    pub(crate) external_ids: bool,
    pub(crate) triples: TripleOptions,
}

/// Run the relationship listing.
///
/// CSV output is one `subject,predicate,object` line per edge; JSON-lines
/// output is one `{"subject", "predicate", "object"}` record per edge.
pub(crate) fn run(
    sources: &CompositeSource,
    decoders: &[Decoder],
    filter: &FilterArgs,
    subgraph: &SubgraphArgs,
    graph_options: GraphOptions,
    projection: Projection,
    format: TripleFormat,
) -> Result<String> {
    let mut graph = super::shared::relationship_graph(sources, filter, subgraph, decoders, graph_options);
    if projection.external_ids {
        graph = graph.relabel_by_external_id();
    }

    let triples = triples::graph_to_triples(&graph, projection.triples);
    match format {
        TripleFormat::Csv => Ok(triples::to_csv(&triples)),
        TripleFormat::Jsonl => output::format_jsonl(&triples),
    }
}
