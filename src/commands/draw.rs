//! The `draw` command: render the relationship graph as GraphViz DOT.

use crate::cli::{FilterArgs, SubgraphArgs};
use crate::config::Config;
use crate::decoders::Decoder;
use crate::dot::{self, DotOptions, NodeLabel};
use crate::graph::GraphOptions;
use crate::loader::CompositeSource;
use crate::triples::{self, TripleOptions};
use anyhow::Result;
use tracing::warn;

/// Appearance of the rendered diagram.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Style {
    pub(crate) label: NodeLabel,
    pub(crate) group_by_type: bool,
    pub(crate) include_edge_labels: bool,
    /// Collapse objects to one node per STIX type
    pub(crate) types_only: bool,
}

/// Run the graph drawing.
///
/// Edge colours come from the config's rules first and the per-type defaults
/// second.
pub(crate) fn run(
    sources: &CompositeSource,
    config: &Config,
    decoders: &[Decoder],
    filter: &FilterArgs,
    subgraph: &SubgraphArgs,
    graph_options: GraphOptions,
    style: Style,
) -> Result<String> {
    let graph = super::shared::relationship_graph(sources, filter, subgraph, decoders, graph_options);

    let mut options = DotOptions {
        group_by_type: style.group_by_type,
        include_edge_labels: style.include_edge_labels,
        node_labels: None,
        palette: config.palette(),
    };

    if style.types_only {
        if style.label != NodeLabel::Id {
            warn!("Node labels are ignored when drawing types only");
        }
        let reduced = triples::graph_to_triples(
            &graph,
            TripleOptions { deduplicate: true, reduce_to_types: true, ..Default::default() },
        );
        return Ok(dot::triples_to_dot(&reduced, &options));
    }

    options.node_labels = dot::node_labels(&graph, style.label);
    Ok(dot::graph_to_dot(&graph, &options))
}
