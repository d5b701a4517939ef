//! The `matrix` command: one CSV row per relationship between objects of the
//! loaded datasets.

use crate::datasets::Dataset;
use crate::decoders::Decoder;
use crate::graph::{build_graph, GraphOptions};
use crate::loader::CompositeSource;
use crate::output;
use anyhow::Result;
use tracing::info;

/// Run the matrix export, optionally keeping only rows whose source object
/// comes from `source_dataset`.
pub(crate) fn run(
    sources: &CompositeSource,
    decoders: &[Decoder],
    graph_options: GraphOptions,
    source_dataset: Option<Dataset>,
) -> Result<String> {
    let graph = build_graph(&sources.query(), decoders, graph_options);
    let rows = output::matrix_rows(&graph, sources, source_dataset.map(Dataset::slug));
    info!("Matrix has {} rows", rows.len());
    Ok(output::format_matrix_csv(&rows))
}
