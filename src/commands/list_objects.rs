//! The `list-objects` command: print the loaded objects that pass the filter,
//! either as JSON-lines or wrapped in a single STIX bundle.

use crate::cli::{FilterArgs, ObjectFormat};
use crate::decoders::Decoder;
use crate::loader::CompositeSource;
use crate::output;
use anyhow::Result;
use tracing::info;

/// Run the object listing.
///
/// Objects keep their source order; sources keep the order they were
/// selected in.
pub(crate) fn run(
    sources: &CompositeSource,
    decoders: &[Decoder],
    filter: &FilterArgs,
    format: ObjectFormat,
) -> Result<String> {
    let objects = super::shared::object_filter(filter).apply(sources.query(), decoders);
    info!("Selected {} of {} objects", objects.len(), sources.len());

    match format {
        ObjectFormat::Jsonl => output::format_jsonl(&objects),
        ObjectFormat::Bundle => output::format_bundle(&output::create_bundle(objects)),
    }
}
