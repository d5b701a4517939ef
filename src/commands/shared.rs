//! Shared plumbing for the command implementations.
//!
//! Every command that reads STIX data goes through the same steps: turn the
//! CLI toggles into decoders, a filter and graph options, drop deprecated or
//! revoked content, then build the relationship graph. Those steps live here.

use crate::cli::{DecoderArgs, FilterArgs, SubgraphArgs};
use crate::config::Config;
use crate::datasets::{self, DatasetSelection};
use crate::decoders::{default_decoders, Decoder, DecoderOptions};
use crate::filter::{NamePattern, ObjectFilter};
use crate::graph::{build_graph, GraphOptions, StixGraph};
use crate::loader::CompositeSource;
use crate::types::StixObject;
use anyhow::{Context, Result};
use tracing::{debug, warn};

// ============================================================================
// Sources
// ============================================================================

/// Resolve the dataset selection against the config and load everything.
pub(crate) fn load_sources(selection: &DatasetSelection, config: &Config) -> Result<CompositeSource> {
    let sources = selection.resolve(config)?;
    debug!(
        "Loading {} data sources: {}",
        sources.len(),
        sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    datasets::load_sources(&sources).context("Failed to load data sources")
}

// ============================================================================
// Decoding
// ============================================================================

/// Decoder options from the config file, with any CLI toggle switched on.
pub(crate) fn decoder_options(config: &Config, args: &DecoderArgs) -> DecoderOptions {
    DecoderOptions {
        include_identities: config.decoder.include_identities || args.include_identities,
        include_markings: config.decoder.include_markings || args.include_markings,
        expand_external_references: config.decoder.expand_external_references
            || args.expand_external_references,
    }
}

pub(crate) fn decoders(config: &Config, args: &DecoderArgs) -> Vec<Decoder> {
    default_decoders(decoder_options(config, args))
}

pub(crate) fn graph_options(args: &DecoderArgs) -> GraphOptions {
    GraphOptions { drop_dangling_references: !args.keep_dangling_references }
}

// ============================================================================
// Filtering
// ============================================================================

/// Whether any id, type or name selection was given.
pub(crate) fn has_selection(filter: &FilterArgs) -> bool {
    !filter.object_ids.is_empty() || !filter.object_types.is_empty() || !filter.object_names.is_empty()
}

/// The full filter: selection plus lifecycle (deprecated / revoked) rules.
pub(crate) fn object_filter(filter: &FilterArgs) -> ObjectFilter {
    ObjectFilter::new()
        .with_ids(filter.object_ids.iter().cloned())
        .with_types(filter.object_types.iter().cloned())
        .with_names(&filter.object_names)
        .include_deprecated(filter.include_deprecated)
        .include_revoked(filter.include_revoked)
}

/// Only the lifecycle rules. Relationship objects must survive this one,
/// so the selection is applied to graph nodes instead.
pub(crate) fn lifecycle_filter(filter: &FilterArgs) -> ObjectFilter {
    ObjectFilter::new()
        .include_deprecated(filter.include_deprecated)
        .include_revoked(filter.include_revoked)
}

// ============================================================================
// Graphs
// ============================================================================

/// Build the relationship graph for the listing and drawing commands.
///
/// With an object selection, a radius or predicate patterns, the graph is
/// narrowed to the neighbourhood of the selected objects (every node when
/// nothing is selected). The radius defaults to one hop.
pub(crate) fn relationship_graph(
    sources: &CompositeSource,
    filter: &FilterArgs,
    subgraph: &SubgraphArgs,
    decoders: &[Decoder],
    options: GraphOptions,
) -> StixGraph {
    let objects = lifecycle_filter(filter).apply(sources.query(), decoders);
    let graph = build_graph(&objects, decoders, options);

    let selecting = has_selection(filter);
    if !selecting && subgraph.radius.is_none() && subgraph.predicates.is_empty() {
        return graph;
    }

    let start = if selecting {
        let ids = selected_ids(&objects, filter, decoders);
        if ids.is_empty() {
            warn!("No objects matched the selection");
            return StixGraph::new();
        }
        ids
    } else {
        Vec::new()
    };

    let predicates: Vec<NamePattern> = subgraph.predicates.iter().map(|p| NamePattern::new(p)).collect();
    graph.related_subgraph(&start, &predicates, subgraph.radius.unwrap_or(1))
}

fn selected_ids(objects: &[StixObject], filter: &FilterArgs, decoders: &[Decoder]) -> Vec<String> {
    let selection = object_filter(filter).include_deprecated(true).include_revoked(true);
    objects
        .iter()
        .filter(|o| selection.matches(o, decoders))
        .map(|o| o.id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemorySource;
    use serde_json::json;

    fn sources() -> CompositeSource {
        let objects = vec![
            json!({"id": "malware--a", "type": "malware", "name": "Agent Tesla"}),
            json!({"id": "attack-pattern--b", "type": "attack-pattern", "name": "Phishing"}),
            json!({"id": "attack-pattern--c", "type": "attack-pattern", "name": "Old", "x_mitre_deprecated": true}),
            json!({"id": "tool--d", "type": "tool", "name": "PsExec"}),
            json!({"id": "relationship--1", "type": "relationship", "source_ref": "malware--a",
                   "relationship_type": "uses", "target_ref": "attack-pattern--b"}),
            json!({"id": "relationship--2", "type": "relationship", "source_ref": "malware--a",
                   "relationship_type": "uses", "target_ref": "attack-pattern--c"}),
            json!({"id": "relationship--3", "type": "relationship", "source_ref": "tool--d",
                   "relationship_type": "related-to", "target_ref": "attack-pattern--b"}),
        ];
        let objects = objects.into_iter().filter_map(StixObject::from_value).collect();
        vec![MemorySource::new("fixture", objects)].into_iter().collect()
    }

    fn decoders() -> Vec<Decoder> {
        default_decoders(DecoderOptions::default())
    }

    #[test]
    fn test_decoder_options_merge_config_and_flags() {
        let mut config = Config::default();
        config.decoder.include_markings = true;
        let args = DecoderArgs { include_identities: true, ..Default::default() };

        let options = decoder_options(&config, &args);
        assert!(options.include_identities);
        assert!(options.include_markings);
        assert!(!options.expand_external_references);
    }

    #[test]
    fn test_whole_graph_drops_deprecated_objects() {
        let graph = relationship_graph(
            &sources(),
            &FilterArgs::default(),
            &SubgraphArgs::default(),
            &decoders(),
            GraphOptions::default(),
        );
        assert!(!graph.contains("attack-pattern--c"));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_selection_narrows_to_neighbourhood() {
        let filter = FilterArgs { object_names: vec!["agent*".to_string()], ..Default::default() };
        let graph = relationship_graph(
            &sources(),
            &filter,
            &SubgraphArgs::default(),
            &decoders(),
            GraphOptions::default(),
        );
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains("attack-pattern--b"));
        assert!(!graph.contains("tool--d"));
    }

    #[test]
    fn test_unmatched_selection_is_empty() {
        let filter = FilterArgs { object_ids: vec!["malware--zzz".to_string()], ..Default::default() };
        let graph = relationship_graph(
            &sources(),
            &filter,
            &SubgraphArgs { radius: Some(3), predicates: Vec::new() },
            &decoders(),
            GraphOptions::default(),
        );
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_predicate_patterns_without_selection() {
        let graph = relationship_graph(
            &sources(),
            &FilterArgs::default(),
            &SubgraphArgs { radius: None, predicates: vec!["related-*".to_string()] },
            &decoders(),
            GraphOptions::default(),
        );
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains("tool--d"));
    }
}
