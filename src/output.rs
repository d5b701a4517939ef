//! Output formatting.
//!
//! - JSON-lines: one compact JSON document per line
//! - Bundle: a STIX bundle wrapping the selected objects
//! - Matrix: one CSV row per relationship between objects of loaded datasets
//! - Summary: pretty-printed graph totals

use crate::external_id::try_external_id;
use crate::graph::{GraphSummary, StixGraph};
use crate::loader::CompositeSource;
use crate::types::{stix_type_from_id, StixObject};
use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

/// Format items as JSON-lines, one per line.
pub fn format_jsonl<T: Serialize>(items: &[T]) -> Result<String> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item).context("Failed to serialize JSONL record")?);
        out.push('\n');
    }
    Ok(out)
}

/// A STIX bundle. Field order and the `spec_verson` key match what existing
/// consumers of these bundles read.
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub objects: Vec<StixObject>,
    pub spec_verson: &'static str,
}

pub fn create_bundle(objects: Vec<StixObject>) -> Bundle {
    Bundle {
        id: format!("bundle--{}", Uuid::new_v4()),
        kind: "bundle",
        objects,
        spec_verson: "2.1",
    }
}

pub fn format_bundle(bundle: &Bundle) -> Result<String> {
    let mut json = serde_json::to_string_pretty(bundle).context("Failed to serialize bundle")?;
    json.push('\n');
    Ok(json)
}

pub fn format_summary(summary: &GraphSummary) -> Result<String> {
    let mut json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    json.push('\n');
    Ok(json)
}

/// One edge of the relationship matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub source_dataset: String,
    pub source_object_id: String,
    pub source_object_external_id: Option<String>,
    pub source_object_name: Option<String>,
    pub source_object_type: String,
    pub relationship: String,
    pub target_object_id: String,
    pub target_object_external_id: Option<String>,
    pub target_object_name: Option<String>,
    pub target_object_type: String,
    pub target_dataset: String,
}

const MATRIX_HEADER: [&str; 11] = [
    "source_dataset",
    "source_object_id",
    "source_object_external_id",
    "source_object_name",
    "source_object_type",
    "relationship",
    "target_object_id",
    "target_object_external_id",
    "target_object_name",
    "target_object_type",
    "target_dataset",
];

/// Rows for every edge whose endpoints were both loaded from a source,
/// optionally restricted to edges leaving one dataset.
pub fn matrix_rows(graph: &StixGraph, sources: &CompositeSource, source_dataset: Option<&str>) -> Vec<MatrixRow> {
    let mut rows = Vec::new();

    for edge in graph.edges() {
        let (Some(source_ds), Some(target_ds)) =
            (sources.dataset_of(&edge.source), sources.dataset_of(&edge.object))
        else {
            continue;
        };
        if source_dataset.is_some_and(|wanted| wanted != source_ds) {
            continue;
        }

        let describe = |id: &str| {
            let object = graph.node(id).map(|n| n.as_object());
            let external = object.as_ref().and_then(try_external_id);
            let name = object
                .as_ref()
                .and_then(|o| o.get_str("name"))
                .map(str::to_string);
            (external, name)
        };
        let (source_external, source_name) = describe(&edge.source);
        let (target_external, target_name) = describe(&edge.object);

        rows.push(MatrixRow {
            source_dataset: source_ds.to_string(),
            source_object_type: stix_type_from_id(&edge.source).to_string(),
            source_object_external_id: source_external,
            source_object_name: source_name,
            relationship: edge.predicate,
            target_object_type: stix_type_from_id(&edge.object).to_string(),
            target_object_external_id: target_external,
            target_object_name: target_name,
            target_dataset: target_ds.to_string(),
            source_object_id: edge.source,
            target_object_id: edge.object,
        });
    }

    rows
}

/// CSV with a header row; empty cells for missing values.
pub fn format_matrix_csv(rows: &[MatrixRow]) -> String {
    let mut out = MATRIX_HEADER.join(",");
    out.push('\n');

    for row in rows {
        let cells = [
            row.source_dataset.as_str(),
            row.source_object_id.as_str(),
            row.source_object_external_id.as_deref().unwrap_or_default(),
            row.source_object_name.as_deref().unwrap_or_default(),
            row.source_object_type.as_str(),
            row.relationship.as_str(),
            row.target_object_id.as_str(),
            row.target_object_external_id.as_deref().unwrap_or_default(),
            row.target_object_name.as_deref().unwrap_or_default(),
            row.target_object_type.as_str(),
            row.target_dataset.as_str(),
        ];
        let quoted: Vec<String> = cells.iter().map(|c| csv_field(c)).collect();
        out.push_str(&quoted.join(","));
        out.push('\n');
    }

    out
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::{default_decoders, DecoderOptions};
    use crate::graph::{build_graph, GraphOptions};
    use crate::loader::MemorySource;
    use serde_json::json;

    fn object(value: serde_json::Value) -> StixObject {
        StixObject::from_value(value).unwrap()
    }

    #[test]
    fn test_bundle_shape() {
        let bundle = create_bundle(vec![object(json!({"id": "malware--a", "type": "malware"}))]);
        let json = format_bundle(&bundle).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["id"].as_str().unwrap().starts_with("bundle--"));
        assert_eq!(value["type"], "bundle");
        assert_eq!(value["spec_verson"], "2.1");
        assert_eq!(value["objects"][0]["id"], "malware--a");

        let id_at = json.find("\"id\"").unwrap();
        let type_at = json.find("\"type\"").unwrap();
        let spec_at = json.find("\"spec_verson\"").unwrap();
        assert!(id_at < type_at && type_at < spec_at);
    }

    #[test]
    fn test_jsonl_one_record_per_line() {
        let objects = vec![
            object(json!({"id": "malware--a"})),
            object(json!({"id": "tool--b", "name": "multi\nline"})),
        ];
        let text = format_jsonl(&objects).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"id":"malware--a"}"#);
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"x\""), "\"say \"\"x\"\"\"");
    }

    #[test]
    fn test_matrix_rows_skip_unloaded_endpoints() {
        let controls = MemorySource::new(
            "nist-sp-800-53",
            vec![object(json!({
                "id": "course-of-action--c", "type": "course-of-action", "name": "Account Management, General",
                "external_references": [{"source_name": "NIST 800-53 Revision 5", "external_id": "AC-2"}]
            }))],
        );
        let attack = MemorySource::new(
            "attack-enterprise",
            vec![object(json!({
                "id": "attack-pattern--p", "type": "attack-pattern", "name": "Valid Accounts",
                "x_mitre_domains": ["enterprise-attack"],
                "external_references": [{"source_name": "mitre-attack", "external_id": "T1078"}]
            }))],
        );
        let mappings = MemorySource::new(
            "attack-to-nist-sp-800-53",
            vec![
                object(json!({"id": "relationship--1", "type": "relationship", "source_ref": "course-of-action--c",
                              "relationship_type": "mitigates", "target_ref": "attack-pattern--p"})),
                object(json!({"id": "relationship--2", "type": "relationship", "source_ref": "attack-pattern--p",
                              "relationship_type": "related-to", "target_ref": "relationship--1"})),
            ],
        );
        let sources: CompositeSource = vec![controls, attack, mappings].into_iter().collect();
        let graph = build_graph(
            &sources.query(),
            &default_decoders(DecoderOptions::default()),
            GraphOptions { drop_dangling_references: false },
        );

        let rows = matrix_rows(&graph, &sources, None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_object_external_id.as_deref(), Some("AC-2"));
        assert_eq!(rows[0].target_object_external_id.as_deref(), Some("T1078"));
        assert_eq!(rows[0].target_dataset, "attack-enterprise");

        let filtered = matrix_rows(&graph, &sources, Some("nist-sp-800-53"));
        assert_eq!(filtered.len(), 1);

        let csv = format_matrix_csv(&filtered);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), MATRIX_HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "nist-sp-800-53,course-of-action--c,AC-2,\"Account Management, General\",course-of-action,\
             mitigates,attack-pattern--p,T1078,Valid Accounts,attack-pattern,attack-enterprise"
        );
    }
}
