//! Decoders turning batches of STIX objects into graph nodes and edges.
//!
//! Two strategies exist:
//!
//! - [`DecoderKind::Generic`] handles plain STIX `relationship` objects
//!   and, optionally, identity/marking/external-reference links.
//! - [`DecoderKind::Mitre`] surfaces the implicit relationships MITRE encodes
//!   as plain fields in ATT&CK, CAPEC and MBC content.
//!
//! Decoders are stacked: every decoder contributes edges independently, and
//! the order of the stack only decides which decoder's node data wins.

use crate::constants::{
    ATTACK_PATTERN, EXTERNAL_REFERENCE, IDENTITY, MALWARE_BEHAVIOR, MALWARE_METHOD,
    MARKING_DEFINITION, RELATED_TO, RELATIONSHIP, UUID_NAMESPACE, X_MITRE_DATA_COMPONENT,
    X_MITRE_MATRIX, X_MITRE_TACTIC,
};
use crate::types::{Edge, EdgeData, Node, StixObject, Triple};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Knobs shared by every decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Emit `identity` nodes and edges to `created_by_ref` / `x_mitre_modified_by_ref`
    pub include_identities: bool,
    /// Emit `marking-definition` nodes and edges to `object_marking_refs`
    pub include_markings: bool,
    /// Synthesize a pseudo-node per external reference URL
    pub expand_external_references: bool,
}

/// The closed set of decoding strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    Generic,
    Mitre,
}

/// A decoding strategy bundled with its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
    kind: DecoderKind,
    options: DecoderOptions,
}

impl Decoder {
    pub fn new(kind: DecoderKind, options: DecoderOptions) -> Self {
        Self { kind, options }
    }

    pub fn generic(options: DecoderOptions) -> Self {
        Self::new(DecoderKind::Generic, options)
    }

    pub fn mitre(options: DecoderOptions) -> Self {
        Self::new(DecoderKind::Mitre, options)
    }

    pub fn kind(&self) -> DecoderKind {
        self.kind
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Decode a batch of objects into nodes.
    ///
    /// Relationship objects never become nodes; identities, markings and
    /// external references only do when the matching option is enabled.
    pub fn iter_nodes(&self, objects: &[StixObject]) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(objects.len());

        for o in objects {
            if self.options.expand_external_references {
                for reference in o.get_object_list("external_references") {
                    if let Some(url) = reference.get("url").and_then(Value::as_str) {
                        nodes.push(Node::new(
                            external_reference_id(url),
                            EXTERNAL_REFERENCE.to_string(),
                            reference.clone(),
                        ));
                    }
                }
            }

            let skip = match o.stix_type() {
                RELATIONSHIP => true,
                IDENTITY => !self.options.include_identities,
                MARKING_DEFINITION => !self.options.include_markings,
                EXTERNAL_REFERENCE => !self.options.expand_external_references,
                _ => false,
            };
            if skip || o.id().is_empty() {
                continue;
            }

            nodes.push(Node::new(
                o.id().to_string(),
                o.stix_type().to_string(),
                o.fields().clone(),
            ));
        }

        nodes
    }

    /// Decode a batch of objects into edges.
    pub fn iter_edges(&self, objects: &[StixObject]) -> Vec<Edge> {
        match self.kind {
            DecoderKind::Generic => self.generic_edges(objects),
            DecoderKind::Mitre => self.mitre_edges(objects),
        }
    }

    pub fn iter_triples(&self, objects: &[StixObject]) -> Vec<Triple> {
        self.iter_edges(objects).iter().map(Edge::to_triple).collect()
    }

    pub fn is_deprecated(&self, o: &StixObject) -> bool {
        match self.kind {
            DecoderKind::Generic => false,
            DecoderKind::Mitre => {
                o.is_true("x_mitre_deprecated")
                    || o.get_str("x_capec_status")
                        .is_some_and(|status| status.to_lowercase() == "deprecated")
            }
        }
    }

    pub fn is_revoked(&self, o: &StixObject) -> bool {
        o.is_true("revoked")
    }

    /// Sorted, deduplicated union of an object's `name` and `aliases`.
    pub fn names(&self, o: &StixObject) -> Vec<String> {
        let mut names = BTreeSet::new();
        if let Some(name) = o.get_str("name").filter(|n| !n.is_empty()) {
            names.insert(name.to_string());
        }
        for alias in o.get_str_list("aliases") {
            names.insert(alias.to_string());
        }
        names.into_iter().collect()
    }

    fn generic_edges(&self, objects: &[StixObject]) -> Vec<Edge> {
        let mut edges = Vec::new();

        for o in objects {
            let id = o.id();

            if o.stix_type() == RELATIONSHIP {
                let (Some(source), Some(predicate), Some(target)) = (
                    o.get_str("source_ref"),
                    o.get_str("relationship_type"),
                    o.get_str("target_ref"),
                ) else {
                    debug!("Skipping incomplete relationship {}", id);
                    continue;
                };

                let data = EdgeData {
                    created: parse_timestamp(o.get_str("created")),
                    modified: parse_timestamp(o.get_str("modified")),
                };
                edges.push(Edge::new(source, predicate, target).with_data(data));
                continue;
            }

            if self.options.include_identities {
                if let Some(created_by) = o.get_str("created_by_ref") {
                    edges.push(Edge::new(id, RELATED_TO, created_by));
                }
            }

            if self.options.include_markings {
                for marking in o.get_str_list("object_marking_refs") {
                    edges.push(Edge::new(id, RELATED_TO, marking));
                }
            }

            if self.options.expand_external_references {
                for reference in o.get_object_list("external_references") {
                    if let Some(url) = reference.get("url").and_then(Value::as_str) {
                        edges.push(Edge::new(id, RELATED_TO, external_reference_id(url)));
                    }
                }
            }
        }

        edges
    }

    fn mitre_edges(&self, objects: &[StixObject]) -> Vec<Edge> {
        // First pass: kill chain phase names resolve to tactics by shortname.
        let mut tactics_by_shortname: FxHashMap<&str, &str> = FxHashMap::default();
        for o in objects {
            if o.stix_type() == X_MITRE_TACTIC {
                if let Some(shortname) = o.get_str("x_mitre_shortname") {
                    tactics_by_shortname.insert(shortname, o.id());
                }
            }
        }

        let mut edges = Vec::new();
        for o in objects {
            let stix_type = o.stix_type();
            if stix_type == RELATIONSHIP {
                continue;
            }
            let id = o.id();

            match stix_type {
                X_MITRE_MATRIX => {
                    for tactic in o.get_str_list("tactic_refs") {
                        edges.push(Edge::new(tactic, RELATED_TO, id));
                    }
                }
                ATTACK_PATTERN => {
                    for phase in o.get_object_list("kill_chain_phases") {
                        let Some(phase_name) = phase.get("phase_name").and_then(Value::as_str)
                        else {
                            continue;
                        };
                        match tactics_by_shortname.get(phase_name) {
                            Some(tactic) => edges.push(Edge::new(id, RELATED_TO, *tactic)),
                            None => debug!("No tactic for kill chain phase {} ({})", phase_name, id),
                        }
                    }
                }
                X_MITRE_DATA_COMPONENT => {
                    if let Some(data_source) = o.get_str("x_mitre_data_source_ref") {
                        edges.push(Edge::new(data_source, RELATED_TO, id));
                    }
                }
                MALWARE_BEHAVIOR => {
                    for objective in o.get_str_list("objective_refs") {
                        edges.push(Edge::new(id, RELATED_TO, objective));
                    }
                }
                MALWARE_METHOD => {
                    if let Some(behavior) = o.get_str("behavior_ref") {
                        edges.push(Edge::new(id, RELATED_TO, behavior));
                    }
                }
                _ => {}
            }

            if self.options.include_identities {
                if let Some(modified_by) = o.get_str("x_mitre_modified_by_ref") {
                    edges.push(Edge::new(id, RELATED_TO, modified_by));
                }
            }
        }

        edges
    }
}

/// The default decoder stack: generic first, MITRE extensions second.
pub fn default_decoders(options: DecoderOptions) -> Vec<Decoder> {
    vec![Decoder::generic(options), Decoder::mitre(options)]
}

/// Deterministic pseudo-node id for an external reference URL.
///
/// UUIDv5 in the STIX namespace over the canonical JSON of `{"url": url}`.
pub fn external_reference_id(url: &str) -> String {
    let mut key = Map::new();
    key.insert("url".to_string(), Value::String(url.to_string()));
    let blob = canonical_json(&Value::Object(key));
    Uuid::new_v5(&UUID_NAMESPACE, blob.as_bytes()).to_string()
}

/// Serialize a JSON value per RFC 8785: no whitespace, object members sorted
/// by UTF-16 code units.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        Value::Object(fields) => {
            let mut keys: Vec<&String> = fields.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        canonical_json(&fields[k.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        scalar => scalar.to_string(),
    }
}

/// Parse an ISO-8601 timestamp; absent or unparseable values become `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring malformed timestamp {:?}: {}", raw, e);
            None
        }
    }
}
