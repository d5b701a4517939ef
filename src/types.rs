//! Core data model: STIX objects as loaded, and the nodes, edges and triples
//! the decoders derive from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Separator between the type prefix and the UUID in a STIX id.
pub const ID_SEPARATOR: &str = "--";

/// Derive the STIX type from an id (`"attack-pattern--1234"` -> `"attack-pattern"`).
///
/// An id without the separator is returned unchanged.
pub fn stix_type_from_id(id: &str) -> &str {
    id.split(ID_SEPARATOR).next().unwrap_or(id)
}

/// A STIX object in its canonical form: an untyped JSON mapping.
///
/// Every loader converts its input into this representation exactly once, so
/// nothing downstream has to care where an object came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StixObject(Map<String, Value>);

impl StixObject {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Convert a JSON value into an object; anything but a JSON object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// The object's `id`, or an empty string when absent.
    pub fn id(&self) -> &str {
        self.get_str("id").unwrap_or_default()
    }

    /// The authoritative STIX type: the id prefix, falling back to the
    /// declared `type` field when the object has no id.
    pub fn stix_type(&self) -> &str {
        match self.get_str("id") {
            Some(id) => stix_type_from_id(id),
            None => self.declared_type().unwrap_or_default(),
        }
    }

    /// The `type` field exactly as written in the source document.
    pub fn declared_type(&self) -> Option<&str> {
        self.get_str("type")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// True only when the field holds the JSON literal `true`.
    pub fn is_true(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    /// String entries of an array field; non-string entries are skipped.
    pub fn get_str_list(&self, key: &str) -> Vec<&str> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Object entries of an array field such as `external_references`.
    pub fn get_object_list(&self, key: &str) -> Vec<&Map<String, Value>> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for StixObject {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// A vertex in the relationship graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Map<String, Value>,
}

impl Node {
    pub fn new<S: Into<String>>(id: S, kind: S, data: Map<String, Value>) -> Self {
        Self { id: id.into(), kind: kind.into(), data }
    }

    /// A node known only by its id, created when an edge names an endpoint
    /// that no decoder has materialized.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: stix_type_from_id(id).to_string(),
            data: Map::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    /// View the node's data as a STIX object.
    pub fn as_object(&self) -> StixObject {
        StixObject::new(self.data.clone())
    }
}

/// Attributes carried on an edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// A directed, labelled edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub predicate: String,
    pub object: String,
    #[serde(skip_serializing_if = "is_empty_data")]
    pub data: EdgeData,
}

fn is_empty_data(data: &EdgeData) -> bool {
    data.created.is_none() && data.modified.is_none()
}

impl Edge {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        source: S1,
        predicate: S2,
        object: S3,
    ) -> Self {
        Self {
            source: source.into(),
            predicate: predicate.into(),
            object: object.into(),
            data: EdgeData::default(),
        }
    }

    pub fn with_data(mut self, data: EdgeData) -> Self {
        self.data = data;
        self
    }

    pub fn to_triple(&self) -> Triple {
        Triple::new(&self.source, &self.predicate, &self.object)
    }
}

/// A (subject, predicate, object) statement derived from an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        subject: S1,
        predicate: S2,
        object: S3,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            subject: self.object.clone(),
            predicate: self.predicate.clone(),
            object: self.subject.clone(),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.subject, self.predicate, self.object)
    }
}
