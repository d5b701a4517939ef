//! GraphViz DOT rendering of triples.

use crate::constants::{default_colour_for_type, DOT_INDENT, EXTERNAL_REFERENCE};
use crate::external_id::try_external_id;
use crate::filter::NamePattern;
use crate::graph::StixGraph;
use crate::triples::{graph_to_triples, TripleOptions};
use crate::types::{stix_type_from_id, Triple};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::OnceLock;
use uuid::Uuid;

/// A colour rule over (subject type, predicate, object type).
#[derive(Debug, Clone)]
pub struct ColourRule {
    subject_type: Option<NamePattern>,
    predicate: Option<NamePattern>,
    object_type: Option<NamePattern>,
    colour: String,
}

impl ColourRule {
    pub fn new(
        subject_type: Option<&str>,
        predicate: Option<&str>,
        object_type: Option<&str>,
        colour: &str,
    ) -> Self {
        Self {
            subject_type: subject_type.map(NamePattern::new),
            predicate: predicate.map(NamePattern::new),
            object_type: object_type.map(NamePattern::new),
            colour: colour.to_string(),
        }
    }

    fn matches(&self, subject_type: &str, predicate: &str, object_type: &str) -> bool {
        let check = |pattern: &Option<NamePattern>, value: &str| {
            pattern.as_ref().map_or(true, |p| p.is_match(value))
        };
        check(&self.subject_type, subject_type)
            && check(&self.predicate, predicate)
            && check(&self.object_type, object_type)
    }
}

/// Edge colours: explicit rules in order, then the default colour of the
/// subject's type.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    rules: Vec<ColourRule>,
}

impl Palette {
    pub fn with_rule(mut self, rule: ColourRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn colour_for(&self, subject_type: &str, predicate: &str, object_type: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(subject_type, predicate, object_type))
            .map(|rule| rule.colour.as_str())
            .or_else(|| default_colour_for_type(subject_type))
    }
}

#[derive(Debug, Clone)]
pub struct DotOptions {
    /// Wrap nodes of each type in a labelled `subgraph cluster_*`
    pub group_by_type: bool,
    pub include_edge_labels: bool,
    /// Node id to display label. When set, unlabelled nodes and their edges
    /// are left out.
    pub node_labels: Option<FxHashMap<String, String>>,
    pub palette: Palette,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            group_by_type: false,
            include_edge_labels: true,
            node_labels: None,
            palette: Palette::default(),
        }
    }
}

/// Which label to show on each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeLabel {
    /// The raw STIX id
    #[default]
    Id,
    /// The object's `name`
    Name,
    /// The dataset-specific external id
    ExternalId,
}

/// Collapse runs of non-word characters and hyphens to `_`, then lower-case.
pub fn safe_id(s: &str) -> String {
    unsafe_chars_regex().replace_all(s, "_").to_lowercase()
}

#[allow(clippy::expect_used)] // Static regex pattern is hardcoded and valid
fn unsafe_chars_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\W-]+").expect("valid regex"))
}

/// The type a node is grouped and coloured by. Pseudo-nodes for external
/// references carry a bare UUID and group as `external-reference`.
pub fn node_type(id: &str) -> &str {
    if Uuid::parse_str(id).is_ok() {
        EXTERNAL_REFERENCE
    } else {
        stix_type_from_id(id)
    }
}

/// Render triples as a `digraph`. Triples are sorted first, so the output
/// only depends on the set of triples given.
pub fn triples_to_dot(triples: &[Triple], options: &DotOptions) -> String {
    let indent = " ".repeat(DOT_INDENT);
    let mut lines = vec![
        "digraph G {".to_string(),
        format!("{indent}rankdir=LR;"),
        format!("{indent}node[shape=box];"),
        format!("{indent}splines=true;"),
        format!("{indent}nodesep=0.25;"),
        format!("{indent}ranksep=1;"),
        format!("{indent}concentrate=true;"),
        String::new(),
    ];

    let mut sorted = triples.to_vec();
    sorted.sort();

    let label_of = |id: &str| -> Option<String> {
        match &options.node_labels {
            Some(labels) => labels.get(id).cloned(),
            None => Some(id.to_string()),
        }
    };

    // First-seen order of endpoints, one entry per safe id
    let mut declared: FxHashSet<String> = FxHashSet::default();
    let mut endpoints: Vec<&str> = Vec::new();
    for t in &sorted {
        for id in [t.subject.as_str(), t.object.as_str()] {
            if label_of(id).is_some() && declared.insert(safe_id(id)) {
                endpoints.push(id);
            }
        }
    }

    let declaration = |id: &str, depth: usize| -> Option<String> {
        label_of(id).map(|label| {
            format!(
                "{}\"{}\" [label=\"{}\"];",
                indent.repeat(depth),
                safe_id(id),
                escape(&label)
            )
        })
    };

    if options.group_by_type {
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        for &id in &endpoints {
            let kind = node_type(id);
            match groups.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, members)) => members.push(id),
                None => groups.push((kind, vec![id])),
            }
        }
        for (kind, members) in groups {
            lines.push(format!("{indent}subgraph cluster_{} {{", safe_id(kind)));
            lines.push(format!("{indent}{indent}label=\"{kind}\";"));
            lines.extend(members.iter().filter_map(|&id| declaration(id, 2)));
            lines.push(format!("{indent}}}"));
        }
    } else {
        lines.extend(endpoints.iter().filter_map(|&id| declaration(id, 1)));
    }

    let mut emitted: FxHashSet<String> = FxHashSet::default();
    for t in &sorted {
        if let Some(labels) = &options.node_labels {
            if !(labels.contains_key(&t.subject) && labels.contains_key(&t.object)) {
                continue;
            }
        }

        let mut attrs = Vec::new();
        if options.include_edge_labels {
            attrs.push(format!("label=\"{}\"", escape(&t.predicate)));
        }
        let colour = options
            .palette
            .colour_for(node_type(&t.subject), &t.predicate, node_type(&t.object));
        if let Some(colour) = colour {
            attrs.push(format!("color=\"{}\"", colour));
        }

        let line = if attrs.is_empty() {
            format!("{indent}\"{}\" -> \"{}\";", safe_id(&t.subject), safe_id(&t.object))
        } else {
            format!(
                "{indent}\"{}\" -> \"{}\" [{}];",
                safe_id(&t.subject),
                safe_id(&t.object),
                attrs.join(", ")
            )
        };
        if emitted.insert(line.clone()) {
            lines.push(line);
        }
    }

    lines.push("}".to_string());
    let mut dot = lines.join("\n");
    dot.push('\n');
    dot
}

/// Render every edge of a graph.
pub fn graph_to_dot(graph: &StixGraph, options: &DotOptions) -> String {
    triples_to_dot(&graph_to_triples(graph, TripleOptions::default()), options)
}

/// Label map for [`DotOptions::node_labels`]; `None` for [`NodeLabel::Id`].
pub fn node_labels(graph: &StixGraph, label: NodeLabel) -> Option<FxHashMap<String, String>> {
    match label {
        NodeLabel::Id => None,
        NodeLabel::Name => Some(
            graph
                .nodes()
                .filter_map(|n| n.name().map(|name| (n.id.clone(), name.to_string())))
                .collect(),
        ),
        NodeLabel::ExternalId => Some(
            graph
                .nodes()
                .filter_map(|n| try_external_id(&n.as_object()).map(|ext| (n.id.clone(), ext)))
                .collect(),
        ),
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AQUA, RED};

    fn sample() -> Vec<Triple> {
        vec![
            Triple::new("malware--a", "uses", "attack-pattern--b"),
            Triple::new("attack-pattern--b", "related-to", "x-mitre-tactic--t"),
            Triple::new("malware--a", "uses", "tool--c"),
        ]
    }

    #[test]
    fn test_safe_id() {
        assert_eq!(safe_id("attack-pattern--0042-ABC"), "attack_pattern_0042_abc");
        assert_eq!(safe_id("T1059.001"), "t1059_001");
        assert_eq!(safe_id("a b\tc"), "a_b_c");
    }

    #[test]
    fn test_safe_id_keeps_non_ascii_word_characters() {
        assert_eq!(safe_id("X-MITRE-Tactic"), "x_mitre_tactic");
        assert_eq!(safe_id("ΩMEGA--Äö.É"), "ωmega_äö_é");
        assert_eq!(safe_id("--Lead"), "_lead");
    }

    #[test]
    fn test_header_and_ordering() {
        let dot = triples_to_dot(&sample(), &DotOptions::default());
        let lines: Vec<&str> = dot.lines().collect();
        assert_eq!(
            &lines[..8],
            &[
                "digraph G {",
                "    rankdir=LR;",
                "    node[shape=box];",
                "    splines=true;",
                "    nodesep=0.25;",
                "    ranksep=1;",
                "    concentrate=true;",
                "",
            ]
        );
        // Sorted triples: attack-pattern subject first
        assert_eq!(lines[8], "    \"attack_pattern_b\" [label=\"attack-pattern--b\"];");
        assert_eq!(lines[9], "    \"x_mitre_tactic_t\" [label=\"x-mitre-tactic--t\"];");
        assert!(dot.contains(&format!(
            "    \"malware_a\" -> \"tool_c\" [label=\"uses\", color=\"{}\"];",
            RED
        )));
        assert!(dot.contains(&format!(
            "    \"attack_pattern_b\" -> \"x_mitre_tactic_t\" [label=\"related-to\", color=\"{}\"];",
            AQUA
        )));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_each_node_declared_once() {
        let dot = triples_to_dot(&sample(), &DotOptions::default());
        let declarations = dot.lines().filter(|l| l.contains("[label=") && !l.contains("->")).count();
        assert_eq!(declarations, 4);
    }

    #[test]
    fn test_unlabelled_edge_without_colour() {
        let options = DotOptions { include_edge_labels: false, ..Default::default() };
        let dot = triples_to_dot(&[Triple::new("vulnerability--v", "targets", "software--s")], &options);
        assert!(dot.contains("    \"vulnerability_v\" -> \"software_s\";"));
    }

    #[test]
    fn test_grouping_by_type() {
        let options = DotOptions { group_by_type: true, ..Default::default() };
        let dot = triples_to_dot(
            &[
                Triple::new("malware--a", "uses", "malware--b"),
                Triple::new("malware--a", "related-to", "c0f473a6-4e90-5704-9236-63d5b739c8c8"),
            ],
            &options,
        );
        assert!(dot.contains("    subgraph cluster_malware {\n        label=\"malware\";\n        \"malware_a\""));
        assert!(dot.contains("    subgraph cluster_external_reference {\n        label=\"external-reference\";"));
    }

    #[test]
    fn test_node_labels_hide_unlabelled_nodes() {
        let mut labels = FxHashMap::default();
        labels.insert("malware--a".to_string(), "Emotet".to_string());
        labels.insert("attack-pattern--b".to_string(), "Phishing".to_string());
        let options = DotOptions { node_labels: Some(labels), ..Default::default() };

        let dot = triples_to_dot(&sample(), &options);
        assert!(dot.contains("\"malware_a\" [label=\"Emotet\"];"));
        assert!(!dot.contains("tool_c"));
        assert!(!dot.contains("x_mitre_tactic_t"));
        assert!(dot.contains("\"malware_a\" -> \"attack_pattern_b\""));
    }

    #[test]
    fn test_palette_rules_before_defaults() {
        let palette = Palette::default().with_rule(ColourRule::new(None, Some("mitigates"), None, "#000001"));
        assert_eq!(palette.colour_for("course-of-action", "mitigates", "attack-pattern"), Some("#000001"));
        assert_eq!(palette.colour_for("malware", "uses", "tool"), Some(RED));
        assert_eq!(palette.colour_for("vulnerability", "uses", "tool"), None);
    }

    #[test]
    fn test_labels_are_escaped() {
        let mut labels = FxHashMap::default();
        labels.insert("tool--a".to_string(), "say \"hi\"".to_string());
        labels.insert("tool--b".to_string(), "b".to_string());
        let options = DotOptions { node_labels: Some(labels), ..Default::default() };
        let dot = triples_to_dot(&[Triple::new("tool--a", "uses", "tool--b")], &options);
        assert!(dot.contains(r#"[label="say \"hi\""];"#));
    }
}
