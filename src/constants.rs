//! Fixed tables shared across the pipeline: STIX type names, the pseudo-id
//! namespace and the default edge colour palette.

use uuid::{uuid, Uuid};

/// UUIDv5 namespace from the STIX 2.1 specification (section 2.9).
pub const UUID_NAMESPACE: Uuid = uuid!("00abedb4-aa42-466c-9c01-fed23315a9b7");

/// Predicate used for every implicit relationship surfaced by a decoder.
pub const RELATED_TO: &str = "related-to";

pub const ATTACK_PATTERN: &str = "attack-pattern";
pub const CAMPAIGN: &str = "campaign";
pub const COURSE_OF_ACTION: &str = "course-of-action";
pub const EXTERNAL_REFERENCE: &str = "external-reference";
pub const IDENTITY: &str = "identity";
pub const INTRUSION_SET: &str = "intrusion-set";
pub const MALWARE: &str = "malware";
pub const MALWARE_BEHAVIOR: &str = "malware-behavior";
pub const MALWARE_METHOD: &str = "malware-method";
pub const MALWARE_OBJECTIVE: &str = "malware-objective";
pub const MARKING_DEFINITION: &str = "marking-definition";
pub const RELATIONSHIP: &str = "relationship";
pub const TOOL: &str = "tool";
pub const X_MITRE_ASSET: &str = "x-mitre-asset";
pub const X_MITRE_DATA_COMPONENT: &str = "x-mitre-data-component";
pub const X_MITRE_DATA_SOURCE: &str = "x-mitre-data-source";
pub const X_MITRE_MATRIX: &str = "x-mitre-matrix";
pub const X_MITRE_TACTIC: &str = "x-mitre-tactic";

pub const BLACK: &str = "#000000";
pub const AQUA: &str = "#00FFFF";
pub const AQUAMARINE: &str = "#7FFFD4";
pub const BLUE: &str = "#0000FF";
pub const CORNFLOWER_BLUE: &str = "#6495ED";
pub const DARK_MAGENTA: &str = "#8B008B";
pub const DEEP_SKY_BLUE: &str = "#00BFFF";
pub const FOREST_GREEN: &str = "#228B22";
pub const GOLD: &str = "#FFD700";
pub const HOT_PINK: &str = "#FF69B4";
pub const LIGHT_GREEN: &str = "#90EE90";
pub const MAGENTA: &str = "#FF00FF";
pub const MEDIUM_PURPLE: &str = "#9370DB";
pub const MEDIUM_SEA_GREEN: &str = "#3CB371";
pub const ORANGE_RED: &str = "#FF4500";
pub const PINK: &str = "#FFC0CB";
pub const PLUM: &str = "#DDA0DD";
pub const RED: &str = "#FF0000";

/// Edge colour keyed by the STIX type of the edge's subject.
pub const DEFAULT_COLOURS_BY_TYPE: &[(&str, &str)] = &[
    (ATTACK_PATTERN, AQUA),
    (CAMPAIGN, MEDIUM_PURPLE),
    (COURSE_OF_ACTION, FOREST_GREEN),
    (IDENTITY, DARK_MAGENTA),
    (INTRUSION_SET, DEEP_SKY_BLUE),
    (MALWARE, RED),
    (MALWARE_BEHAVIOR, ORANGE_RED),
    (MALWARE_METHOD, PINK),
    (MALWARE_OBJECTIVE, GOLD),
    (MARKING_DEFINITION, PLUM),
    (TOOL, HOT_PINK),
    (X_MITRE_ASSET, AQUAMARINE),
    (X_MITRE_DATA_COMPONENT, LIGHT_GREEN),
    (X_MITRE_DATA_SOURCE, MAGENTA),
    (X_MITRE_MATRIX, CORNFLOWER_BLUE),
    (X_MITRE_TACTIC, BLUE),
    (EXTERNAL_REFERENCE, MEDIUM_SEA_GREEN),
];

/// Look up the default edge colour for a subject type.
pub fn default_colour_for_type(stix_type: &str) -> Option<&'static str> {
    DEFAULT_COLOURS_BY_TYPE
        .iter()
        .find(|(t, _)| *t == stix_type)
        .map(|(_, colour)| *colour)
}

/// Spaces per indentation level in generated DOT.
pub const DOT_INDENT: usize = 4;
