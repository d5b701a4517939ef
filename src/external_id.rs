//! Dataset-specific external identifiers (`T1059`, `AC-1`, `CAPEC-66`, ...).
//!
//! Objects are classified by the first matching heuristic, in a fixed
//! priority order, and the matching extractor then pulls out the id.

use crate::constants::X_MITRE_MATRIX;
use crate::error::{Result, StixError};
use crate::types::{stix_type_from_id, StixObject};
use serde_json::{Map, Value};

const ATTACK_DOMAINS: [&str; 3] = ["enterprise-attack", "mobile-attack", "ics-attack"];
const NIST_SOURCE_NAMES: [&str; 2] = ["NIST 800-53 Revision 4", "NIST 800-53 Revision 5"];

/// Which naming scheme an object's external id follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Attack,
    NistSp80053,
    Capec,
    Mbc,
}

impl Scheme {
    /// Classify an object; `None` when no heuristic matches.
    pub fn classify(o: &StixObject) -> Option<Self> {
        if is_attack(o) {
            Some(Self::Attack)
        } else if is_nist_sp_800_53(o) {
            Some(Self::NistSp80053)
        } else if is_capec(o) {
            Some(Self::Capec)
        } else if is_mbc(o) {
            Some(Self::Mbc)
        } else {
            None
        }
    }

    pub fn dataset_name(self) -> &'static str {
        match self {
            Self::Attack => "MITRE ATT&CK",
            Self::NistSp80053 => "NIST SP 800-53",
            Self::Capec => "MITRE CAPEC",
            Self::Mbc => "MITRE MBC",
        }
    }

    pub fn extract(self, o: &StixObject) -> Result<String> {
        let found = match self {
            Self::Attack => attack_external_id(o),
            Self::NistSp80053 => nist_external_id(o),
            Self::Capec => reference_external_id(o, |name| name == "capec"),
            Self::Mbc => mbc_external_id(o),
        };
        found
            .map(str::to_string)
            .ok_or_else(|| StixError::external_id_not_found(self.dataset_name()))
    }
}

/// Resolve an object's external id.
///
/// Fails with [`StixError::UnknownExternalId`] when the object belongs to
/// no known dataset, or [`StixError::ExternalIdNotFound`] when it does but
/// carries no id in the expected place.
pub fn external_id(o: &StixObject) -> Result<String> {
    match Scheme::classify(o) {
        Some(scheme) => scheme.extract(o),
        None => Err(StixError::unknown_external_id(o.id())),
    }
}

/// Like [`external_id`], but treats per-object failures as "no id".
pub fn try_external_id(o: &StixObject) -> Option<String> {
    external_id(o).ok()
}

pub fn is_attack(o: &StixObject) -> bool {
    ATTACK_DOMAINS.iter().any(|domain| in_attack_domain(o, domain))
}

pub fn is_attack_enterprise(o: &StixObject) -> bool {
    in_attack_domain(o, "enterprise-attack")
}

pub fn is_attack_mobile(o: &StixObject) -> bool {
    in_attack_domain(o, "mobile-attack")
}

pub fn is_attack_ics(o: &StixObject) -> bool {
    in_attack_domain(o, "ics-attack")
}

fn in_attack_domain(o: &StixObject, domain: &str) -> bool {
    o.get_str_list("x_mitre_domains").contains(&domain)
}

pub fn is_nist_sp_800_53(o: &StixObject) -> bool {
    nist_external_id(o).is_some()
}

pub fn is_capec(o: &StixObject) -> bool {
    o.contains_key("x_capec_version")
}

pub fn is_mbc(o: &StixObject) -> bool {
    let direct = o
        .get("obj_defn")
        .and_then(Value::as_object)
        .is_some_and(is_mbc_definition);
    direct || extension_definitions(o).any(is_mbc_definition)
}

/// A `vulnerability` with a CVE reference.
pub fn is_cve(o: &StixObject) -> bool {
    stix_type_from_id(o.id()) == "vulnerability"
        && o.get_object_list("external_references")
            .iter()
            .any(|r| r.get("source_name").and_then(Value::as_str) == Some("cve"))
}

fn reference_external_id<F>(o: &StixObject, source_matches: F) -> Option<&str>
where
    F: Fn(&str) -> bool,
{
    o.get_object_list("external_references")
        .into_iter()
        .find(|r| {
            r.get("source_name")
                .and_then(Value::as_str)
                .is_some_and(&source_matches)
        })
        .and_then(|r| r.get("external_id"))
        .and_then(Value::as_str)
}

fn attack_external_id(o: &StixObject) -> Option<&str> {
    if o.stix_type() == X_MITRE_MATRIX {
        return None;
    }
    reference_external_id(o, |name| name == "mitre-attack")
}

fn nist_external_id(o: &StixObject) -> Option<&str> {
    reference_external_id(o, |name| NIST_SOURCE_NAMES.contains(&name))
}

fn mbc_external_id(o: &StixObject) -> Option<&str> {
    let direct = o
        .get("obj_defn")
        .and_then(Value::as_object)
        .and_then(|defn| defn.get("external_id"))
        .and_then(Value::as_str);
    direct.or_else(|| {
        extension_definitions(o)
            .find(|defn| is_mbc_definition(defn))
            .and_then(|defn| defn.get("external_id"))
            .and_then(Value::as_str)
    })
}

fn is_mbc_definition(defn: &Map<String, Value>) -> bool {
    defn.get("source_name").and_then(Value::as_str) == Some("mitre-mbc")
}

/// The `obj_defn` mapping of every entry under `extensions`.
fn extension_definitions(o: &StixObject) -> impl Iterator<Item = &Map<String, Value>> {
    o.get("extensions")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|extensions| extensions.values())
        .filter_map(|ext| ext.get("obj_defn").and_then(Value::as_object))
}
