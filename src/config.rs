use crate::datasets::Dataset;
use crate::decoders::DecoderOptions;
use crate::dot::{ColourRule, Palette};
use crate::error::{Result, StixError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file when `--config` is absent
pub const CONFIG_ENV_VAR: &str = "STIXMAP_CONFIG";

/// User configuration, read from a JSON file.
///
/// Every section is optional and falls back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Overrides for the built-in datasets (matched by slug) and extra sources
    pub data_sources: Vec<DataSourceConfig>,
    /// Edge colour rules, checked in order before the per-type defaults
    pub edge_colours: Vec<EdgeColourPolicy>,
    pub decoder: DecoderOptions,
    /// Node colour and edge label policies from older config files are
    /// accepted and ignored
    #[serde(skip_serializing)]
    pub node_colours: Vec<serde_json::Value>,
    #[serde(skip_serializing)]
    pub edge_labels: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSourceConfig {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Colour edges whose subject type, predicate and object type match the
/// given shell-style patterns. Missing patterns match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeColourPolicy {
    #[serde(default, alias = "subject")]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default, alias = "object")]
    pub object_type: Option<String>,
    pub colour: String,
}

impl Config {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StixError::io(path, e))?;
        let config: Config =
            serde_json::from_str(&text).map_err(|e| StixError::json(path.display().to_string(), e))?;
        config.validate()?;
        if !config.node_colours.is_empty() || !config.edge_labels.is_empty() {
            debug!("Ignoring node_colours and edge_labels in {}", path.display());
        }
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the explicitly given file, else the file named by
    /// [`CONFIG_ENV_VAR`], else the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(&PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    /// Validate the configuration and return errors for invalid settings
    pub fn validate(&self) -> Result<()> {
        for entry in &self.data_sources {
            if entry.name.trim().is_empty() {
                return Err(StixError::configuration("data source name must not be empty"));
            }

            let builtin = Dataset::from_slug(&entry.name).is_some();
            if entry.enabled && !builtin && entry.url.is_none() && entry.path.is_none() {
                return Err(StixError::configuration(format!(
                    "data source {:?} needs a url or a path",
                    entry.name
                )));
            }

            if let Some(url) = &entry.url {
                let valid = url::Url::parse(url)
                    .map(|u| matches!(u.scheme(), "http" | "https"))
                    .unwrap_or(false);
                if !valid {
                    return Err(StixError::configuration(format!(
                        "data source {:?} has an invalid url: {}",
                        entry.name, url
                    )));
                }
            }
        }

        for policy in &self.edge_colours {
            if !is_hex_colour(&policy.colour) {
                return Err(StixError::configuration(format!(
                    "edge colour must look like #RRGGBB, got {:?}",
                    policy.colour
                )));
            }
        }

        Ok(())
    }

    pub fn data_source(&self, name: &str) -> Option<&DataSourceConfig> {
        self.data_sources.iter().find(|entry| entry.name == name)
    }

    /// The edge palette: configured rules first, default per-type colours last.
    pub fn palette(&self) -> Palette {
        self.edge_colours.iter().fold(Palette::default(), |palette, policy| {
            palette.with_rule(ColourRule::new(
                policy.subject_type.as_deref(),
                policy.predicate.as_deref(),
                policy.object_type.as_deref(),
                &policy.colour,
            ))
        })
    }
}

fn is_hex_colour(colour: &str) -> bool {
    colour.len() == 7
        && colour.starts_with('#')
        && colour[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.decoder, DecoderOptions::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"decoder": {"include_identities": true}}"#).unwrap();
        assert!(config.decoder.include_identities);
        assert!(!config.decoder.include_markings);
        assert!(config.data_sources.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"colours": []}"#).is_err());
    }

    #[test]
    fn test_legacy_policy_keys_are_accepted() {
        let config: Config = serde_json::from_str(
            r##"{
                "data_sources": [{"name": "mbc", "url": null, "path": null, "enabled": false}],
                "node_colours": [{"type": "malware", "colour": "#FF0000"}],
                "edge_colours": [{"subject": "malware", "predicate": "uses", "object": "attack-pattern", "colour": "#00FF00"}],
                "edge_labels": [{"directed": true, "replace": false}]
            }"##,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.edge_colours[0].subject_type.as_deref(), Some("malware"));
        assert_eq!(config.edge_colours[0].object_type.as_deref(), Some("attack-pattern"));
        assert_eq!(config.node_colours.len(), 1);

        let palette = config.palette();
        assert_eq!(palette.colour_for("malware", "uses", "attack-pattern"), Some("#00FF00"));
        assert_ne!(palette.colour_for("tool", "uses", "attack-pattern"), Some("#00FF00"));

        let written = serde_json::to_value(&config).unwrap();
        assert!(written.get("node_colours").is_none());
        assert!(written["edge_colours"][0].get("subject_type").is_some());
    }

    #[test]
    fn test_colour_validation() {
        let bad = Config {
            edge_colours: vec![EdgeColourPolicy {
                subject_type: Some("malware".into()),
                predicate: None,
                object_type: None,
                colour: "red".into(),
            }],
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(is_hex_colour("#00ff7F"));
        assert!(!is_hex_colour("#00ff7"));
    }

    #[test]
    fn test_data_source_validation() {
        let missing_location: Config =
            serde_json::from_str(r#"{"data_sources": [{"name": "internal"}]}"#).unwrap();
        assert!(missing_location.validate().is_err());

        let disabled_builtin: Config =
            serde_json::from_str(r#"{"data_sources": [{"name": "mbc", "enabled": false}]}"#).unwrap();
        assert!(disabled_builtin.validate().is_ok());

        let bad_url: Config = serde_json::from_str(
            r#"{"data_sources": [{"name": "x", "url": "ftp://example.com/a.json"}]}"#,
        )
        .unwrap();
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r##"{{"edge_colours": [{{"predicate": "mitigates", "colour": "#123456"}}]}}"##
        )
        .unwrap();
        file.flush().unwrap();

        let config = Config::discover(Some(file.path())).unwrap();
        assert_eq!(config.edge_colours.len(), 1);
        let palette = config.palette();
        assert_eq!(
            palette.colour_for("course-of-action", "mitigates", "attack-pattern"),
            Some("#123456")
        );
    }

    #[test]
    fn test_load_reports_bad_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{").unwrap();
        file.flush().unwrap();
        assert!(matches!(Config::load(file.path()), Err(StixError::Json { .. })));
    }
}
