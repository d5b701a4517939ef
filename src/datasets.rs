//! Built-in dataset table and dataset selection.
//!
//! Each dataset is looked up in a conventional local checkout first and
//! fetched from its canonical URL when that checkout is missing.

use crate::config::{Config, DataSourceConfig};
use crate::error::{Result, StixError};
use crate::loader::{self, CompositeSource, MemorySource};
use clap::ValueEnum;
use tracing::{debug, info};

/// The datasets this tool knows how to find on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Dataset {
    #[value(name = "attack-enterprise")]
    AttackEnterprise,
    #[value(name = "attack-mobile")]
    AttackMobile,
    #[value(name = "attack-ics")]
    AttackIcs,
    #[value(name = "nist-sp-800-53")]
    NistSp80053,
    #[value(name = "attack-to-nist-sp-800-53")]
    AttackToNistSp80053,
    #[value(name = "capec")]
    Capec,
    #[value(name = "mbc")]
    Mbc,
}

impl Dataset {
    pub const ALL: [Dataset; 7] = [
        Dataset::AttackEnterprise,
        Dataset::AttackMobile,
        Dataset::AttackIcs,
        Dataset::NistSp80053,
        Dataset::AttackToNistSp80053,
        Dataset::Capec,
        Dataset::Mbc,
    ];

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Dataset::AttackEnterprise => "MITRE ATT&CK Enterprise",
            Dataset::AttackMobile => "MITRE ATT&CK Mobile",
            Dataset::AttackIcs => "MITRE ATT&CK ICS",
            Dataset::NistSp80053 => "NIST SP 800-53",
            Dataset::AttackToNistSp80053 => "MITRE ATT&CK Enterprise to NIST SP 800-53",
            Dataset::Capec => "MITRE CAPEC",
            Dataset::Mbc => "MITRE MBC",
        }
    }

    /// Stable identifier used on the command line, in config files and in
    /// matrix output
    pub fn slug(self) -> &'static str {
        match self {
            Dataset::AttackEnterprise => "attack-enterprise",
            Dataset::AttackMobile => "attack-mobile",
            Dataset::AttackIcs => "attack-ics",
            Dataset::NistSp80053 => "nist-sp-800-53",
            Dataset::AttackToNistSp80053 => "attack-to-nist-sp-800-53",
            Dataset::Capec => "capec",
            Dataset::Mbc => "mbc",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.slug() == slug)
    }

    pub fn url(self) -> &'static str {
        match self {
            Dataset::AttackEnterprise => "https://raw.githubusercontent.com/mitre-attack/attack-stix-data/master/enterprise-attack/enterprise-attack.json",
            Dataset::AttackMobile => "https://raw.githubusercontent.com/mitre-attack/attack-stix-data/master/mobile-attack/mobile-attack.json",
            Dataset::AttackIcs => "https://raw.githubusercontent.com/mitre-attack/attack-stix-data/master/ics-attack/ics-attack.json",
            Dataset::NistSp80053 => "https://raw.githubusercontent.com/center-for-threat-informed-defense/attack-control-framework-mappings/main/frameworks/attack_12_1/nist800_53_r5/stix/nist800-53-r5-controls.json",
            Dataset::AttackToNistSp80053 => "https://raw.githubusercontent.com/center-for-threat-informed-defense/attack-control-framework-mappings/main/frameworks/attack_12_1/nist800_53_r5/stix/nist800-53-r5-mappings.json",
            Dataset::Capec => "https://raw.githubusercontent.com/mitre/cti/master/capec/2.1/stix-capec.json",
            Dataset::Mbc => "https://raw.githubusercontent.com/MBCProject/mbc-stix2/master/mbc/mbc.json",
        }
    }

    /// Conventional location of a local checkout
    pub fn path(self) -> &'static str {
        match self {
            Dataset::AttackEnterprise => "~/src/attack-stix-data/enterprise-attack/enterprise-attack.json",
            Dataset::AttackMobile => "~/src/attack-stix-data/mobile-attack/mobile-attack.json",
            Dataset::AttackIcs => "~/src/attack-stix-data/ics-attack/ics-attack.json",
            Dataset::NistSp80053 => "~/src/attack-control-framework-mappings/frameworks/attack_12_1/nist800_53_r5/stix/nist800-53-r5-controls.json",
            Dataset::AttackToNistSp80053 => "~/src/attack-control-framework-mappings/frameworks/attack_12_1/nist800_53_r5/stix/nist800-53-r5-mappings.json",
            Dataset::Capec => "~/src/cti/capec/2.1/stix-capec.json",
            Dataset::Mbc => "~/src/mbc-stix2/mbc/mbc.json",
        }
    }

    pub fn source(self) -> DataSource {
        DataSource {
            name: self.slug().to_string(),
            primary: self.path().to_string(),
            fallback: Some(self.url().to_string()),
        }
    }
}

/// A named source to load: a primary locator plus an optional fallback used
/// when the primary cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub name: String,
    pub primary: String,
    pub fallback: Option<String>,
}

impl DataSource {
    /// A source named after its own locator.
    pub fn locator<S: Into<String>>(locator: S) -> Self {
        let locator = locator.into();
        Self { name: locator.clone(), primary: locator, fallback: None }
    }

    fn from_config(entry: &DataSourceConfig) -> Option<Self> {
        let (primary, fallback) = match (&entry.path, &entry.url) {
            (Some(path), url) => (path.clone(), url.clone()),
            (None, Some(url)) => (url.clone(), None),
            (None, None) => return None,
        };
        Some(Self { name: entry.name.clone(), primary, fallback })
    }

    pub fn load(&self) -> Result<MemorySource> {
        let source = match &self.fallback {
            Some(fallback) => loader::load_with_fallback(&self.primary, fallback)?,
            None => loader::load(&self.primary)?,
        };
        Ok(source.with_name(self.name.as_str()))
    }
}

/// Which datasets to load, as chosen on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSelection {
    pub all: bool,
    pub attack_enterprise: bool,
    pub attack_mobile: bool,
    pub attack_ics: bool,
    pub nist_sp_800_53: bool,
    pub capec: bool,
    pub mbc: bool,
    pub attack_to_nist_sp_800_53: bool,
    /// Arbitrary locators given with `--include`
    pub locators: Vec<String>,
}

impl DatasetSelection {
    /// The selected built-in datasets, in table order.
    ///
    /// The ATT&CK to NIST SP 800-53 mappings are pulled in whenever both
    /// ATT&CK Enterprise and NIST SP 800-53 are selected.
    pub fn datasets(&self) -> Vec<Dataset> {
        if self.all {
            return Dataset::ALL.to_vec();
        }

        let mapping = self.attack_to_nist_sp_800_53 || (self.attack_enterprise && self.nist_sp_800_53);
        let flags = [
            (Dataset::AttackEnterprise, self.attack_enterprise),
            (Dataset::AttackMobile, self.attack_mobile),
            (Dataset::AttackIcs, self.attack_ics),
            (Dataset::NistSp80053, self.nist_sp_800_53),
            (Dataset::AttackToNistSp80053, mapping),
            (Dataset::Capec, self.capec),
            (Dataset::Mbc, self.mbc),
        ];
        flags
            .into_iter()
            .filter_map(|(dataset, selected)| selected.then_some(dataset))
            .collect()
    }

    /// Resolve the selection into loadable sources.
    ///
    /// Config entries named after a dataset slug override that dataset's
    /// locations (or disable it); other enabled entries are added as extra
    /// sources. Fails with [`StixError::NoDataSources`] before any I/O when
    /// nothing is left to load.
    pub fn resolve(&self, config: &Config) -> Result<Vec<DataSource>> {
        let mut sources = Vec::new();

        for dataset in self.datasets() {
            match config.data_source(dataset.slug()) {
                Some(entry) if !entry.enabled => {
                    debug!("{} disabled by configuration", dataset.name());
                }
                Some(entry) => {
                    sources.push(DataSource::from_config(entry).unwrap_or_else(|| dataset.source()));
                }
                None => sources.push(dataset.source()),
            }
        }

        for entry in &config.data_sources {
            if entry.enabled && Dataset::from_slug(&entry.name).is_none() {
                if let Some(source) = DataSource::from_config(entry) {
                    sources.push(source);
                }
            }
        }

        sources.extend(self.locators.iter().map(DataSource::locator));

        if sources.is_empty() {
            return Err(StixError::NoDataSources);
        }
        Ok(sources)
    }
}

/// Load every source into one composite source.
pub fn load_sources(sources: &[DataSource]) -> Result<CompositeSource> {
    if sources.is_empty() {
        return Err(StixError::NoDataSources);
    }

    let mut composite = CompositeSource::new();
    for source in sources {
        let loaded = source.load()?;
        info!("{}: {} objects", source.name, loaded.len());
        composite.add(loaded);
    }
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs_round_trip() {
        for dataset in Dataset::ALL {
            assert_eq!(Dataset::from_slug(dataset.slug()), Some(dataset));
            assert!(dataset.url().starts_with("https://"));
            assert!(dataset.path().starts_with("~/src/"));
        }
        assert_eq!(Dataset::from_slug("attack"), None);
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let selection = DatasetSelection::default();
        assert!(matches!(
            selection.resolve(&Config::default()),
            Err(StixError::NoDataSources)
        ));
    }

    #[test]
    fn test_mapping_is_implied_by_attack_and_nist() {
        let selection = DatasetSelection {
            attack_enterprise: true,
            nist_sp_800_53: true,
            ..Default::default()
        };
        assert_eq!(
            selection.datasets(),
            vec![
                Dataset::AttackEnterprise,
                Dataset::NistSp80053,
                Dataset::AttackToNistSp80053
            ]
        );

        let attack_only = DatasetSelection { attack_enterprise: true, ..Default::default() };
        assert_eq!(attack_only.datasets(), vec![Dataset::AttackEnterprise]);
    }

    #[test]
    fn test_include_all() {
        let selection = DatasetSelection { all: true, ..Default::default() };
        assert_eq!(selection.datasets().len(), 7);
    }

    #[test]
    fn test_locators_and_config_overrides() {
        let config: Config = serde_json::from_str(
            r#"{"data_sources": [
                {"name": "capec", "path": "/mirror/capec.json"},
                {"name": "mbc", "enabled": false},
                {"name": "internal", "url": "https://intel.example.com/bundle.json"},
                {"name": "parked", "path": "/tmp/x.json", "enabled": false}
            ]}"#,
        )
        .unwrap();

        let selection = DatasetSelection {
            capec: true,
            mbc: true,
            locators: vec!["./local.json".to_string()],
            ..Default::default()
        };
        let sources = selection.resolve(&config).unwrap();
        assert_eq!(
            sources,
            vec![
                DataSource {
                    name: "capec".into(),
                    primary: "/mirror/capec.json".into(),
                    fallback: None
                },
                DataSource {
                    name: "internal".into(),
                    primary: "https://intel.example.com/bundle.json".into(),
                    fallback: None
                },
                DataSource::locator("./local.json"),
            ]
        );
    }
}
