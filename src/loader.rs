//! Object loading: resolve a locator (file, directory, glob or URL) into an
//! in-memory source of STIX objects.
//!
//! Local files are read and parsed in parallel; the resulting objects are
//! concatenated in sorted path order so that loads are deterministic.

use crate::error::{Result, StixError};
use crate::file_io::read_file_smart;
use crate::types::StixObject;
use rayon::prelude::*;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Characters that turn a path into a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// A resolved input location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// An `http://` or `https://` URL
    Url(String),
    /// An existing file or directory
    Path(PathBuf),
    /// A glob pattern, split into the literal directory it starts from and
    /// the pattern relative to it
    Glob { base: PathBuf, pattern: String },
}

impl Locator {
    /// Classify a raw locator string.
    ///
    /// `~` and `$VAR` / `${VAR}` are expanded for local paths. Anything that
    /// is not a well-formed HTTP(S) URL, an existing path, or a glob pattern
    /// is rejected with [`StixError::InvalidLocation`].
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StixError::invalid_location(raw));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return match url::Url::parse(trimmed) {
                Ok(url) if url.host_str().is_some() => Ok(Self::Url(trimmed.to_string())),
                _ => Err(StixError::invalid_location(raw)),
            };
        }

        let expanded = expand_path(trimmed);
        let path = PathBuf::from(&expanded);
        if path.exists() {
            return Ok(Self::Path(path));
        }

        if expanded.contains(GLOB_CHARS) {
            let (base, pattern) = split_glob(&expanded);
            return Ok(Self::Glob { base, pattern });
        }

        Err(StixError::invalid_location(raw))
    }

    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

/// Expand a leading `~` and any `$VAR` / `${VAR}` references.
///
/// Undefined variables are left untouched.
pub fn expand_path(raw: &str) -> String {
    let mut path = raw.to_string();
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            path = format!("{}{}", home.display(), &path[1..]);
        }
    }

    env_var_regex()
        .replace_all(&path, |caps: &regex::Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

#[allow(clippy::expect_used)] // Static regex pattern is hardcoded and valid
fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid regex")
    })
}

/// Split a glob into the longest literal directory prefix and the remainder.
fn split_glob(pattern: &str) -> (PathBuf, String) {
    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    let mut in_pattern = false;

    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if !in_pattern && !text.contains(GLOB_CHARS) {
            base.push(component);
        } else {
            in_pattern = true;
            rest.push(text.into_owned());
        }
    }

    if base.as_os_str().is_empty() {
        base = PathBuf::from(".");
    }
    (base, rest.join("/"))
}

/// The objects loaded from one locator.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    objects: Vec<StixObject>,
}

impl MemorySource {
    pub fn new<S: Into<String>>(name: S, objects: Vec<StixObject>) -> Self {
        Self { name: name.into(), objects }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the source, e.g. to the display name of a dataset.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn query(&self) -> &[StixObject] {
        &self.objects
    }

    pub fn get(&self, id: &str) -> Option<&StixObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn into_objects(self) -> Vec<StixObject> {
        self.objects
    }
}

/// Several sources queried in turn. Results are concatenated, never deduplicated.
#[derive(Debug, Clone, Default)]
pub struct CompositeSource {
    sources: Vec<MemorySource>,
    /// Object id to the index of the first source holding it
    provenance: FxHashMap<String, usize>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: MemorySource) {
        let position = self.sources.len();
        for o in source.query() {
            self.provenance.entry(o.id().to_string()).or_insert(position);
        }
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[MemorySource] {
        &self.sources
    }

    /// Every object of every source, in source order.
    pub fn query(&self) -> Vec<StixObject> {
        self.sources
            .iter()
            .flat_map(|s| s.query().iter().cloned())
            .collect()
    }

    /// Every object with the given id, across all sources.
    pub fn get(&self, id: &str) -> Vec<&StixObject> {
        self.sources.iter().filter_map(|s| s.get(id)).collect()
    }

    /// Name of the first source holding the given id.
    pub fn dataset_of(&self, id: &str) -> Option<&str> {
        self.provenance
            .get(id)
            .map(|&position| self.sources[position].name())
    }

    pub fn len(&self) -> usize {
        self.sources.iter().map(MemorySource::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<MemorySource> for CompositeSource {
    fn from_iter<I: IntoIterator<Item = MemorySource>>(iter: I) -> Self {
        let mut composite = Self::new();
        for source in iter {
            composite.add(source);
        }
        composite
    }
}

/// Load every object behind a locator.
pub fn load(raw: &str) -> Result<MemorySource> {
    let objects = match Locator::parse(raw)? {
        Locator::Url(url) => fetch_url(&url)?,
        Locator::Path(path) => load_files(&expand_directory(&path))?,
        Locator::Glob { base, pattern } => {
            let files = expand_glob(&base, &pattern)?;
            if files.is_empty() {
                return Err(StixError::invalid_location(raw));
            }
            load_files(&files)?
        }
    };

    info!("Loaded {} objects from {}", objects.len(), raw);
    Ok(MemorySource::new(raw, objects))
}

/// Load several locators independently and merge them.
pub fn load_many<S: AsRef<str>>(locators: &[S]) -> Result<CompositeSource> {
    if locators.is_empty() {
        return Err(StixError::NoDataSources);
    }
    locators.iter().map(|l| load(l.as_ref())).collect()
}

/// Load `primary`, falling back to `fallback` only when the primary cannot be
/// resolved at all. Network and parse failures are never masked.
pub fn load_with_fallback(primary: &str, fallback: &str) -> Result<MemorySource> {
    match load(primary) {
        Err(e) if e.is_invalid_location() => {
            debug!("{}; falling back to {}", e, fallback);
            load(fallback)
        }
        other => other,
    }
}

/// Parse a JSON document holding a bare array of objects, a bundle, or a
/// single object.
pub fn parse_document(bytes: &[u8], origin: &str) -> Result<Vec<StixObject>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| StixError::json(origin, e))?;
    objects_from_value(value, origin)
}

fn objects_from_value(value: Value, origin: &str) -> Result<Vec<StixObject>> {
    match value {
        Value::Array(items) => Ok(collect_objects(items, origin)),
        Value::Object(mut fields) => match fields.remove("objects") {
            Some(Value::Array(items)) => Ok(collect_objects(items, origin)),
            Some(_) => Err(StixError::unexpected_document(origin, "`objects` is not an array")),
            None => Ok(vec![StixObject::new(fields)]),
        },
        _ => Err(StixError::unexpected_document(
            origin,
            "expected a JSON array, a bundle or a STIX object",
        )),
    }
}

fn collect_objects(items: Vec<Value>, origin: &str) -> Vec<StixObject> {
    let total = items.len();
    let objects: Vec<StixObject> = items.into_iter().filter_map(StixObject::from_value).collect();
    if objects.len() < total {
        warn!(
            "Skipped {} non-object entries in {}",
            total - objects.len(),
            origin
        );
    }
    objects
}

/// A directory expands to every regular file beneath it; a file to itself.
fn expand_directory(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn expand_glob(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let walker = globwalk::GlobWalkerBuilder::from_patterns(base, &[pattern])
        .follow_links(true)
        .build()
        .map_err(|e| StixError::configuration(format!("bad glob pattern {:?}: {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .flat_map(|e| expand_directory(e.path()))
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

fn load_files(files: &[PathBuf]) -> Result<Vec<StixObject>> {
    debug!("Reading {} files", files.len());
    let batches: Vec<Vec<StixObject>> = files
        .par_iter()
        .map(|path| {
            let data = read_file_smart(path)?;
            parse_document(data.as_slice(), &path.display().to_string())
        })
        .collect::<Result<_>>()?;
    Ok(batches.into_iter().flatten().collect())
}

fn fetch_url(url: &str) -> Result<Vec<StixObject>> {
    info!("Fetching {}", url);
    let agent = ureq::AgentBuilder::new().build();
    let response = agent
        .get(url)
        .set(
            "User-Agent",
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
        )
        .call()
        .map_err(|e| StixError::http(url, e))?;

    let body: Value =
        serde_json::from_reader(response.into_reader()).map_err(|e| StixError::json(url, e))?;
    match body {
        Value::Object(mut fields) => match fields.remove("objects") {
            Some(Value::Array(items)) => Ok(collect_objects(items, url)),
            _ => Err(StixError::unexpected_document(url, "missing `objects` array")),
        },
        _ => Err(StixError::unexpected_document(url, "expected a STIX bundle")),
    }
}
