use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, decoding and projecting STIX content.
#[derive(Debug, Error)]
pub enum StixError {
    #[error("Invalid location: {locator} is neither an existing path nor an HTTP(S) URL")]
    InvalidLocation { locator: String },

    #[error("Unknown external ID for {id}")]
    UnknownExternalId { id: String },

    #[error("{dataset} external ID not found")]
    ExternalIdNotFound { dataset: &'static str },

    #[error("No data sources specified")]
    NoDataSources,

    #[error("HTTP request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected document shape in {origin}: {reason}")]
    UnexpectedDocument { origin: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed triple on line {line}: {content:?}")]
    MalformedTriple { line: usize, content: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, StixError>;

impl StixError {
    pub fn invalid_location<S: Into<String>>(locator: S) -> Self {
        Self::InvalidLocation { locator: locator.into() }
    }

    pub fn unknown_external_id<S: Into<String>>(id: S) -> Self {
        Self::UnknownExternalId { id: id.into() }
    }

    pub fn external_id_not_found(dataset: &'static str) -> Self {
        Self::ExternalIdNotFound { dataset }
    }

    pub fn http<S: Into<String>>(url: S, source: ureq::Error) -> Self {
        Self::Http { url: url.into(), source: Box::new(source) }
    }

    pub fn json<S: Into<String>>(origin: S, source: serde_json::Error) -> Self {
        Self::Json { origin: origin.into(), source }
    }

    pub fn unexpected_document<S1: Into<String>, S2: Into<String>>(origin: S1, reason: S2) -> Self {
        Self::UnexpectedDocument { origin: origin.into(), reason: reason.into() }
    }

    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn malformed_triple<S: Into<String>>(line: usize, content: S) -> Self {
        Self::MalformedTriple { line, content: content.into() }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Returns true if the error concerns a single object and processing of
    /// the remaining graph can continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownExternalId { .. } | Self::ExternalIdNotFound { .. })
    }

    /// Returns true if the locator could not be resolved at all, which is the
    /// only failure a fallback locator is allowed to absorb.
    pub fn is_invalid_location(&self) -> bool {
        matches!(self, Self::InvalidLocation { .. })
    }
}
