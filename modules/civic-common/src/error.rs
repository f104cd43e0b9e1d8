use std::fmt;

use thiserror::Error;
use tracing::warn;

/// An upstream the pipeline can fall back from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Geocoding,
    Search,
    OpenStates,
    Gemini,
    PageFetch,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Geocoding => "geocoding",
            Source::Search => "search",
            Source::OpenStates => "openstates",
            Source::Gemini => "gemini",
            Source::PageFetch => "page_fetch",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single source failed. Recoverable: callers degrade it to an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnavailable {
    pub source: Source,
    pub reason: String,
}

impl SourceUnavailable {
    pub fn new(source: Source, reason: impl fmt::Display) -> Self {
        Self {
            source,
            reason: reason.to_string(),
        }
    }

    pub fn missing_credential(source: Source) -> Self {
        Self::new(source, "credential not configured")
    }
}

impl fmt::Display for SourceUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} unavailable: {}", self.source, self.reason)
    }
}

impl std::error::Error for SourceUnavailable {}

/// Degrade a per-source failure to an empty list, logging it.
pub trait OrEmpty<T> {
    fn or_empty(self) -> Vec<T>;
}

impl<T> OrEmpty<T> for Result<Vec<T>, SourceUnavailable> {
    fn or_empty(self) -> Vec<T> {
        match self {
            Ok(items) => items,
            Err(e) => {
                warn!(source = e.source.as_str(), reason = e.reason.as_str(), "Source unavailable, continuing without it");
                Vec::new()
            }
        }
    }
}

/// Failures that propagate to the caller.
#[derive(Error, Debug)]
pub enum CivicError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
