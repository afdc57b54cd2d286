//! Error types for the mixing engine
//!
//! `ConfigError` covers everything `mix` and the advisories can reject. It is always
//! raised before a single item is emitted, so callers never see partial results.
//! The crate-level `Error` covers loading settings from disk.

use thiserror::Error;

/// Result type for settings loading
pub type Result<T> = std::result::Result<T, Error>;

/// Invalid mix configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No enabled source has any items to draw from
    #[error("Insufficient sources: at least one enabled, non-empty source is required")]
    InsufficientSources,

    /// Neither a positive target count nor a positive target duration was given
    #[error("Missing target: set a target count, a target duration, or use all sources")]
    MissingTarget,

    /// Both target kinds were given and `use_all_sources` is off
    #[error("Ambiguous target: set either a target count or a target duration, not both")]
    AmbiguousTarget,

    /// Two pools share an id, so ratio entries and statistics cannot tell them apart
    #[error("Duplicate source id '{source_id}'")]
    DuplicateSource { source_id: String },

    /// A ratio entry violates its bounds or cannot be normalized
    #[error("Invalid ratio entry for source '{source_id}': {reason}")]
    InvalidRatioEntry { source_id: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid_entry(source_id: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidRatioEntry {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Library error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed or located
    #[error("Settings error: {0}")]
    Settings(String),
}
