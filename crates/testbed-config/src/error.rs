//! Configuration errors.

use std::path::PathBuf;
use testbed_types::TopologyError;
use thiserror::Error;

/// Invalid or unreadable parameters, or a config artifact that could not be
/// written. Always raised before any node process is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter value is out of range.
    #[error("invalid parameter `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// A parameters file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A parameters file is not valid TOML for the expected shape.
    #[error("failed to parse parameters: {0}")]
    Parse(#[from] toml::de::Error),

    /// Committee or worker cache could not be derived from the identities.
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    /// A config artifact could not be serialised.
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A config artifact could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
