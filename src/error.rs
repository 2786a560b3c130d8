//! Error types.

use crate::ner::NerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building an engine or loading configuration.
///
/// Analysis itself never fails.
#[derive(Debug, Error)]
pub enum Error {
    #[error("max-count-per-type must be at least 1")]
    InvalidMaxCount,

    #[error("risk sensitivity k must be a positive finite number, got {0}")]
    InvalidSensitivity(f64),

    #[error("minimum NER confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),

    #[error("failed to read configuration from {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Ner(#[from] NerError),
}

pub type Result<T> = std::result::Result<T, Error>;
