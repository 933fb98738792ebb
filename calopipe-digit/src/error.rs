//! Digitization error types.

use std::path::PathBuf;

use calopipe_core::StoreError;
use thiserror::Error;

/// Result type for digitization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running the digitization chain.
#[derive(Error, Debug)]
pub enum Error {
    /// A shaper file could not be parsed.
    #[error("shaper file {path}: line {line}: {reason}")]
    ShaperFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A pulse shape is unusable.
    #[error("invalid pulse shape: {0}")]
    InvalidShape(String),

    /// Filter weights do not match the number of samples.
    #[error("{which} weights have {weights} entries but the pulse has {samples} samples")]
    WeightLength {
        which: &'static str,
        weights: usize,
        samples: usize,
    },

    /// Inconsistent configuration value.
    #[error("invalid {what}: {reason}")]
    InvalidConfig { what: &'static str, reason: String },

    /// Malformed defect table entry.
    #[error("defect table entry {index}: {reason}")]
    DefectRule { index: usize, reason: String },

    /// A defect table names a module the layout does not have.
    #[error("defect table entry {index}: unknown module '{module}'")]
    UnknownModule { index: usize, module: String },

    /// Event store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Geometry lookup failed.
    #[error(transparent)]
    Geometry(#[from] calopipe_geometry::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            what,
            reason: reason.into(),
        }
    }
}
