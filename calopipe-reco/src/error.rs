//! Reconstruction error types.

use thiserror::Error;

/// Result type for reconstruction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the reconstruction stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Inconsistent configuration value.
    #[error("invalid {what}: {reason}")]
    InvalidConfig { what: &'static str, reason: String },

    /// A cluster has no ring set.
    #[error("no ring set for cluster {cluster_index}")]
    MissingRings { cluster_index: usize },
}

impl Error {
    pub(crate) fn config(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            what,
            reason: reason.into(),
        }
    }
}
