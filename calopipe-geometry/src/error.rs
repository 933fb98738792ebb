//! Geometry error types.

use thiserror::Error;

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry configuration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// A volume descriptor is inconsistent.
    #[error("invalid sampling volume '{name}': {reason}")]
    InvalidVolume { name: String, reason: String },

    /// The eta of a point could not be computed, even with the fallback formula.
    #[error("eta undefined for r={r}, z={z}")]
    DegenerateEta { r: f64, z: f64 },

    /// Two volumes share a name or a collection key.
    #[error("duplicate {what} '{name}' in detector layout")]
    Duplicate { what: &'static str, name: String },

    /// Malformed geometry document.
    #[error("geometry document: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
