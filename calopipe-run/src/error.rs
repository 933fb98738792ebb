//! Pipeline error types.

use calopipe_core::StoreError;
use thiserror::Error;

/// Result type for pipeline configuration and run operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised before any event is processed, or by the run driver.
#[derive(Error, Debug)]
pub enum Error {
    /// Inconsistent pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Geometry could not be built.
    #[error(transparent)]
    Geometry(#[from] calopipe_geometry::Error),

    /// A digitization stage could not be configured.
    #[error(transparent)]
    Digit(#[from] calopipe_digit::Error),

    /// A reconstruction stage could not be configured.
    #[error(transparent)]
    Reco(#[from] calopipe_reco::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure of one stage inside one event.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Digit(#[from] calopipe_digit::Error),

    #[error(transparent)]
    Reco(#[from] calopipe_reco::Error),
}

/// A failed event, with the stage and key involved.
#[derive(Error, Debug)]
#[error("event {event}: {stage} failed on key '{key}': {source}")]
pub struct EventError {
    pub event: usize,
    pub stage: String,
    pub key: String,
    #[source]
    pub source: StageError,
}

impl EventError {
    /// Creates an error for `stage` touching `key` in `event`.
    pub fn new(
        event: usize,
        stage: impl Into<String>,
        key: impl Into<String>,
        source: impl Into<StageError>,
    ) -> Self {
        Self {
            event,
            stage: stage.into(),
            key: key.into(),
            source: source.into(),
        }
    }
}
