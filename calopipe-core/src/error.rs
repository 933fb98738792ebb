//! Error types for calopipe-core.

use crate::store::KeyKind;
use thiserror::Error;

/// Errors raised by [`crate::EventStore`] accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A stage asked for a key nobody recorded in this event.
    #[error("event {event}: key '{key}' was never recorded")]
    MissingKey { key: String, event: usize },

    /// A key was recorded twice within one event.
    #[error("event {event}: key '{key}' is already recorded")]
    DuplicateKey { key: String, event: usize },

    /// The key exists but holds another kind of collection.
    #[error("event {event}: key '{key}' holds {found}, expected {expected}")]
    WrongKind {
        key: String,
        event: usize,
        expected: KeyKind,
        found: KeyKind,
    },
}

impl StoreError {
    /// Name of the key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::MissingKey { key, .. }
            | Self::DuplicateKey { key, .. }
            | Self::WrongKind { key, .. } => key,
        }
    }
}
