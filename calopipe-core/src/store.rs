//! Per-event keyed collection exchange.
//!
//! Every pipeline stage reads the collections written by its predecessors
//! and records its own output under a configured key. A key can be written
//! once per event; reading an absent key is an error that names the key and
//! the event.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::cluster::Cluster;
use crate::electron::ElectronCandidate;
use crate::error::StoreError;
use crate::event::{EventInfo, Hit, Seed};
use crate::rings::RingSet;

/// Kind of collection a key carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KeyKind {
    Events,
    Hits,
    Seeds,
    Cells,
    Clusters,
    Rings,
    Electrons,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Events => "events",
            Self::Hits => "hits",
            Self::Seeds => "seeds",
            Self::Cells => "cells",
            Self::Clusters => "clusters",
            Self::Rings => "rings",
            Self::Electrons => "electrons",
        };
        f.write_str(name)
    }
}

/// One typed collection stored under a key.
#[derive(Debug, Clone)]
pub enum Collection {
    Events(Vec<EventInfo>),
    Hits(Vec<Hit>),
    Seeds(Vec<Seed>),
    Cells(Vec<Cell>),
    Clusters(Vec<Cluster>),
    Rings(Vec<RingSet>),
    Electrons(Vec<ElectronCandidate>),
}

impl Collection {
    /// Kind of the collection.
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Events(_) => KeyKind::Events,
            Self::Hits(_) => KeyKind::Hits,
            Self::Seeds(_) => KeyKind::Seeds,
            Self::Cells(_) => KeyKind::Cells,
            Self::Clusters(_) => KeyKind::Clusters,
            Self::Rings(_) => KeyKind::Rings,
            Self::Electrons(_) => KeyKind::Electrons,
        }
    }

    /// Number of items in the collection.
    pub fn len(&self) -> usize {
        match self {
            Self::Events(v) => v.len(),
            Self::Hits(v) => v.len(),
            Self::Seeds(v) => v.len(),
            Self::Cells(v) => v.len(),
            Self::Clusters(v) => v.len(),
            Self::Rings(v) => v.len(),
            Self::Electrons(v) => v.len(),
        }
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! typed_accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $item:ty) => {
        $(#[$doc])*
        pub fn $name(&self, key: &str) -> Result<&[$item], StoreError> {
            match self.get(key)? {
                Collection::$variant(items) => Ok(items),
                other => Err(self.wrong_kind(key, KeyKind::$variant, other.kind())),
            }
        }
    };
}

/// Collections of one event, keyed by name.
#[derive(Debug, Default)]
pub struct EventStore {
    event_index: usize,
    entries: HashMap<String, Collection>,
}

impl EventStore {
    /// Creates an empty store for the given event index.
    pub fn new(event_index: usize) -> Self {
        Self {
            event_index,
            entries: HashMap::new(),
        }
    }

    /// Index of the event this store belongs to.
    pub fn event_index(&self) -> usize {
        self.event_index
    }

    /// Records a collection under a key that has not been written yet.
    pub fn record(&mut self, key: impl Into<String>, collection: Collection) -> Result<(), StoreError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                key,
                event: self.event_index,
            });
        }
        self.entries.insert(key, collection);
        Ok(())
    }

    /// Returns the collection stored under a key.
    pub fn get(&self, key: &str) -> Result<&Collection, StoreError> {
        self.entries.get(key).ok_or_else(|| StoreError::MissingKey {
            key: key.to_string(),
            event: self.event_index,
        })
    }

    /// Returns true if the key was recorded.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Recorded keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of recorded keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    typed_accessor!(
        /// Event headers stored under `key`.
        events, Events, EventInfo
    );
    typed_accessor!(
        /// Hits stored under `key`.
        hits, Hits, Hit
    );
    typed_accessor!(
        /// Seeds stored under `key`.
        seeds, Seeds, Seed
    );
    typed_accessor!(
        /// Cells stored under `key`.
        cells, Cells, Cell
    );
    typed_accessor!(
        /// Clusters stored under `key`.
        clusters, Clusters, Cluster
    );
    typed_accessor!(
        /// Ring sets stored under `key`.
        rings, Rings, RingSet
    );
    typed_accessor!(
        /// Electron candidates stored under `key`.
        electrons, Electrons, ElectronCandidate
    );

    /// Header of the event, taken from the first entry under `key`.
    pub fn event_info(&self, key: &str) -> Result<EventInfo, StoreError> {
        self.events(key)?
            .first()
            .copied()
            .ok_or_else(|| StoreError::MissingKey {
                key: key.to_string(),
                event: self.event_index,
            })
    }

    fn wrong_kind(&self, key: &str, expected: KeyKind, found: KeyKind) -> StoreError {
        StoreError::WrongKind {
            key: key.to_string(),
            event: self.event_index,
            expected,
            found,
        }
    }
}
