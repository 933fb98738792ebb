//! Consolidation of per-sampling cell collections.

use std::collections::HashSet;
use std::sync::Arc;

use calopipe_core::Cell;
use tracing::debug;

use crate::error::{Error, Result};

/// Output of [`CellMerge::merge`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergedCells {
    /// Reconstructed cells.
    pub cells: Vec<Cell>,
    /// The same cells carrying the in-time deposited energy.
    pub truth: Vec<Cell>,
}

/// Merges several cell collections, tagging each cell with its source key.
#[derive(Clone, Debug)]
pub struct CellMerge {
    keys: Vec<Arc<str>>,
}

impl CellMerge {
    /// Creates a merge over distinct input keys.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if !seen.insert(key.to_string()) {
                return Err(Error::config("merge inputs", format!("key '{key}' listed twice")));
            }
            out.push(Arc::from(key));
        }
        Ok(Self { keys: out })
    }

    /// Input keys, in merge order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| &**k)
    }

    /// Reads every input through `fetch` and concatenates them in key order.
    pub fn merge<'a, F>(&self, mut fetch: F) -> Result<MergedCells>
    where
        F: FnMut(&str) -> Result<&'a [Cell]>,
    {
        let mut merged = MergedCells::default();
        for key in &self.keys {
            let input = fetch(&**key)?;
            merged.cells.reserve(input.len());
            merged.truth.reserve(input.len());
            for cell in input {
                let mut reco = cell.clone();
                reco.source = Some(Arc::clone(key));

                let mut truth = reco.clone();
                truth.energy = cell.truth_energy;
                truth.time = 0.0;
                truth.pulse = Vec::new();

                merged.cells.push(reco);
                merged.truth.push(truth);
            }
        }
        debug!(
            inputs = self.keys.len(),
            cells = merged.cells.len(),
            "Merged cell collections"
        );
        Ok(merged)
    }
}
