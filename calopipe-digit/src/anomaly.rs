//! Defect injection on digitized cells.

use std::sync::Arc;

use calopipe_core::Cell;
use rand::Rng;
use tracing::trace;

use crate::defects::{Defect, DefectIndex};
use crate::pulse::add_gaussian_noise;

/// Applies the defect table to the cells of one sampling.
///
/// Dead cells lose their samples and deposited energy. Noisy cells receive
/// additional gaussian noise with deviation `factor * noise_std`.
#[derive(Clone, Debug)]
pub struct AnomalyGenerator {
    index: Arc<DefectIndex>,
    noise_mean: f64,
    noise_std: f64,
}

impl AnomalyGenerator {
    /// Creates a generator sharing a defect index, with the sampling's
    /// nominal noise parameters.
    pub fn new(index: Arc<DefectIndex>, noise_mean: f64, noise_std: f64) -> Self {
        Self {
            index,
            noise_mean,
            noise_std,
        }
    }

    /// Shared defect index.
    pub fn index(&self) -> &Arc<DefectIndex> {
        &self.index
    }

    /// Perturbs a digitized cell. Returns the applied defect, if any.
    pub fn apply<R: Rng + ?Sized>(&self, event_number: u64, cell: &mut Cell, rng: &mut R) -> Option<Defect> {
        let defect = self.index.lookup(event_number, cell.hash())?;
        match defect {
            Defect::Dead => {
                cell.pulse.iter_mut().for_each(|s| *s = 0.0);
                cell.truth_energy = 0.0;
                cell.energy = 0.0;
            }
            Defect::Noisy { factor } => {
                add_gaussian_noise(&mut cell.pulse, self.noise_mean, factor * self.noise_std, rng);
            }
        }
        trace!(event = event_number, cell = cell.hash(), ?defect, "Perturbed cell");
        cell.anomalous = true;
        Some(defect)
    }
}
