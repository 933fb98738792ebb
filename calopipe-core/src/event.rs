//! Inputs supplied to the pipeline by upstream readers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sampling::CaloSampling;

/// Event header.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventInfo {
    /// Run number the event belongs to.
    pub run_number: u32,
    /// Event number, used to look up defect rules and to seed noise.
    pub event_number: u64,
    /// Average pile-up interactions per bunch crossing.
    pub avgmu: f64,
}

impl EventInfo {
    /// Creates a new event header.
    #[inline]
    pub fn new(run_number: u32, event_number: u64) -> Self {
        Self {
            run_number,
            event_number,
            avgmu: 0.0,
        }
    }
}

/// Energy deposit left by particle transport in one sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Sampling the deposit was recorded in.
    pub sampling: CaloSampling,
    /// Pseudorapidity of the deposit.
    pub eta: f64,
    /// Azimuth of the deposit, in [-pi, pi].
    pub phi: f64,
    /// Deposited energy (MeV).
    pub energy: f64,
    /// Bunch crossing relative to the triggered one (0 = in time).
    pub bunch_crossing: i32,
}

impl Hit {
    /// Creates an in-time hit.
    #[inline]
    pub fn new(sampling: CaloSampling, eta: f64, phi: f64, energy: f64) -> Self {
        Self {
            sampling,
            eta,
            phi,
            energy,
            bunch_crossing: 0,
        }
    }

    /// Moves the hit to another bunch crossing.
    #[must_use]
    pub fn with_bunch_crossing(mut self, bc: i32) -> Self {
        self.bunch_crossing = bc;
        self
    }
}

/// Seed position a cluster is built around.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Seed {
    /// Seed identifier, carried to the cluster.
    pub id: usize,
    /// Pseudorapidity of the seed.
    pub eta: f64,
    /// Azimuth of the seed.
    pub phi: f64,
    /// Transverse energy of the seeding particle, if known.
    pub et: f64,
}

impl Seed {
    /// Creates a new seed.
    #[inline]
    pub fn new(id: usize, eta: f64, phi: f64) -> Self {
        Self {
            id,
            eta,
            phi,
            et: 0.0,
        }
    }
}
