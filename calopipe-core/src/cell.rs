//! Calorimeter cells: one readout channel for one event.

use std::f64::consts::PI;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sampling::CaloSampling;

/// Multiplier separating the module index from the bin part of a cell hash.
pub const MODULE_STRIDE: u64 = 10_000_000;

/// Multiplier separating the eta bin from the phi bin inside a cell hash.
const ETA_STRIDE: u64 = 1_000;

/// Identity of a readout channel.
///
/// `module` is the index of the sampling volume inside the detector layout,
/// so two volumes sharing a [`CaloSampling`] (for instance both endcap
/// sides) still produce distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellId {
    /// Sampling layer.
    pub sampling: CaloSampling,
    /// Index of the owning sampling volume.
    pub module: u32,
    /// Eta bin index inside the volume lattice.
    pub eta_bin: u32,
    /// Phi bin index inside the volume lattice.
    pub phi_bin: u32,
}

impl CellId {
    /// Creates a new cell identity.
    #[inline]
    pub fn new(sampling: CaloSampling, module: u32, eta_bin: u32, phi_bin: u32) -> Self {
        Self {
            sampling,
            module,
            eta_bin,
            phi_bin,
        }
    }

    /// Numeric hash: `module * 10^7 + eta_bin * 10^3 + phi_bin`.
    #[inline]
    pub fn hash(&self) -> u64 {
        u64::from(self.module) * MODULE_STRIDE
            + u64::from(self.eta_bin) * ETA_STRIDE
            + u64::from(self.phi_bin)
    }

    /// Module index encoded in a cell hash.
    #[inline]
    pub fn module_of(hash: u64) -> u64 {
        hash / MODULE_STRIDE
    }
}

/// Geometric description of a cell centre.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellGeometry {
    /// Centre pseudorapidity.
    pub eta: f64,
    /// Centre azimuth.
    pub phi: f64,
    /// Width in eta.
    pub deta: f64,
    /// Width in phi.
    pub dphi: f64,
    /// Transverse radius of the centre (mm).
    pub radius: f64,
    /// Longitudinal position of the centre (mm).
    pub z: f64,
}

impl CellGeometry {
    /// Cartesian position of the cell centre.
    pub fn position(&self) -> [f64; 3] {
        [
            self.radius * self.phi.cos(),
            self.radius * self.phi.sin(),
            self.z,
        ]
    }
}

/// Reconstructed state of one cell for one event.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    /// Channel identity.
    pub id: CellId,
    /// Centre position and size.
    pub geometry: CellGeometry,
    /// Reconstructed energy (MeV).
    pub energy: f64,
    /// Reconstructed time (ns).
    pub time: f64,
    /// In-time deposited energy from simulation (MeV).
    pub truth_energy: f64,
    /// Digitized samples.
    pub pulse: Vec<f64>,
    /// Set when a defect rule touched this cell.
    pub anomalous: bool,
    /// Collection key the cell came from, filled by the merge step.
    pub source: Option<Arc<str>>,
}

impl Cell {
    /// Creates an empty cell.
    pub fn new(id: CellId, geometry: CellGeometry) -> Self {
        Self {
            id,
            geometry,
            energy: 0.0,
            time: 0.0,
            truth_energy: 0.0,
            pulse: Vec::new(),
            anomalous: false,
            source: None,
        }
    }

    /// Transverse energy of the reconstructed signal.
    #[inline]
    pub fn et(&self) -> f64 {
        self.energy / self.geometry.eta.cosh()
    }

    /// Numeric hash of the cell identity.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.id.hash()
    }
}

/// Azimuthal difference `a - b` wrapped into `(-pi, pi]`.
#[inline]
pub fn delta_phi(a: f64, b: f64) -> f64 {
    let mut d = a - b;
    while d > PI {
        d -= 2.0 * PI;
    }
    while d <= -PI {
        d += 2.0 * PI;
    }
    d
}
