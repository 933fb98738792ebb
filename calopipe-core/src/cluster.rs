//! Calorimeter clusters and their shower-shape variables.

use crate::cell::{Cell, CellId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lightweight copy of a cell kept inside a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterCell {
    /// Channel identity.
    pub id: CellId,
    /// Centre pseudorapidity.
    pub eta: f64,
    /// Centre azimuth.
    pub phi: f64,
    /// Reconstructed energy.
    pub energy: f64,
    /// Cartesian centre position (mm).
    pub position: [f64; 3],
}

impl From<&Cell> for ClusterCell {
    fn from(cell: &Cell) -> Self {
        Self {
            id: cell.id,
            eta: cell.geometry.eta,
            phi: cell.geometry.phi,
            energy: cell.energy,
            position: cell.geometry.position(),
        }
    }
}

/// Standard electromagnetic shower shapes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShowerShapes {
    /// Second-layer energy in a 3x3 window around the hottest cell.
    pub e233: f64,
    /// Second-layer energy in a 3x7 window.
    pub e237: f64,
    /// Second-layer energy in a 7x7 window.
    pub e277: f64,
    /// `e237 / e277`.
    pub reta: f64,
    /// `e233 / e237`.
    pub rphi: f64,
    /// Energy-weighted eta width in the second layer (3x5 window).
    pub weta2: f64,
    /// Relative difference of the two leading strip maxima.
    pub eratio: f64,
    /// Hottest strip-layer energy.
    pub emaxs1: f64,
    /// Presampler energy fraction.
    pub f0: f64,
    /// First-layer energy fraction.
    pub f1: f64,
    /// Second-layer energy fraction.
    pub f2: f64,
    /// Third-layer energy fraction.
    pub f3: f64,
    /// Hadronic leakage: hadronic transverse energy over cluster transverse energy.
    pub rhad: f64,
    /// Energy in the electromagnetic samplings.
    pub em_energy: f64,
    /// Energy in the hadronic samplings.
    pub had_energy: f64,
}

/// Moments suited to forward geometry, computed along the shower axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForwardMoments {
    /// Energy-weighted mean squared distance to the shower axis (mm^2).
    pub second_r: f64,
    /// Energy-weighted mean squared depth around the centre (mm^2).
    pub second_lambda: f64,
    /// Depth of the shower centre along the axis (mm).
    pub lambda_center: f64,
    /// Hottest cell energy over cluster energy.
    pub frac_max: f64,
    /// Normalized lateral moment.
    pub lateral_mom: f64,
    /// Normalized longitudinal moment.
    pub longitudinal_mom: f64,
}

/// Cells aggregated around one seed.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Identifier of the seed that produced the cluster.
    pub seed_id: usize,
    /// Seed pseudorapidity.
    pub seed_eta: f64,
    /// Seed azimuth.
    pub seed_phi: f64,
    /// Energy-weighted centroid pseudorapidity.
    pub eta: f64,
    /// Energy-weighted centroid azimuth.
    pub phi: f64,
    /// Summed energy.
    pub energy: f64,
    /// Transverse energy.
    pub et: f64,
    /// Hottest second-layer cell the window was centred on.
    pub center: Option<CellId>,
    /// Shape moments.
    pub shapes: ShowerShapes,
    /// Forward moments, present when requested.
    pub forward: Option<ForwardMoments>,
    /// Member cells.
    pub cells: Vec<ClusterCell>,
}

impl Cluster {
    /// Creates an empty cluster for a seed.
    pub fn new(seed_id: usize, seed_eta: f64, seed_phi: f64) -> Self {
        Self {
            seed_id,
            seed_eta,
            seed_phi,
            ..Self::default()
        }
    }

    /// Adds a cell to the cluster.
    pub fn push(&mut self, cell: ClusterCell) {
        self.cells.push(cell);
    }

    /// Returns the number of cells in the cluster.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the cluster has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns an iterator over the member cells.
    pub fn iter(&self) -> impl Iterator<Item = &ClusterCell> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellGeometry;
    use crate::sampling::CaloSampling;

    #[test]
    fn test_cluster_operations() {
        let mut cluster = Cluster::new(7, 0.1, 0.2);
        assert!(cluster.is_empty());

        let mut cell = Cell::new(
            CellId::new(CaloSampling::EMB2, 0, 4, 5),
            CellGeometry {
                eta: 0.1,
                phi: 0.2,
                radius: 1600.0,
                ..CellGeometry::default()
            },
        );
        cell.energy = 12.5;
        cluster.push(ClusterCell::from(&cell));

        assert_eq!(cluster.len(), 1);
        assert_eq!(cluster.seed_id, 7);
        assert_eq!(cluster.iter().next().map(|c| c.id.eta_bin), Some(4));
    }
}
