//! Seeded window clustering.
//!
//! Each seed opens a rectangle reaching `eta_window` and `phi_window` to
//! either side of it (half-widths). The hottest
//! second-layer cell inside it must exceed `min_center_energy`, otherwise
//! the seed yields no cluster. Every cell in the rectangle joins the cluster;
//! clusters of nearby seeds may share cells.

use calopipe_core::{delta_phi, Cell, Cluster, ClusterCell, Layer, Seed};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::shapes::{forward_moments, shower_shapes};

/// Cluster maker configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// Half-width of the window in eta.
    pub eta_window: f64,
    /// Half-width of the window in phi (rad).
    pub phi_window: f64,
    /// Minimum energy of the centre cell (MeV).
    pub min_center_energy: f64,
    /// Whether to compute forward moments.
    pub do_forward_moments: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            eta_window: 0.2,
            phi_window: 0.2,
            min_center_energy: 1000.0,
            do_forward_moments: false,
        }
    }
}

impl ClusterConfig {
    /// Sets both window half-widths.
    #[must_use]
    pub fn with_window(mut self, eta_window: f64, phi_window: f64) -> Self {
        self.eta_window = eta_window;
        self.phi_window = phi_window;
        self
    }

    /// Sets the centre-cell threshold.
    #[must_use]
    pub fn with_min_center_energy(mut self, energy: f64) -> Self {
        self.min_center_energy = energy;
        self
    }

    /// Enables forward moments.
    #[must_use]
    pub fn with_forward_moments(mut self, enabled: bool) -> Self {
        self.do_forward_moments = enabled;
        self
    }

    /// Checks window sizes.
    pub fn validate(&self) -> Result<()> {
        for (what, width) in [("eta_window", self.eta_window), ("phi_window", self.phi_window)] {
            if !(width > 0.0 && width.is_finite()) {
                return Err(Error::config(what, format!("{width} must be > 0")));
            }
        }
        if self.min_center_energy.is_nan() {
            return Err(Error::config("min_center_energy", "must be a number"));
        }
        Ok(())
    }
}

/// Builds at most one cluster per seed.
#[derive(Clone, Debug)]
pub struct ClusterMaker {
    config: ClusterConfig,
}

impl ClusterMaker {
    /// Create with a validated configuration.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Clusters `cells` around every seed, in seed order.
    pub fn build(&self, cells: &[Cell], seeds: &[Seed]) -> Vec<Cluster> {
        let clusters: Vec<Cluster> = seeds
            .iter()
            .filter_map(|seed| self.build_one(cells, seed))
            .collect();
        debug!(
            seeds = seeds.len(),
            clusters = clusters.len(),
            "Built clusters"
        );
        clusters
    }

    /// Clusters the cells around one seed.
    pub fn build_one(&self, cells: &[Cell], seed: &Seed) -> Option<Cluster> {
        let members: Vec<&Cell> = cells
            .iter()
            .filter(|c| self.in_window(seed, c))
            .collect();

        let center = members
            .iter()
            .copied()
            .filter(|c| c.id.sampling.layer() == Layer::Em2)
            .max_by(|a, b| a.energy.total_cmp(&b.energy))?;
        if center.energy <= self.config.min_center_energy {
            trace!(
                seed = seed.id,
                energy = center.energy,
                "Seed below centre threshold"
            );
            return None;
        }

        let mut cluster = Cluster::new(seed.id, seed.eta, seed.phi);
        cluster.center = Some(center.id);
        cluster.energy = members.iter().map(|c| c.energy).sum();
        let (eta, phi) = centroid(&members, seed);
        cluster.eta = eta;
        cluster.phi = phi;
        cluster.et = cluster.energy / eta.cosh();
        cluster.shapes = shower_shapes(&members, center, cluster.et, eta);
        if self.config.do_forward_moments {
            cluster.forward = Some(forward_moments(&members, cluster.energy));
        }
        for cell in members {
            cluster.push(ClusterCell::from(cell));
        }
        Some(cluster)
    }

    fn in_window(&self, seed: &Seed, cell: &Cell) -> bool {
        (cell.geometry.eta - seed.eta).abs() <= self.config.eta_window
            && delta_phi(cell.geometry.phi, seed.phi).abs() <= self.config.phi_window
    }
}

/// Energy-weighted position over positive-energy cells, phi taken relative to
/// the seed. Falls back to the seed position when no cell carries energy.
fn centroid(cells: &[&Cell], seed: &Seed) -> (f64, f64) {
    let mut sum = 0.0;
    let mut eta = 0.0;
    let mut dphi = 0.0;
    for cell in cells.iter().filter(|c| c.energy > 0.0) {
        sum += cell.energy;
        eta += cell.energy * cell.geometry.eta;
        dphi += cell.energy * delta_phi(cell.geometry.phi, seed.phi);
    }
    if sum <= 0.0 {
        return (seed.eta, seed.phi);
    }
    (eta / sum, delta_phi(seed.phi + dphi / sum, 0.0))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_abs_diff_eq;
    use calopipe_core::{CaloSampling, CellGeometry, CellId};
    use std::f64::consts::PI;

    fn cell(sampling: CaloSampling, eta_bin: u32, phi_bin: u32, energy: f64) -> Cell {
        let deta = 0.025;
        let dphi = PI / 128.0;
        let mut c = Cell::new(
            CellId::new(sampling, 0, eta_bin, phi_bin),
            CellGeometry {
                eta: (f64::from(eta_bin) + 0.5) * deta,
                phi: (f64::from(phi_bin) + 0.5) * dphi,
                deta,
                dphi,
                radius: 1700.0,
                z: 0.0,
            },
        );
        c.energy = energy;
        c
    }

    fn grid() -> Vec<Cell> {
        let mut cells = Vec::new();
        for e in 0..20 {
            for p in 0..20 {
                let energy = match (e, p) {
                    (10, 10) => 20_000.0,
                    (9 | 11, 10) | (10, 9 | 11) => 2_000.0,
                    _ => 10.0,
                };
                cells.push(cell(CaloSampling::EMB2, e, p, energy));
            }
        }
        cells.push(cell(CaloSampling::EMB1, 10, 10, 5_000.0));
        cells.push(cell(CaloSampling::TileCal1, 10, 10, 300.0));
        cells
    }

    fn seed_at(cells: &[Cell]) -> Seed {
        let hot = &cells[10 * 20 + 10];
        Seed::new(3, hot.geometry.eta, hot.geometry.phi)
    }

    #[test]
    fn test_cluster_around_seed() {
        let cells = grid();
        let maker = ClusterMaker::new(ClusterConfig::default().with_window(0.05, 0.05)).unwrap();
        let clusters = maker.build(&cells, &[seed_at(&cells)]);
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.seed_id, 3);
        assert_eq!(c.center, Some(cells[10 * 20 + 10].id));
        assert_abs_diff_eq!(c.eta, cells[10 * 20 + 10].geometry.eta, epsilon = 1e-3);
        let expected: f64 = c.cells.iter().map(|m| m.energy).sum();
        assert_abs_diff_eq!(c.energy, expected, epsilon = 1e-9);
        assert!(c.energy > 33_000.0);
        assert!(c.shapes.reta > 0.9 && c.shapes.reta <= 1.0);
        assert!(c.shapes.rhad > 0.0);
        assert!(c.forward.is_none());
    }

    #[test]
    fn test_below_threshold_seed_gives_nothing() {
        let cells = grid();
        let maker =
            ClusterMaker::new(ClusterConfig::default().with_min_center_energy(25_000.0)).unwrap();
        assert!(maker.build(&cells, &[seed_at(&cells)]).is_empty());

        let far = Seed::new(0, 2.0, -1.0);
        assert!(ClusterMaker::new(ClusterConfig::default())
            .unwrap()
            .build(&cells, &[far])
            .is_empty());
    }

    #[test]
    fn test_idempotent() {
        let cells = grid();
        let maker = ClusterMaker::new(ClusterConfig::default().with_forward_moments(true)).unwrap();
        let seeds = [seed_at(&cells), seed_at(&cells)];
        let first = maker.build(&cells, &seeds);
        let second = maker.build(&cells, &seeds);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0].forward.is_some());
    }

    #[test]
    fn test_window_wraps_in_phi() {
        let mut cells = vec![cell(CaloSampling::EMB2, 4, 0, 5_000.0)];
        let mut wrapped = cell(CaloSampling::EMB2, 4, 255, 1_000.0);
        wrapped.geometry.phi -= 2.0 * PI;
        cells.push(wrapped);
        let seed = Seed::new(0, cells[0].geometry.eta, 0.0);
        let maker = ClusterMaker::new(ClusterConfig::default().with_window(0.05, 0.02)).unwrap();
        let cluster = maker.build_one(&cells, &seed).unwrap();
        assert_eq!(cluster.len(), 2);
        assert!(cluster.phi.abs() < 0.01);
    }

    #[test]
    fn test_window_reaches_half_width_each_side() {
        let cells = grid();
        let seed = seed_at(&cells);
        // 6 bins of 0.025 away from the seed in eta
        let far = cells[16 * 20 + 10].id;
        let has_far = |window: f64| {
            let maker = ClusterMaker::new(ClusterConfig::default().with_window(window, window)).unwrap();
            let cluster = maker.build_one(&cells, &seed).unwrap();
            cluster.cells.iter().any(|m| m.id == far)
        };
        assert!(has_far(0.2));
        assert!(!has_far(0.1));

        // two cells each side in both directions
        let maker = ClusterMaker::new(ClusterConfig::default().with_window(0.06, 0.06)).unwrap();
        let cluster = maker.build_one(&cells, &seed).unwrap();
        let em2 = cluster
            .cells
            .iter()
            .filter(|m| m.id.sampling == CaloSampling::EMB2)
            .count();
        assert_eq!(em2, 5 * 5);
    }

    #[test]
    fn test_rejects_empty_window() {
        assert!(ClusterMaker::new(ClusterConfig::default().with_window(0.0, 0.1)).is_err());
    }
}
