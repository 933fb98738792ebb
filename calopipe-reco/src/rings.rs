//! Concentric ring energy sums.
//!
//! A ring layer groups samplings sharing one ring granularity. A cell lands
//! in ring `floor(max(|d_eta| / delta_eta, |d_phi| / delta_phi))` of its
//! layer, counted from the ring centre; cells past the last ring are ignored.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::f64::consts::PI;

use calopipe_core::{delta_phi, CaloSampling, Cluster, ClusterCell, RingSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Ring granularity of a group of samplings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RingLayerConfig {
    /// Samplings feeding this layer.
    pub samplings: Vec<CaloSampling>,
    /// Number of rings.
    pub n_rings: usize,
    /// Ring width in eta.
    pub delta_eta: f64,
    /// Ring width in phi (rad).
    pub delta_phi: f64,
}

impl RingLayerConfig {
    /// Creates a layer.
    pub fn new(samplings: &[CaloSampling], n_rings: usize, delta_eta: f64, delta_phi: f64) -> Self {
        Self {
            samplings: samplings.to_vec(),
            n_rings,
            delta_eta,
            delta_phi,
        }
    }

    fn ring_of(&self, cell: &ClusterCell, eta: f64, phi: f64) -> Option<usize> {
        let deta = (cell.eta - eta).abs() / self.delta_eta;
        let dphi = delta_phi(cell.phi, phi).abs() / self.delta_phi;
        let ring = deta.max(dphi).floor() as usize;
        (ring < self.n_rings).then_some(ring)
    }
}

/// Where the rings of a layer are centred.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingCenter {
    /// Cluster centroid.
    #[default]
    Centroid,
    /// Hottest cluster cell among the layer's samplings.
    HottestCell,
}

/// Rings builder configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RingsConfig {
    /// Ring layers, in output order.
    pub layers: Vec<RingLayerConfig>,
    /// Ring centring.
    pub center: RingCenter,
}

impl Default for RingsConfig {
    /// Seven layers and 100 rings: presampler, strips, middle, back and three
    /// hadronic layers.
    fn default() -> Self {
        use CaloSampling as S;
        Self {
            layers: vec![
                RingLayerConfig::new(&[S::PSB, S::PSE], 8, 0.025, PI / 32.0),
                RingLayerConfig::new(&[S::EMB1, S::EMEC1], 64, 0.003_125, PI / 32.0),
                RingLayerConfig::new(&[S::EMB2, S::EMEC2], 8, 0.025, PI / 128.0),
                RingLayerConfig::new(&[S::EMB3, S::EMEC3], 8, 0.05, PI / 128.0),
                RingLayerConfig::new(&[S::TileCal1, S::TileExt1, S::HEC1], 4, 0.1, PI / 32.0),
                RingLayerConfig::new(&[S::TileCal2, S::TileExt2, S::HEC2], 4, 0.1, PI / 32.0),
                RingLayerConfig::new(&[S::TileCal3, S::TileExt3, S::HEC3], 4, 0.2, PI / 32.0),
            ],
            center: RingCenter::Centroid,
        }
    }
}

impl RingsConfig {
    /// Sets the ring centring.
    #[must_use]
    pub fn with_center(mut self, center: RingCenter) -> Self {
        self.center = center;
        self
    }

    /// Replaces the ring layers.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<RingLayerConfig>) -> Self {
        self.layers = layers;
        self
    }

    /// Checks ring counts and widths.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::config("ring layers", "at least one layer is required"));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.n_rings == 0 || layer.samplings.is_empty() {
                return Err(Error::config(
                    "ring layer",
                    format!("layer {i} needs rings and samplings"),
                ));
            }
            if !(layer.delta_eta > 0.0 && layer.delta_phi > 0.0) {
                return Err(Error::config(
                    "ring layer",
                    format!("layer {i} ring widths must be > 0"),
                ));
            }
        }
        Ok(())
    }

    /// Total number of rings per cluster.
    pub fn n_rings(&self) -> usize {
        self.layers.iter().map(|l| l.n_rings).sum()
    }
}

/// Builds one ring set per cluster.
#[derive(Clone, Debug)]
pub struct RingsBuilder {
    config: RingsConfig,
}

impl RingsBuilder {
    /// Create with a validated configuration.
    pub fn new(config: RingsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &RingsConfig {
        &self.config
    }

    /// Ring sets of every cluster, index-aligned with `clusters`.
    pub fn build(&self, clusters: &[Cluster]) -> Vec<RingSet> {
        let rings: Vec<RingSet> = clusters
            .iter()
            .enumerate()
            .map(|(i, c)| self.build_one(i, c))
            .collect();
        debug!(clusters = clusters.len(), rings = self.config.n_rings(), "Built ring sets");
        rings
    }

    /// Ring set of one cluster.
    pub fn build_one(&self, cluster_index: usize, cluster: &Cluster) -> RingSet {
        let mut set = RingSet {
            cluster_index,
            rings: Vec::with_capacity(self.config.n_rings()),
            layout: Vec::with_capacity(self.config.layers.len()),
        };
        for layer in &self.config.layers {
            let members: Vec<&ClusterCell> = cluster
                .iter()
                .filter(|c| layer.samplings.contains(&c.id.sampling))
                .collect();
            let (eta, phi) = match self.config.center {
                RingCenter::Centroid => (cluster.eta, cluster.phi),
                RingCenter::HottestCell => members
                    .iter()
                    .max_by(|a, b| a.energy.total_cmp(&b.energy))
                    .map_or((cluster.eta, cluster.phi), |c| (c.eta, c.phi)),
            };

            let mut sums = vec![0.0; layer.n_rings];
            for cell in members {
                if let Some(ring) = layer.ring_of(cell, eta, phi) {
                    sums[ring] += cell.energy;
                }
            }
            set.rings.extend(sums);
            set.layout.push(layer.n_rings);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_abs_diff_eq;
    use calopipe_core::CellId;

    fn member(sampling: CaloSampling, eta: f64, phi: f64, energy: f64) -> ClusterCell {
        ClusterCell {
            id: CellId::new(sampling, 0, 0, 0),
            eta,
            phi,
            energy,
            position: [0.0; 3],
        }
    }

    fn cluster() -> Cluster {
        let mut c = Cluster::new(0, 0.0, 0.0);
        c.push(member(CaloSampling::EMB2, 0.01, 0.0, 1000.0));
        c.push(member(CaloSampling::EMB2, 0.04, 0.0, 200.0));
        c.push(member(CaloSampling::EMB2, 0.0, -0.03, 100.0));
        c.push(member(CaloSampling::EMB2, 0.5, 0.0, 999.0));
        c.push(member(CaloSampling::TileCal1, 0.05, 0.0, 40.0));
        c
    }

    #[test]
    fn test_default_layout_has_hundred_rings() {
        let builder = RingsBuilder::new(RingsConfig::default()).unwrap();
        let set = builder.build_one(4, &cluster());
        assert_eq!(set.len(), 100);
        assert_eq!(set.layout, vec![8, 64, 8, 8, 4, 4, 4]);
        assert_eq!(set.cluster_index, 4);
    }

    #[test]
    fn test_ring_sums_around_centroid() {
        let builder = RingsBuilder::new(RingsConfig::default()).unwrap();
        let set = builder.build_one(0, &cluster());
        let middle = set.layer(2).unwrap();
        assert_abs_diff_eq!(middle[0], 1000.0);
        // |d_phi| = 0.03 also falls in ring 1 with pi/128 width
        assert_abs_diff_eq!(middle[1], 300.0);
        assert_abs_diff_eq!(middle.iter().sum::<f64>(), 1300.0);
        assert_abs_diff_eq!(set.layer(4).unwrap()[0], 40.0);
        assert_abs_diff_eq!(set.total(), 1340.0);
    }

    #[test]
    fn test_hottest_cell_centring() {
        let builder =
            RingsBuilder::new(RingsConfig::default().with_center(RingCenter::HottestCell)).unwrap();
        let mut c = cluster();
        c.eta = 0.2;
        let set = builder.build_one(0, &c);
        assert_abs_diff_eq!(set.layer(2).unwrap()[0], 1000.0);
        assert_abs_diff_eq!(set.layer(4).unwrap()[0], 40.0);
    }

    #[test]
    fn test_rejects_zero_width() {
        let layers = vec![RingLayerConfig::new(&[CaloSampling::EMB2], 4, 0.0, 0.1)];
        assert!(RingsBuilder::new(RingsConfig::default().with_layers(layers)).is_err());
    }
}
