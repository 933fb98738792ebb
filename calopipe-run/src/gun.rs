//! Synthetic single-electron events.
//!
//! Each event holds one electron with a flat eta/phi distribution. Its energy
//! is split over the layers with fixed fractions and spread laterally as
//! gaussian point deposits in the first volume of each layer that covers the
//! electron's eta.
#![allow(clippy::cast_precision_loss)]

use std::f64::consts::PI;
use std::sync::Arc;

use calopipe_core::{Collection, EventInfo, EventStore, Hit, Layer, Seed, StoreError};
use calopipe_digit::stream_seed;
use calopipe_geometry::DetectorLayout;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::KeyConfig;
use crate::error::{Error, Result};

/// Fraction of the electron energy and lateral spread per layer.
const PROFILE: [(Layer, f64, f64); 5] = [
    (Layer::PreSampler, 0.03, 0.02),
    (Layer::Em1, 0.30, 0.01),
    (Layer::Em2, 0.60, 0.015),
    (Layer::Em3, 0.04, 0.03),
    (Layer::Had1, 0.03, 0.05),
];

/// Particle gun settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GunConfig {
    /// Electron energy (MeV).
    pub energy: f64,
    pub eta_min: f64,
    pub eta_max: f64,
    pub phi_min: f64,
    pub phi_max: f64,
    pub run_number: u32,
    /// Seed of the generator, independent of the digitization seed.
    pub seed: u64,
    /// Point deposits per layer.
    pub hits_per_layer: usize,
    /// Copies of the shower at other bunch crossings, scaled by
    /// `pileup_fraction`.
    pub pileup_bunch_crossings: Vec<i32>,
    pub pileup_fraction: f64,
}

impl Default for GunConfig {
    fn default() -> Self {
        Self {
            energy: 50_000.0,
            eta_min: -1.2,
            eta_max: 1.2,
            phi_min: -PI,
            phi_max: PI,
            run_number: 1,
            seed: 0,
            hits_per_layer: 50,
            pileup_bunch_crossings: Vec::new(),
            pileup_fraction: 0.0,
        }
    }
}

impl GunConfig {
    /// Sets the electron energy.
    #[must_use]
    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    /// Sets the eta range.
    #[must_use]
    pub fn with_eta_range(mut self, eta_min: f64, eta_max: f64) -> Self {
        self.eta_min = eta_min;
        self.eta_max = eta_max;
        self
    }

    /// Sets the generator seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Adds out-of-time copies of the shower.
    #[must_use]
    pub fn with_pileup(mut self, bunch_crossings: Vec<i32>, fraction: f64) -> Self {
        self.pileup_bunch_crossings = bunch_crossings;
        self.pileup_fraction = fraction;
        self
    }

    /// Checks ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.energy > 0.0) {
            return Err(Error::Config(format!("gun energy {} must be > 0", self.energy)));
        }
        if !(self.eta_min < self.eta_max && self.phi_min < self.phi_max) {
            return Err(Error::Config("gun eta/phi ranges are empty".into()));
        }
        if self.hits_per_layer == 0 {
            return Err(Error::Config("gun needs at least one hit per layer".into()));
        }
        Ok(())
    }
}

/// Produces the input collections of synthetic events.
#[derive(Clone, Debug)]
pub struct ElectronGun {
    config: GunConfig,
    keys: KeyConfig,
    layout: Arc<DetectorLayout>,
}

impl ElectronGun {
    /// Create a gun writing under `keys`.
    pub fn new(config: GunConfig, keys: KeyConfig, layout: Arc<DetectorLayout>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            keys,
            layout,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &GunConfig {
        &self.config
    }

    /// Hits and true position of the electron of event `index`.
    pub fn generate(&self, index: usize) -> (Vec<Hit>, Seed) {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(stream_seed(cfg.seed, index as u64, u64::MAX));
        let eta = rng.gen_range(cfg.eta_min..cfg.eta_max);
        let phi = rng.gen_range(cfg.phi_min..cfg.phi_max);

        let mut hits = Vec::new();
        for (layer, fraction, spread) in PROFILE {
            let Some(volume) = self
                .layout
                .volumes()
                .iter()
                .find(|v| v.sampling().layer() == layer && v.contains_eta(eta))
            else {
                continue;
            };
            let Ok(lateral) = Normal::new(0.0, spread) else {
                continue;
            };
            let energy = cfg.energy * fraction / cfg.hits_per_layer as f64;
            for _ in 0..cfg.hits_per_layer {
                let hit = Hit::new(
                    volume.sampling(),
                    eta + lateral.sample(&mut rng),
                    phi + lateral.sample(&mut rng),
                    energy,
                );
                for &bc in &cfg.pileup_bunch_crossings {
                    hits.push(
                        Hit::new(hit.sampling, hit.eta, hit.phi, energy * cfg.pileup_fraction)
                            .with_bunch_crossing(bc),
                    );
                }
                hits.push(hit);
            }
        }
        for hit in &mut hits {
            hit.phi = calopipe_core::delta_phi(hit.phi, 0.0);
        }

        let mut seed = Seed::new(0, eta, phi);
        seed.et = cfg.energy / eta.cosh();
        (hits, seed)
    }

    /// Event store of event `index` holding its header, hits and seed.
    pub fn event(&self, index: usize) -> std::result::Result<EventStore, StoreError> {
        let (hits, seed) = self.generate(index);
        let mut store = EventStore::new(index);
        store.record(
            self.keys.events.clone(),
            Collection::Events(vec![EventInfo::new(self.config.run_number, index as u64)]),
        )?;
        store.record(self.keys.hits.clone(), Collection::Hits(hits))?;
        store.record(self.keys.seeds.clone(), Collection::Seeds(vec![seed]))?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_abs_diff_eq;

    fn gun(config: GunConfig) -> ElectronGun {
        let layout = Arc::new(DetectorLayout::reference_barrel().unwrap());
        ElectronGun::new(config, KeyConfig::default(), layout).unwrap()
    }

    #[test]
    fn test_energy_shared_over_layers() {
        let gun = gun(GunConfig::default().with_eta_range(-0.5, 0.5));
        let (hits, seed) = gun.generate(3);
        let total: f64 = hits.iter().map(|h| h.energy).sum();
        assert_abs_diff_eq!(total, 50_000.0, epsilon = 1e-6);
        assert!(seed.eta.abs() < 0.5);
        assert!(hits.iter().all(|h| h.bunch_crossing == 0));
    }

    #[test]
    fn test_events_are_reproducible() {
        let gun = gun(GunConfig::default().with_seed(11));
        assert_eq!(gun.generate(4), gun.generate(4));
        assert_ne!(gun.generate(4).1, gun.generate(5).1);
    }

    #[test]
    fn test_pileup_copies() {
        let gun = gun(
            GunConfig::default()
                .with_eta_range(0.1, 0.2)
                .with_pileup(vec![-1, 2], 0.5),
        );
        let (hits, _) = gun.generate(0);
        let in_time: f64 = hits.iter().filter(|h| h.bunch_crossing == 0).map(|h| h.energy).sum();
        let late: f64 = hits.iter().filter(|h| h.bunch_crossing == 2).map(|h| h.energy).sum();
        assert_abs_diff_eq!(late, 0.5 * in_time, epsilon = 1e-6);
    }

    #[test]
    fn test_store_has_inputs() {
        let gun = gun(GunConfig::default());
        let store = gun.event(2).unwrap();
        assert_eq!(store.event_info("Events").unwrap().event_number, 2);
        assert_eq!(store.seeds("Seeds").unwrap().len(), 1);
        assert!(!store.hits("Hits").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_empty_range() {
        let layout = Arc::new(DetectorLayout::reference_barrel().unwrap());
        let config = GunConfig::default().with_eta_range(1.0, 1.0);
        assert!(ElectronGun::new(config, KeyConfig::default(), layout).is_err());
    }
}
