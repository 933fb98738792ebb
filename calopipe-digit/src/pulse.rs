//! Sampled analog pulse synthesis.
#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::shape::{PulseShape, ShaperSource};

/// Bunch-crossing spacing (ns).
pub const BUNCH_SPACING_NS: f64 = 25.0;

/// Pulse generation parameters of one sampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PulseConfig {
    /// Samples recorded per cell.
    pub n_samples: usize,
    /// Shape template.
    pub shaper: ShaperSource,
    /// Constant baseline added to every sample.
    pub pedestal: f64,
    /// Mean of the per-sample relative shape deformation.
    pub deformation_mean: f64,
    /// Standard deviation of the per-sample relative shape deformation.
    pub deformation_std: f64,
    /// Mean of the additive electronic noise (MeV).
    pub noise_mean: f64,
    /// Standard deviation of the additive electronic noise (MeV).
    pub noise_std: f64,
    /// Time between samples (ns).
    pub sampling_rate: f64,
    /// Bunch crossing of the first sample relative to the triggered one.
    pub start_sampling_bc: i32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            n_samples: 5,
            shaper: ShaperSource::default(),
            pedestal: 0.0,
            deformation_mean: 0.0,
            deformation_std: 0.0,
            noise_mean: 0.0,
            noise_std: 0.0,
            sampling_rate: BUNCH_SPACING_NS,
            start_sampling_bc: -2,
        }
    }
}

impl PulseConfig {
    /// Sets the number of samples.
    #[must_use]
    pub fn with_samples(mut self, n_samples: usize, start_sampling_bc: i32) -> Self {
        self.n_samples = n_samples;
        self.start_sampling_bc = start_sampling_bc;
        self
    }

    /// Sets the additive noise.
    #[must_use]
    pub fn with_noise(mut self, mean: f64, std: f64) -> Self {
        self.noise_mean = mean;
        self.noise_std = std;
        self
    }

    /// Sets the shape deformation.
    #[must_use]
    pub fn with_deformation(mut self, mean: f64, std: f64) -> Self {
        self.deformation_mean = mean;
        self.deformation_std = std;
        self
    }

    /// Sets the pedestal.
    #[must_use]
    pub fn with_pedestal(mut self, pedestal: f64) -> Self {
        self.pedestal = pedestal;
        self
    }

    /// Sets the shape template.
    #[must_use]
    pub fn with_shaper(mut self, shaper: ShaperSource) -> Self {
        self.shaper = shaper;
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(Error::config("n_samples", "must be at least one"));
        }
        if !(self.sampling_rate > 0.0) {
            return Err(Error::config("sampling_rate", "must be positive"));
        }
        for (what, std) in [
            ("noise_std", self.noise_std),
            ("deformation_std", self.deformation_std),
        ] {
            if !(std >= 0.0 && std.is_finite()) {
                return Err(Error::config(what, format!("{std} is not a valid deviation")));
            }
        }
        Ok(())
    }
}

/// Synthesizes the samples of one cell.
#[derive(Clone, Debug)]
pub struct PulseGenerator {
    config: PulseConfig,
    shape: Arc<PulseShape>,
}

impl PulseGenerator {
    /// Creates a generator, loading the configured shape.
    pub fn new(config: PulseConfig) -> Result<Self> {
        let shape = Arc::new(config.shaper.load()?);
        Self::with_shape(config, shape)
    }

    /// Creates a generator around an already loaded shape.
    pub fn with_shape(config: PulseConfig, shape: Arc<PulseShape>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, shape })
    }

    /// Generation parameters.
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Shape template.
    pub fn shape(&self) -> &Arc<PulseShape> {
        &self.shape
    }

    /// Number of samples per cell.
    pub fn n_samples(&self) -> usize {
        self.config.n_samples
    }

    /// Time of sample `k` relative to the triggered bunch crossing (ns).
    pub fn sample_time(&self, k: usize) -> f64 {
        (f64::from(self.config.start_sampling_bc) + k as f64) * self.config.sampling_rate
    }

    /// Noise-free unit-energy samples of a deposit in bunch crossing `bc`.
    pub fn template(&self, bc: i32) -> Vec<f64> {
        let shift = f64::from(bc) * BUNCH_SPACING_NS;
        (0..self.config.n_samples)
            .map(|k| self.shape.value(self.sample_time(k) - shift))
            .collect()
    }

    /// Time derivative of the in-time unit-energy samples.
    pub fn template_derivative(&self) -> Vec<f64> {
        (0..self.config.n_samples)
            .map(|k| self.shape.derivative(self.sample_time(k)))
            .collect()
    }

    /// Samples for a list of `(bunch crossing, energy)` deposits.
    ///
    /// `noise_std` replaces the configured noise deviation, so callers can
    /// apply conditions-dependent noise.
    pub fn generate<R: Rng + ?Sized>(&self, deposits: &[(i32, f64)], noise_std: f64, rng: &mut R) -> Vec<f64> {
        let cfg = &self.config;
        let deformation = gaussian(cfg.deformation_mean, cfg.deformation_std);
        let noise = gaussian(cfg.noise_mean, noise_std);

        (0..cfg.n_samples)
            .map(|k| {
                let t = self.sample_time(k);
                let signal: f64 = deposits
                    .iter()
                    .map(|&(bc, energy)| energy * self.shape.value(t - f64::from(bc) * BUNCH_SPACING_NS))
                    .sum();
                let scale = 1.0 + deformation.map_or(cfg.deformation_mean, |d| d.sample(rng));
                let offset = noise.map_or(cfg.noise_mean, |n| n.sample(rng));
                cfg.pedestal + signal * scale + offset
            })
            .collect()
    }
}

/// Adds gaussian noise to every sample.
pub fn add_gaussian_noise<R: Rng + ?Sized>(samples: &mut [f64], mean: f64, std: f64, rng: &mut R) {
    match gaussian(mean, std) {
        Some(dist) => samples.iter_mut().for_each(|s| *s += dist.sample(rng)),
        None => samples.iter_mut().for_each(|s| *s += mean),
    }
}

/// Normal distribution, `None` for a degenerate (zero or invalid) deviation.
fn gaussian(mean: f64, std: f64) -> Option<Normal<f64>> {
    if std > 0.0 {
        Normal::new(mean, std).ok()
    } else {
        None
    }
}
