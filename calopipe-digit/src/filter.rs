//! Energy and time estimation from digitized samples.

use serde::{Deserialize, Serialize};

use crate::cof::ConstrainedOptimalFilter;
use crate::error::{Error, Result};
use crate::pulse::PulseGenerator;

/// Reconstructed energy and time of one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Estimate {
    /// Energy (MeV).
    pub energy: f64,
    /// Time relative to the triggered bunch crossing (ns).
    pub time: f64,
}

/// Linear optimal filter with fixed weights.
///
/// `energy = a . (s - pedestal)` and `time = (b . (s - pedestal)) / energy`.
/// The pedestal is zero unless set; explicit weights are applied to the raw
/// samples.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimalFilter {
    weights_energy: Vec<f64>,
    weights_time: Vec<f64>,
    pedestal: f64,
}

impl OptimalFilter {
    /// Creates a filter from explicit weights.
    pub fn new(weights_energy: Vec<f64>, weights_time: Vec<f64>) -> Result<Self> {
        if weights_energy.is_empty() {
            return Err(Error::config("weights_energy", "no weights given"));
        }
        if weights_time.len() != weights_energy.len() {
            return Err(Error::WeightLength {
                which: "time",
                weights: weights_time.len(),
                samples: weights_energy.len(),
            });
        }
        Ok(Self {
            weights_energy,
            weights_time,
            pedestal: 0.0,
        })
    }

    /// Derives white-noise OF2 weights from the generator's in-time template.
    pub fn from_generator(generator: &PulseGenerator) -> Result<Self> {
        let (a, b) = of2_weights(&generator.template(0), &generator.template_derivative())?;
        Ok(Self::new(a, b)?.with_pedestal(generator.config().pedestal))
    }

    /// Sets the baseline subtracted before filtering.
    #[must_use]
    pub fn with_pedestal(mut self, pedestal: f64) -> Self {
        self.pedestal = pedestal;
        self
    }

    /// Energy weights.
    pub fn weights_energy(&self) -> &[f64] {
        &self.weights_energy
    }

    /// Time weights.
    pub fn weights_time(&self) -> &[f64] {
        &self.weights_time
    }

    /// Number of samples the weights expect.
    pub fn n_samples(&self) -> usize {
        self.weights_energy.len()
    }

    /// Estimates energy and time. A zero energy yields a zero time.
    pub fn estimate(&self, samples: &[f64]) -> Result<Estimate> {
        if samples.len() != self.weights_energy.len() {
            return Err(Error::WeightLength {
                which: "energy",
                weights: self.weights_energy.len(),
                samples: samples.len(),
            });
        }
        let (energy, energy_time) = samples
            .iter()
            .zip(self.weights_energy.iter().zip(&self.weights_time))
            .fold((0.0, 0.0), |(e, et), (&s, (&a, &b))| {
                let s = s - self.pedestal;
                (e + a * s, et + b * s)
            });
        let time = if energy == 0.0 { 0.0 } else { energy_time / energy };
        Ok(Estimate { energy, time })
    }
}

/// OF2 weights for white noise.
///
/// With `Q1 = g.g`, `Q2 = g'.g'`, `Q3 = g.g'` and `D = Q1 Q2 - Q3^2`:
/// `a = (Q2 g - Q3 g') / D`, `b = (Q3 g - Q1 g') / D`. These satisfy
/// `a.g = 1`, `a.g' = 0`, `b.g = 0` and `b.g' = -1`.
pub fn of2_weights(g: &[f64], dg: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if g.len() != dg.len() {
        return Err(Error::WeightLength {
            which: "derivative",
            weights: dg.len(),
            samples: g.len(),
        });
    }
    let dot = |x: &[f64], y: &[f64]| x.iter().zip(y).map(|(a, b)| a * b).sum::<f64>();
    let q1 = dot(g, g);
    let q2 = dot(dg, dg);
    let q3 = dot(g, dg);
    let det = q1 * q2 - q3 * q3;
    if det.abs() <= f64::EPSILON * (q1 * q2).max(f64::MIN_POSITIVE) {
        return Err(Error::InvalidShape(
            "samples do not constrain amplitude and time independently".into(),
        ));
    }
    let a = g.iter().zip(dg).map(|(x, d)| (q2 * x - q3 * d) / det).collect();
    let b = g.iter().zip(dg).map(|(x, d)| (q3 * x - q1 * d) / det).collect();
    Ok((a, b))
}

/// Estimator selection of one sampling.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum FilterConfig {
    /// Fixed weights.
    Weights {
        weights_energy: Vec<f64>,
        weights_time: Vec<f64>,
    },
    /// OF2 weights derived from the pulse shape.
    #[default]
    DerivedWeights,
    /// Constrained optimal filter.
    Constrained {
        #[serde(default)]
        threshold: f64,
    },
}

/// Per-sampling estimator, fixed at configuration time.
#[derive(Clone, Debug)]
pub enum CellEstimator {
    Optimal(OptimalFilter),
    Constrained(ConstrainedOptimalFilter),
}

impl CellEstimator {
    /// Builds the estimator described by `config` for a generator's readout.
    pub fn build(config: &FilterConfig, generator: &PulseGenerator) -> Result<Self> {
        let estimator = match config {
            FilterConfig::Weights {
                weights_energy,
                weights_time,
            } => Self::Optimal(OptimalFilter::new(
                weights_energy.clone(),
                weights_time.clone(),
            )?),
            FilterConfig::DerivedWeights => Self::Optimal(OptimalFilter::from_generator(generator)?),
            FilterConfig::Constrained { threshold } => {
                Self::Constrained(ConstrainedOptimalFilter::new(generator, *threshold)?)
            }
        };
        if estimator.n_samples() != generator.n_samples() {
            return Err(Error::WeightLength {
                which: "energy",
                weights: estimator.n_samples(),
                samples: generator.n_samples(),
            });
        }
        Ok(estimator)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Optimal(_) => "OptimalFilter",
            Self::Constrained(_) => "ConstrainedOptimalFilter",
        }
    }

    /// Number of samples the estimator expects.
    pub fn n_samples(&self) -> usize {
        match self {
            Self::Optimal(of) => of.n_samples(),
            Self::Constrained(cof) => cof.n_samples(),
        }
    }

    /// Estimates energy and time of one pulse.
    pub fn estimate(&self, samples: &[f64]) -> Result<Estimate> {
        match self {
            Self::Optimal(of) => of.estimate(samples),
            Self::Constrained(cof) => cof.estimate(samples),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::pulse::PulseConfig;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_energy_is_linear_in_samples() {
        let of = OptimalFilter::new(vec![-0.2, 0.3, 0.8, 0.2, -0.1], vec![0.1, -0.4, 0.0, 0.4, -0.1]).unwrap();
        let x = [1.0, 5.0, 12.0, 7.0, 2.0];
        let y = [-3.0, 2.0, 4.0, 0.5, 1.0];
        let combo: Vec<f64> = x.iter().zip(&y).map(|(a, b)| 2.5 * a - 1.5 * b).collect();
        let ex = of.estimate(&x).unwrap().energy;
        let ey = of.estimate(&y).unwrap().energy;
        assert_abs_diff_eq!(of.estimate(&combo).unwrap().energy, 2.5 * ex - 1.5 * ey, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_pulse_has_zero_time() {
        let of = OptimalFilter::new(vec![1.0; 3], vec![1.0; 3]).unwrap();
        let est = of.estimate(&[0.0; 3]).unwrap();
        assert_eq!(est, Estimate::default());
    }

    #[test]
    fn test_weight_length_mismatch() {
        assert!(matches!(
            OptimalFilter::new(vec![1.0; 4], vec![1.0; 5]),
            Err(Error::WeightLength { which: "time", .. })
        ));
        let of = OptimalFilter::new(vec![1.0; 4], vec![1.0; 4]).unwrap();
        assert!(of.estimate(&[0.0; 5]).is_err());
    }

    #[test]
    fn test_derived_weights_recover_amplitude_and_phase() {
        let gen = PulseGenerator::new(PulseConfig::default().with_samples(7, -3)).unwrap();
        let of = OptimalFilter::from_generator(&gen).unwrap();
        let g = gen.template(0);
        let est = of.estimate(&g.iter().map(|v| 800.0 * v).collect::<Vec<_>>()).unwrap();
        assert_abs_diff_eq!(est.energy, 800.0, epsilon = 1e-6);
        assert_abs_diff_eq!(est.time, 0.0, epsilon = 1e-6);

        // a small delay shows up as a positive time
        let delayed: Vec<f64> = (0..7)
            .map(|k| 800.0 * gen.shape().value(gen.sample_time(k) - 1.0))
            .collect();
        let est = of.estimate(&delayed).unwrap();
        assert_abs_diff_eq!(est.time, 1.0, epsilon = 0.2);
    }

    #[test]
    fn test_fixed_weights_apply_to_raw_samples() {
        let gen = PulseGenerator::new(
            PulseConfig::default()
                .with_samples(5, -2)
                .with_pedestal(50.0),
        )
        .unwrap();
        let cfg = FilterConfig::Weights {
            weights_energy: vec![0.1, 0.2, 0.4, 0.2, 0.1],
            weights_time: vec![0.0; 5],
        };
        let est = CellEstimator::build(&cfg, &gen).unwrap();
        let s = [60.0, 80.0, 150.0, 90.0, 55.0];
        let doubled: Vec<f64> = s.iter().map(|v| 2.0 * v).collect();
        let e1 = est.estimate(&s).unwrap().energy;
        assert_abs_diff_eq!(e1, 105.5, epsilon = 1e-9);
        assert_abs_diff_eq!(est.estimate(&doubled).unwrap().energy, 2.0 * e1, epsilon = 1e-9);
    }

    #[test]
    fn test_builder_rejects_wrong_length() {
        let gen = PulseGenerator::new(PulseConfig::default()).unwrap();
        let cfg = FilterConfig::Weights {
            weights_energy: vec![1.0; 4],
            weights_time: vec![0.0; 4],
        };
        assert!(CellEstimator::build(&cfg, &gen).is_err());
    }
}
