//! Constrained optimal filter for pile-up rich readouts.
//!
//! The samples are fitted as a superposition of pulses, one per bunch
//! crossing whose peak falls inside the readout window. Out-of-time
//! amplitudes at or below the threshold are removed and the fit repeated
//! until the set is stable. The in-time amplitude is the energy; a second
//! fit with the template derivative gives the time.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::error::{Error, Result};
use crate::filter::Estimate;
use crate::pulse::PulseGenerator;

const SVD_EPS: f64 = 1e-12;
const RELATIVE_FLOOR: f64 = 1e-9;

#[derive(Clone, Debug)]
struct Column {
    bc: i32,
    template: Vec<f64>,
}

/// Pulse-shape driven filter anchored on the first sampled bunch crossing.
#[derive(Clone, Debug)]
pub struct ConstrainedOptimalFilter {
    columns: Vec<Column>,
    derivative: Vec<f64>,
    threshold: f64,
    pedestal: f64,
    n_samples: usize,
}

impl ConstrainedOptimalFilter {
    /// Prepares the templates of a generator's readout window.
    pub fn new(generator: &PulseGenerator, threshold: f64) -> Result<Self> {
        if !(threshold >= 0.0 && threshold.is_finite()) {
            return Err(Error::config("threshold", format!("{threshold} must be >= 0")));
        }
        let n_samples = generator.n_samples();
        let start = generator.config().start_sampling_bc;
        let last = start.saturating_add(i32::try_from(n_samples).unwrap_or(i32::MAX) - 1);

        let mut columns: Vec<Column> = (start..=last)
            .chain(std::iter::once(0))
            .map(|bc| Column {
                bc,
                template: generator.template(bc),
            })
            .filter(|c| c.template.iter().any(|&v| v != 0.0))
            .collect();
        columns.sort_by_key(|c| c.bc);
        columns.dedup_by_key(|c| c.bc);
        if !columns.iter().any(|c| c.bc == 0) {
            return Err(Error::InvalidShape(
                "in-time pulse is not visible in the readout window".into(),
            ));
        }

        Ok(Self {
            columns,
            derivative: generator.template_derivative(),
            threshold,
            pedestal: generator.config().pedestal,
            n_samples,
        })
    }

    /// Number of samples expected.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Amplitude threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Bunch crossings the fit starts from.
    pub fn bunch_crossings(&self) -> impl Iterator<Item = i32> + '_ {
        self.columns.iter().map(|c| c.bc)
    }

    /// Estimates energy and time of one pulse.
    pub fn estimate(&self, samples: &[f64]) -> Result<Estimate> {
        if samples.len() != self.n_samples {
            return Err(Error::WeightLength {
                which: "template",
                weights: self.n_samples,
                samples: samples.len(),
            });
        }
        let y = DVector::from_iterator(samples.len(), samples.iter().map(|s| s - self.pedestal));

        // amplitudes indistinguishable from rounding never survive
        let floor = self
            .threshold
            .max(RELATIVE_FLOOR * y.iter().fold(0.0_f64, |m, v| m.max(v.abs())));
        let mut active: Vec<usize> = (0..self.columns.len()).collect();
        let mut amplitude = None;
        for _ in 0..self.columns.len() {
            let Some(amps) = self.fit(&active, None, &y) else {
                break;
            };
            let before = active.len();
            let kept: Vec<usize> = active
                .iter()
                .zip(amps.iter())
                .filter(|&(&i, &a)| self.columns[i].bc == 0 || a > floor)
                .map(|(&i, _)| i)
                .collect();
            if kept.len() == before {
                amplitude = active
                    .iter()
                    .position(|&i| self.columns[i].bc == 0)
                    .map(|p| amps[p]);
                break;
            }
            active = kept;
        }

        match amplitude {
            Some(energy) if energy > self.threshold && energy.is_finite() => {
                let time = (active.len() < self.n_samples)
                    .then(|| self.fit(&active, Some(&self.derivative), &y))
                    .flatten()
                    .and_then(|coef| {
                        let p = active.iter().position(|&i| self.columns[i].bc == 0)?;
                        let a = coef[p];
                        let b = coef[coef.len() - 1];
                        (a != 0.0).then(|| -b / a)
                    })
                    .filter(|t| t.is_finite())
                    .unwrap_or(0.0);
                Ok(Estimate { energy, time })
            }
            _ => {
                trace!("COF below threshold, using peak sample");
                let peak = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Ok(Estimate {
                    energy: if peak.is_finite() { peak } else { 0.0 },
                    time: 0.0,
                })
            }
        }
    }

    /// Least-squares amplitudes of the active columns (plus an optional extra column).
    fn fit(&self, active: &[usize], extra: Option<&[f64]>, y: &DVector<f64>) -> Option<DVector<f64>> {
        let ncols = active.len() + usize::from(extra.is_some());
        let h = DMatrix::from_fn(self.n_samples, ncols, |r, c| match active.get(c) {
            Some(&i) => self.columns[i].template[r],
            None => extra.map_or(0.0, |d| d[r]),
        });
        h.svd(true, true).solve(y, SVD_EPS).ok()
    }
}
