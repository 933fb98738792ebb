//! Signal coupling between neighbouring cells of a second EM layer.
//!
//! Every cell above the energy threshold leaks a fixed fraction of its
//! baseline-subtracted samples into each neighbour: capacitively to the four
//! edge neighbours, inductively to the four corner neighbours and resistively
//! to the cells two steps away in eta. The source loses exactly what its
//! neighbours gain. Touched cells are estimated again.
#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use std::collections::HashMap;

use calopipe_core::Cell;
use calopipe_geometry::SamplingVolume;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::CellEstimator;

/// Cross-talk amplitudes (percent of the source signal per neighbour).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrossTalkConfig {
    /// Only cells above this energy (MeV) leak signal.
    pub min_energy: f64,
    /// Edge-neighbour coupling (%).
    pub amp_capacitive: f64,
    /// Corner-neighbour coupling (%).
    pub amp_inductive: f64,
    /// Second-neighbour coupling along eta (%).
    pub amp_resistive: f64,
}

impl Default for CrossTalkConfig {
    fn default() -> Self {
        Self {
            min_energy: 1000.0,
            amp_capacitive: 4.2,
            amp_inductive: 2.3,
            amp_resistive: 1.0,
        }
    }
}

impl CrossTalkConfig {
    /// Sets the energy threshold.
    #[must_use]
    pub fn with_min_energy(mut self, min_energy: f64) -> Self {
        self.min_energy = min_energy;
        self
    }

    /// Sets the three coupling amplitudes (%).
    #[must_use]
    pub fn with_amplitudes(mut self, capacitive: f64, inductive: f64, resistive: f64) -> Self {
        self.amp_capacitive = capacitive;
        self.amp_inductive = inductive;
        self.amp_resistive = resistive;
        self
    }

    /// Neighbour offsets `(d_eta, d_phi)` with their coupling fraction.
    pub fn couplings(&self) -> Vec<(i64, i64, f64)> {
        let cap = self.amp_capacitive / 100.0;
        let ind = self.amp_inductive / 100.0;
        let res = self.amp_resistive / 100.0;
        vec![
            (1, 0, cap),
            (-1, 0, cap),
            (0, 1, cap),
            (0, -1, cap),
            (1, 1, ind),
            (1, -1, ind),
            (-1, 1, ind),
            (-1, -1, ind),
            (2, 0, res),
            (-2, 0, res),
        ]
    }

    /// Checks amplitudes and the total leaked fraction.
    pub fn validate(&self) -> Result<()> {
        for (what, amp) in [
            ("amp_capacitive", self.amp_capacitive),
            ("amp_inductive", self.amp_inductive),
            ("amp_resistive", self.amp_resistive),
        ] {
            if !(amp >= 0.0 && amp.is_finite()) {
                return Err(Error::config(what, format!("{amp} must be >= 0")));
            }
        }
        let total: f64 = self.couplings().iter().map(|c| c.2).sum();
        if total >= 1.0 {
            return Err(Error::config(
                "cross-talk amplitudes",
                format!("a cell would leak {:.1}% of its signal", total * 100.0),
            ));
        }
        Ok(())
    }
}

/// Applies cross-talk to the raw cells of one volume.
#[derive(Clone, Debug)]
pub struct CrossTalkMaker {
    config: CrossTalkConfig,
    estimator: CellEstimator,
    pedestal: f64,
    n_eta: i64,
    n_phi: i64,
}

impl CrossTalkMaker {
    /// Creates a maker for the lattice of `volume`.
    pub fn new(config: CrossTalkConfig, estimator: CellEstimator, pedestal: f64, volume: &SamplingVolume) -> Result<Self> {
        config.validate()?;
        if !volume.sampling().has_cross_talk() {
            return Err(Error::config(
                "cross-talk sampling",
                format!("{} is not wired for cross-talk", volume.sampling()),
            ));
        }
        Ok(Self {
            config,
            estimator,
            pedestal,
            n_eta: i64::from(volume.n_eta()),
            n_phi: i64::from(volume.n_phi()),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &CrossTalkConfig {
        &self.config
    }

    /// Returns the adjusted copy of `cells`; the input is left untouched.
    pub fn apply(&self, cells: &[Cell]) -> Result<Vec<Cell>> {
        let index: HashMap<(i64, i64), usize> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| ((i64::from(c.id.eta_bin), i64::from(c.id.phi_bin)), i))
            .collect();
        let couplings = self.config.couplings();

        let mut deltas: HashMap<usize, Vec<f64>> = HashMap::new();
        let mut sources = 0usize;
        for (i, cell) in cells.iter().enumerate() {
            if cell.energy <= self.config.min_energy {
                continue;
            }
            sources += 1;
            let signal: Vec<f64> = cell.pulse.iter().map(|s| s - self.pedestal).collect();
            let eta = i64::from(cell.id.eta_bin);
            let phi = i64::from(cell.id.phi_bin);
            for &(de, dp, fraction) in &couplings {
                let e = eta + de;
                if e < 0 || e >= self.n_eta || fraction <= 0.0 {
                    continue;
                }
                let p = (phi + dp).rem_euclid(self.n_phi);
                let Some(&j) = index.get(&(e, p)) else {
                    continue;
                };
                if j == i {
                    continue;
                }
                transfer(&mut deltas, i, &signal, -fraction);
                transfer(&mut deltas, j, &signal, fraction);
            }
        }

        let mut out = cells.to_vec();
        for (&i, delta) in &deltas {
            let cell = &mut out[i];
            cell.pulse.iter_mut().zip(delta).for_each(|(s, d)| *s += d);
            let estimate = self.estimator.estimate(&cell.pulse)?;
            cell.energy = estimate.energy;
            cell.time = estimate.time;
        }
        debug!(sources, touched = deltas.len(), "Applied cross-talk");
        Ok(out)
    }
}

fn transfer(deltas: &mut HashMap<usize, Vec<f64>>, cell: usize, signal: &[f64], fraction: f64) {
    let delta = deltas.entry(cell).or_insert_with(|| vec![0.0; signal.len()]);
    delta.iter_mut().zip(signal).for_each(|(d, s)| *d += fraction * s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_maker::CellMaker;
    use crate::filter::FilterConfig;
    use crate::pulse::{PulseConfig, PulseGenerator};
    use approx::assert_abs_diff_eq;
    use calopipe_core::{CaloSampling, EventInfo, Hit};
    use calopipe_geometry::VolumeDescriptor;

    fn setup() -> (CellMaker, CrossTalkMaker) {
        let volume = SamplingVolume::build(
            VolumeDescriptor::new("EMB2", CaloSampling::EMB2, 1500.0, 1800.0, -300.0, 300.0, 0.025, 0.1),
            0,
        )
        .unwrap();
        let pulse = PulseGenerator::new(PulseConfig::default()).unwrap();
        let estimator = CellEstimator::build(&FilterConfig::DerivedWeights, &pulse).unwrap();
        let xt = CrossTalkMaker::new(CrossTalkConfig::default(), estimator.clone(), 0.0, &volume).unwrap();
        (CellMaker::new(volume, pulse, estimator, 0), xt)
    }

    #[test]
    fn test_energy_conserved_among_neighbours() {
        let (maker, xt) = setup();
        let hits = [Hit::new(CaloSampling::EMB2, 0.01, 0.05, 20_000.0)];
        let raw = maker.make(&hits, &EventInfo::new(1, 1), 9).unwrap();
        let adjusted = xt.apply(&raw).unwrap();

        let before: f64 = raw.iter().map(|c| c.energy).sum();
        let after: f64 = adjusted.iter().map(|c| c.energy).sum();
        assert_abs_diff_eq!(before, after, epsilon = 1e-6);

        let src = raw.iter().position(|c| c.energy > 19_000.0).unwrap();
        assert_abs_diff_eq!(adjusted[src].energy, 20_000.0 * (1.0 - 0.28), epsilon = 1e-4);
        let receivers = adjusted.iter().filter(|c| c.energy > 1.0 && c.energy < 1000.0).count();
        assert_eq!(receivers, 10);
    }

    #[test]
    fn test_below_threshold_untouched() {
        let (maker, xt) = setup();
        let hits = [Hit::new(CaloSampling::EMB2, 0.01, 0.05, 900.0)];
        let raw = maker.make(&hits, &EventInfo::new(1, 1), 9).unwrap();
        assert_eq!(xt.apply(&raw).unwrap(), raw);
    }

    #[test]
    fn test_phi_wraps_around() {
        let (maker, xt) = setup();
        let hits = [Hit::new(CaloSampling::EMB2, 0.01, 3.14, 20_000.0)];
        let raw = maker.make(&hits, &EventInfo::new(1, 1), 9).unwrap();
        let adjusted = xt.apply(&raw).unwrap();
        let n_phi = xt.n_phi as u32;
        assert!(adjusted
            .iter()
            .any(|c| c.id.phi_bin == 0 && c.energy > 100.0));
        assert!(adjusted
            .iter()
            .any(|c| c.id.phi_bin == n_phi - 2 && c.energy > 100.0));
    }

    #[test]
    fn test_rejects_excessive_coupling() {
        let cfg = CrossTalkConfig::default().with_amplitudes(20.0, 5.0, 1.0);
        assert!(cfg.validate().is_err());
    }
}
