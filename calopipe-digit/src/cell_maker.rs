//! Per-sampling digitization: hits to reconstructed cells.

use std::collections::HashMap;

use calopipe_core::{Cell, EventInfo, Hit};
use calopipe_geometry::SamplingVolume;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::anomaly::AnomalyGenerator;
use crate::defects::Defect;
use crate::error::Result;
use crate::filter::{CellEstimator, Estimate};
use crate::pulse::PulseGenerator;

/// Seed of one random stream, mixed from the run seed, the event number and
/// a per-sampling stream index.
pub fn stream_seed(run_seed: u64, event_number: u64, stream: u64) -> u64 {
    splitmix64(splitmix64(splitmix64(run_seed) ^ event_number) ^ stream)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Digitizes every cell of one sampling volume.
#[derive(Clone, Debug)]
pub struct CellMaker {
    volume: SamplingVolume,
    pulse: PulseGenerator,
    estimator: CellEstimator,
    anomaly: Option<AnomalyGenerator>,
    stream: u64,
}

impl CellMaker {
    /// Creates a maker. `stream` separates the random streams of samplings.
    pub fn new(volume: SamplingVolume, pulse: PulseGenerator, estimator: CellEstimator, stream: u64) -> Self {
        Self {
            volume,
            pulse,
            estimator,
            anomaly: None,
            stream,
        }
    }

    /// Enables defect injection.
    #[must_use]
    pub fn with_anomaly(mut self, anomaly: AnomalyGenerator) -> Self {
        self.anomaly = Some(anomaly);
        self
    }

    /// Volume being digitized.
    pub fn volume(&self) -> &SamplingVolume {
        &self.volume
    }

    /// Energy estimator.
    pub fn estimator(&self) -> &CellEstimator {
        &self.estimator
    }

    /// Pulse generator.
    pub fn pulse(&self) -> &PulseGenerator {
        &self.pulse
    }

    /// Produces one cell per lattice point, eta-major.
    ///
    /// Hits of other samplings are ignored; hits of this sampling outside
    /// the lattice are dropped.
    pub fn make(&self, hits: &[Hit], event: &EventInfo, run_seed: u64) -> Result<Vec<Cell>> {
        let sampling = self.volume.sampling();
        let mut deposits: HashMap<(u32, u32), Vec<(i32, f64)>> = HashMap::new();
        let mut dropped = 0usize;
        for hit in hits.iter().filter(|h| h.sampling == sampling) {
            let Some(id) = self.volume.find_cell(hit.eta, hit.phi) else {
                dropped += 1;
                continue;
            };
            let list = deposits.entry((id.eta_bin, id.phi_bin)).or_default();
            match list.iter_mut().find(|(bc, _)| *bc == hit.bunch_crossing) {
                Some((_, energy)) => *energy += hit.energy,
                None => list.push((hit.bunch_crossing, hit.energy)),
            }
        }
        if dropped > 0 {
            debug!(
                volume = self.volume.name(),
                dropped, "Hits outside the volume lattice"
            );
        }

        let mut rng = StdRng::seed_from_u64(stream_seed(run_seed, event.event_number, self.stream));
        let noise_std = self.pulse.config().noise_std;
        let mut cells = Vec::with_capacity(self.volume.n_cells());
        for (id, geometry) in self.volume.cells() {
            let deps = deposits
                .get(&(id.eta_bin, id.phi_bin))
                .map_or(&[][..], Vec::as_slice);
            let mut cell = Cell::new(id, geometry);
            cell.truth_energy = deps.iter().filter(|(bc, _)| *bc == 0).map(|(_, e)| e).sum();
            cell.pulse = self.pulse.generate(deps, noise_std, &mut rng);

            let defect = self
                .anomaly
                .as_ref()
                .and_then(|a| a.apply(event.event_number, &mut cell, &mut rng));
            let estimate = if defect == Some(Defect::Dead) {
                Estimate::default()
            } else {
                self.estimator.estimate(&cell.pulse)?
            };
            cell.energy = estimate.energy;
            cell.time = estimate.time;
            cells.push(cell);
        }

        debug!(
            volume = self.volume.name(),
            cells = cells.len(),
            hit_cells = deposits.len(),
            "Digitized sampling"
        );
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::defects::{DefectIndex, DefectRule, DefectTable, DefectTarget};
    use crate::filter::FilterConfig;
    use crate::pulse::PulseConfig;
    use approx::assert_abs_diff_eq;
    use calopipe_core::CaloSampling;
    use calopipe_geometry::VolumeDescriptor;
    use std::sync::Arc;

    fn maker(noise: f64) -> CellMaker {
        let volume = SamplingVolume::build(
            VolumeDescriptor::new("EMB2", CaloSampling::EMB2, 1500.0, 1800.0, -300.0, 300.0, 0.05, 0.5)
                .with_module("M1"),
            1,
        )
        .unwrap();
        let pulse = PulseGenerator::new(PulseConfig::default().with_noise(0.0, noise)).unwrap();
        let estimator = CellEstimator::build(&FilterConfig::DerivedWeights, &pulse).unwrap();
        CellMaker::new(volume, pulse, estimator, 3)
    }

    #[test]
    fn test_noise_free_energy_recovered() {
        let maker = maker(0.0);
        let hits = vec![
            Hit::new(CaloSampling::EMB2, 0.01, 0.1, 700.0),
            Hit::new(CaloSampling::EMB2, 0.012, 0.1, 300.0),
            Hit::new(CaloSampling::EMB2, 0.012, 0.1, 50.0).with_bunch_crossing(10),
            Hit::new(CaloSampling::EMB1, 0.01, 0.1, 9999.0),
        ];
        let cells = maker.make(&hits, &EventInfo::new(1, 7), 42).unwrap();
        assert_eq!(cells.len(), maker.volume().n_cells());
        let hot = cells.iter().max_by(|a, b| a.energy.total_cmp(&b.energy)).unwrap();
        assert_eq!(hot.truth_energy, 1000.0);
        assert_abs_diff_eq!(hot.energy, 1000.0, epsilon = 1e-6);
        let total: f64 = cells.iter().map(|c| c.truth_energy).sum();
        assert_eq!(total, 1000.0);
    }

    #[test]
    fn test_reproducible_per_event() {
        let maker = maker(20.0);
        let event = EventInfo::new(1, 11);
        let a = maker.make(&[], &event, 5).unwrap();
        let b = maker.make(&[], &event, 5).unwrap();
        let c = maker.make(&[], &EventInfo::new(1, 12), 5).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_dead_module_only_inside_range() {
        let table = DefectTable {
            runs: vec![DefectRule {
                start_event: 0,
                end_event: 10,
                dead_modules: true,
                noise_std_factor: 1.0,
                cells: vec![DefectTarget::Module("M1".into())],
            }],
        };
        let index = Arc::new(DefectIndex::build(&table, |n| (n == "M1").then_some(1)).unwrap());
        let maker = maker(0.0).with_anomaly(AnomalyGenerator::new(index, 0.0, 0.0));
        let hits = vec![Hit::new(CaloSampling::EMB2, 0.01, 0.1, 1000.0)];

        let inside = maker.make(&hits, &EventInfo::new(1, 5), 1).unwrap();
        assert!(inside.iter().all(|c| c.energy == 0.0 && c.truth_energy == 0.0 && c.anomalous));

        let outside = maker.make(&hits, &EventInfo::new(1, 11), 1).unwrap();
        assert!(outside.iter().all(|c| !c.anomalous));
        assert!(outside.iter().any(|c| c.energy > 999.0));
    }

    #[test]
    fn test_stream_seed_separates_inputs() {
        let base = stream_seed(1, 2, 3);
        assert_ne!(base, stream_seed(1, 2, 4));
        assert_ne!(base, stream_seed(1, 3, 3));
        assert_ne!(base, stream_seed(2, 2, 3));
        assert_eq!(base, stream_seed(1, 2, 3));
    }
}
