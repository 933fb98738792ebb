//! Immutable pipeline configuration.
//!
//! One JSON document configures the whole chain. Unknown property names are
//! rejected; omitted ones take their defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use calopipe_core::{CaloSampling, Detector};
use calopipe_digit::{CrossTalkConfig, FilterConfig, PulseConfig};
use calopipe_geometry::DetectorLayout;
use calopipe_reco::{ClusterConfig, ElectronConfig, RingsConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plan::KeyPlan;

/// Event store key names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyConfig {
    pub hits: String,
    pub events: String,
    pub seeds: String,
    pub cells: String,
    pub truth_cells: String,
    pub clusters: String,
    pub rings: String,
    pub electrons: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            hits: "Hits".into(),
            events: "Events".into(),
            seeds: "Seeds".into(),
            cells: "Cells".into(),
            truth_cells: "TruthCells".into(),
            clusters: "Clusters".into(),
            rings: "Rings".into(),
            electrons: "Electrons".into(),
        }
    }
}

/// Readout of one sampling.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub pulse: PulseConfig,
    pub filter: FilterConfig,
}

/// Digitization settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigitConfig {
    /// Readout used by samplings without an entry in `samplings`.
    pub default: SamplingConfig,
    /// Per-sampling readout.
    pub samplings: BTreeMap<CaloSampling, SamplingConfig>,
    /// Out-of-time amplitude threshold of the constrained filter (MeV).
    pub cof_threshold: f64,
    /// Coupling between second-layer neighbours.
    pub cross_talk: CrossTalkConfig,
}

impl DigitConfig {
    /// Readout of a sampling.
    pub fn sampling(&self, sampling: CaloSampling) -> &SamplingConfig {
        self.samplings.get(&sampling).unwrap_or(&self.default)
    }

    /// Estimator of a sampling. With `do_cof`, tile samplings use the
    /// constrained filter.
    pub fn filter(&self, sampling: CaloSampling, do_cof: bool) -> FilterConfig {
        if do_cof && sampling.detector() == Detector::Tile {
            FilterConfig::Constrained {
                threshold: self.cof_threshold,
            }
        } else {
            self.sampling(sampling).filter.clone()
        }
    }
}

/// Complete configuration of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Seed every random stream derives from.
    pub run_seed: u64,
    pub keys: KeyConfig,
    /// Simulate cross-talk in the second EM layers.
    pub do_cross_talk: bool,
    /// Use the constrained filter in the tile calorimeter.
    pub do_cof: bool,
    /// Inject the defect table.
    pub do_defects: bool,
    pub digit: DigitConfig,
    pub cluster: ClusterConfig,
    pub rings: RingsConfig,
    pub electron: ElectronConfig,
}

impl PipelineConfig {
    /// Parses a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration document.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Sets the run seed.
    #[must_use]
    pub fn with_run_seed(mut self, seed: u64) -> Self {
        self.run_seed = seed;
        self
    }

    /// Enables or disables cross-talk.
    #[must_use]
    pub fn with_cross_talk(mut self, enabled: bool) -> Self {
        self.do_cross_talk = enabled;
        self
    }

    /// Enables or disables the constrained filter.
    #[must_use]
    pub fn with_cof(mut self, enabled: bool) -> Self {
        self.do_cof = enabled;
        self
    }

    /// Enables or disables defect injection.
    #[must_use]
    pub fn with_defects(mut self, enabled: bool) -> Self {
        self.do_defects = enabled;
        self
    }

    /// Replaces the key names.
    #[must_use]
    pub fn with_keys(mut self, keys: KeyConfig) -> Self {
        self.keys = keys;
        self
    }

    /// Replaces the readout of one sampling.
    #[must_use]
    pub fn with_sampling(mut self, sampling: CaloSampling, config: SamplingConfig) -> Self {
        self.digit.samplings.insert(sampling, config);
        self
    }

    /// Checks every stage setting and the key flow on `layout`.
    pub fn validate(&self, layout: &DetectorLayout) -> Result<KeyPlan> {
        for volume in layout.volumes() {
            self.digit.sampling(volume.sampling()).pulse.validate()?;
        }
        if self.do_cross_talk {
            self.digit.cross_talk.validate()?;
        }
        if self.do_cof && !(self.digit.cof_threshold >= 0.0) {
            return Err(Error::Config(format!(
                "cof_threshold {} must be >= 0",
                self.digit.cof_threshold
            )));
        }
        self.cluster.validate()?;
        self.rings.validate()?;
        self.electron.validate()?;

        let plan = KeyPlan::build(self, layout);
        plan.check()?;
        Ok(plan)
    }
}
