//! Electron candidates and cut-based identification.

use std::collections::{BTreeMap, HashSet};

use calopipe_core::{Cluster, ElectronCandidate, ElectronFeatures, RingSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Window on one named feature. Open bounds are omitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cut {
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Cut {
    /// Lower bound only.
    pub fn above(feature: &str, min: f64) -> Self {
        Self {
            feature: feature.to_string(),
            min: Some(min),
            max: None,
        }
    }

    /// Upper bound only.
    pub fn below(feature: &str, max: f64) -> Self {
        Self {
            feature: feature.to_string(),
            min: None,
            max: Some(max),
        }
    }

    fn accepts(&self, features: &ElectronFeatures) -> bool {
        let Some(value) = features.get(&self.feature) else {
            return false;
        };
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

/// Named set of cuts; a candidate passes when every cut accepts it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutMenu {
    pub name: String,
    pub cuts: Vec<Cut>,
}

impl CutMenu {
    /// Creates a menu.
    pub fn new(name: &str, cuts: Vec<Cut>) -> Self {
        Self {
            name: name.to_string(),
            cuts,
        }
    }

    /// Evaluates the menu.
    pub fn accepts(&self, features: &ElectronFeatures) -> bool {
        self.cuts.iter().all(|c| c.accepts(features))
    }

    /// Loose, medium and tight shower-shape menus for barrel electrons.
    pub fn reference_menus() -> Vec<Self> {
        vec![
            Self::new(
                "loose",
                vec![Cut::above("reta", 0.80), Cut::below("rhad", 0.10)],
            ),
            Self::new(
                "medium",
                vec![
                    Cut::above("reta", 0.88),
                    Cut::below("rhad", 0.05),
                    Cut::below("weta2", 0.013),
                ],
            ),
            Self::new(
                "tight",
                vec![
                    Cut::above("reta", 0.92),
                    Cut::above("rphi", 0.85),
                    Cut::below("rhad", 0.02),
                    Cut::below("weta2", 0.012),
                    Cut::above("eratio", 0.60),
                ],
            ),
        ]
    }
}

/// Electron builder configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElectronConfig {
    /// Clusters below this transverse energy (MeV) are skipped.
    pub min_et: f64,
    /// Identification menus.
    pub menus: Vec<CutMenu>,
}

impl ElectronConfig {
    /// Sets the transverse energy threshold.
    #[must_use]
    pub fn with_min_et(mut self, min_et: f64) -> Self {
        self.min_et = min_et;
        self
    }

    /// Sets the identification menus.
    #[must_use]
    pub fn with_menus(mut self, menus: Vec<CutMenu>) -> Self {
        self.menus = menus;
        self
    }

    /// Checks menu names and feature names.
    pub fn validate(&self) -> Result<()> {
        let probe = ElectronFeatures::default();
        let mut names = HashSet::new();
        for menu in &self.menus {
            if !names.insert(menu.name.as_str()) {
                return Err(Error::config(
                    "cut menu",
                    format!("menu '{}' defined twice", menu.name),
                ));
            }
            for cut in &menu.cuts {
                if probe.get(&cut.feature).is_none() {
                    return Err(Error::config(
                        "cut menu",
                        format!("menu '{}' cuts on unknown feature '{}'", menu.name, cut.feature),
                    ));
                }
                if let (Some(lo), Some(hi)) = (cut.min, cut.max) {
                    if lo > hi {
                        return Err(Error::config(
                            "cut menu",
                            format!("menu '{}' has an empty window on '{}'", menu.name, cut.feature),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Turns clusters and their ring sets into electron candidates.
#[derive(Clone, Debug)]
pub struct ElectronBuilder {
    config: ElectronConfig,
}

impl ElectronBuilder {
    /// Create with a validated configuration.
    pub fn new(config: ElectronConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ElectronConfig {
        &self.config
    }

    /// One candidate per cluster above threshold. Every such cluster must
    /// have a ring set.
    pub fn build(&self, clusters: &[Cluster], rings: &[RingSet]) -> Result<Vec<ElectronCandidate>> {
        let by_cluster: BTreeMap<usize, &RingSet> =
            rings.iter().map(|r| (r.cluster_index, r)).collect();
        if by_cluster.len() != rings.len() {
            warn!(
                rings = rings.len(),
                distinct = by_cluster.len(),
                "Several ring sets share a cluster; keeping the last"
            );
        }

        let mut candidates = Vec::new();
        for (index, cluster) in clusters.iter().enumerate() {
            if cluster.et < self.config.min_et {
                continue;
            }
            let ring_set = by_cluster
                .get(&index)
                .ok_or(Error::MissingRings { cluster_index: index })?;
            let features = ElectronFeatures::from_cluster(cluster);
            let decisions = self
                .config
                .menus
                .iter()
                .map(|m| (m.name.clone(), m.accepts(&features)))
                .collect();
            candidates.push(ElectronCandidate {
                cluster_index: index,
                seed_id: cluster.seed_id,
                features,
                rings: ring_set.rings.clone(),
                decisions,
            });
        }
        debug!(
            clusters = clusters.len(),
            candidates = candidates.len(),
            "Built electron candidates"
        );
        Ok(candidates)
    }
}
