//! Electron candidates built from clusters and rings.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;

/// Identification features of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElectronFeatures {
    pub eta: f64,
    pub phi: f64,
    pub et: f64,
    pub energy: f64,
    pub reta: f64,
    pub rphi: f64,
    pub weta2: f64,
    pub eratio: f64,
    pub f1: f64,
    pub f3: f64,
    pub rhad: f64,
}

impl ElectronFeatures {
    /// Collects the features of a cluster.
    pub fn from_cluster(cluster: &Cluster) -> Self {
        let s = &cluster.shapes;
        Self {
            eta: cluster.eta,
            phi: cluster.phi,
            et: cluster.et,
            energy: cluster.energy,
            reta: s.reta,
            rphi: s.rphi,
            weta2: s.weta2,
            eratio: s.eratio,
            f1: s.f1,
            f3: s.f3,
            rhad: s.rhad,
        }
    }

    /// Looks a feature up by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "eta" => self.eta,
            "abs_eta" => self.eta.abs(),
            "phi" => self.phi,
            "et" => self.et,
            "energy" => self.energy,
            "reta" => self.reta,
            "rphi" => self.rphi,
            "weta2" => self.weta2,
            "eratio" => self.eratio,
            "f1" => self.f1,
            "f3" => self.f3,
            "rhad" => self.rhad,
            _ => return None,
        };
        Some(value)
    }
}

/// Electron hypothesis.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ElectronCandidate {
    /// Index of the source cluster in the event's cluster collection.
    pub cluster_index: usize,
    /// Identifier of the seed behind the cluster.
    pub seed_id: usize,
    /// Shower-shape features.
    pub features: ElectronFeatures,
    /// Ring sums of the source cluster.
    pub rings: Vec<f64>,
    /// Outcome of each configured identification menu.
    pub decisions: BTreeMap<String, bool>,
}

impl ElectronCandidate {
    /// Outcome of a named menu, `false` when the menu was not evaluated.
    pub fn passed(&self, menu: &str) -> bool {
        self.decisions.get(menu).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_lookup() {
        let mut cluster = Cluster::new(0, -1.2, 0.4);
        cluster.eta = -1.2;
        cluster.et = 25_000.0;
        cluster.shapes.reta = 0.93;
        let features = ElectronFeatures::from_cluster(&cluster);
        assert_eq!(features.get("reta"), Some(0.93));
        assert_eq!(features.get("abs_eta"), Some(1.2));
        assert_eq!(features.get("unknown"), None);
    }

    #[test]
    fn test_missing_menu_is_not_passed() {
        let candidate = ElectronCandidate::default();
        assert!(!candidate.passed("tight"));
    }
}
