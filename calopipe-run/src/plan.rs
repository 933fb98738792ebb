//! Configuration-time check of the keys exchanged between stages.

use std::collections::HashMap;

use calopipe_core::KeyKind;
use calopipe_geometry::DetectorLayout;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};

/// Suffix of the raw cells a cross-talk stage reads.
pub const AUX_SUFFIX: &str = "_Aux";

/// Keys one stage reads and writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: String,
    pub reads: Vec<(String, KeyKind)>,
    pub writes: Vec<(String, KeyKind)>,
}

impl StagePlan {
    fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn read(mut self, key: &str, kind: KeyKind) -> Self {
        self.reads.push((key.to_string(), kind));
        self
    }

    fn write(mut self, key: &str, kind: KeyKind) -> Self {
        self.writes.push((key.to_string(), kind));
        self
    }
}

/// Ordered stages of one event together with the supplied inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPlan {
    pub inputs: Vec<(String, KeyKind)>,
    pub stages: Vec<StagePlan>,
}

impl KeyPlan {
    /// Lays out the stages `config` runs on `layout`.
    pub fn build(config: &PipelineConfig, layout: &DetectorLayout) -> Self {
        let keys = &config.keys;
        let mut stages = Vec::new();
        let mut merge = StagePlan::new("CellMerge");
        for volume in layout.volumes() {
            let key = volume.collection_key();
            let maker = StagePlan::new(format!("CellMaker({})", volume.name()))
                .read(&keys.hits, KeyKind::Hits)
                .read(&keys.events, KeyKind::Events);
            if config.do_cross_talk && volume.sampling().has_cross_talk() {
                let aux = format!("{key}{AUX_SUFFIX}");
                stages.push(maker.write(&aux, KeyKind::Cells));
                stages.push(
                    StagePlan::new(format!("CrossTalkMaker({})", volume.name()))
                        .read(&aux, KeyKind::Cells)
                        .write(key, KeyKind::Cells),
                );
            } else {
                stages.push(maker.write(key, KeyKind::Cells));
            }
            merge = merge.read(key, KeyKind::Cells);
        }
        stages.push(
            merge
                .write(&keys.cells, KeyKind::Cells)
                .write(&keys.truth_cells, KeyKind::Cells),
        );
        stages.push(
            StagePlan::new("ClusterMaker")
                .read(&keys.cells, KeyKind::Cells)
                .read(&keys.seeds, KeyKind::Seeds)
                .write(&keys.clusters, KeyKind::Clusters),
        );
        stages.push(
            StagePlan::new("RingsBuilder")
                .read(&keys.clusters, KeyKind::Clusters)
                .write(&keys.rings, KeyKind::Rings),
        );
        stages.push(
            StagePlan::new("ElectronBuilder")
                .read(&keys.clusters, KeyKind::Clusters)
                .read(&keys.rings, KeyKind::Rings)
                .write(&keys.electrons, KeyKind::Electrons),
        );

        Self {
            inputs: vec![
                (keys.hits.clone(), KeyKind::Hits),
                (keys.events.clone(), KeyKind::Events),
                (keys.seeds.clone(), KeyKind::Seeds),
            ],
            stages,
        }
    }

    /// Checks that every read follows a write of the same kind and that no
    /// key is written twice.
    pub fn check(&self) -> Result<()> {
        let mut available: HashMap<&str, (KeyKind, &str)> = HashMap::new();
        for (key, kind) in &self.inputs {
            if key.is_empty() {
                return Err(Error::Config("input key names must not be empty".into()));
            }
            if available.insert(key.as_str(), (*kind, "input")).is_some() {
                return Err(Error::Config(format!("input key '{key}' is supplied twice")));
            }
        }

        for stage in &self.stages {
            for (key, kind) in &stage.reads {
                match available.get(key.as_str()) {
                    None => {
                        return Err(Error::Config(format!(
                            "{} reads '{key}' which no earlier stage writes",
                            stage.stage
                        )))
                    }
                    Some((found, writer)) if found != kind => {
                        return Err(Error::Config(format!(
                            "{} reads '{key}' as {kind} but {writer} writes {found}",
                            stage.stage
                        )))
                    }
                    Some(_) => {}
                }
            }
            for (key, kind) in &stage.writes {
                if key.is_empty() {
                    return Err(Error::Config(format!("{} writes an empty key", stage.stage)));
                }
                if let Some((_, writer)) = available.insert(key.as_str(), (*kind, stage.stage.as_str())) {
                    return Err(Error::Config(format!(
                        "{} writes '{key}' which {writer} already writes",
                        stage.stage
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyConfig;

    fn layout() -> DetectorLayout {
        DetectorLayout::reference_barrel().unwrap()
    }

    #[test]
    fn test_default_plan_is_consistent() {
        let config = PipelineConfig::default().with_cross_talk(true);
        let plan = KeyPlan::build(&config, &layout());
        plan.check().unwrap();
        // 7 makers, one cross-talk stage, merge and three reconstruction stages
        assert_eq!(plan.stages.len(), 12);
        assert!(plan
            .stages
            .iter()
            .any(|s| s.writes.contains(&("Collection_EMB2_Aux".to_string(), KeyKind::Cells))));
    }

    #[test]
    fn test_clash_with_collection_key_rejected() {
        let keys = KeyConfig {
            cells: "Collection_EMB1".into(),
            ..KeyConfig::default()
        };
        let config = PipelineConfig::default().with_keys(keys);
        let err = KeyPlan::build(&config, &layout()).check().unwrap_err();
        assert!(err.to_string().contains("already writes"));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let keys = KeyConfig {
            seeds: "Clusters".into(),
            ..KeyConfig::default()
        };
        let config = PipelineConfig::default().with_keys(keys);
        assert!(KeyPlan::build(&config, &layout()).check().is_err());
    }

    #[test]
    fn test_missing_producer_rejected() {
        let mut plan = KeyPlan::build(&PipelineConfig::default(), &layout());
        plan.inputs.retain(|(k, _)| k != "Seeds");
        let err = plan.check().unwrap_err();
        assert!(err.to_string().contains("ClusterMaker reads 'Seeds'"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let keys = KeyConfig {
            rings: String::new(),
            ..KeyConfig::default()
        };
        let config = PipelineConfig::default().with_keys(keys);
        assert!(KeyPlan::build(&config, &layout()).check().is_err());
    }
}
