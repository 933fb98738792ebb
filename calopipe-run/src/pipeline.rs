//! Per-event execution of the configured chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use calopipe_core::{Collection, EventStore};
use calopipe_digit::{
    AnomalyGenerator, CellEstimator, CellMaker, CellMerge, CrossTalkMaker, DefectIndex,
    DefectTable, PulseGenerator,
};
use calopipe_geometry::DetectorLayout;
use calopipe_reco::{ClusterMaker, ElectronBuilder, RingsBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, EventError, Result, StageError};
use crate::plan::{KeyPlan, AUX_SUFFIX};

#[derive(Clone, Debug)]
struct CrossTalkStage {
    maker: CrossTalkMaker,
    aux_key: String,
}

/// Digitization of one volume.
#[derive(Clone, Debug)]
struct SamplingChain {
    maker: CellMaker,
    key: String,
    cross_talk: Option<CrossTalkStage>,
}

/// Counters of one processed event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    pub event_number: u64,
    pub cells: usize,
    pub anomalous_cells: usize,
    pub clusters: usize,
    pub electrons: usize,
    /// Candidates passing each identification menu.
    pub passed: BTreeMap<String, usize>,
}

/// The configured chain, shared read-only by every worker.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    layout: Arc<DetectorLayout>,
    plan: KeyPlan,
    chains: Vec<SamplingChain>,
    merge: CellMerge,
    clusters: ClusterMaker,
    rings: RingsBuilder,
    electrons: ElectronBuilder,
}

impl Pipeline {
    /// Validates `config` against `layout` and builds every stage.
    ///
    /// `defects` is required when the configuration enables defect
    /// injection and ignored otherwise.
    pub fn new(
        config: PipelineConfig,
        layout: Arc<DetectorLayout>,
        defects: Option<&DefectTable>,
    ) -> Result<Self> {
        let plan = config.validate(&layout)?;

        let index = match (config.do_defects, defects) {
            (true, Some(table)) => Some(Arc::new(DefectIndex::build(table, |name| {
                layout.module_index(name)
            })?)),
            (true, None) => {
                return Err(Error::Config(
                    "defect injection is enabled but no defect table was given".into(),
                ))
            }
            (false, Some(_)) => {
                warn!("Defect table given but defect injection is disabled; ignoring it");
                None
            }
            (false, None) => None,
        };

        let mut chains = Vec::with_capacity(layout.len());
        for volume in layout.volumes() {
            let sampling = volume.sampling();
            let readout = config.digit.sampling(sampling);
            let pulse = PulseGenerator::new(readout.pulse.clone())?;
            let estimator =
                CellEstimator::build(&config.digit.filter(sampling, config.do_cof), &pulse)?;

            let cross_talk = if config.do_cross_talk && sampling.has_cross_talk() {
                Some(CrossTalkStage {
                    maker: CrossTalkMaker::new(
                        config.digit.cross_talk.clone(),
                        estimator.clone(),
                        readout.pulse.pedestal,
                        volume,
                    )?,
                    aux_key: format!("{}{AUX_SUFFIX}", volume.collection_key()),
                })
            } else {
                None
            };

            let mut maker =
                CellMaker::new(volume.clone(), pulse, estimator, u64::from(volume.module()));
            if let Some(index) = &index {
                maker = maker.with_anomaly(AnomalyGenerator::new(
                    Arc::clone(index),
                    readout.pulse.noise_mean,
                    readout.pulse.noise_std,
                ));
            }
            debug!(
                volume = volume.name(),
                estimator = maker.estimator().name(),
                cross_talk = cross_talk.is_some(),
                "Configured sampling"
            );
            chains.push(SamplingChain {
                maker,
                key: volume.collection_key().to_string(),
                cross_talk,
            });
        }

        let merge = CellMerge::new(chains.iter().map(|c| c.key.as_str()))?;
        let clusters = ClusterMaker::new(config.cluster.clone())?;
        let rings = RingsBuilder::new(config.rings.clone())?;
        let electrons = ElectronBuilder::new(config.electron.clone())?;

        info!(
            volumes = layout.len(),
            cells = layout.n_cells(),
            stages = plan.stages.len(),
            cross_talk = config.do_cross_talk,
            cof = config.do_cof,
            defects = index.is_some(),
            "Pipeline configured"
        );
        Ok(Self {
            config,
            layout,
            plan,
            chains,
            merge,
            clusters,
            rings,
            electrons,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detector layout.
    pub fn layout(&self) -> &Arc<DetectorLayout> {
        &self.layout
    }

    /// Validated key flow.
    pub fn plan(&self) -> &KeyPlan {
        &self.plan
    }

    /// Runs every stage on one event. The store must hold the configured
    /// hits, events and seeds keys; every produced collection is recorded
    /// into it.
    pub fn execute(
        &self,
        event_index: usize,
        store: &mut EventStore,
    ) -> std::result::Result<EventSummary, EventError> {
        let keys = &self.config.keys;
        let event = store
            .event_info(&keys.events)
            .map_err(|e| EventError::new(event_index, "EventInfo", &keys.events, e))?;
        let hits = store
            .hits(&keys.hits)
            .map_err(|e| EventError::new(event_index, "Hits", &keys.hits, e))?
            .to_vec();

        for chain in &self.chains {
            let name = chain.maker.volume().name();
            let cells = chain
                .maker
                .make(&hits, &event, self.config.run_seed)
                .map_err(|e| EventError::new(event_index, format!("CellMaker({name})"), &chain.key, e))?;
            match &chain.cross_talk {
                None => store
                    .record(chain.key.clone(), Collection::Cells(cells))
                    .map_err(|e| EventError::new(event_index, format!("CellMaker({name})"), &chain.key, e))?,
                Some(xt) => {
                    let stage = format!("CrossTalkMaker({name})");
                    store
                        .record(xt.aux_key.clone(), Collection::Cells(cells))
                        .map_err(context(event_index, &stage, &xt.aux_key))?;
                    let raw = store.cells(&xt.aux_key).map_err(context(event_index, &stage, &xt.aux_key))?;
                    let adjusted = xt.maker.apply(raw).map_err(context(event_index, &stage, &chain.key))?;
                    store
                        .record(chain.key.clone(), Collection::Cells(adjusted))
                        .map_err(context(event_index, &stage, &chain.key))?;
                }
            }
        }

        let merged = self
            .merge
            .merge(|key| Ok(store.cells(key)?))
            .map_err(|e| EventError::new(event_index, "CellMerge", &keys.cells, e))?;
        let anomalous_cells = merged.cells.iter().filter(|c| c.anomalous).count();
        let n_cells = merged.cells.len();
        store
            .record(keys.cells.clone(), Collection::Cells(merged.cells))
            .map_err(context(event_index, "CellMerge", &keys.cells))?;
        store
            .record(keys.truth_cells.clone(), Collection::Cells(merged.truth))
            .map_err(context(event_index, "CellMerge", &keys.truth_cells))?;

        let clusters = {
            let cells = store.cells(&keys.cells).map_err(context(event_index, "ClusterMaker", &keys.cells))?;
            let seeds = store.seeds(&keys.seeds).map_err(context(event_index, "ClusterMaker", &keys.seeds))?;
            self.clusters.build(cells, seeds)
        };
        let n_clusters = clusters.len();
        store
            .record(keys.clusters.clone(), Collection::Clusters(clusters))
            .map_err(context(event_index, "ClusterMaker", &keys.clusters))?;

        let rings = {
            let clusters = store
                .clusters(&keys.clusters)
                .map_err(context(event_index, "RingsBuilder", &keys.clusters))?;
            self.rings.build(clusters)
        };
        store
            .record(keys.rings.clone(), Collection::Rings(rings))
            .map_err(context(event_index, "RingsBuilder", &keys.rings))?;

        let electrons = {
            let clusters = store
                .clusters(&keys.clusters)
                .map_err(context(event_index, "ElectronBuilder", &keys.clusters))?;
            let rings = store.rings(&keys.rings).map_err(context(event_index, "ElectronBuilder", &keys.rings))?;
            self.electrons
                .build(clusters, rings)
                .map_err(context(event_index, "ElectronBuilder", &keys.electrons))?
        };
        let mut passed = BTreeMap::new();
        for menu in &self.config.electron.menus {
            let n = electrons.iter().filter(|e| e.passed(&menu.name)).count();
            passed.insert(menu.name.clone(), n);
        }
        let n_electrons = electrons.len();
        store
            .record(keys.electrons.clone(), Collection::Electrons(electrons))
            .map_err(context(event_index, "ElectronBuilder", &keys.electrons))?;

        debug!(
            event = event.event_number,
            cells = n_cells,
            clusters = n_clusters,
            electrons = n_electrons,
            "Event processed"
        );
        Ok(EventSummary {
            event_number: event.event_number,
            cells: n_cells,
            anomalous_cells,
            clusters: n_clusters,
            electrons: n_electrons,
            passed,
        })
    }
}

fn context<'a, E: Into<StageError>>(
    event: usize,
    stage: &'a str,
    key: &'a str,
) -> impl FnOnce(E) -> EventError + 'a {
    move |source| EventError::new(event, stage, key, source)
}
