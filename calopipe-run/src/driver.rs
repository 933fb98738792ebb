//! Parallel event driver.
//!
//! Events are independent: each worker builds the input store of an event,
//! runs the pipeline on it and reports the outcome. Failed events are
//! counted and logged without stopping the run.

use std::collections::BTreeMap;

use calopipe_core::{EventStore, StoreError};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EventError, Result};
use crate::pipeline::{EventSummary, Pipeline};

/// Run driver options.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Worker threads; 0 lets the pool choose.
    pub threads: usize,
    /// Whether processed event stores are returned.
    pub keep_stores: bool,
}

impl RunOptions {
    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Keeps the processed event stores.
    #[must_use]
    pub fn with_keep_stores(mut self, keep: bool) -> Self {
        self.keep_stores = keep;
        self
    }
}

/// Outcome of one event.
#[derive(Debug)]
pub struct EventOutcome {
    pub event_index: usize,
    pub result: std::result::Result<EventSummary, EventError>,
    /// Processed store, when requested and the input could be built.
    pub store: Option<EventStore>,
}

/// Counters over a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events_ok: usize,
    pub events_failed: usize,
    pub cells: usize,
    pub anomalous_cells: usize,
    pub clusters: usize,
    pub electrons: usize,
    pub passed: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Adds the counters of one successful event.
    pub fn add(&mut self, event: &EventSummary) {
        self.events_ok += 1;
        self.cells += event.cells;
        self.anomalous_cells += event.anomalous_cells;
        self.clusters += event.clusters;
        self.electrons += event.electrons;
        for (menu, n) in &event.passed {
            *self.passed.entry(menu.clone()).or_default() += n;
        }
    }

    /// Counts one failed event.
    pub fn add_failure(&mut self) {
        self.events_failed += 1;
    }
}

/// Result of [`Pipeline::run_events`].
#[derive(Debug)]
pub struct RunOutput {
    pub summary: RunSummary,
    /// Outcomes in event order.
    pub events: Vec<EventOutcome>,
}

impl Pipeline {
    /// Processes events `0..n_events` on a dedicated pool.
    ///
    /// `source` builds the input store of an event. Outcomes come back in
    /// event order whatever the number of threads.
    pub fn run_events<F>(&self, n_events: usize, options: &RunOptions, source: F) -> Result<RunOutput>
    where
        F: Fn(usize) -> std::result::Result<EventStore, StoreError> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .build()?;
        info!(
            events = n_events,
            threads = pool.current_num_threads(),
            "Starting run"
        );

        let events: Vec<EventOutcome> = pool.install(|| {
            (0..n_events)
                .into_par_iter()
                .map(|index| self.run_one(index, options.keep_stores, &source))
                .collect()
        });

        let mut summary = RunSummary::default();
        for outcome in &events {
            match &outcome.result {
                Ok(event) => summary.add(event),
                Err(err) => {
                    warn!(event = outcome.event_index, error = %err, "Event failed");
                    summary.add_failure();
                }
            }
        }
        info!(
            ok = summary.events_ok,
            failed = summary.events_failed,
            clusters = summary.clusters,
            electrons = summary.electrons,
            "Run finished"
        );
        Ok(RunOutput { summary, events })
    }

    fn run_one<F>(&self, index: usize, keep: bool, source: &F) -> EventOutcome
    where
        F: Fn(usize) -> std::result::Result<EventStore, StoreError>,
    {
        let mut store = match source(index) {
            Ok(store) => store,
            Err(err) => {
                return EventOutcome {
                    event_index: index,
                    result: Err(EventError::new(index, "EventSource", err.key().to_string(), err)),
                    store: None,
                }
            }
        };
        let result = self.execute(index, &mut store);
        EventOutcome {
            event_index: index,
            result,
            store: keep.then_some(store),
        }
    }
}
