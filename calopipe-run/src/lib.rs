//! calopipe-run: Configuration and execution of the calorimeter chain.
//!
//! This crate provides:
//! - [`PipelineConfig`]: one immutable document configuring every stage
//! - [`KeyPlan`]: configuration-time check of the keys stages exchange
//! - [`Pipeline`]: the per-event entry point
//! - [`Pipeline::run_events`]: parallel processing of independent events
//! - [`ElectronGun`]: synthetic single-electron inputs
//!

mod config;
mod driver;
mod error;
mod gun;
mod pipeline;
mod plan;

pub use config::{DigitConfig, KeyConfig, PipelineConfig, SamplingConfig};
pub use driver::{EventOutcome, RunOptions, RunOutput, RunSummary};
pub use error::{Error, EventError, Result, StageError};
pub use gun::{ElectronGun, GunConfig};
pub use pipeline::{EventSummary, Pipeline};
pub use plan::{KeyPlan, StagePlan, AUX_SUFFIX};
