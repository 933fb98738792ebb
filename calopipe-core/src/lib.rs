//! calopipe-core: Data model and event exchange for calorimeter processing.
//!
//! This crate provides the per-event collections shared by every pipeline
//! stage (hits, cells, clusters, rings, electron candidates), the sampling
//! taxonomy and the keyed [`EventStore`] the stages communicate through.
//!

pub mod cell;
pub mod cluster;
pub mod electron;
pub mod error;
pub mod event;
pub mod rings;
pub mod sampling;
pub mod store;

pub use cell::{delta_phi, Cell, CellGeometry, CellId, MODULE_STRIDE};
pub use cluster::{Cluster, ClusterCell, ForwardMoments, ShowerShapes};
pub use electron::{ElectronCandidate, ElectronFeatures};
pub use error::StoreError;
pub use event::{EventInfo, Hit, Seed};
pub use rings::RingSet;
pub use sampling::{CaloSampling, Detector, Layer};
pub use store::{Collection, EventStore, KeyKind};
