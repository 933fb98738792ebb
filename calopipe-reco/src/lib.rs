//! calopipe-reco: Reconstruction stages run on merged cells.
//!
//! This crate provides:
//! - [`ClusterMaker`]: seeded window clusters with shower shapes and
//!   optional forward moments
//! - [`RingsBuilder`]: concentric ring energy sums per cluster
//! - [`ElectronBuilder`]: electron candidates with cut-menu decisions
//!

mod cluster;
mod electron;
mod error;
mod rings;
mod shapes;

pub use cluster::{ClusterConfig, ClusterMaker};
pub use electron::{Cut, CutMenu, ElectronBuilder, ElectronConfig};
pub use error::{Error, Result};
pub use rings::{RingCenter, RingLayerConfig, RingsBuilder, RingsConfig};
