//! calopipe-digit: Calorimeter digitization chain.
//!
//! This crate turns energy deposits into reconstructed cells:
//! - **Pulse generation** from normalized shapes with pile-up, noise and
//!   shape deformation
//! - **Energy and time estimation** with the optimal filter (fixed or
//!   derived weights) or the constrained optimal filter
//! - **Defect injection** from a run/event indexed defect table
//! - **Cross-talk** between neighbouring cells of second EM layers
//! - **Merging** of per-sampling collections
//!

mod anomaly;
mod cell_maker;
mod cof;
mod crosstalk;
pub mod defects;
pub mod error;
mod filter;
mod merge;
mod pulse;
pub mod shape;

pub use anomaly::AnomalyGenerator;
pub use cell_maker::{stream_seed, CellMaker};
pub use cof::ConstrainedOptimalFilter;
pub use crosstalk::{CrossTalkConfig, CrossTalkMaker};
pub use defects::{Defect, DefectIndex, DefectRule, DefectTable, DefectTarget};
pub use error::{Error, Result};
pub use filter::{of2_weights, CellEstimator, Estimate, FilterConfig, OptimalFilter};
pub use merge::{CellMerge, MergedCells};
pub use pulse::{add_gaussian_noise, PulseConfig, PulseGenerator, BUNCH_SPACING_NS};
pub use shape::{PulseShape, ShaperSource};
