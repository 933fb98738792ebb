//! calopipe-geometry: Sampling volumes and their eta/phi granularity.
//!
//! Each [`SamplingVolume`] turns the physical extent of one calorimeter
//! layer into a rectangular eta/phi lattice. The [`DetectorLayout`] owns the
//! volumes, assigns module indices and resolves hits to cells.
//!

pub mod binning;
pub mod error;
pub mod layout;
pub mod volume;

pub use binning::{
    eta, find_bin, phi_edge_count, phi_edges, round_edge, stepped_edge_count, stepped_edges, theta,
    EDGE_DECIMALS,
};
pub use error::{Error, Result};
pub use layout::{reference_barrel_descriptors, DetectorLayout, LayoutDocument};
pub use volume::{Orientation, SamplingVolume, VolumeDescriptor};
