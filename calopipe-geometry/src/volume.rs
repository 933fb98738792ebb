//! Sampling volumes and their eta/phi lattice.
#![allow(clippy::cast_possible_truncation)]

use calopipe_core::{CaloSampling, CellGeometry, CellId};
use serde::{Deserialize, Serialize};

use crate::binning::{
    eta, find_bin, phi_edge_count, phi_edges, round_edge, stepped_edge_count, stepped_edges,
};
use crate::error::{Error, Result};

/// Largest eta bin count the cell hash layout can address.
const MAX_ETA_BINS: usize = 10_000;
/// Largest phi bin count the cell hash layout can address.
const MAX_PHI_BINS: usize = 1_000;

/// Physical description of one sampling volume, as supplied by the geometry
/// construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeDescriptor {
    /// Unique volume name.
    pub name: String,
    /// Sampling layer the volume reads out.
    pub sampling: CaloSampling,
    /// Module name used by defect tables (defaults to the volume name).
    #[serde(default)]
    pub module: Option<String>,
    /// Inner radius (mm).
    pub rmin: f64,
    /// Outer radius (mm).
    pub rmax: f64,
    /// Lower z boundary (mm).
    pub zmin: f64,
    /// Upper z boundary (mm).
    pub zmax: f64,
    /// Cell width in eta.
    pub delta_eta: f64,
    /// Cell width in phi.
    pub delta_phi: f64,
    /// Absorber material code.
    #[serde(default)]
    pub absorber_material: String,
    /// Active gap material code.
    #[serde(default)]
    pub gap_material: String,
    /// Overrides the computed lower eta edge.
    #[serde(default)]
    pub eta_min: Option<f64>,
    /// Overrides the computed upper eta edge.
    #[serde(default)]
    pub eta_max: Option<f64>,
    /// Key of the cell collection digitized from this volume.
    #[serde(default)]
    pub collection_key: Option<String>,
}

impl VolumeDescriptor {
    /// Creates a descriptor with no material codes and no overrides.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        sampling: CaloSampling,
        rmin: f64,
        rmax: f64,
        zmin: f64,
        zmax: f64,
        delta_eta: f64,
        delta_phi: f64,
    ) -> Self {
        Self {
            name: name.into(),
            sampling,
            module: None,
            rmin,
            rmax,
            zmin,
            zmax,
            delta_eta,
            delta_phi,
            absorber_material: String::new(),
            gap_material: String::new(),
            eta_min: None,
            eta_max: None,
            collection_key: None,
        }
    }

    /// Sets the module name.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets absorber and gap material codes.
    #[must_use]
    pub fn with_materials(mut self, absorber: impl Into<String>, gap: impl Into<String>) -> Self {
        self.absorber_material = absorber.into();
        self.gap_material = gap.into();
        self
    }

    /// Overrides the eta edges.
    #[must_use]
    pub fn with_eta_range(mut self, eta_min: Option<f64>, eta_max: Option<f64>) -> Self {
        self.eta_min = eta_min;
        self.eta_max = eta_max;
        self
    }

    /// Sets the cell collection key.
    #[must_use]
    pub fn with_collection_key(mut self, key: impl Into<String>) -> Self {
        self.collection_key = Some(key.into());
        self
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidVolume {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.rmin < 0.0 || self.rmax <= self.rmin {
            return Err(self.invalid(format!(
                "radii must satisfy 0 <= rmin < rmax (got {} / {})",
                self.rmin, self.rmax
            )));
        }
        if self.zmax <= self.zmin {
            return Err(self.invalid(format!(
                "zmin {} must be below zmax {}",
                self.zmin, self.zmax
            )));
        }
        if !(self.delta_eta > 0.0) {
            return Err(self.invalid("delta_eta must be positive"));
        }
        if !(self.delta_phi > 0.0 && self.delta_phi <= 2.0 * std::f64::consts::PI) {
            return Err(self.invalid("delta_phi must lie in (0, 2pi]"));
        }
        Ok(())
    }
}

/// How depth maps onto the cell centre position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Depth runs along the radius; cells sit at the mid radius.
    Barrel,
    /// Depth runs along z; cells sit at the mid z plane.
    Endcap,
}

/// A sampling volume with its derived lattice.
///
/// `eta_min` and `eta_max` follow the construction convention: for volumes
/// entirely at negative z they refer to |eta|, so `eta_min` is the edge
/// nearest to zero and `eta_max` the most forward one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SamplingVolume {
    descriptor: VolumeDescriptor,
    module: u32,
    module_name: String,
    collection_key: String,
    orientation: Orientation,
    eta_bins: Vec<f64>,
    phi_bins: Vec<f64>,
    eta_min: f64,
    eta_max: f64,
}

impl SamplingVolume {
    /// Builds the lattice of a volume placed at position `module` in the layout.
    pub fn build(descriptor: VolumeDescriptor, module: u32) -> Result<Self> {
        descriptor.validate()?;
        if phi_edge_count(descriptor.delta_phi) > MAX_PHI_BINS {
            return Err(descriptor.invalid(format!(
                "delta_phi {} gives more than {MAX_PHI_BINS} phi edges",
                descriptor.delta_phi
            )));
        }

        let (eta_bins, eta_min, eta_max) = eta_lattice(&descriptor)?;
        if eta_bins.len() < 2 {
            return Err(descriptor.invalid("eta range is narrower than one cell"));
        }
        if eta_bins.windows(2).any(|w| w[1] <= w[0]) {
            return Err(descriptor.invalid("eta edges are not strictly increasing"));
        }
        let phi_bins = phi_edges(descriptor.delta_phi);
        if eta_bins.len() > MAX_ETA_BINS || phi_bins.len() > MAX_PHI_BINS {
            return Err(descriptor.invalid(format!(
                "lattice of {}x{} edges exceeds the addressable cell range",
                eta_bins.len(),
                phi_bins.len()
            )));
        }

        let orientation = if descriptor.zmin < 0.0 && descriptor.zmax > 0.0 {
            Orientation::Barrel
        } else if descriptor.zmax - descriptor.zmin <= descriptor.rmax - descriptor.rmin {
            Orientation::Endcap
        } else {
            Orientation::Barrel
        };

        let module_name = descriptor
            .module
            .clone()
            .unwrap_or_else(|| descriptor.name.clone());
        let collection_key = descriptor
            .collection_key
            .clone()
            .unwrap_or_else(|| format!("Collection_{}", descriptor.name));

        Ok(Self {
            descriptor,
            module,
            module_name,
            collection_key,
            orientation,
            eta_bins,
            phi_bins,
            eta_min,
            eta_max,
        })
    }

    /// Volume name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Sampling layer.
    pub fn sampling(&self) -> CaloSampling {
        self.descriptor.sampling
    }

    /// Physical description the lattice was built from.
    pub fn descriptor(&self) -> &VolumeDescriptor {
        &self.descriptor
    }

    /// Module index (position in the layout).
    pub fn module(&self) -> u32 {
        self.module
    }

    /// Module name used by defect tables.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Key of the cell collection digitized from this volume.
    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    /// Depth orientation.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Eta bin edges, strictly increasing.
    pub fn eta_bins(&self) -> &[f64] {
        &self.eta_bins
    }

    /// Phi bin edges from -pi to pi.
    pub fn phi_bins(&self) -> &[f64] {
        &self.phi_bins
    }

    /// Lower eta edge (see the type documentation for negative-z volumes).
    pub fn eta_min(&self) -> f64 {
        self.eta_min
    }

    /// Upper eta edge (see the type documentation for negative-z volumes).
    pub fn eta_max(&self) -> f64 {
        self.eta_max
    }

    /// Number of cells along eta.
    pub fn n_eta(&self) -> u32 {
        (self.eta_bins.len() - 1) as u32
    }

    /// Number of cells along phi.
    pub fn n_phi(&self) -> u32 {
        (self.phi_bins.len() - 1) as u32
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        self.n_eta() as usize * self.n_phi() as usize
    }

    /// Returns true if `eta` falls inside the lattice.
    pub fn contains_eta(&self, eta: f64) -> bool {
        find_bin(&self.eta_bins, eta).is_some()
    }

    /// Cell containing the point, if any.
    pub fn find_cell(&self, eta: f64, phi: f64) -> Option<CellId> {
        let eta_bin = find_bin(&self.eta_bins, eta)?;
        let phi_bin = find_bin(&self.phi_bins, phi)?;
        Some(self.cell_id(eta_bin as u32, phi_bin as u32))
    }

    /// Identity of the cell at the given bin indices.
    pub fn cell_id(&self, eta_bin: u32, phi_bin: u32) -> CellId {
        CellId::new(self.descriptor.sampling, self.module, eta_bin, phi_bin)
    }

    /// Centre position and size of the cell at the given bin indices.
    pub fn cell_geometry(&self, eta_bin: u32, phi_bin: u32) -> CellGeometry {
        let (e0, e1) = (
            self.eta_bins[eta_bin as usize],
            self.eta_bins[eta_bin as usize + 1],
        );
        let (p0, p1) = (
            self.phi_bins[phi_bin as usize],
            self.phi_bins[phi_bin as usize + 1],
        );
        let eta = (e0 + e1) / 2.0;
        let d = &self.descriptor;
        let (radius, z) = match self.orientation {
            Orientation::Barrel => {
                let r = (d.rmin + d.rmax) / 2.0;
                (r, r * eta.sinh())
            }
            Orientation::Endcap => {
                let z = (d.zmin + d.zmax) / 2.0;
                let s = eta.sinh();
                let r = if s.abs() > f64::EPSILON { z / s } else { d.rmax };
                (r.abs(), z)
            }
        };
        CellGeometry {
            eta,
            phi: (p0 + p1) / 2.0,
            deta: e1 - e0,
            dphi: p1 - p0,
            radius,
            z,
        }
    }

    /// Every cell of the lattice, eta-major.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, CellGeometry)> + '_ {
        (0..self.n_eta()).flat_map(move |ie| {
            (0..self.n_phi()).map(move |ip| (self.cell_id(ie, ip), self.cell_geometry(ie, ip)))
        })
    }
}

/// Eta edges of a volume with the reported (min, max) pair.
fn bounded_edges(d: &VolumeDescriptor, start: f64, stop: f64, step: f64) -> Result<Vec<f64>> {
    let count = stepped_edge_count(start, stop, step);
    if count > MAX_ETA_BINS {
        return Err(d.invalid(format!(
            "delta_eta {} gives more than {MAX_ETA_BINS} eta edges",
            d.delta_eta
        )));
    }
    Ok(stepped_edges(start, stop, step))
}

fn eta_lattice(d: &VolumeDescriptor) -> Result<(Vec<f64>, f64, f64)> {
    let step = d.delta_eta;
    if d.zmin > 0.0 {
        // entirely at positive z
        let lo = d.eta_min.map_or_else(|| eta(d.rmax, d.zmin), Ok)?;
        let hi = d.eta_max.map_or_else(|| eta(d.rmin, d.zmax), Ok)?;
        let bins = bounded_edges(d, round_edge(lo), round_edge(hi), step)?;
        let (first, last) = (bins[0], bins[bins.len() - 1]);
        Ok((bins, first, last))
    } else if d.zmax < 0.0 {
        // entirely at negative z: step away from zero, then flip
        let inner = d.eta_min.map_or_else(|| eta(d.rmax, d.zmax), Ok)?;
        let outer = d.eta_max.map_or_else(|| eta(d.rmin, d.zmin), Ok)?;
        let mut bins = bounded_edges(d, round_edge(inner), round_edge(outer), -step)?;
        bins.reverse();
        let (first, last) = (bins[0], bins[bins.len() - 1]);
        Ok((bins, last, first))
    } else {
        // straddles z = 0: both halves start on the shared eta = 0 edge
        let center = round_edge(eta(d.rmax, 0.0)?);
        let right_end = d.eta_max.map_or_else(|| eta(d.rmin, d.zmax), Ok)?;
        let left_end = d.eta_min.map_or_else(|| eta(d.rmin, d.zmin), Ok)?;
        let right = bounded_edges(d, center, round_edge(right_end), step)?;
        let mut left = bounded_edges(d, center, round_edge(left_end), -step)?;
        left.reverse();
        left.extend_from_slice(&right[1..]);
        let (first, last) = (left[0], left[left.len() - 1]);
        Ok((left, first, last))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::binning::eta as eta_of;
    use approx::assert_abs_diff_eq;

    fn endcap() -> VolumeDescriptor {
        VolumeDescriptor::new(
            "EMEC2_A",
            CaloSampling::EMEC2,
            1500.0,
            2000.0,
            3000.0,
            3500.0,
            0.1,
            0.1,
        )
    }

    #[test]
    fn test_positive_side_lattice() {
        let vol = SamplingVolume::build(endcap(), 0).unwrap();
        let bins = vol.eta_bins();
        assert_eq!(bins[0], round_edge(eta_of(2000.0, 3000.0).unwrap()));
        assert_eq!(
            bins[bins.len() - 1],
            round_edge(eta_of(1500.0, 3500.0).unwrap())
        );
        assert_eq!(vol.eta_min(), bins[0]);
        assert_eq!(vol.eta_max(), bins[bins.len() - 1]);
        assert_eq!(vol.phi_bins().len(), 63);
        assert!(bins.windows(2).all(|w| w[1] > w[0]));
        for &edge in bins {
            assert_eq!(edge, round_edge(edge));
        }
    }

    #[test]
    fn test_negative_side_mirrors_positive() {
        let mut desc = endcap();
        desc.name = "EMEC2_C".into();
        desc.zmin = -3500.0;
        desc.zmax = -3000.0;
        let neg = SamplingVolume::build(desc, 1).unwrap();
        let pos = SamplingVolume::build(endcap(), 0).unwrap();

        let mirrored: Vec<f64> = pos.eta_bins().iter().rev().map(|e| -e).collect();
        assert_eq!(neg.eta_bins(), &mirrored[..]);
        // |eta| convention: eta_min is the inner edge
        assert_eq!(neg.eta_min(), -pos.eta_min());
        assert_eq!(neg.eta_max(), -pos.eta_max());
    }

    #[test]
    fn test_straddling_volume_has_single_zero_edge() {
        let desc = VolumeDescriptor::new(
            "EMB2",
            CaloSampling::EMB2,
            1580.0,
            1850.0,
            -3200.0,
            3200.0,
            0.025,
            std::f64::consts::PI / 128.0,
        );
        let vol = SamplingVolume::build(desc, 0).unwrap();
        let bins = vol.eta_bins();
        assert_eq!(bins.iter().filter(|&&e| e == 0.0).count(), 1);
        assert!(bins.windows(2).all(|w| w[1] > w[0]));
        assert_abs_diff_eq!(bins[0], -bins[bins.len() - 1], epsilon = 1e-9);
        assert_eq!(vol.orientation(), Orientation::Barrel);
    }

    #[test]
    fn test_overrides() {
        let vol = SamplingVolume::build(endcap().with_eta_range(Some(1.3), Some(1.5)), 0).unwrap();
        assert_eq!(vol.eta_bins(), &[1.3, 1.4, 1.5]);
    }

    #[test]
    fn test_find_cell_round_trip() {
        let vol = SamplingVolume::build(endcap(), 4).unwrap();
        let geo = vol.cell_geometry(2, 10);
        let id = vol.find_cell(geo.eta, geo.phi).unwrap();
        assert_eq!((id.eta_bin, id.phi_bin, id.module), (2, 10, 4));
        assert_eq!(vol.orientation(), Orientation::Endcap);
        assert_abs_diff_eq!(geo.z, 3250.0, epsilon = 1e-9);
    }

    #[test]
    fn test_oversized_lattice_rejected_before_building() {
        let mut fine_phi = endcap();
        fine_phi.delta_phi = 1e-11;
        assert!(matches!(
            SamplingVolume::build(fine_phi, 0),
            Err(Error::InvalidVolume { .. })
        ));

        let mut fine_eta = endcap();
        fine_eta.delta_eta = 1e-12;
        let err = SamplingVolume::build(fine_eta, 0).unwrap_err();
        assert!(err.to_string().contains("delta_eta"));

        let mut barrel = endcap();
        barrel.zmin = -3500.0;
        barrel.delta_eta = 1e-12;
        assert!(SamplingVolume::build(barrel, 0).is_err());
    }

    #[test]
    fn test_invalid_radii() {
        let mut desc = endcap();
        desc.rmax = 1000.0;
        assert!(matches!(
            SamplingVolume::build(desc, 0),
            Err(Error::InvalidVolume { .. })
        ));
    }

    #[test]
    fn test_default_keys() {
        let vol = SamplingVolume::build(endcap(), 0).unwrap();
        assert_eq!(vol.collection_key(), "Collection_EMEC2_A");
        assert_eq!(vol.module_name(), "EMEC2_A");
        assert_eq!(vol.cells().count(), vol.n_cells());
    }
}
