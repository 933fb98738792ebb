//! Detector layout: the ordered set of sampling volumes.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use calopipe_core::{CaloSampling, CellId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::volume::{SamplingVolume, VolumeDescriptor};

/// JSON geometry document: `{"volumes": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutDocument {
    pub volumes: Vec<VolumeDescriptor>,
}

/// Immutable set of sampling volumes built at configuration time.
///
/// The module index of a volume is its position in the layout. Module names
/// and collection keys are unique.
#[derive(Clone, Debug)]
pub struct DetectorLayout {
    volumes: Vec<SamplingVolume>,
    by_name: HashMap<String, usize>,
    by_module: HashMap<String, usize>,
}

impl DetectorLayout {
    /// Builds every volume of the layout.
    pub fn from_descriptors(descriptors: Vec<VolumeDescriptor>) -> Result<Self> {
        let mut volumes = Vec::with_capacity(descriptors.len());
        let mut by_name = HashMap::new();
        let mut by_module = HashMap::new();
        let mut keys = HashMap::new();

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let module = u32::try_from(index).map_err(|_| Error::InvalidVolume {
                name: descriptor.name.clone(),
                reason: "too many volumes".into(),
            })?;
            let volume = SamplingVolume::build(descriptor, module)?;
            if by_name.insert(volume.name().to_string(), index).is_some() {
                return Err(Error::Duplicate {
                    what: "volume",
                    name: volume.name().to_string(),
                });
            }
            if by_module
                .insert(volume.module_name().to_string(), index)
                .is_some()
            {
                return Err(Error::Duplicate {
                    what: "module",
                    name: volume.module_name().to_string(),
                });
            }
            if keys
                .insert(volume.collection_key().to_string(), index)
                .is_some()
            {
                return Err(Error::Duplicate {
                    what: "collection key",
                    name: volume.collection_key().to_string(),
                });
            }
            debug!(
                volume = volume.name(),
                sampling = %volume.sampling(),
                n_eta = volume.n_eta(),
                n_phi = volume.n_phi(),
                "Built sampling volume"
            );
            volumes.push(volume);
        }

        info!(volumes = volumes.len(), "Detector layout ready");
        Ok(Self {
            volumes,
            by_name,
            by_module,
        })
    }

    /// Parses a geometry document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: LayoutDocument = serde_json::from_str(json)?;
        Self::from_descriptors(doc.volumes)
    }

    /// Reads a geometry document from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Descriptors the layout was built from, as a document.
    pub fn document(&self) -> LayoutDocument {
        LayoutDocument {
            volumes: self.volumes.iter().map(|v| v.descriptor().clone()).collect(),
        }
    }

    /// All volumes in module order.
    pub fn volumes(&self) -> &[SamplingVolume] {
        &self.volumes
    }

    /// Number of volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Returns true if the layout has no volumes.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Volume by name.
    pub fn volume(&self, name: &str) -> Option<&SamplingVolume> {
        self.by_name.get(name).map(|&i| &self.volumes[i])
    }

    /// Volume by module index.
    pub fn volume_by_module(&self, module: u32) -> Option<&SamplingVolume> {
        self.volumes.get(module as usize)
    }

    /// Module index of a module name.
    pub fn module_index(&self, module_name: &str) -> Option<u32> {
        self.by_module
            .get(module_name)
            .map(|&i| self.volumes[i].module())
    }

    /// Volumes reading out one sampling.
    pub fn volumes_for(&self, sampling: CaloSampling) -> impl Iterator<Item = &SamplingVolume> {
        self.volumes.iter().filter(move |v| v.sampling() == sampling)
    }

    /// Volume and cell containing a point of a sampling.
    pub fn locate(&self, sampling: CaloSampling, eta: f64, phi: f64) -> Option<(&SamplingVolume, CellId)> {
        self.volumes_for(sampling)
            .find_map(|v| v.find_cell(eta, phi).map(|id| (v, id)))
    }

    /// Total number of cells across all volumes.
    pub fn n_cells(&self) -> usize {
        self.volumes.iter().map(SamplingVolume::n_cells).sum()
    }

    /// A compact barrel detector: presampler, three EM layers and three
    /// hadronic tile layers, all centred on z = 0.
    pub fn reference_barrel() -> Result<Self> {
        Self::from_descriptors(reference_barrel_descriptors())
    }
}

/// Descriptors of [`DetectorLayout::reference_barrel`].
pub fn reference_barrel_descriptors() -> Vec<VolumeDescriptor> {
    let em = |name: &str, sampling, rmin, rmax, deta, dphi| {
        VolumeDescriptor::new(name, sampling, rmin, rmax, -1200.0, 1200.0, deta, dphi)
            .with_materials("Lead", "LAr")
    };
    let tile = |name: &str, sampling, rmin, rmax, deta| {
        VolumeDescriptor::new(name, sampling, rmin, rmax, -2800.0, 2800.0, deta, PI / 32.0)
            .with_materials("Iron", "Scintillator")
    };
    vec![
        em("PSB", CaloSampling::PSB, 1410.0, 1440.0, 0.025, PI / 32.0),
        em("EMB1", CaloSampling::EMB1, 1500.0, 1590.0, 0.0125, PI / 32.0),
        em("EMB2", CaloSampling::EMB2, 1590.0, 1850.0, 0.025, PI / 128.0),
        em("EMB3", CaloSampling::EMB3, 1850.0, 1980.0, 0.05, PI / 128.0),
        tile("TileCal1", CaloSampling::TileCal1, 2300.0, 2600.0, 0.1),
        tile("TileCal2", CaloSampling::TileCal2, 2600.0, 3440.0, 0.1),
        tile("TileCal3", CaloSampling::TileCal3, 3440.0, 3820.0, 0.2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_barrel() {
        let layout = DetectorLayout::reference_barrel().unwrap();
        assert_eq!(layout.len(), 7);
        assert_eq!(layout.module_index("EMB2"), Some(2));
        let emb2 = layout.volume("EMB2").unwrap();
        assert_eq!(emb2.n_phi(), 256);
        assert_eq!(emb2.collection_key(), "Collection_EMB2");
    }

    #[test]
    fn test_locate() {
        let layout = DetectorLayout::reference_barrel().unwrap();
        let (vol, id) = layout.locate(CaloSampling::EMB2, 0.01, 0.0).unwrap();
        assert_eq!(vol.name(), "EMB2");
        assert_eq!(id.module, 2);
        assert!(layout.locate(CaloSampling::EMB2, 3.0, 0.0).is_none());
        assert!(layout.locate(CaloSampling::EMEC2, 0.01, 0.0).is_none());
    }

    #[test]
    fn test_duplicate_module_rejected() {
        let mut descs = reference_barrel_descriptors();
        descs[1].module = Some("PSB".into());
        assert!(matches!(
            DetectorLayout::from_descriptors(descs),
            Err(Error::Duplicate { what: "module", .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"volumes": [], "extra": 1}"#;
        assert!(matches!(
            DetectorLayout::from_json_str(json),
            Err(Error::Json(_))
        ));
    }
}
