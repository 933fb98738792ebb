//! Calorimeter sampling taxonomy.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Readout technology family of a sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Detector {
    /// Liquid-argon electromagnetic calorimeter (barrel and endcap).
    Lar,
    /// Scintillating-tile hadronic calorimeter.
    Tile,
    /// Hadronic endcap.
    Hec,
}

/// Longitudinal layer role, independent of barrel/endcap placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Layer {
    PreSampler,
    Em1,
    Em2,
    Em3,
    Had1,
    Had2,
    Had3,
}

/// One calorimeter sampling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CaloSampling {
    PSB,
    PSE,
    EMB1,
    EMB2,
    EMB3,
    TileCal1,
    TileCal2,
    TileCal3,
    TileExt1,
    TileExt2,
    TileExt3,
    EMEC1,
    EMEC2,
    EMEC3,
    HEC1,
    HEC2,
    HEC3,
}

impl CaloSampling {
    /// All samplings, in declaration order.
    pub const ALL: [CaloSampling; 17] = [
        Self::PSB,
        Self::PSE,
        Self::EMB1,
        Self::EMB2,
        Self::EMB3,
        Self::TileCal1,
        Self::TileCal2,
        Self::TileCal3,
        Self::TileExt1,
        Self::TileExt2,
        Self::TileExt3,
        Self::EMEC1,
        Self::EMEC2,
        Self::EMEC3,
        Self::HEC1,
        Self::HEC2,
        Self::HEC3,
    ];

    /// Readout family of this sampling.
    pub fn detector(self) -> Detector {
        match self {
            Self::TileCal1
            | Self::TileCal2
            | Self::TileCal3
            | Self::TileExt1
            | Self::TileExt2
            | Self::TileExt3 => Detector::Tile,
            Self::HEC1 | Self::HEC2 | Self::HEC3 => Detector::Hec,
            _ => Detector::Lar,
        }
    }

    /// Longitudinal role of this sampling.
    pub fn layer(self) -> Layer {
        match self {
            Self::PSB | Self::PSE => Layer::PreSampler,
            Self::EMB1 | Self::EMEC1 => Layer::Em1,
            Self::EMB2 | Self::EMEC2 => Layer::Em2,
            Self::EMB3 | Self::EMEC3 => Layer::Em3,
            Self::TileCal1 | Self::TileExt1 | Self::HEC1 => Layer::Had1,
            Self::TileCal2 | Self::TileExt2 | Self::HEC2 => Layer::Had2,
            Self::TileCal3 | Self::TileExt3 | Self::HEC3 => Layer::Had3,
        }
    }

    /// Whether the sampling belongs to the electromagnetic section.
    pub fn is_em(self) -> bool {
        matches!(
            self.layer(),
            Layer::PreSampler | Layer::Em1 | Layer::Em2 | Layer::Em3
        )
    }

    /// Second EM layers are the only ones wired for cross-talk simulation.
    pub fn has_cross_talk(self) -> bool {
        matches!(self, Self::EMB2 | Self::EMEC2)
    }

    /// Short name used in collection keys and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::PSB => "PSB",
            Self::PSE => "PSE",
            Self::EMB1 => "EMB1",
            Self::EMB2 => "EMB2",
            Self::EMB3 => "EMB3",
            Self::TileCal1 => "TileCal1",
            Self::TileCal2 => "TileCal2",
            Self::TileCal3 => "TileCal3",
            Self::TileExt1 => "TileExt1",
            Self::TileExt2 => "TileExt2",
            Self::TileExt3 => "TileExt3",
            Self::EMEC1 => "EMEC1",
            Self::EMEC2 => "EMEC2",
            Self::EMEC3 => "EMEC3",
            Self::HEC1 => "HEC1",
            Self::HEC2 => "HEC2",
            Self::HEC3 => "HEC3",
        }
    }
}

impl fmt::Display for CaloSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
