#![allow(clippy::float_cmp)]
use std::io::Write;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use calopipe_core::{CaloSampling, EventInfo, Hit};
use calopipe_digit::{
    AnomalyGenerator, CellEstimator, CellMaker, CellMerge, CrossTalkConfig, CrossTalkMaker,
    DefectIndex, DefectTable, FilterConfig, PulseConfig, PulseGenerator,
};
use calopipe_geometry::{DetectorLayout, VolumeDescriptor};

fn layout() -> DetectorLayout {
    DetectorLayout::from_descriptors(vec![
        VolumeDescriptor::new("EMB1", CaloSampling::EMB1, 1500.0, 1590.0, -400.0, 400.0, 0.025, 0.2)
            .with_module("M0"),
        VolumeDescriptor::new("EMB2", CaloSampling::EMB2, 1590.0, 1850.0, -400.0, 400.0, 0.025, 0.1)
            .with_module("M1"),
    ])
    .unwrap()
}

fn defect_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"runs": [{{"StartEventNumber": 0, "EndEventNumber": 10,
                        "DeadModules": true, "NoiseStdFactor": 1.0, "Cells": ["M1"]}}]}}"#
    )
    .unwrap();
    file
}

fn maker(layout: &DetectorLayout, name: &str, index: &Arc<DefectIndex>) -> CellMaker {
    let volume = layout.volume(name).unwrap().clone();
    let pulse = PulseGenerator::new(PulseConfig::default().with_noise(0.0, 5.0)).unwrap();
    let estimator = CellEstimator::build(&FilterConfig::DerivedWeights, &pulse).unwrap();
    let stream = u64::from(volume.module());
    let anomaly = AnomalyGenerator::new(Arc::clone(index), 0.0, 5.0);
    CellMaker::new(volume, pulse, estimator, stream).with_anomaly(anomaly)
}

#[test]
fn test_dead_module_window() {
    let layout = layout();
    let file = defect_file();
    let table = DefectTable::from_file(file.path()).unwrap();
    let index = Arc::new(DefectIndex::build(&table, |n| layout.module_index(n)).unwrap());
    let emb1 = maker(&layout, "EMB1", &index);
    let emb2 = maker(&layout, "EMB2", &index);
    let hits = vec![
        Hit::new(CaloSampling::EMB1, 0.1, 0.3, 5_000.0),
        Hit::new(CaloSampling::EMB2, 0.1, 0.3, 30_000.0),
    ];

    let event = EventInfo::new(100, 5);
    let dead = emb2.make(&hits, &event, 1).unwrap();
    assert!(dead.iter().all(|c| c.energy == 0.0 && c.anomalous));
    let alive = emb1.make(&hits, &event, 1).unwrap();
    assert!(alive.iter().all(|c| !c.anomalous));
    assert!(alive.iter().any(|c| c.energy > 4_900.0));

    let later = emb2.make(&hits, &EventInfo::new(100, 11), 1).unwrap();
    assert!(later.iter().all(|c| !c.anomalous));
    assert!(later.iter().any(|c| c.energy > 29_900.0));
}

#[test]
fn test_cross_talk_then_merge() {
    let layout = layout();
    let index = Arc::new(DefectIndex::default());
    let emb1 = maker(&layout, "EMB1", &index);
    let emb2 = maker(&layout, "EMB2", &index);
    let hits = vec![
        Hit::new(CaloSampling::EMB1, -0.2, -1.0, 2_000.0),
        Hit::new(CaloSampling::EMB2, -0.2, -1.0, 40_000.0),
    ];
    let event = EventInfo::new(100, 3);

    let raw2 = emb2.make(&hits, &event, 8).unwrap();
    let xt = CrossTalkMaker::new(
        CrossTalkConfig::default(),
        emb2.estimator().clone(),
        0.0,
        emb2.volume(),
    )
    .unwrap();
    let adjusted2 = xt.apply(&raw2).unwrap();
    let raw1 = emb1.make(&hits, &event, 8).unwrap();

    let sum = |cells: &[calopipe_core::Cell]| cells.iter().map(|c| c.energy).sum::<f64>();
    assert_abs_diff_eq!(sum(raw2.as_slice()), sum(adjusted2.as_slice()), epsilon = 1e-6);

    let merge = CellMerge::new(["Collection_EMB1", "Collection_EMB2"]).unwrap();
    let merged = merge
        .merge(|key| match key {
            "Collection_EMB1" => Ok(raw1.as_slice()),
            _ => Ok(adjusted2.as_slice()),
        })
        .unwrap();
    assert_eq!(merged.cells.len(), raw1.len() + adjusted2.len());
    let truth_total: f64 = merged.truth.iter().map(|c| c.energy).sum();
    assert_eq!(truth_total, 42_000.0);
    assert!(merged
        .cells
        .iter()
        .all(|c| c.source.as_deref().is_some_and(|s| s.starts_with("Collection_"))));
}
