#![allow(clippy::float_cmp)]
use approx::assert_abs_diff_eq;
use calopipe_core::{Cell, Layer, Seed};
use calopipe_geometry::DetectorLayout;
use calopipe_reco::{
    ClusterConfig, ClusterMaker, CutMenu, ElectronBuilder, ElectronConfig, RingsBuilder,
    RingsConfig,
};

const SHOWER_ETA: f64 = 0.31;
const SHOWER_PHI: f64 = -1.02;

/// Cells of the reference barrel carrying a compact electromagnetic shower.
fn shower_cells() -> Vec<Cell> {
    let layout = DetectorLayout::reference_barrel().unwrap();
    let mut cells = Vec::new();
    for volume in layout.volumes() {
        let (scale, width) = match volume.sampling().layer() {
            Layer::PreSampler => (1_000.0, 0.03),
            Layer::Em1 => (8_000.0, 0.02),
            Layer::Em2 => (30_000.0, 0.015),
            Layer::Em3 => (1_000.0, 0.03),
            _ => (200.0, 0.1),
        };
        for (id, geometry) in volume.cells() {
            let deta = geometry.eta - SHOWER_ETA;
            let dphi = calopipe_core::delta_phi(geometry.phi, SHOWER_PHI);
            if deta.abs() > 0.3 || dphi.abs() > 0.3 {
                continue;
            }
            let mut cell = Cell::new(id, geometry);
            let r2 = (deta * deta + dphi * dphi) / (width * width);
            cell.energy = scale * (-0.5 * r2).exp() * geometry.deta * geometry.dphi
                / (2.0 * std::f64::consts::PI * width * width);
            cells.push(cell);
        }
    }
    cells
}

#[test]
fn test_single_shower_through_reconstruction() {
    let cells = shower_cells();
    let seeds = [Seed::new(0, SHOWER_ETA, SHOWER_PHI), Seed::new(1, -0.8, 2.0)];

    let clusters = ClusterMaker::new(ClusterConfig::default().with_min_center_energy(500.0))
        .unwrap()
        .build(&cells, &seeds);
    assert_eq!(clusters.len(), 1);
    let cluster = &clusters[0];
    assert_abs_diff_eq!(cluster.eta, SHOWER_ETA, epsilon = 0.01);
    assert_abs_diff_eq!(cluster.phi, SHOWER_PHI, epsilon = 0.01);
    assert!(cluster.shapes.f2 > 0.5);
    assert!(cluster.shapes.f1 > 0.1);
    assert!(cluster.shapes.reta > 0.9);

    let rings = RingsBuilder::new(RingsConfig::default()).unwrap().build(&clusters);
    assert_eq!(rings.len(), 1);
    assert_eq!(rings[0].len(), 100);
    let middle = rings[0].layer(2).unwrap();
    assert!(middle[0] > middle[3]);
    assert!(rings[0].total() <= cluster.energy + 1e-6);

    let electrons = ElectronBuilder::new(
        ElectronConfig::default()
            .with_min_et(1_000.0)
            .with_menus(CutMenu::reference_menus()),
    )
    .unwrap()
    .build(&clusters, &rings)
    .unwrap();
    assert_eq!(electrons.len(), 1);
    assert_eq!(electrons[0].seed_id, 0);
    assert_eq!(electrons[0].rings, rings[0].rings);
    assert!(electrons[0].passed("loose"));
}
