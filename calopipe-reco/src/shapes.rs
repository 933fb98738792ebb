//! Shower-shape and forward-moment computation.

use calopipe_core::{delta_phi, Cell, ForwardMoments, Layer, ShowerShapes};
use nalgebra::Vector3;

/// Lateral moment reference radius (mm).
const LATERAL_R0: f64 = 40.0;
/// Longitudinal moment reference depth (mm).
const LONGITUDINAL_L0: f64 = 100.0;

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Energy of the second-layer cells inside an `n_eta x n_phi` block of cells
/// centred on `center`.
fn window_energy(cells: &[&Cell], center: &Cell, n_eta: u32, n_phi: u32) -> f64 {
    let half_eta = f64::from(n_eta) / 2.0 * center.geometry.deta;
    let half_phi = f64::from(n_phi) / 2.0 * center.geometry.dphi;
    cells
        .iter()
        .filter(|c| c.id.sampling.layer() == Layer::Em2)
        .filter(|c| {
            (c.geometry.eta - center.geometry.eta).abs() < half_eta
                && delta_phi(c.geometry.phi, center.geometry.phi).abs() < half_phi
        })
        .map(|c| c.energy)
        .sum()
}

fn weta2(cells: &[&Cell], center: &Cell) -> f64 {
    let half_eta = 1.5 * center.geometry.deta;
    let half_phi = 2.5 * center.geometry.dphi;
    let (mut sum, mut s1, mut s2) = (0.0, 0.0, 0.0);
    for c in cells.iter().filter(|c| c.id.sampling.layer() == Layer::Em2) {
        if (c.geometry.eta - center.geometry.eta).abs() < half_eta
            && delta_phi(c.geometry.phi, center.geometry.phi).abs() < half_phi
        {
            sum += c.energy;
            s1 += c.energy * c.geometry.eta;
            s2 += c.energy * c.geometry.eta * c.geometry.eta;
        }
    }
    if sum <= 0.0 {
        return 0.0;
    }
    let mean = s1 / sum;
    (s2 / sum - mean * mean).max(0.0).sqrt()
}

/// Leading strip energy and the leading one away from its neighbours.
fn strip_maxima(cells: &[&Cell]) -> (f64, f64) {
    let strips: Vec<&Cell> = cells
        .iter()
        .copied()
        .filter(|c| c.id.sampling.layer() == Layer::Em1)
        .collect();
    let Some(first) = strips.iter().max_by(|a, b| a.energy.total_cmp(&b.energy)) else {
        return (0.0, 0.0);
    };
    let second = strips
        .iter()
        .filter(|c| {
            (c.geometry.eta - first.geometry.eta).abs() > 1.5 * first.geometry.deta
                || delta_phi(c.geometry.phi, first.geometry.phi).abs() > 0.5 * first.geometry.dphi
        })
        .map(|c| c.energy)
        .fold(0.0_f64, f64::max);
    (first.energy.max(0.0), second)
}

/// Electromagnetic shower shapes of a cluster's cells around its hottest
/// second-layer cell.
pub(crate) fn shower_shapes(cells: &[&Cell], center: &Cell, et: f64, eta: f64) -> ShowerShapes {
    let mut layers = [0.0; 4];
    let mut had_energy = 0.0;
    for c in cells {
        match c.id.sampling.layer() {
            Layer::PreSampler => layers[0] += c.energy,
            Layer::Em1 => layers[1] += c.energy,
            Layer::Em2 => layers[2] += c.energy,
            Layer::Em3 => layers[3] += c.energy,
            Layer::Had1 | Layer::Had2 | Layer::Had3 => had_energy += c.energy,
        }
    }
    let em_energy: f64 = layers.iter().sum();

    let e233 = window_energy(cells, center, 3, 3);
    let e237 = window_energy(cells, center, 3, 7);
    let e277 = window_energy(cells, center, 7, 7);
    let (emax1, emax2) = strip_maxima(cells);

    ShowerShapes {
        e233,
        e237,
        e277,
        reta: ratio(e237, e277),
        rphi: ratio(e233, e237),
        weta2: weta2(cells, center),
        eratio: ratio(emax1 - emax2, emax1 + emax2),
        emaxs1: emax1,
        f0: ratio(layers[0], em_energy),
        f1: ratio(layers[1], em_energy),
        f2: ratio(layers[2], em_energy),
        f3: ratio(layers[3], em_energy),
        rhad: ratio(had_energy / eta.cosh(), et),
        em_energy,
        had_energy,
    }
}

/// Moments along the shower axis, the line from the origin through the
/// energy-weighted barycentre. Only positive-energy cells contribute.
pub(crate) fn forward_moments(cells: &[&Cell], energy: f64) -> ForwardMoments {
    let points: Vec<(f64, Vector3<f64>)> = cells
        .iter()
        .filter(|c| c.energy > 0.0)
        .map(|c| (c.energy, Vector3::from(c.geometry.position())))
        .collect();
    let sum: f64 = points.iter().map(|(w, _)| w).sum();
    if sum <= 0.0 {
        return ForwardMoments::default();
    }

    let barycentre = points
        .iter()
        .fold(Vector3::zeros(), |acc, (w, x)| acc + x * *w)
        / sum;
    let axis = if barycentre.norm() > 0.0 {
        barycentre.normalize()
    } else {
        Vector3::z()
    };

    // (energy, r^2, lambda^2) per cell, hottest first
    let mut terms: Vec<(f64, f64, f64)> = points
        .iter()
        .map(|(w, x)| {
            let d = x - barycentre;
            let lambda = d.dot(&axis);
            let r2 = (d - axis * lambda).norm_squared();
            (*w, r2, lambda * lambda)
        })
        .collect();
    terms.sort_by(|a, b| b.0.total_cmp(&a.0));

    let second_r = terms.iter().map(|(w, r2, _)| w * r2).sum::<f64>() / sum;
    let second_lambda = terms.iter().map(|(w, _, l2)| w * l2).sum::<f64>() / sum;

    let leading: f64 = terms.iter().take(2).map(|(w, _, _)| w).sum();
    let lat: f64 = terms.iter().skip(2).map(|(w, r2, _)| w * r2).sum();
    let lng: f64 = terms.iter().skip(2).map(|(w, _, l2)| w * l2).sum();
    let lat_max = leading * LATERAL_R0 * LATERAL_R0;
    let lng_max = leading * LONGITUDINAL_L0 * LONGITUDINAL_L0;

    ForwardMoments {
        second_r,
        second_lambda,
        lambda_center: barycentre.dot(&axis),
        frac_max: ratio(terms[0].0, energy),
        lateral_mom: ratio(lat, lat + lat_max),
        longitudinal_mom: ratio(lng, lng + lng_max),
    }
}
