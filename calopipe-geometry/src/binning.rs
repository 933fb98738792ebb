//! Eta/phi lattice construction.
//!
//! All bin edges are rounded to four decimals. Downstream lookups compare
//! edges for exact equality, so the rounding is part of the contract.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use std::f64::consts::{FRAC_PI_2, PI};

use crate::error::{Error, Result};

/// Decimal places kept on every bin edge.
pub const EDGE_DECIMALS: i32 = 4;

/// Tolerance used when comparing rounded edges.
const EDGE_TOLERANCE: f64 = 0.5e-4;

/// Rounds a value to [`EDGE_DECIMALS`] decimals.
#[inline]
pub fn round_edge(value: f64) -> f64 {
    let scale = 10f64.powi(EDGE_DECIMALS);
    (value * scale).round() / scale
}

/// Polar angle of a point at transverse radius `r` and longitudinal `z`.
#[inline]
pub fn theta(r: f64, z: f64) -> f64 {
    if z == 0.0 {
        FRAC_PI_2
    } else {
        r.atan2(z)
    }
}

/// Pseudorapidity for a polar angle.
///
/// Falls back to `-ln(tan((theta + pi) / 2))` when `tan(theta / 2)` leaves
/// the domain of the logarithm.
pub fn theta_to_eta(theta: f64) -> Option<f64> {
    let t = (theta / 2.0).tan();
    if t.is_finite() && t > 0.0 {
        return Some(-t.ln());
    }
    let t = ((theta + PI) / 2.0).tan();
    let eta = -t.abs().ln();
    eta.is_finite().then_some(eta)
}

/// Pseudorapidity of a point at transverse radius `r` and longitudinal `z`.
pub fn eta(r: f64, z: f64) -> Result<f64> {
    theta_to_eta(theta(r, z)).ok_or(Error::DegenerateEta { r, z })
}

/// Uniform edges from `start` towards `stop` in steps of `step`.
///
/// `step` may be negative. The sequence always ends exactly on `stop`: when
/// the last regular edge falls short by more than half a step the boundary
/// is appended, otherwise it replaces the last regular edge.
pub fn stepped_edges(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let start = round_edge(start);
    let stop = round_edge(stop);
    let span = (stop - start) / step;
    if !span.is_finite() || span <= EDGE_TOLERANCE {
        return vec![start];
    }

    let count = (span - 1e-9).ceil().max(1.0) as usize;
    let mut edges: Vec<f64> = (0..count)
        .map(|k| round_edge(start + k as f64 * step))
        .collect();

    let last = edges[edges.len() - 1];
    let gap = (stop - last).abs();
    if gap <= EDGE_TOLERANCE {
        return edges;
    }
    if gap < step.abs() / 2.0 && edges.len() > 1 {
        edges.pop();
    }
    edges.push(stop);
    edges
}

/// Number of edges [`stepped_edges`] would return, without building them.
///
/// Saturates for vanishing steps.
pub fn stepped_edge_count(start: f64, stop: f64, step: f64) -> usize {
    let span = (round_edge(stop) - round_edge(start)) / step;
    if span.is_nan() || span <= EDGE_TOLERANCE {
        return 1;
    }
    ((span - 1e-9).ceil().max(1.0) + 1.0) as usize
}

/// Number of edges [`phi_edges`] would return, without building them.
pub fn phi_edge_count(delta_phi: f64) -> usize {
    (((2.0 * PI / delta_phi) + 1e-6).floor().max(1.0) as usize).saturating_add(1)
}

/// Phi edges covering `[-pi, pi]` inclusive of both ends.
///
/// The lattice holds `floor(2 pi / delta_phi)` equal bins, so for a step that
/// divides the circle the edges are exactly `delta_phi` apart.
pub fn phi_edges(delta_phi: f64) -> Vec<f64> {
    let bins = phi_edge_count(delta_phi) - 1;
    let width = 2.0 * PI / bins as f64;
    (0..=bins)
        .map(|k| {
            if k == bins {
                round_edge(PI)
            } else {
                round_edge(-PI + k as f64 * width)
            }
        })
        .collect()
}

/// Index of the bin containing `value`, for increasing `edges`.
///
/// The upper boundary belongs to the last bin.
pub fn find_bin(edges: &[f64], value: f64) -> Option<usize> {
    let n = edges.len();
    if n < 2 || !value.is_finite() || value < edges[0] || value > edges[n - 1] {
        return None;
    }
    let idx = edges.partition_point(|&edge| edge <= value);
    Some(idx.saturating_sub(1).min(n - 2))
}
