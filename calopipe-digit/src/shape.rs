//! Normalized analog pulse shapes.
//!
//! A shape is stored as a table of (time, amplitude) points. The time axis
//! is shifted so the maximum sits at `t = 0` and the amplitudes are scaled
//! to a unit peak, so `E * shape(t - t0)` is the response to a deposit `E`
//! arriving at `t0`.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest tabulated analytic shape.
const MAX_SHAPE_POINTS: f64 = 100_000.0;

/// Where a pulse shape comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ShaperSource {
    /// Two-column text file: time (ns) and amplitude.
    File { path: String },
    /// Analytic CR-RC² response with shaping time `tau` (ns).
    CrRc2 {
        tau: f64,
        #[serde(default = "default_resolution")]
        resolution: f64,
    },
}

fn default_resolution() -> f64 {
    0.5
}

impl Default for ShaperSource {
    fn default() -> Self {
        Self::CrRc2 {
            tau: 15.0,
            resolution: default_resolution(),
        }
    }
}

impl ShaperSource {
    /// Loads or builds the shape.
    pub fn load(&self) -> Result<PulseShape> {
        match self {
            Self::File { path } => PulseShape::from_shaper_file(path),
            Self::CrRc2 { tau, resolution } => PulseShape::cr_rc2(*tau, *resolution),
        }
    }
}

/// Tabulated pulse shape with a unit peak at `t = 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct PulseShape {
    times: Vec<f64>,
    values: Vec<f64>,
    resolution: f64,
}

impl PulseShape {
    /// Builds a shape from raw points, normalizing time origin and peak.
    pub fn from_samples(times: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if times.len() != values.len() {
            return Err(Error::InvalidShape(format!(
                "{} times for {} amplitudes",
                times.len(),
                values.len()
            )));
        }
        if times.len() < 2 {
            return Err(Error::InvalidShape("need at least two points".into()));
        }
        if times.iter().chain(&values).any(|v| !v.is_finite()) {
            return Err(Error::InvalidShape("non-finite point".into()));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidShape(
                "time column must be strictly increasing".into(),
            ));
        }

        let (peak_index, peak) = values
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
                if v > best.1 {
                    (i, v)
                } else {
                    best
                }
            });
        if peak <= 0.0 {
            return Err(Error::InvalidShape("shape has no positive peak".into()));
        }

        let t0 = times[peak_index];
        let resolution = times
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(f64::INFINITY, f64::min);
        Ok(Self {
            times: times.into_iter().map(|t| t - t0).collect(),
            values: values.into_iter().map(|v| v / peak).collect(),
            resolution,
        })
    }

    /// Reads a two-column shaper file. Blank lines and `#` comments are ignored.
    pub fn from_shaper_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut times = Vec::new();
        let mut values = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let bad = |reason: String| Error::ShaperFile {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            };
            let mut cols = line.split_whitespace();
            let (Some(t), Some(v), None) = (cols.next(), cols.next(), cols.next()) else {
                return Err(bad("expected two columns".into()));
            };
            times.push(t.parse::<f64>().map_err(|e| bad(e.to_string()))?);
            values.push(v.parse::<f64>().map_err(|e| bad(e.to_string()))?);
        }
        Self::from_samples(times, values)
    }

    /// Analytic CR-RC² response `(x^2 e^-x)` with `x = t / tau`, tabulated
    /// every `resolution` ns up to fourteen shaping times.
    pub fn cr_rc2(tau: f64, resolution: f64) -> Result<Self> {
        if !(tau > 0.0 && resolution > 0.0 && resolution < tau) {
            return Err(Error::InvalidShape(format!(
                "CR-RC2 needs 0 < resolution < tau (got tau={tau}, resolution={resolution})"
            )));
        }
        let end = 14.0 * tau;
        let points = (end / resolution).ceil() + 1.0;
        if !(points <= MAX_SHAPE_POINTS) {
            return Err(Error::InvalidShape(format!(
                "CR-RC2 with tau={tau} and resolution={resolution} needs {points} points, \
                 more than {MAX_SHAPE_POINTS}"
            )));
        }
        let n = points as usize;
        let times: Vec<f64> = (0..n).map(|i| i as f64 * resolution).collect();
        let values = times
            .iter()
            .map(|&t| {
                let x = t / tau;
                x * x * (-x).exp()
            })
            .collect();
        Self::from_samples(times, values)
    }

    /// Amplitude at time `t`, linearly interpolated, zero outside the table.
    pub fn value(&self, t: f64) -> f64 {
        let n = self.times.len();
        if !(t >= self.times[0] && t <= self.times[n - 1]) {
            return 0.0;
        }
        let hi = self.times.partition_point(|&x| x < t).clamp(1, n - 1);
        let (t0, t1) = (self.times[hi - 1], self.times[hi]);
        let (v0, v1) = (self.values[hi - 1], self.values[hi]);
        v0 + (v1 - v0) * (t - t0) / (t1 - t0)
    }

    /// Time derivative at `t` by central difference over the table spacing.
    pub fn derivative(&self, t: f64) -> f64 {
        let h = self.resolution;
        (self.value(t + h) - self.value(t - h)) / (2.0 * h)
    }

    /// Table time axis (ns), peak at zero.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Table amplitudes, unit peak.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Smallest spacing of the time axis (ns).
    pub fn resolution(&self) -> f64 {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;

    #[test]
    fn test_cr_rc2_peak_at_origin() {
        let shape = PulseShape::cr_rc2(15.0, 0.5).unwrap();
        assert_abs_diff_eq!(shape.value(0.0), 1.0, epsilon = 1e-12);
        assert!(shape.value(-10.0) < 1.0);
        assert!(shape.value(10.0) < 1.0);
        assert_abs_diff_eq!(shape.value(-31.0), 0.0);
        assert_abs_diff_eq!(shape.derivative(0.0), 0.0, epsilon = 1e-3);
        assert!(shape.derivative(-10.0) > 0.0);
    }

    #[test]
    fn test_cr_rc2_table_size_bounded() {
        assert!(matches!(
            PulseShape::cr_rc2(15.0, 1e-12),
            Err(Error::InvalidShape(_))
        ));
        assert!(PulseShape::cr_rc2(15.0, 0.01).is_ok());
    }

    #[test]
    fn test_interpolation() {
        let shape = PulseShape::from_samples(vec![0.0, 10.0, 20.0], vec![0.0, 2.0, 1.0]).unwrap();
        assert_abs_diff_eq!(shape.value(-5.0), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(shape.value(5.0), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(shape.value(11.0), 0.0);
    }

    #[test]
    fn test_shaper_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# time amplitude").unwrap();
        writeln!(file, "0 0.0").unwrap();
        writeln!(file, "25 4.0").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "50 2.0  # tail").unwrap();
        let shape = PulseShape::from_shaper_file(file.path()).unwrap();
        assert_eq!(shape.times(), &[-25.0, 0.0, 25.0]);
        assert_eq!(shape.values(), &[0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_shaper_file_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 0.0").unwrap();
        writeln!(file, "25").unwrap();
        let err = PulseShape::from_shaper_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ShaperFile { line: 2, .. }));
    }

    #[test]
    fn test_rejects_flat_shape() {
        assert!(PulseShape::from_samples(vec![0.0, 1.0], vec![0.0, 0.0]).is_err());
    }
}
