//! 2D binning of a constant-energy plane.
//!
//! The plane engine bins an energy slab over a 2D grid in either
//! Cartesian (qx, qy) or polar (azimuth, |q|) coordinates, row by row
//! over the second coordinate. Rows and columns are either fixed-size or
//! adaptive.

use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rustqe_core::{bin_edges, histogram_counts, histogram_weighted};
use rustqe_core::{BinnedData, Error, QCloud, Result};

/// Coordinate system of the plane binning.
///
/// Each variant carries its own projection from (qx, qy); the variant is
/// resolved once at call entry rather than re-dispatching per point on a
/// mode string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlaneBinning {
    /// Bin on (qx, qy) directly.
    #[default]
    Cartesian,
    /// Bin on (atan2(qy, qx), |q|).
    Polar,
}

impl PlaneBinning {
    /// Projects a Q point into this binning's (x, y) plane.
    #[must_use]
    pub fn project(self, qx: f64, qy: f64) -> (f64, f64) {
        match self {
            Self::Cartesian => (qx, qy),
            Self::Polar => (qy.atan2(qx), qx.hypot(qy)),
        }
    }
}

impl FromStr for PlaneBinning {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xy" => Ok(Self::Cartesian),
            "polar" => Ok(Self::Polar),
            _ => Err(Error::UnknownBinning(s.to_owned())),
        }
    }
}

/// Parameters of a plane cut.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneConfig {
    /// Coordinate system to bin in.
    pub binning: PlaneBinning,
    /// Bin size (fixed) or minimum bin size (adaptive) along x.
    pub x_tolerance: f64,
    /// Bin size (fixed) or minimum bin size (adaptive) along y.
    pub y_tolerance: f64,
    /// Adaptive bins merge sparse regions instead of using fixed steps.
    pub adaptive: bool,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            binning: PlaneBinning::Cartesian,
            x_tolerance: 0.05,
            y_tolerance: 0.05,
            adaptive: false,
        }
    }
}

impl PlaneConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the binning coordinate system.
    #[must_use]
    pub fn with_binning(mut self, binning: PlaneBinning) -> Self {
        self.binning = binning;
        self
    }

    /// Sets the x bin tolerance.
    #[must_use]
    pub fn with_x_tolerance(mut self, tolerance: f64) -> Self {
        self.x_tolerance = tolerance;
        self
    }

    /// Sets the y bin tolerance.
    #[must_use]
    pub fn with_y_tolerance(mut self, tolerance: f64) -> Self {
        self.y_tolerance = tolerance;
        self
    }

    /// Enables or disables adaptive binning.
    #[must_use]
    pub fn with_adaptive(mut self, adaptive: bool) -> Self {
        self.adaptive = adaptive;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.x_tolerance > 0.0) {
            return Err(Error::InvalidTolerance(self.x_tolerance));
        }
        if !(self.y_tolerance > 0.0) {
            return Err(Error::InvalidTolerance(self.y_tolerance));
        }
        Ok(())
    }
}

/// One row of a plane cut: a strip in y binned along x.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneRow {
    /// Bin edges along x.
    pub x_edges: Vec<f64>,
    /// The y strip this row covers.
    pub y_range: [f64; 2],
    /// Aggregates per x bin.
    pub data: BinnedData,
}

/// Result of a plane cut over one energy window.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneCut {
    /// Surviving rows, bottom to top in y.
    pub rows: Vec<PlaneRow>,
    /// The energy window of the cut.
    pub energy_range: [f64; 2],
    /// The binning the cut was performed in.
    pub binning: PlaneBinning,
}

/// Fixed-step edges from `start` (inclusive) to `stop` (exclusive).
fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut i = 0u64;
    loop {
        #[allow(clippy::cast_precision_loss)]
        let v = step.mul_add(i as f64, start);
        if v >= stop {
            break;
        }
        out.push(v);
        i += 1;
    }
    out
}

/// Bins the energy window `(emin, emax]` over a 2D grid in the plane.
///
/// Rows run over the binning's y coordinate, fixed-size or adaptive per
/// `config`; each row is binned along x. Pixels with NaN normalization
/// are excluded up front. Rows in which no x bins could be built are
/// skipped. An empty energy window yields a result with no rows.
///
/// # Errors
/// [`Error::InvalidTolerance`] plus shape validation errors.
pub fn cut_plane(cloud: &QCloud, emin: f64, emax: f64, config: PlaneConfig) -> Result<PlaneCut> {
    cloud.validate()?;
    config.validate()?;

    let (x, y): (Vec<f64>, Vec<f64>) = cloud
        .qx
        .iter()
        .zip(&cloud.qy)
        .map(|(&qx, &qy)| config.binning.project(qx, qy))
        .unzip();

    let in_window: Vec<usize> = (0..cloud.len())
        .filter(|&i| cloud.energy[i] > emin && cloud.energy[i] <= emax)
        .collect();

    let mut out = PlaneCut {
        energy_range: [emin, emax],
        binning: config.binning,
        ..PlaneCut::default()
    };
    if in_window.is_empty() {
        return Ok(out);
    }

    let y_window: Vec<f64> = in_window.iter().map(|&i| y[i]).collect();
    let y_bins = if config.adaptive {
        bin_edges(&y_window, config.y_tolerance)
    } else {
        let (lo, hi) = min_max(&y_window);
        arange(lo, hi, config.y_tolerance)
    };

    for pair in y_bins.windows(2) {
        let (y_lo, y_hi) = (pair[0], pair[1]);
        let kept: Vec<usize> = in_window
            .iter()
            .copied()
            .filter(|&i| y[i] > y_lo && y[i] < y_hi && cloud.normalization[i].is_finite())
            .collect();
        let x_inside: Vec<f64> = kept.iter().map(|&i| x[i]).collect();

        let x_edges = if config.adaptive {
            bin_edges(&x_inside, config.x_tolerance)
        } else {
            let (lo, hi) = min_max(&x);
            arange(lo, hi, config.x_tolerance)
        };
        if x_edges.len() < 2 {
            continue;
        }

        let gather = |column: &[f64]| -> Vec<f64> { kept.iter().map(|&i| column[i]).collect() };
        out.rows.push(PlaneRow {
            data: BinnedData {
                intensity: histogram_weighted(&x_inside, &gather(&cloud.intensity), &x_edges),
                monitor: histogram_weighted(&x_inside, &gather(&cloud.monitor), &x_edges),
                normalization: histogram_weighted(
                    &x_inside,
                    &gather(&cloud.normalization),
                    &x_edges,
                ),
                norm_count: histogram_counts(&x_inside, &x_edges),
            },
            x_edges,
            y_range: [y_lo, y_hi],
        });
    }
    Ok(out)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sheet_cloud() -> QCloud {
        let mut cloud = QCloud::default();
        for i in 0..10 {
            for j in 0..10 {
                cloud.push(
                    0.05 + 0.1 * f64::from(i),
                    0.05 + 0.1 * f64::from(j),
                    1.0,
                    1.0,
                    10.0,
                    1.0,
                );
            }
        }
        cloud
    }

    #[test]
    fn test_binning_from_str() {
        assert_eq!("xy".parse::<PlaneBinning>().unwrap(), PlaneBinning::Cartesian);
        assert_eq!("Polar".parse::<PlaneBinning>().unwrap(), PlaneBinning::Polar);
        assert!(matches!(
            "rlu".parse::<PlaneBinning>(),
            Err(Error::UnknownBinning(_))
        ));
    }

    #[test]
    fn test_polar_projection() {
        let (phi, r) = PlaneBinning::Polar.project(0.0, 2.0);
        assert_relative_eq!(phi, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(r, 2.0);
    }

    #[test]
    fn test_fixed_grid_rows() {
        let cloud = sheet_cloud();
        let cut = cut_plane(&cloud, 0.0, 2.0, PlaneConfig::new().with_y_tolerance(0.25)).unwrap();
        assert!(!cut.rows.is_empty());
        for row in &cut.rows {
            assert!(row.x_edges.len() >= 2);
            assert!(row.y_range[1] > row.y_range[0]);
        }
    }

    #[test]
    fn test_nan_normalization_pixels_excluded() {
        let mut cloud = sheet_cloud();
        let n = cloud.len();
        cloud.normalization[n / 2] = f64::NAN;
        let cut = cut_plane(
            &cloud,
            0.0,
            2.0,
            PlaneConfig::new().with_adaptive(true).with_y_tolerance(0.25),
        )
        .unwrap();
        let total: u64 = cut
            .rows
            .iter()
            .map(|r| r.data.norm_count.iter().sum::<u64>())
            .sum();
        // The masked pixel never reaches a bin, so no NaN sums appear.
        assert!(total < n as u64);
        for row in &cut.rows {
            assert!(row.data.normalization.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_empty_window_yields_no_rows() {
        let cloud = sheet_cloud();
        let cut = cut_plane(&cloud, 50.0, 60.0, PlaneConfig::default()).unwrap();
        assert!(cut.rows.is_empty());
    }

    #[test]
    fn test_adaptive_rows_cover_all_points() {
        let cloud = sheet_cloud();
        let cut = cut_plane(
            &cloud,
            0.0,
            2.0,
            PlaneConfig::new()
                .with_adaptive(true)
                .with_x_tolerance(0.2)
                .with_y_tolerance(0.2),
        )
        .unwrap();
        let total: u64 = cut
            .rows
            .iter()
            .map(|r| r.data.norm_count.iter().sum::<u64>())
            .sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_arange_excludes_stop() {
        let edges = arange(0.0, 1.0, 0.25);
        assert_eq!(edges, vec![0.0, 0.25, 0.5, 0.75]);
        assert!(arange(1.0, 1.0, 0.1).is_empty());
    }
}
