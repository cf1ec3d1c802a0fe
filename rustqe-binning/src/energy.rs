//! Constant-Q energy cut.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rustqe_core::{bin_edges, histogram_counts, histogram_weighted};
use rustqe_core::{BinnedData, Error, QCloud, Result};

/// Result of a constant-Q cut along the energy axis.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyCut {
    /// Aggregates per energy bin.
    pub data: BinnedData,
    /// Adaptive energy bin edges; just the window pair when no bins
    /// could be built from the surviving points.
    pub energy_edges: Vec<f64>,
}

impl EnergyCut {
    /// Returns true if no bins survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Cuts through a constant Q point along energy.
///
/// Points within `width` of `q` (Euclidean distance in the Q plane) and
/// with energy in `[e1, e2]` are binned over adaptive energy edges with
/// minimum size `min_pixel`. Unlike the line cut, an exhausted energy or
/// Q filter here is an error: a constant-Q cut with nothing in range is
/// always a caller mistake.
///
/// # Errors
/// [`Error::EmptyEnergyWindow`], [`Error::EmptyQRegion`],
/// [`Error::InvalidWidth`], [`Error::InvalidTolerance`].
pub fn cut_1d_e(
    cloud: &QCloud,
    q: [f64; 2],
    e1: f64,
    e2: f64,
    width: f64,
    min_pixel: f64,
) -> Result<EnergyCut> {
    cloud.validate()?;
    if !(width > 0.0) {
        return Err(Error::InvalidWidth(width));
    }
    if !(min_pixel > 0.0) {
        return Err(Error::InvalidTolerance(min_pixel));
    }

    let mut in_window = 0usize;
    let mut in_region = 0usize;
    let mut kept = Vec::new();
    for i in 0..cloud.len() {
        let inside_q = (cloud.qx[i] - q[0]).hypot(cloud.qy[i] - q[1]) < width;
        let inside_e = cloud.energy[i] >= e1 && cloud.energy[i] <= e2;
        in_window += usize::from(inside_e);
        in_region += usize::from(inside_q);
        if inside_q && inside_e {
            kept.push(i);
        }
    }
    if in_window == 0 {
        return Err(Error::EmptyEnergyWindow { emin: e1, emax: e2 });
    }
    if in_region == 0 {
        return Err(Error::EmptyQRegion {
            qx: q[0],
            qy: q[1],
            width,
        });
    }

    let energies: Vec<f64> = kept.iter().map(|&i| cloud.energy[i]).collect();
    let edges = bin_edges(&energies, min_pixel);
    if edges.is_empty() {
        return Ok(EnergyCut {
            data: BinnedData::default(),
            energy_edges: vec![e1, e2],
        });
    }

    let gather = |column: &[f64]| -> Vec<f64> { kept.iter().map(|&i| column[i]).collect() };
    let data = BinnedData {
        intensity: histogram_weighted(&energies, &gather(&cloud.intensity), &edges),
        monitor: histogram_weighted(&energies, &gather(&cloud.monitor), &edges),
        normalization: histogram_weighted(&energies, &gather(&cloud.normalization), &edges),
        norm_count: histogram_counts(&energies, &edges),
    };

    Ok(EnergyCut {
        data,
        energy_edges: edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ladder_cloud() -> QCloud {
        let mut cloud = QCloud::default();
        for i in 0..8 {
            cloud.push(1.0, 1.0, 0.5 * f64::from(i), 3.0, 50.0, 1.0);
        }
        cloud.push(5.0, 5.0, 1.0, 100.0, 50.0, 1.0); // far away in Q
        cloud
    }

    #[test]
    fn test_energy_cut_bins_in_window() {
        let cloud = ladder_cloud();
        let cut = cut_1d_e(&cloud, [1.0, 1.0], 0.0, 2.0, 0.1, 0.4).unwrap();
        // Energies 0.0, 0.5, 1.0, 1.5, 2.0 are inside the window.
        assert_eq!(cut.data.norm_count.iter().sum::<u64>(), 5);
        assert_relative_eq!(cut.data.intensity.iter().sum::<f64>(), 15.0);
        assert!(cut.energy_edges.windows(2).all(|p| p[1] > p[0]));
    }

    #[test]
    fn test_far_point_excluded_by_radius() {
        let cloud = ladder_cloud();
        let cut = cut_1d_e(&cloud, [1.0, 1.0], 0.0, 4.0, 0.1, 0.4).unwrap();
        assert_relative_eq!(cut.data.intensity.iter().sum::<f64>(), 24.0);
    }

    #[test]
    fn test_empty_energy_window_is_an_error() {
        let cloud = ladder_cloud();
        let err = cut_1d_e(&cloud, [1.0, 1.0], 50.0, 60.0, 0.1, 0.4).unwrap_err();
        assert!(matches!(err, Error::EmptyEnergyWindow { .. }));
    }

    #[test]
    fn test_empty_q_region_is_an_error() {
        let cloud = ladder_cloud();
        let err = cut_1d_e(&cloud, [-40.0, -40.0], 0.0, 2.0, 0.1, 0.4).unwrap_err();
        assert!(matches!(err, Error::EmptyQRegion { .. }));
    }
}
