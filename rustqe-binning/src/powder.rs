//! Powder-averaged radial cuts.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rustqe_core::{bin_edges, histogram_counts, histogram_weighted};
use rustqe_core::{BinnedData, Error, QCloud, Result};

/// Result of a powder cut: one radial spectrum per energy slice.
///
/// `slices` and `q_edges` are parallel over energy slices; the edge
/// arrays may differ in length between slices, and a slice without data
/// holds empty entries in both.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowderCut {
    /// Aggregates per radial bin, one entry per energy slice.
    pub slices: Vec<BinnedData>,
    /// Radial bin edges per energy slice.
    pub q_edges: Vec<Vec<f64>>,
    /// The energy edges the cut was performed over.
    pub energy_edges: Vec<f64>,
}

/// Bins intensity by |Q| and energy, averaging over all azimuths.
///
/// For every energy slice `(E_i, E_{i+1}]` the radial distance
/// `sqrt(qx² + qy²)` of in-slice points is binned over adaptive edges
/// with minimum size `q_min_bin`. There is no width parameter; the full
/// azimuthal range contributes.
///
/// # Errors
/// [`Error::InvalidTolerance`] for a non-positive `q_min_bin`, plus shape
/// validation errors.
pub fn cut_powder(cloud: &QCloud, energy_edges: &[f64], q_min_bin: f64) -> Result<PowderCut> {
    cloud.validate()?;
    if !(q_min_bin > 0.0) {
        return Err(Error::InvalidTolerance(q_min_bin));
    }

    let radius: Vec<f64> = cloud
        .qx
        .iter()
        .zip(&cloud.qy)
        .map(|(&x, &y)| x.hypot(y))
        .collect();

    let mut out = PowderCut {
        energy_edges: energy_edges.to_vec(),
        ..PowderCut::default()
    };
    for pair in energy_edges.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let kept: Vec<usize> = (0..cloud.len())
            .filter(|&i| cloud.energy[i] > lo && cloud.energy[i] <= hi)
            .collect();
        let q_inside: Vec<f64> = kept.iter().map(|&i| radius[i]).collect();
        let edges = bin_edges(&q_inside, q_min_bin);
        if edges.is_empty() {
            out.slices.push(BinnedData::default());
            out.q_edges.push(Vec::new());
            continue;
        }
        let gather = |column: &[f64]| -> Vec<f64> { kept.iter().map(|&i| column[i]).collect() };
        out.slices.push(BinnedData {
            intensity: histogram_weighted(&q_inside, &gather(&cloud.intensity), &edges),
            monitor: histogram_weighted(&q_inside, &gather(&cloud.monitor), &edges),
            normalization: histogram_weighted(&q_inside, &gather(&cloud.normalization), &edges),
            norm_count: histogram_counts(&q_inside, &edges),
        });
        out.q_edges.push(edges);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ring_cloud() -> QCloud {
        // Two rings of radius 1 and 2 at two energies.
        let mut cloud = QCloud::default();
        for k in 0..12 {
            let phi = f64::from(k) * std::f64::consts::TAU / 12.0;
            cloud.push(phi.cos(), phi.sin(), 0.5, 1.0, 10.0, 1.0);
            cloud.push(2.0 * phi.cos(), 2.0 * phi.sin(), 1.5, 2.0, 10.0, 1.0);
        }
        cloud
    }

    #[test]
    fn test_powder_bins_by_radius() {
        let cloud = ring_cloud();
        let cut = cut_powder(&cloud, &[0.0, 1.0, 2.0], 0.05).unwrap();
        assert_eq!(cut.slices.len(), 2);

        // First slice: all twelve points collapse onto radius 1.
        assert_eq!(cut.slices[0].norm_count.iter().sum::<u64>(), 12);
        assert_relative_eq!(cut.slices[0].intensity.iter().sum::<f64>(), 12.0);
        // Second slice: radius 2 ring.
        assert_relative_eq!(cut.slices[1].intensity.iter().sum::<f64>(), 24.0);
    }

    #[test]
    fn test_radial_edges_strictly_increasing() {
        let cloud = ring_cloud();
        let cut = cut_powder(&cloud, &[0.0, 1.0, 2.0], 0.05).unwrap();
        for edges in &cut.q_edges {
            assert!(edges.windows(2).all(|p| p[1] > p[0]));
        }
    }

    #[test]
    fn test_slice_without_data_is_empty_not_error() {
        let cloud = ring_cloud();
        let cut = cut_powder(&cloud, &[0.0, 1.0, 2.0, 99.0, 100.0], 0.05).unwrap();
        assert_eq!(cut.slices.len(), 4);
        assert!(cut.slices[3].is_empty());
        assert!(cut.q_edges[3].is_empty());
    }

    #[test]
    fn test_slice_bounds_half_open() {
        // A point exactly on a slice's lower edge belongs to the slice
        // below, one exactly on the upper edge to the slice itself.
        let mut cloud = QCloud::default();
        cloud.push(1.0, 0.0, 1.0, 5.0, 10.0, 1.0);
        let cut = cut_powder(&cloud, &[0.0, 1.0, 2.0], 0.05).unwrap();
        assert_relative_eq!(cut.slices[0].intensity.iter().sum::<f64>(), 5.0);
        assert!(cut.slices[1].is_empty());
    }
}
