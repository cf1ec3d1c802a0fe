//! Multi-slice Q-E cuts and multi-segment path cuts.
//!
//! A Q-E cut repeats a 1D cut once per consecutive energy-edge pair,
//! producing a Q-versus-energy map. A path cut chains Q-E cuts between
//! consecutive waypoints with `extend = false`, stitching the per-segment
//! distance axes into one continuous axis.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;
use rayon::prelude::*;

use rustqe_core::{EmptySegment, Error, QCloud, Result};

use crate::cut::{cut_1d, CutConfig, CutResult};

/// Forward transform from reciprocal-lattice coordinates to the
/// instrument's native 2D projection coordinates.
///
/// The transform belongs to the sample/instrument layer; the cut engine
/// only needs the forward direction to place waypoints.
pub trait QTransform {
    /// Maps (h, k, l) to (qx, qy), projecting onto the scattering plane.
    fn to_projection(&self, h: f64, k: f64, l: f64) -> [f64; 2];
}

/// One Q-E cut: a stack of 1D cuts over consecutive energy slices.
///
/// Slices that contained no data are skipped entirely, so `slices`,
/// `bin_centers` and `bin_distance` are parallel over surviving slices
/// only.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceCut {
    /// Surviving per-slice cut results.
    pub slices: Vec<CutResult>,
    /// Bin centers (qx, qy, E) per surviving slice.
    pub bin_centers: Vec<Vec<[f64; 3]>>,
    /// Distance of each bin center from the segment start, per slice.
    pub bin_distance: Vec<Vec<f64>>,
}

impl SliceCut {
    /// Returns true if every slice came back empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

/// Cuts the cloud from `q1` to `q2` once per consecutive energy-edge pair.
///
/// Slices run in parallel; their order follows `energy_edges`. Empty
/// slices are dropped from the result. Fewer than two energy edges yield
/// an empty result.
///
/// # Errors
/// Propagates the validation errors of [`cut_1d`].
pub fn cut_qe(
    cloud: &QCloud,
    q1: [f64; 2],
    q2: [f64; 2],
    config: CutConfig,
    energy_edges: &[f64],
) -> Result<SliceCut> {
    let windows: Vec<(f64, f64)> = energy_edges
        .windows(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();

    let cuts: Vec<CutResult> = windows
        .par_iter()
        .map(|&(emin, emax)| cut_1d(cloud, q1, q2, config, emin, emax))
        .collect::<Result<_>>()?;

    let mut out = SliceCut::default();
    for cut in cuts {
        if cut.is_empty() {
            continue;
        }
        let centers = cut.centers();
        let distance = centers
            .iter()
            .map(|c| (c[0] - q1[0]).hypot(c[1] - q1[1]))
            .collect();
        out.bin_centers.push(centers);
        out.bin_distance.push(distance);
        out.slices.push(cut);
    }
    debug!(
        "qe cut kept {}/{} energy slices",
        out.slices.len(),
        windows.len()
    );
    Ok(out)
}

/// One segment of a path cut.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathSegment {
    /// Segment start in projection coordinates.
    pub from: [f64; 2],
    /// Segment end in projection coordinates.
    pub to: [f64; 2],
    /// The Q-E cut along this segment.
    pub cut: SliceCut,
    /// Total path length before this segment.
    pub distance_offset: f64,
}

/// A multi-segment path cut through Q-E space.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathCut {
    /// Per-segment results in waypoint order.
    pub segments: Vec<PathSegment>,
}

impl PathCut {
    /// Flattens every bin distance onto the stitched path axis.
    ///
    /// Within each slice of each segment, distances are offset by the
    /// accumulated length of the preceding segments, so the sequence is
    /// non-decreasing across segment boundaries.
    #[must_use]
    pub fn stitched_distances(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for segment in &self.segments {
            for distances in &segment.cut.bin_distance {
                out.extend(distances.iter().map(|d| d + segment.distance_offset));
            }
        }
        out
    }
}

/// Cuts along a polyline of waypoints given in projection coordinates.
///
/// Each consecutive waypoint pair is cut with `extend = false` so the
/// segments tile the path without overlap. Any segment whose every energy
/// slice came back empty is collected into one combined error naming the
/// offending waypoint pairs and the energy window.
///
/// # Errors
/// [`Error::TooFewWaypoints`], [`Error::TooFewEnergyBins`],
/// [`Error::EmptySegments`], plus per-segment validation errors.
pub fn cut_qe_line(
    cloud: &QCloud,
    waypoints: &[[f64; 2]],
    config: CutConfig,
    energy_edges: &[f64],
) -> Result<PathCut> {
    if waypoints.len() < 2 {
        return Err(Error::TooFewWaypoints(waypoints.len()));
    }
    if energy_edges.len() < 2 {
        return Err(Error::TooFewEnergyBins(energy_edges.len()));
    }
    let segment_config = config.with_extend(false);

    let mut path = PathCut::default();
    let mut empty = Vec::new();
    let mut offset = 0.0;
    for (index, pair) in waypoints.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);
        let cut = cut_qe(cloud, from, to, segment_config, energy_edges)?;
        if cut.is_empty() {
            empty.push(EmptySegment {
                segment: index,
                from,
                to,
                emin: energy_edges[0],
                emax: energy_edges[energy_edges.len() - 1],
            });
        }
        path.segments.push(PathSegment {
            from,
            to,
            cut,
            distance_offset: offset,
        });
        offset += (to[0] - from[0]).hypot(to[1] - from[1]);
    }

    if !empty.is_empty() {
        return Err(Error::EmptySegments(empty));
    }
    Ok(path)
}

/// Cuts along a polyline of reciprocal-lattice waypoints.
///
/// Waypoints are mapped through the supplied transform and the cut runs
/// in projection coordinates.
///
/// # Errors
/// Same as [`cut_qe_line`].
pub fn cut_qe_line_rlu<T: QTransform>(
    cloud: &QCloud,
    waypoints: &[[f64; 3]],
    transform: &T,
    config: CutConfig,
    energy_edges: &[f64],
) -> Result<PathCut> {
    if waypoints.len() < 2 {
        return Err(Error::TooFewWaypoints(waypoints.len()));
    }
    let projected: Vec<[f64; 2]> = waypoints
        .iter()
        .map(|w| transform.to_projection(w[0], w[1], w[2]))
        .collect();
    cut_qe_line(cloud, &projected, config, energy_edges)
}
