//! 3D rebinning of a point cloud onto a regular voxel grid.
//!
//! Bin counts are derived from the data extent and the requested step
//! sizes; voxel corner grids are produced alongside the aggregates so a
//! volumetric viewer can place every voxel without re-deriving geometry.

use ndarray::Array3;

use rustqe_core::{find_bin, Error, Result};

/// A voxelized data set: per-voxel aggregates plus corner geometry.
///
/// Aggregate arrays have shape `(nx, ny, nz)`; corner grids have shape
/// `(nx+1, ny+1, nz+1)`. Monitor is present when monitor weights were
/// supplied; normalization and the integer norm-count when normalization
/// weights were.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    /// Summed intensity per voxel.
    pub intensity: Array3<f64>,
    /// Summed monitor counts per voxel.
    pub monitor: Option<Array3<f64>>,
    /// Summed normalization per voxel; NaN where masked pixels landed.
    pub normalization: Option<Array3<f64>>,
    /// Number of points per voxel.
    pub norm_count: Option<Array3<u64>>,
    /// X coordinate of every voxel corner.
    pub x_corners: Array3<f64>,
    /// Y coordinate of every voxel corner.
    pub y_corners: Array3<f64>,
    /// Z coordinate of every voxel corner.
    pub z_corners: Array3<f64>,
    /// The per-axis 1D bin edges the grid was built from.
    pub edges: [Vec<f64>; 3],
}

impl VoxelGrid {
    /// Number of voxels along each axis.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        let s = self.intensity.shape();
        (s[0], s[1], s[2])
    }
}

/// Inclusive linspace with `n` points.
fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![lo];
    }
    #[allow(clippy::cast_precision_loss)]
    let step = (hi - lo) / (n - 1) as f64;
    #[allow(clippy::cast_precision_loss)]
    (0..n).map(|i| step.mul_add(i as f64, lo)).collect()
}

/// Converts bin-center coordinates to corner coordinates.
///
/// Corners sit midway between adjacent centers; the outer corners are
/// extrapolated symmetrically so the outermost cells are as wide as
/// their inner neighbours. A single center degenerates to one cell of
/// the nominal step width.
#[must_use]
pub fn centers_to_corners(centers: &[f64], nominal_step: f64) -> Vec<f64> {
    match centers {
        [] => Vec::new(),
        [c] => vec![c - 0.5 * nominal_step, c + 0.5 * nominal_step],
        _ => {
            let n = centers.len();
            let mut corners = Vec::with_capacity(n + 1);
            corners.push(centers[0] - 0.5 * (centers[1] - centers[0]));
            for pair in centers.windows(2) {
                corners.push(0.5 * (pair[0] + pair[1]));
            }
            corners.push(centers[n - 1] + 0.5 * (centers[n - 1] - centers[n - 2]));
            corners
        }
    }
}

/// Derives the corner edges of one axis from its data extent.
///
/// The bin count is `round(extent / step) + 1` center positions spanning
/// the data inclusively; centers become corners via
/// [`centers_to_corners`]. Data collapsed onto a single point yields the
/// degenerate single-voxel case with edges at ±step/2.
///
/// # Errors
/// [`Error::InvalidStep`] for a non-positive step,
/// [`Error::EmptyVoxelInput`] for an empty axis.
pub fn calculate_axis_edges(values: &[f64], step: f64, axis: char) -> Result<Vec<f64>> {
    if !(step > 0.0) {
        return Err(Error::InvalidStep { axis, step });
    }
    if values.is_empty() {
        return Err(Error::EmptyVoxelInput);
    }
    let (lo, hi) = values.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = ((hi - lo).abs() / step).round() as usize + 1;
    let centers = linspace(lo, hi, n);
    Ok(centers_to_corners(&centers, step))
}

/// Rebins a 3D point cloud onto a regular voxel grid.
///
/// `positions` holds the x, y and z coordinate columns; `intensity` is
/// the primary weighted quantity, `mon` and `norm` optional extra ones.
/// Precomputed per-axis `edges` bypass the extent-based derivation.
///
/// # Errors
/// [`Error::InvalidStep`], [`Error::EmptyVoxelInput`], or
/// [`Error::ShapeMismatch`] when the weight columns disagree with the
/// position columns.
#[allow(clippy::too_many_arguments, clippy::similar_names)]
pub fn bin_3d(
    dx: f64,
    dy: f64,
    dz: f64,
    positions: [&[f64]; 3],
    intensity: &[f64],
    norm: Option<&[f64]>,
    mon: Option<&[f64]>,
    edges: Option<[Vec<f64>; 3]>,
) -> Result<VoxelGrid> {
    let n_points = positions[0].len();
    for (column, len) in [
        ("y positions", positions[1].len()),
        ("z positions", positions[2].len()),
        ("intensity", intensity.len()),
        ("normalization", norm.map_or(n_points, <[f64]>::len)),
        ("monitor", mon.map_or(n_points, <[f64]>::len)),
    ] {
        if len != n_points {
            return Err(Error::ShapeMismatch {
                column,
                expected: n_points,
                found: len,
            });
        }
    }

    let [xe, ye, ze] = match edges {
        Some(e) => e,
        None => [
            calculate_axis_edges(positions[0], dx, 'x')?,
            calculate_axis_edges(positions[1], dy, 'y')?,
            calculate_axis_edges(positions[2], dz, 'z')?,
        ],
    };
    if xe.len() < 2 || ye.len() < 2 || ze.len() < 2 {
        return Err(Error::EmptyVoxelInput);
    }
    let shape = (xe.len() - 1, ye.len() - 1, ze.len() - 1);

    let mut grid = VoxelGrid {
        intensity: Array3::zeros(shape),
        monitor: mon.map(|_| Array3::zeros(shape)),
        normalization: norm.map(|_| Array3::zeros(shape)),
        norm_count: norm.map(|_| Array3::zeros(shape)),
        x_corners: Array3::from_shape_fn(
            (shape.0 + 1, shape.1 + 1, shape.2 + 1),
            |(i, _, _)| xe[i],
        ),
        y_corners: Array3::from_shape_fn(
            (shape.0 + 1, shape.1 + 1, shape.2 + 1),
            |(_, j, _)| ye[j],
        ),
        z_corners: Array3::from_shape_fn(
            (shape.0 + 1, shape.1 + 1, shape.2 + 1),
            |(_, _, k)| ze[k],
        ),
        edges: [xe, ye, ze],
    };

    for p in 0..n_points {
        let Some(i) = find_bin(&grid.edges[0], positions[0][p]) else {
            continue;
        };
        let Some(j) = find_bin(&grid.edges[1], positions[1][p]) else {
            continue;
        };
        let Some(k) = find_bin(&grid.edges[2], positions[2][p]) else {
            continue;
        };
        grid.intensity[[i, j, k]] += intensity[p];
        if let (Some(monitor), Some(weights)) = (grid.monitor.as_mut(), mon) {
            monitor[[i, j, k]] += weights[p];
        }
        if let (Some(normalization), Some(weights)) = (grid.normalization.as_mut(), norm) {
            normalization[[i, j, k]] += weights[p];
        }
        if let Some(count) = grid.norm_count.as_mut() {
            count[[i, j, k]] += 1;
        }
    }
    Ok(grid)
}
