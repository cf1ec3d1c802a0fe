//! Boundary polygon construction for A3-A4 raster scans.

use geo::{ConvexHull, MultiPoint, Point, Polygon};

use rustqe_core::{Error, Result};

/// Sorted unique values of one angular axis.
fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted
}

/// Builds the enclosing boundary polygon of a rectangular A3-A4 raster.
///
/// The raster's unique axis values are padded outward by half the first
/// and last spacing on each axis: four strips (left, right, bottom, top)
/// plus the four outer corners. The convex hull of the padded strips is
/// returned, which places every measurement point strictly inside the
/// boundary; the tessellation step requires that.
///
/// # Errors
/// [`Error::DegenerateRaster`] when an axis has fewer than 2 unique
/// values, since no spacing can be derived.
pub fn hull_boundary(a3: &[f64], a4: &[f64]) -> Result<Polygon<f64>> {
    let a3_unique = unique_sorted(a3);
    let a4_unique = unique_sorted(a4);
    if a3_unique.len() < 2 {
        return Err(Error::DegenerateRaster {
            axis: "A3",
            unique: a3_unique.len(),
        });
    }
    if a4_unique.len() < 2 {
        return Err(Error::DegenerateRaster {
            axis: "A4",
            unique: a4_unique.len(),
        });
    }

    let a3_pad = [
        0.5 * (a3_unique[1] - a3_unique[0]),
        0.5 * (a3_unique[a3_unique.len() - 1] - a3_unique[a3_unique.len() - 2]),
    ];
    let a4_pad = [
        0.5 * (a4_unique[1] - a4_unique[0]),
        0.5 * (a4_unique[a4_unique.len() - 1] - a4_unique[a4_unique.len() - 2]),
    ];

    let left = a3_unique[0] - a3_pad[0];
    let right = a3_unique[a3_unique.len() - 1] + a3_pad[1];
    let bottom = a4_unique[0] - a4_pad[0];
    let top = a4_unique[a4_unique.len() - 1] + a4_pad[1];

    let mut padded = Vec::with_capacity(2 * (a3_unique.len() + a4_unique.len()) + 4);
    for &a4 in &a4_unique {
        padded.push(Point::new(left, a4));
        padded.push(Point::new(right, a4));
    }
    for &a3 in &a3_unique {
        padded.push(Point::new(a3, bottom));
        padded.push(Point::new(a3, top));
    }
    padded.extend([
        Point::new(left, bottom),
        Point::new(left, top),
        Point::new(right, bottom),
        Point::new(right, top),
    ]);

    Ok(MultiPoint::new(padded).convex_hull())
}
