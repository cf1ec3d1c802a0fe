//! Per-point pixel tessellation of measurement positions.
//!
//! Builds one simple polygon around every measurement point: the Voronoi
//! cell of the point, clipped to the (union of) scan boundaries. A wrong
//! tessellation silently corrupts everything drawn from it, so every
//! geometric invariant failure is a hard error and never auto-corrected.

use geo::{Area, BooleanOps, Contains, Intersects, LineString, MultiPolygon, Point, Polygon};
use log::debug;
use rstar::{primitives::GeomWithData, RTree};

use rustqe_core::{Error, Result};

use crate::cell::voronoi_diagram;
use crate::hull::hull_boundary;

/// Offset of the synthetic far points that close all genuine cells.
const FAR_POINT_OFFSET: f64 = 50.0;

/// Corner coordinates of each polygon, without the closing duplicate.
///
/// Convenience for callers zipping pixel geometry onto per-point data
/// without going through the `geo` types.
#[must_use]
pub fn vertex_arrays(polygons: &[Polygon<f64>]) -> Vec<Vec<[f64; 2]>> {
    polygons
        .iter()
        .map(|polygon| {
            let coords = &polygon.exterior().0;
            let n = coords.len().saturating_sub(1);
            coords[..n].iter().map(|c| [c.x, c.y]).collect()
        })
        .collect()
}

/// Mean of the distinct polygon corner coordinates.
#[must_use]
pub fn vertex_centroid(polygon: &Polygon<f64>) -> [f64; 2] {
    let coords = &polygon.exterior().0;
    if coords.is_empty() {
        return [f64::NAN, f64::NAN];
    }
    // The exterior ring repeats its first coordinate at the end.
    let n = if coords.len() > 1 {
        coords.len() - 1
    } else {
        coords.len()
    };
    let mut sum = [0.0, 0.0];
    for c in &coords[..n] {
        sum[0] += c.x;
        sum[1] += c.y;
    }
    #[allow(clippy::cast_precision_loss)]
    [sum[0] / n as f64, sum[1] / n as f64]
}

/// The 8 synthetic points surrounding the data extent.
fn far_points(points: &[[f64; 2]]) -> [[f64; 2]; 8] {
    let n = points.len();
    #[allow(clippy::cast_precision_loss)]
    let mean = points.iter().fold([0.0, 0.0], |m, p| {
        [m[0] + p[0] / n as f64, m[1] + p[1] / n as f64]
    });
    let (min, max) = points.iter().fold(
        ([f64::MAX, f64::MAX], [f64::MIN, f64::MIN]),
        |(lo, hi), p| {
            (
                [lo[0].min(p[0]), lo[1].min(p[1])],
                [hi[0].max(p[0]), hi[1].max(p[1])],
            )
        },
    );
    let d = FAR_POINT_OFFSET;
    [
        [mean[0], max[1] + d],
        [mean[0], min[1] - d],
        [min[0] - d, mean[1]],
        [max[0] + d, mean[1]],
        [min[0] - d, max[1] + d],
        [min[0] - d, min[1] - d],
        [max[0] + d, max[1] + d],
        [max[0] + d, min[1] - d],
    ]
}

/// Tessellates one or more groups of measurement points into pixels.
///
/// Boundaries are either supplied (one or more polygons, not necessarily
/// one per group) or derived from each group's own raster via
/// [`hull_boundary`]; their union bounds the tessellation. Cells fully
/// inside the union are kept as-is; cells crossing it are clipped, and a
/// disjoint clip keeps its largest-area piece.
///
/// Returned polygons are in input point order (all groups concatenated).
///
/// # Errors
/// - [`Error::BoundaryViolation`] if any point falls outside the union:
///   the boundary under-covers the data and must be fixed by the caller.
/// - [`Error::CellCountMismatch`] when the surviving cell count differs
///   from the point count (overlapping points, points on the boundary).
/// - [`Error::TriangulationFailed`] for degenerate point sets.
pub fn tessellate(
    groups: &[Vec<[f64; 2]>],
    boundaries: Option<&[Polygon<f64>]>,
) -> Result<Vec<Polygon<f64>>> {
    let owned_hulls: Vec<Polygon<f64>>;
    let bounds: &[Polygon<f64>] = match boundaries {
        Some(bs) => bs,
        None => {
            owned_hulls = groups
                .iter()
                .map(|group| {
                    let (a3, a4): (Vec<f64>, Vec<f64>) =
                        group.iter().map(|p| (p[0], p[1])).unzip();
                    hull_boundary(&a3, &a4)
                })
                .collect::<Result<_>>()?;
            &owned_hulls
        }
    };

    let mut combined = MultiPolygon::new(Vec::new());
    for boundary in bounds {
        combined = if combined.0.is_empty() {
            MultiPolygon::new(vec![boundary.clone()])
        } else {
            combined.union(&MultiPolygon::new(vec![boundary.clone()]))
        };
    }

    let points: Vec<[f64; 2]> = groups.iter().flatten().copied().collect();
    let outside = points
        .iter()
        .filter(|p| !combined.intersects(&Point::new(p[0], p[1])))
        .count();
    if outside > 0 {
        return Err(Error::BoundaryViolation {
            outside,
            total: points.len(),
        });
    }

    let mut augmented = points.clone();
    augmented.extend(far_points(&points));
    let diagram = voronoi_diagram(&augmented)?;

    let mut polygons = Vec::with_capacity(points.len());
    let mut clipped = 0usize;
    for cell in diagram.cells.iter().take(points.len()) {
        let Some(cell) = cell else {
            // Unbounded or duplicate-point cell; surfaces as a count
            // mismatch below.
            continue;
        };
        let coords = diagram.cell_coords(cell);
        if coords.len() < 3 {
            continue;
        }
        let polygon = Polygon::new(
            LineString::from(
                coords
                    .iter()
                    .map(|c| (c[0], c[1]))
                    .collect::<Vec<(f64, f64)>>(),
            ),
            Vec::new(),
        );
        if combined.contains(&polygon) {
            polygons.push(polygon);
            continue;
        }
        // Edge cell: clip to the boundary, keep the largest piece.
        clipped += 1;
        let pieces = combined.intersection(&MultiPolygon::new(vec![polygon]));
        let Some(largest) = pieces
            .into_iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
        else {
            continue;
        };
        polygons.push(largest);
    }
    debug!(
        "tessellated {} points, {} edge cells clipped",
        points.len(),
        clipped
    );

    if polygons.len() != points.len() {
        return Err(Error::CellCountMismatch {
            points: points.len(),
            cells: polygons.len(),
        });
    }
    Ok(polygons)
}

/// Reorders tessellation cells onto a caller-supplied point ordering.
///
/// Each cell is matched to its nearest reference point by vertex-mean
/// centroid; the match must be a bijection. The returned vector holds,
/// at position `i`, the cell belonging to `reference[i]`.
///
/// # Errors
/// [`Error::CellCountMismatch`] for a length disagreement,
/// [`Error::NonBijectiveMatch`] when two cells claim one point.
pub fn match_to_points(
    polygons: &[Polygon<f64>],
    reference: &[[f64; 2]],
) -> Result<Vec<Polygon<f64>>> {
    if polygons.len() != reference.len() {
        return Err(Error::CellCountMismatch {
            points: reference.len(),
            cells: polygons.len(),
        });
    }
    if polygons.is_empty() {
        return Ok(Vec::new());
    }

    let tree = RTree::bulk_load(
        reference
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(*p, i))
            .collect(),
    );

    let mut claims = vec![0usize; reference.len()];
    let mut assignment = vec![usize::MAX; reference.len()];
    for (cell_index, polygon) in polygons.iter().enumerate() {
        let centroid = vertex_centroid(polygon);
        let nearest = tree
            .nearest_neighbor(&centroid)
            .expect("tree built from non-empty reference");
        claims[nearest.data] += 1;
        assignment[nearest.data] = cell_index;
    }
    if let Some(point) = claims.iter().position(|&c| c > 1) {
        return Err(Error::NonBijectiveMatch {
            point,
            claims: claims[point],
        });
    }

    Ok(assignment
        .into_iter()
        .map(|cell_index| polygons[cell_index].clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Contains;

    fn raster_group(n3: usize, n4: usize) -> Vec<[f64; 2]> {
        let mut points = Vec::new();
        for i in 0..n3 {
            for j in 0..n4 {
                points.push([f64::from(i as u32) * 0.5, f64::from(j as u32) * 0.8]);
            }
        }
        points
    }

    #[test]
    fn test_bijection_on_clean_raster() {
        let group = raster_group(6, 5);
        let polygons = tessellate(&[group.clone()], None).unwrap();
        assert_eq!(polygons.len(), group.len());
        for (point, polygon) in group.iter().zip(&polygons) {
            assert!(
                polygon.contains(&Point::new(point[0], point[1])),
                "cell does not contain its own point {point:?}"
            );
        }
    }

    #[test]
    fn test_boundary_violation_is_fatal() {
        let group = raster_group(4, 4);
        // A boundary that covers almost nothing.
        let tiny = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (0.1, 0.0), (0.1, 0.1), (0.0, 0.1)]),
            vec![],
        );
        let err = tessellate(&[group], Some(&[tiny])).unwrap_err();
        match err {
            Error::BoundaryViolation { outside, total } => {
                assert_eq!(total, 16);
                assert!(outside > 0);
            }
            other => panic!("expected BoundaryViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_duplicates_fail_count_invariant() {
        let mut group = raster_group(4, 4);
        group.push(group[5]); // exact overlap
        let hull = {
            let (a3, a4): (Vec<f64>, Vec<f64>) = group.iter().map(|p| (p[0], p[1])).unzip();
            crate::hull::hull_boundary(&a3, &a4).unwrap()
        };
        let err = tessellate(&[group], Some(&[hull])).unwrap_err();
        assert!(matches!(err, Error::CellCountMismatch { points: 17, .. }));
    }

    #[test]
    fn test_two_groups_union_boundary() {
        // Two disjoint rasters tessellated as one region.
        let a = raster_group(3, 3);
        let b: Vec<[f64; 2]> = raster_group(3, 3)
            .into_iter()
            .map(|p| [p[0] + 10.0, p[1]])
            .collect();
        let total = a.len() + b.len();
        let polygons = tessellate(&[a, b], None).unwrap();
        assert_eq!(polygons.len(), total);
    }

    #[test]
    fn test_match_reorders_to_reference() {
        let group = raster_group(4, 3);
        let polygons = tessellate(&[group.clone()], None).unwrap();

        let mut reversed = group.clone();
        reversed.reverse();
        let matched = match_to_points(&polygons, &reversed).unwrap();
        for (point, polygon) in reversed.iter().zip(&matched) {
            assert!(polygon.contains(&Point::new(point[0], point[1])));
        }
    }

    #[test]
    fn test_match_rejects_length_mismatch() {
        let group = raster_group(3, 3);
        let polygons = tessellate(&[group.clone()], None).unwrap();
        let err = match_to_points(&polygons, &group[..4]).unwrap_err();
        assert!(matches!(err, Error::CellCountMismatch { .. }));
    }

    #[test]
    fn test_vertex_centroid_square() {
        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]),
            vec![],
        );
        assert_eq!(vertex_centroid(&square), [1.0, 1.0]);
    }

    #[test]
    fn test_edge_cells_are_clipped_to_boundary() {
        use geo::Area;
        let group = raster_group(5, 5);
        let polygons = tessellate(&[group.clone()], None).unwrap();
        // Without clipping, corner cells would stretch toward the far
        // points; clipped they stay within one padded raster cell.
        for polygon in &polygons {
            assert!(polygon.unsigned_area() < 2.0 * 0.5 * 0.8 + 1e-9);
        }
    }
}
