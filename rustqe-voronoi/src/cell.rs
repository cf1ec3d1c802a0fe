//! Voronoi cell recovery from the Delaunay half-edge structure.
//!
//! Cells are never materialized as per-polygon objects during
//! construction. Triangle circumcenters form a shared vertex arena and
//! each cell is a list of indices into it; polygons are only built for
//! the cells that survive the boundary checks.

use delaunator::{triangulate, Point as DPoint, Triangulation, EMPTY};
use rayon::prelude::*;

use rustqe_core::{Error, Result};

/// Index of the triangle a half-edge belongs to.
#[inline]
fn triangle_of_edge(edge: usize) -> usize {
    edge / 3
}

/// Next half-edge within the same triangle.
#[inline]
fn next_halfedge(edge: usize) -> usize {
    if edge % 3 == 2 {
        edge - 2
    } else {
        edge + 1
    }
}

/// Circumcenter of a triangle, falling back to the vertex mean for a
/// degenerate (collinear) triangle.
fn circumcenter(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 2] {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let ex = c[0] - a[0];
    let ey = c[1] - a[1];
    let bl = dx * dx + dy * dy;
    let cl = ex * ex + ey * ey;
    let d = dx * ey - dy * ex;
    if d.abs() < f64::EPSILON {
        return [
            (a[0] + b[0] + c[0]) / 3.0,
            (a[1] + b[1] + c[1]) / 3.0,
        ];
    }
    let t = 0.5 / d;
    [
        a[0] + (ey * bl - dy * cl) * t,
        a[1] + (dx * cl - ex * bl) * t,
    ]
}

/// The Voronoi diagram of a point set, in arena form.
///
/// `vertices[t]` is the circumcenter of Delaunay triangle `t`;
/// `cells[p]` lists the triangle indices around point `p` in traversal
/// order, or `None` when the cell touches the unbounded outer region or
/// the point received no triangles at all (exact duplicates).
#[derive(Debug, Clone)]
pub struct VoronoiDiagram {
    /// Circumcenter arena, one vertex per Delaunay triangle.
    pub vertices: Vec<[f64; 2]>,
    /// Per-point vertex index lists; `None` for unbounded or degenerate.
    pub cells: Vec<Option<Vec<usize>>>,
}

impl VoronoiDiagram {
    /// Materializes the vertex coordinates of one cell, dropping
    /// consecutive duplicate vertices (cocircular degeneracies).
    #[must_use]
    pub fn cell_coords(&self, cell: &[usize]) -> Vec<[f64; 2]> {
        let mut coords: Vec<[f64; 2]> = Vec::with_capacity(cell.len());
        for &t in cell {
            let v = self.vertices[t];
            if coords.last() != Some(&v) {
                coords.push(v);
            }
        }
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }
        coords
    }
}

/// Computes the Voronoi diagram over `points`.
///
/// The walk around each point follows incoming half-edges through the
/// triangulation; a walk that reaches a missing twin edge belongs to a
/// hull point and is marked unbounded.
///
/// # Errors
/// [`Error::TriangulationFailed`] when the triangulation is empty
/// (fewer than 3 distinct points, or all collinear).
pub fn voronoi_diagram(points: &[[f64; 2]]) -> Result<VoronoiDiagram> {
    let sites: Vec<DPoint> = points
        .iter()
        .map(|p| DPoint { x: p[0], y: p[1] })
        .collect();
    let triangulation = triangulate(&sites);
    if triangulation.triangles.is_empty() {
        return Err(Error::TriangulationFailed {
            points: points.len(),
        });
    }

    let n_triangles = triangulation.triangles.len() / 3;
    let vertices: Vec<[f64; 2]> = (0..n_triangles)
        .into_par_iter()
        .map(|t| {
            let a = points[triangulation.triangles[3 * t]];
            let b = points[triangulation.triangles[3 * t + 1]];
            let c = points[triangulation.triangles[3 * t + 2]];
            circumcenter(a, b, c)
        })
        .collect();

    let inedges = incoming_edges(points.len(), &triangulation);
    let cells: Vec<Option<Vec<usize>>> = (0..points.len())
        .into_par_iter()
        .map(|p| walk_cell(p, &inedges, &triangulation))
        .collect();

    Ok(VoronoiDiagram { vertices, cells })
}

/// One incoming half-edge per point, preferring hull edges so the walk
/// around a hull point starts at its open end.
fn incoming_edges(n_points: usize, triangulation: &Triangulation) -> Vec<usize> {
    let mut inedges = vec![EMPTY; n_points];
    for e in 0..triangulation.triangles.len() {
        let endpoint = triangulation.triangles[next_halfedge(e)];
        if triangulation.halfedges[e] == EMPTY || inedges[endpoint] == EMPTY {
            inedges[endpoint] = e;
        }
    }
    inedges
}

/// Collects the triangles around point `p`, or `None` when the cell is
/// unbounded or the point has no incident triangle.
fn walk_cell(p: usize, inedges: &[usize], triangulation: &Triangulation) -> Option<Vec<usize>> {
    let start = inedges[p];
    if start == EMPTY {
        return None;
    }
    let mut triangles = Vec::new();
    let mut incoming = start;
    loop {
        triangles.push(triangle_of_edge(incoming));
        let outgoing = next_halfedge(incoming);
        incoming = triangulation.halfedges[outgoing];
        if incoming == EMPTY {
            // Reached the hull: the cell extends to infinity.
            return None;
        }
        if incoming == start {
            break;
        }
    }
    Some(triangles)
}
