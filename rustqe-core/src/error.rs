//! Error types for rustqe-core.

use thiserror::Error;

/// Result type alias for rustqe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A path segment that produced no data in any energy slice.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmptySegment {
    /// Index of the segment along the path.
    pub segment: usize,
    /// Segment start point (qx, qy).
    pub from: [f64; 2],
    /// Segment end point (qx, qy).
    pub to: [f64; 2],
    /// Lower edge of the energy window.
    pub emin: f64,
    /// Upper edge of the energy window.
    pub emax: f64,
}

impl std::fmt::Display for EmptySegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "segment {} from ({:.4}, {:.4}) to ({:.4}, {:.4}) with E in [{:.4}, {:.4}]",
            self.segment, self.from[0], self.from[1], self.to[0], self.to[1], self.emin, self.emax
        )
    }
}

fn join_segments(segments: &[EmptySegment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types for rustqe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Parallel arrays of a point cloud disagree in length.
    #[error("column '{column}' has length {found}, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending column.
        column: &'static str,
        /// Length of the reference column.
        expected: usize,
        /// Length actually found.
        found: usize,
    },

    /// A voxel step size was zero or negative.
    #[error("step size along {axis} must be positive, got {step}")]
    InvalidStep {
        /// Axis label ('x', 'y' or 'z').
        axis: char,
        /// Offending step value.
        step: f64,
    },

    /// A binning tolerance was zero or negative.
    #[error("binning tolerance must be positive, got {0}")]
    InvalidTolerance(f64),

    /// A cut width was zero or negative.
    #[error("cut width must be positive, got {0}")]
    InvalidWidth(f64),

    /// A path cut needs at least two waypoints.
    #[error("a path cut needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),

    /// A multi-slice cut needs at least two energy bin edges.
    #[error("at least 2 energy bin edges are required, got {0}")]
    TooFewEnergyBins(usize),

    /// A cut segment with coincident endpoints has no direction.
    #[error("cut segment from ({:.4}, {:.4}) to ({:.4}, {:.4}) has zero length", from[0], from[1], to[0], to[1])]
    DegenerateSegment {
        /// Segment start point.
        from: [f64; 2],
        /// Segment end point.
        to: [f64; 2],
    },

    /// Voxel bins cannot be derived from an empty point cloud.
    #[error("cannot derive voxel bins from an empty point cloud")]
    EmptyVoxelInput,

    /// An unknown plane-binning mode string.
    #[error("unknown binning mode '{0}', expected 'xy' or 'polar'")]
    UnknownBinning(String),

    /// A constant-Q energy cut found no points in the energy window.
    #[error("no points within the energy window [{emin}, {emax}]")]
    EmptyEnergyWindow {
        /// Lower window edge.
        emin: f64,
        /// Upper window edge.
        emax: f64,
    },

    /// A constant-Q energy cut found no points inside the Q radius.
    #[error("no points within {width} of q = ({qx}, {qy})")]
    EmptyQRegion {
        /// Q point x component.
        qx: f64,
        /// Q point y component.
        qy: f64,
        /// Search radius.
        width: f64,
    },

    /// One or more path segments produced no data at all.
    #[error("no data in {} path segment(s): {}", .0.len(), join_segments(.0))]
    EmptySegments(Vec<EmptySegment>),

    /// A raster axis has too few unique values to build a boundary.
    #[error("raster axis {axis} has {unique} unique value(s), need at least 2")]
    DegenerateRaster {
        /// Axis label ("A3" or "A4").
        axis: &'static str,
        /// Number of unique values found.
        unique: usize,
    },

    /// The combined boundary polygon does not contain all input points.
    #[error("boundary does not contain all points: {outside} of {total} lie outside")]
    BoundaryViolation {
        /// Number of points outside the boundary.
        outside: usize,
        /// Total number of points checked.
        total: usize,
    },

    /// Delaunay triangulation of the point set failed.
    #[error("triangulation of {points} point(s) produced no triangles")]
    TriangulationFailed {
        /// Number of points handed to the triangulator.
        points: usize,
    },

    /// Tessellation produced a different number of cells than points.
    #[error(
        "tessellation produced {cells} cell(s) for {points} point(s); \
         likely causes: exactly overlapping points, or points on the boundary"
    )]
    CellCountMismatch {
        /// Number of input points.
        points: usize,
        /// Number of cells produced.
        cells: usize,
    },

    /// Centroid matching assigned more than one cell to the same point.
    #[error("centroid matching is not a bijection: point {point} claimed by {claims} cells")]
    NonBijectiveMatch {
        /// Index of the point claimed more than once.
        point: usize,
        /// Number of cells claiming it.
        claims: usize,
    },

    /// A raster pipeline was invoked without any scan files.
    #[error("at least one scan file is required")]
    NoScanFiles,

    /// Scan files differ beyond tolerance in one or more attributes.
    #[error("scan attributes differ beyond tolerance: {}", .0.join(", "))]
    IncompatibleFiles(Vec<&'static str>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segments_message_lists_each_segment() {
        let err = Error::EmptySegments(vec![
            EmptySegment {
                segment: 0,
                from: [0.0, 0.0],
                to: [1.0, 0.0],
                emin: 1.0,
                emax: 2.0,
            },
            EmptySegment {
                segment: 2,
                from: [1.0, 0.0],
                to: [1.0, 1.0],
                emin: 1.0,
                emax: 2.0,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 path segment(s)"));
        assert!(msg.contains("segment 0"));
        assert!(msg.contains("segment 2"));
    }

    #[test]
    fn incompatible_files_names_attributes() {
        let err = Error::IncompatibleFiles(vec!["Ei", "temperature"]);
        assert!(err.to_string().contains("Ei, temperature"));
    }
}
