//! rustqe-voronoi: Pixel tessellation for multiplexed spectrometer scans.
//!
//! This crate builds non-overlapping pixel polygons around the
//! measurement points of A3-A4 raster scans:
//! - **boundary construction** over the raster with half-step padding
//!   ([`hull_boundary`])
//! - **Voronoi tessellation** with boundary clipping and invariant
//!   checking ([`tessellate`], [`match_to_points`])
//! - the **raster pipeline** combining scan files, merging duplicate
//!   positions, and projecting pixels to Q space ([`tessellate_raster`])
//!
#![warn(missing_docs)]

pub mod cell;
pub mod hull;
pub mod raster;
pub mod tessellation;

pub use cell::{voronoi_diagram, VoronoiDiagram};
pub use hull::hull_boundary;
pub use raster::{
    check_compatible, tessellate_raster, FileTolerances, RasterScan, RasterTessellation,
    ScanMetadata, K_CONVERSION,
};
pub use tessellation::{match_to_points, tessellate, vertex_arrays, vertex_centroid};

pub use rustqe_core::{Error, Result};
