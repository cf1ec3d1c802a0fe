//! rustqe-binning: Cut engines for spectrometer data reduction.
//!
//! This crate provides the re-binning operations over converted point
//! clouds:
//! - **1D line cuts** with perpendicular width ([`cut_1d`])
//! - **Q-E maps** over energy slices ([`cut_qe`]) and multi-segment
//!   paths ([`cut_qe_line`], [`cut_qe_line_rlu`])
//! - **constant-Q energy cuts** ([`cut_1d_e`])
//! - **2D plane binning**, Cartesian or polar ([`cut_plane`])
//! - **powder averages** over |Q| ([`cut_powder`])
//! - **3D voxelization** with corner geometry ([`bin_3d`])
//!
#![warn(missing_docs)]

pub mod cut;
pub mod energy;
pub mod plane;
pub mod powder;
pub mod slice;
pub mod voxel;

pub use cut::{cut_1d, CutConfig, CutResult};
pub use energy::{cut_1d_e, EnergyCut};
pub use plane::{cut_plane, PlaneBinning, PlaneConfig, PlaneCut, PlaneRow};
pub use powder::{cut_powder, PowderCut};
pub use slice::{cut_qe, cut_qe_line, cut_qe_line_rlu, PathCut, PathSegment, QTransform, SliceCut};
pub use voxel::{bin_3d, calculate_axis_edges, centers_to_corners, VoxelGrid};

// Re-export core primitives the cut results are built from.
pub use rustqe_core::{bin_centers, bin_edges, BinnedData, Error, QCloud, Result};
