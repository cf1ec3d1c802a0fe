//! rustqe-core: Data model and binning primitives for spectrometer data reduction.
//!
//! This crate provides the shared foundations for the cut and tessellation
//! engines: the columnar point cloud, adaptive bin-edge construction,
//! weighted histogram primitives, aggregate bin tuples, and the error
//! taxonomy.

pub mod binning;
pub mod cloud;
pub mod correction;
pub mod error;

pub use binning::{bin_centers, bin_edges, find_bin, histogram_counts, histogram_weighted};
pub use cloud::QCloud;
pub use correction::{nan_safe_div, BinnedData};
pub use error::{EmptySegment, Error, Result};
