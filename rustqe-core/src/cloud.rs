//! Structure of Arrays (`SoA`) point cloud for converted scan data.
//!
//! Converted scan points are stored in parallel vectors rather than an
//! array of structs. The cut engines only ever traverse one or two columns
//! at a time, so the columnar layout keeps those passes cache-friendly.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A batch of converted scan points stored in Structure of Arrays format.
///
/// One entry per detector pixel per scan step. A NaN `normalization` marks
/// a masked/invalid pixel; it flows through binning as a NaN bin sum and
/// must never panic or be clamped.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QCloud {
    /// Momentum transfer along x, in 1/Å.
    pub qx: Vec<f64>,
    /// Momentum transfer along y, in 1/Å.
    pub qy: Vec<f64>,
    /// Energy transfer, in meV.
    pub energy: Vec<f64>,
    /// Detector counts.
    pub intensity: Vec<f64>,
    /// Incident-beam monitor counts.
    pub monitor: Vec<f64>,
    /// Per-pixel sensitivity correction; NaN for masked pixels.
    pub normalization: Vec<f64>,
}

impl QCloud {
    /// Creates a new empty cloud with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            qx: Vec::with_capacity(capacity),
            qy: Vec::with_capacity(capacity),
            energy: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
            monitor: Vec::with_capacity(capacity),
            normalization: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of points in the cloud.
    #[must_use]
    pub fn len(&self) -> usize {
        self.qx.len()
    }

    /// Returns true if the cloud is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.qx.is_empty()
    }

    /// Clears all columns.
    pub fn clear(&mut self) {
        self.qx.clear();
        self.qy.clear();
        self.energy.clear();
        self.intensity.clear();
        self.monitor.clear();
        self.normalization.clear();
    }

    /// Pushes a single point into the cloud.
    pub fn push(&mut self, qx: f64, qy: f64, energy: f64, intensity: f64, monitor: f64, norm: f64) {
        self.qx.push(qx);
        self.qy.push(qy);
        self.energy.push(energy);
        self.intensity.push(intensity);
        self.monitor.push(monitor);
        self.normalization.push(norm);
    }

    /// Appends all points from another cloud to this one.
    pub fn append(&mut self, other: &QCloud) {
        self.qx.extend_from_slice(&other.qx);
        self.qy.extend_from_slice(&other.qy);
        self.energy.extend_from_slice(&other.energy);
        self.intensity.extend_from_slice(&other.intensity);
        self.monitor.extend_from_slice(&other.monitor);
        self.normalization.extend_from_slice(&other.normalization);
    }

    /// Gathers the points at `indices` into a new cloud, preserving order.
    ///
    /// # Panics
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut out = Self::with_capacity(indices.len());
        for &i in indices {
            out.push(
                self.qx[i],
                self.qy[i],
                self.energy[i],
                self.intensity[i],
                self.monitor[i],
                self.normalization[i],
            );
        }
        out
    }

    /// Checks that all columns have the same length.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] naming the first offending column.
    pub fn validate(&self) -> Result<()> {
        let expected = self.qx.len();
        for (column, len) in [
            ("qy", self.qy.len()),
            ("energy", self.energy.len()),
            ("intensity", self.intensity.len()),
            ("monitor", self.monitor.len()),
            ("normalization", self.normalization.len()),
        ] {
            if len != expected {
                return Err(Error::ShapeMismatch {
                    column,
                    expected,
                    found: len,
                });
            }
        }
        Ok(())
    }
}
