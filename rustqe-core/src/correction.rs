//! Aggregated bin tuples and normalization-corrected intensity.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Divides with IEEE semantics made explicit at the call site.
///
/// A zero denominator yields inf (or NaN for 0/0), a NaN denominator
/// yields NaN. Masked pixels and empty bins surface in the corrected
/// intensity this way instead of being clamped or raising.
#[inline]
#[must_use]
pub fn nan_safe_div(num: f64, den: f64) -> f64 {
    num / den
}

/// Per-bin aggregates of one binning operation.
///
/// Intensity, monitor and normalization are weighted sums over the points
/// that fell in each bin; `norm_count` is the number of contributing
/// points. Normalization carries mean semantics only where raster
/// duplicates were merged upstream.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinnedData {
    /// Summed detector counts per bin.
    pub intensity: Vec<f64>,
    /// Summed monitor counts per bin.
    pub monitor: Vec<f64>,
    /// Summed normalization per bin; NaN where a masked pixel contributed.
    pub normalization: Vec<f64>,
    /// Number of points per bin.
    pub norm_count: Vec<u64>,
}

impl BinnedData {
    /// Returns the number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    /// Returns true if there are no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// Normalization-corrected intensity per bin:
    /// `I * count / (monitor * normalization)`.
    ///
    /// Zero monitor or zero/NaN normalization produce inf/NaN entries;
    /// callers deciding what to display own that policy.
    #[must_use]
    pub fn corrected_intensity(&self) -> Vec<f64> {
        self.intensity
            .iter()
            .zip(&self.monitor)
            .zip(&self.normalization)
            .zip(&self.norm_count)
            .map(|(((&i, &m), &n), &c)| {
                #[allow(clippy::cast_precision_loss)]
                nan_safe_div(i * c as f64, m * n)
            })
            .collect()
    }
}
