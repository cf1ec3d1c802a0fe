//! Adaptive bin-edge construction and weighted histogram primitives.
//!
//! Bin edges follow the half-open convention: a value belongs to
//! `[edges[i], edges[i+1])` except for the last bin, which also includes
//! its upper edge. This matches the binning the converted-data pipeline
//! has always produced, so cuts stay comparable across toolchains.

/// Builds adaptive bin edges over `values` with a minimum bin width.
///
/// Values are sorted and walked in order. The first edge sits half a
/// tolerance below the smallest value and the last edge half a tolerance
/// above the largest. An interior edge is placed at the midpoint of any
/// gap wider than the tolerance; otherwise a new edge is started once the
/// span since the previous edge exceeds the tolerance. Values closer than
/// the tolerance therefore share a bin, and every value ends up strictly
/// inside one interval.
///
/// An empty input yields an empty edge vector, which callers must treat
/// as "no data" rather than an error.
#[must_use]
pub fn bin_edges(values: &[f64], tolerance: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut edges = Vec::with_capacity(sorted.len() + 1);
    let mut last_edge = sorted[0] - 0.5 * tolerance;
    edges.push(last_edge);

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next - prev > tolerance {
            last_edge = 0.5 * (prev + next);
            edges.push(last_edge);
        } else if next - last_edge > tolerance {
            last_edge += tolerance;
            edges.push(last_edge);
        }
    }

    edges.push(sorted[sorted.len() - 1] + 0.5 * tolerance);
    edges
}

/// Midpoints of consecutive edges.
#[must_use]
pub fn bin_centers(edges: &[f64]) -> Vec<f64> {
    edges
        .windows(2)
        .map(|pair| 0.5 * (pair[0] + pair[1]))
        .collect()
}

/// Locates the bin index of `value` within `edges`, if any.
///
/// Bins are half-open with a closed last bin. NaN and out-of-range values
/// belong to no bin.
#[must_use]
pub fn find_bin(edges: &[f64], value: f64) -> Option<usize> {
    if edges.len() < 2 || value.is_nan() {
        return None;
    }
    let last = edges.len() - 1;
    if value < edges[0] || value > edges[last] {
        return None;
    }
    if value >= edges[last - 1] {
        // Last bin is closed on both sides.
        return Some(last - 1);
    }
    Some(edges.partition_point(|&e| e <= value) - 1)
}

/// Weighted histogram of `values` over `edges`.
///
/// NaN weights accumulate into their bin sum and deliberately poison it;
/// masked pixels surface as NaN aggregates instead of being dropped.
#[must_use]
pub fn histogram_weighted(values: &[f64], weights: &[f64], edges: &[f64]) -> Vec<f64> {
    debug_assert_eq!(values.len(), weights.len());
    let mut out = vec![0.0; edges.len().saturating_sub(1)];
    for (&v, &w) in values.iter().zip(weights) {
        if let Some(bin) = find_bin(edges, v) {
            out[bin] += w;
        }
    }
    out
}

/// Occupation counts of `values` over `edges`.
#[must_use]
pub fn histogram_counts(values: &[f64], edges: &[f64]) -> Vec<u64> {
    let mut out = vec![0u64; edges.len().saturating_sub(1)];
    for &v in values {
        if let Some(bin) = find_bin(edges, v) {
            out[bin] += 1;
        }
    }
    out
}
