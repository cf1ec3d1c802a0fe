//! A3-A4 raster pipeline: from scan files to Q-space pixel patches.
//!
//! Multiple scan files are combined into one tessellated raster: file
//! attributes are checked for compatibility, measurement positions from
//! all files are merged (duplicates summed/averaged), pixels are built
//! by Voronoi tessellation, matched back to the measurement ordering,
//! and finally projected into Q space per energy plane.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use geo::{LineString, Polygon};
use log::debug;
use ndarray::Array2;

use rustqe_core::{Error, Result};

use crate::hull::hull_boundary;
use crate::tessellation::{match_to_points, tessellate};

/// Conversion factor from sqrt(meV) to 1/Å: `k = 0.694692 * sqrt(E)`.
pub const K_CONVERSION: f64 = 0.694_692;

/// Attributes of one scan file compared before files may be combined.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanMetadata {
    /// Incident energy Ei in meV.
    pub incident_energy: f64,
    /// Sample temperature in K, if recorded.
    pub temperature: Option<f64>,
    /// Applied magnetic field in T, if recorded.
    pub magnetic_field: Option<f64>,
    /// Applied electric field in V/m, if recorded.
    pub electric_field: Option<f64>,
    /// Software binning factor of the file.
    pub binning: u32,
}

/// Tolerances within which two scan files count as equal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileTolerances {
    /// Allowed difference in incident energy, meV.
    pub incident_energy: f64,
    /// Allowed difference in temperature, K.
    pub temperature: f64,
    /// Allowed difference in magnetic field, T.
    pub magnetic_field: f64,
    /// Allowed difference in electric field, V/m.
    pub electric_field: f64,
}

impl Default for FileTolerances {
    fn default() -> Self {
        Self {
            incident_energy: 0.05,
            temperature: 0.2,
            magnetic_field: 0.2,
            electric_field: 0.2,
        }
    }
}

impl FileTolerances {
    /// Creates tolerances with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the incident-energy tolerance.
    #[must_use]
    pub fn with_incident_energy(mut self, tolerance: f64) -> Self {
        self.incident_energy = tolerance;
        self
    }

    /// Sets the temperature tolerance.
    #[must_use]
    pub fn with_temperature(mut self, tolerance: f64) -> Self {
        self.temperature = tolerance;
        self
    }

    /// Sets the magnetic-field tolerance.
    #[must_use]
    pub fn with_magnetic_field(mut self, tolerance: f64) -> Self {
        self.magnetic_field = tolerance;
        self
    }

    /// Sets the electric-field tolerance.
    #[must_use]
    pub fn with_electric_field(mut self, tolerance: f64) -> Self {
        self.electric_field = tolerance;
        self
    }
}

/// One converted scan file, reduced to what the raster pipeline needs.
///
/// The data arrays have one row per (A3, A4) measurement position (A3
/// outer, A4 inner, matching a row-major meshgrid) and one column per
/// energy plane.
#[derive(Debug, Clone)]
pub struct RasterScan {
    /// File attributes compared before combining.
    pub metadata: ScanMetadata,
    /// Sample rotation steps, degrees.
    pub a3: Vec<f64>,
    /// Instrument detector angles, degrees, one per detector column.
    pub a4: Vec<f64>,
    /// Detector counts, shape (positions, planes).
    pub intensity: Array2<f64>,
    /// Per-pixel sensitivity correction; NaN marks masked pixels.
    pub normalization: Array2<f64>,
    /// Monitor counts, shape (positions, planes).
    pub monitor: Array2<f64>,
    /// Mean energy transfer per plane, meV.
    pub plane_energies: Vec<f64>,
}

impl RasterScan {
    /// The (A3, A4) measurement positions of this file in row order.
    #[must_use]
    pub fn points(&self) -> Vec<[f64; 2]> {
        let mut points = Vec::with_capacity(self.a3.len() * self.a4.len());
        for &a3 in &self.a3 {
            for &a4 in &self.a4 {
                points.push([a3, a4]);
            }
        }
        points
    }

    /// Checks the data arrays against the angle axes.
    ///
    /// # Errors
    /// [`Error::ShapeMismatch`] naming the offending array.
    pub fn validate(&self) -> Result<()> {
        let rows = self.a3.len() * self.a4.len();
        let planes = self.plane_energies.len();
        for (column, shape) in [
            ("intensity", self.intensity.dim()),
            ("normalization", self.normalization.dim()),
            ("monitor", self.monitor.dim()),
        ] {
            if shape.0 != rows {
                return Err(Error::ShapeMismatch {
                    column,
                    expected: rows,
                    found: shape.0,
                });
            }
            if shape.1 != planes {
                return Err(Error::ShapeMismatch {
                    column,
                    expected: planes,
                    found: shape.1,
                });
            }
        }
        Ok(())
    }
}

fn is_close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

fn options_close(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => is_close(x, y, tolerance),
        _ => false,
    }
}

/// Verifies that all files agree on the attributes that must match
/// before their rasters may be combined.
///
/// # Errors
/// [`Error::IncompatibleFiles`] naming every differing attribute,
/// [`Error::NoScanFiles`] for an empty file list.
pub fn check_compatible(files: &[RasterScan], tolerances: FileTolerances) -> Result<()> {
    let Some((first, rest)) = files.split_first() else {
        return Err(Error::NoScanFiles);
    };
    let m0 = &first.metadata;
    let mut differing: Vec<&'static str> = Vec::new();
    if !rest
        .iter()
        .all(|f| is_close(m0.incident_energy, f.metadata.incident_energy, tolerances.incident_energy))
    {
        differing.push("Ei");
    }
    if !rest
        .iter()
        .all(|f| options_close(m0.temperature, f.metadata.temperature, tolerances.temperature))
    {
        differing.push("temperature");
    }
    if !rest.iter().all(|f| {
        options_close(m0.magnetic_field, f.metadata.magnetic_field, tolerances.magnetic_field)
    }) {
        differing.push("magnetic field");
    }
    if !rest.iter().all(|f| {
        options_close(m0.electric_field, f.metadata.electric_field, tolerances.electric_field)
    }) {
        differing.push("electric field");
    }
    if !rest.iter().all(|f| m0.binning == f.metadata.binning) {
        differing.push("binning");
    }
    if differing.is_empty() {
        Ok(())
    } else {
        Err(Error::IncompatibleFiles(differing))
    }
}

/// The tessellated raster of one or more combined scan files.
///
/// `polygons[i]` is the pixel of `points[i]`, and row `i` of the data
/// arrays holds that pixel's per-plane aggregates.
#[derive(Debug, Clone)]
pub struct RasterTessellation {
    /// Measurement positions (A3, A4), merged across files.
    pub points: Vec<[f64; 2]>,
    /// One pixel polygon per point, in point order, in A3-A4 space.
    pub polygons: Vec<Polygon<f64>>,
    /// Detector counts, shape (points, planes).
    pub intensity: Array2<f64>,
    /// Sensitivity correction, shape (points, planes).
    pub normalization: Array2<f64>,
    /// Monitor counts, shape (points, planes).
    pub monitor: Array2<f64>,
    /// Mean energy transfer per plane, meV.
    pub plane_energies: Vec<f64>,
    /// Incident energy of the combined files, meV.
    pub incident_energy: f64,
}

impl RasterTessellation {
    /// Corrected intensity per pixel for one plane or a combination.
    ///
    /// A single plane uses `I / (norm * monitor)` directly; combined
    /// planes sum intensity and monitor while averaging normalization,
    /// all NaN-ignoring, then form the same ratio. Masked pixels yield
    /// NaN, zero monitor yields inf; neither is clamped.
    ///
    /// # Panics
    /// Panics if any plane index is out of bounds.
    #[must_use]
    pub fn plane_intensity(&self, planes: &[usize]) -> Vec<f64> {
        let n = self.points.len();
        let mut out = Vec::with_capacity(n);
        for row in 0..n {
            let value = if let [plane] = planes {
                let i = self.intensity[[row, *plane]];
                let norm = self.normalization[[row, *plane]];
                let mon = self.monitor[[row, *plane]];
                i / (norm * mon)
            } else {
                let i: f64 = planes
                    .iter()
                    .map(|&p| self.intensity[[row, p]])
                    .filter(|v| !v.is_nan())
                    .sum();
                let mon: f64 = planes
                    .iter()
                    .map(|&p| self.monitor[[row, p]])
                    .filter(|v| !v.is_nan())
                    .sum();
                let norm = nan_mean(planes.iter().map(|&p| self.normalization[[row, p]]));
                i / (norm * mon)
            };
            out.push(value);
        }
        out
    }

    /// Mean energy of a plane combination.
    ///
    /// # Panics
    /// Panics if any plane index is out of bounds.
    #[must_use]
    pub fn plane_energy(&self, planes: &[usize]) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = planes.len() as f64;
        planes.iter().map(|&p| self.plane_energies[p]).sum::<f64>() / n
    }

    /// Projects every pixel polygon into Q space for one energy plane.
    ///
    /// Each vertex (a3, a4) maps through the scattering triangle:
    /// `qx' = ki - kf cos(a4)`, `qy' = -kf sin(a4)`, rotated by a3, with
    /// `ki = K * sqrt(Ei)` and `kf = K * sqrt(Ei - E_plane)`.
    ///
    /// # Panics
    /// Panics if `plane` is out of bounds.
    #[must_use]
    pub fn q_patches(&self, plane: usize) -> Vec<Polygon<f64>> {
        let ki = K_CONVERSION * self.incident_energy.sqrt();
        let kf = K_CONVERSION * (self.incident_energy - self.plane_energies[plane]).sqrt();
        self.polygons
            .iter()
            .map(|polygon| {
                let ring: Vec<(f64, f64)> = polygon
                    .exterior()
                    .0
                    .iter()
                    .map(|c| {
                        let theta = c.x.to_radians();
                        let a4 = c.y.to_radians();
                        let qx = ki - kf * a4.cos();
                        let qy = -kf * a4.sin();
                        (
                            qx * theta.cos() - qy * theta.sin(),
                            qy * theta.cos() + qx * theta.sin(),
                        )
                    })
                    .collect();
                Polygon::new(LineString::from(ring), vec![])
            })
            .collect()
    }
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        if !v.is_nan() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        f64::NAN
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        sum / n
    }
}

/// NaN-ignoring mean of two values; NaN only when both are NaN.
fn nan_mean_pair(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => b,
        (false, true) => a,
        (false, false) => 0.5 * (a + b),
    }
}

fn point_key(p: [f64; 2]) -> (u64, u64) {
    (p[0].to_bits(), p[1].to_bits())
}

/// Combines scan files into one tessellated raster.
///
/// Files are compatibility-checked, their measurement grids merged.
/// Positions measured more than once (overlapping scans) are collapsed:
/// intensity and monitor are summed while normalization is averaged,
/// NaN-ignoring, one duplicate at a time. With duplicates present the
/// merged positions are sorted lexicographically and the per-file hull
/// boundaries bound the tessellation; otherwise the original meshgrid
/// ordering is kept and the boundaries are derived per file group.
///
/// # Errors
/// Compatibility, shape, and every tessellation invariant error.
pub fn tessellate_raster(
    files: &[RasterScan],
    tolerances: FileTolerances,
) -> Result<RasterTessellation> {
    check_compatible(files, tolerances)?;
    for file in files {
        file.validate()?;
    }
    let planes = files[0].plane_energies.len();
    for file in &files[1..] {
        if file.plane_energies.len() != planes {
            return Err(Error::ShapeMismatch {
                column: "plane_energies",
                expected: planes,
                found: file.plane_energies.len(),
            });
        }
    }

    // Concatenate all files' positions and data rows.
    let group_points: Vec<Vec<[f64; 2]>> = files.iter().map(RasterScan::points).collect();
    let all_points: Vec<[f64; 2]> = group_points.iter().flatten().copied().collect();
    let n_rows = all_points.len();

    let mut intensity = Array2::<f64>::zeros((n_rows, planes));
    let mut normalization = Array2::<f64>::zeros((n_rows, planes));
    let mut monitor = Array2::<f64>::zeros((n_rows, planes));
    let mut row = 0;
    for file in files {
        for r in 0..file.intensity.nrows() {
            intensity.row_mut(row).assign(&file.intensity.row(r));
            normalization
                .row_mut(row)
                .assign(&file.normalization.row(r));
            monitor.row_mut(row).assign(&file.monitor.row(r));
            row += 1;
        }
    }

    // Locate exact duplicates across the combined position list.
    let mut first_occurrence: HashMap<(u64, u64), usize> = HashMap::with_capacity(n_rows);
    let mut duplicates: Vec<usize> = Vec::new();
    for (i, &p) in all_points.iter().enumerate() {
        match first_occurrence.entry(point_key(p)) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(_) => duplicates.push(i),
        }
    }

    let (points, intensity, normalization, monitor, polygons) = if duplicates.is_empty() {
        debug!("raster merge: {} positions, no duplicates", n_rows);
        let polygons = tessellate(&group_points, None)?;
        (all_points, intensity, normalization, monitor, polygons)
    } else {
        debug!(
            "raster merge: {} positions, {} duplicates",
            n_rows,
            duplicates.len()
        );
        // Unique positions in lexicographic order carry the merged rows.
        let mut unique: Vec<(usize, [f64; 2])> = first_occurrence
            .values()
            .map(|&i| (i, all_points[i]))
            .collect();
        unique.sort_by(|a, b| {
            a.1[0]
                .total_cmp(&b.1[0])
                .then_with(|| a.1[1].total_cmp(&b.1[1]))
        });
        let sorted_points: Vec<[f64; 2]> = unique.iter().map(|&(_, p)| p).collect();
        let position: HashMap<(u64, u64), usize> = unique
            .iter()
            .enumerate()
            .map(|(pos, &(_, p))| (point_key(p), pos))
            .collect();

        let mut merged_i = Array2::<f64>::zeros((unique.len(), planes));
        let mut merged_n = Array2::<f64>::zeros((unique.len(), planes));
        let mut merged_m = Array2::<f64>::zeros((unique.len(), planes));
        for (pos, &(i, _)) in unique.iter().enumerate() {
            merged_i.row_mut(pos).assign(&intensity.row(i));
            merged_n.row_mut(pos).assign(&normalization.row(i));
            merged_m.row_mut(pos).assign(&monitor.row(i));
        }
        for &dup in &duplicates {
            let pos = position[&point_key(all_points[dup])];
            for j in 0..planes {
                merged_i[[pos, j]] += intensity[[dup, j]];
                merged_m[[pos, j]] += monitor[[dup, j]];
                merged_n[[pos, j]] = nan_mean_pair(merged_n[[pos, j]], normalization[[dup, j]]);
            }
        }

        let boundaries: Vec<Polygon<f64>> = files
            .iter()
            .map(|file| {
                let points = file.points();
                let (a3, a4): (Vec<f64>, Vec<f64>) = points.iter().map(|p| (p[0], p[1])).unzip();
                hull_boundary(&a3, &a4)
            })
            .collect::<Result<_>>()?;
        let polygons = tessellate(&[sorted_points.clone()], Some(&boundaries))?;
        (sorted_points, merged_i, merged_n, merged_m, polygons)
    };

    let polygons = match_to_points(&polygons, &points)?;

    Ok(RasterTessellation {
        points,
        polygons,
        intensity,
        normalization,
        monitor,
        plane_energies: files[0].plane_energies.clone(),
        incident_energy: files[0].metadata.incident_energy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn metadata() -> ScanMetadata {
        ScanMetadata {
            incident_energy: 5.0,
            temperature: Some(1.6),
            magnetic_field: None,
            electric_field: None,
            binning: 8,
        }
    }

    fn scan(a3_offset: f64, value: f64) -> RasterScan {
        let a3: Vec<f64> = (0..4).map(|i| a3_offset + f64::from(i)).collect();
        let a4: Vec<f64> = (0..5).map(|j| -40.0 - 2.0 * f64::from(j)).collect();
        let rows = a3.len() * a4.len();
        RasterScan {
            metadata: metadata(),
            a3,
            a4,
            intensity: Array2::from_elem((rows, 2), value),
            normalization: Array2::from_elem((rows, 2), 1.0),
            monitor: Array2::from_elem((rows, 2), 100.0),
            plane_energies: vec![2.0, 3.0],
        }
    }

    #[test]
    fn test_compatibility_passes_within_tolerance() {
        let mut b = scan(10.0, 1.0);
        b.metadata.incident_energy = 5.04;
        b.metadata.temperature = Some(1.7);
        assert!(check_compatible(&[scan(0.0, 1.0), b], FileTolerances::default()).is_ok());
    }

    #[test]
    fn test_compatibility_names_every_differing_attribute() {
        let mut b = scan(10.0, 1.0);
        b.metadata.incident_energy = 6.0;
        b.metadata.temperature = None;
        b.metadata.binning = 1;
        let err = check_compatible(&[scan(0.0, 1.0), b], FileTolerances::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Ei"));
        assert!(msg.contains("temperature"));
        assert!(msg.contains("binning"));
        assert!(!msg.contains("magnetic"));
    }

    #[test]
    fn test_no_files_is_an_error() {
        assert!(matches!(
            check_compatible(&[], FileTolerances::default()),
            Err(Error::NoScanFiles)
        ));
    }

    #[test]
    fn test_single_file_tessellation_keeps_meshgrid_order() {
        let file = scan(0.0, 2.0);
        let result = tessellate_raster(&[file.clone()], FileTolerances::default()).unwrap();
        assert_eq!(result.points, file.points());
        assert_eq!(result.polygons.len(), result.points.len());
        assert_eq!(result.intensity.dim(), (20, 2));
    }

    #[test]
    fn test_disjoint_files_concatenate() {
        let result = tessellate_raster(
            &[scan(0.0, 1.0), scan(10.0, 2.0)],
            FileTolerances::default(),
        )
        .unwrap();
        assert_eq!(result.points.len(), 40);
        assert_eq!(result.polygons.len(), 40);
    }

    #[test]
    fn test_overlapping_files_merge_duplicates() {
        // Identical rasters: every position is measured twice.
        let result = tessellate_raster(
            &[scan(0.0, 1.0), scan(0.0, 2.0)],
            FileTolerances::default(),
        )
        .unwrap();
        assert_eq!(result.points.len(), 20);
        // Intensity and monitor sum, normalization averages.
        assert_relative_eq!(result.intensity[[0, 0]], 3.0);
        assert_relative_eq!(result.monitor[[0, 0]], 200.0);
        assert_relative_eq!(result.normalization[[0, 0]], 1.0);
        // Merged positions come out lexicographically sorted.
        for pair in result.points.windows(2) {
            assert!(pair[0][0] < pair[1][0] || (pair[0][0] == pair[1][0] && pair[0][1] < pair[1][1]));
        }
    }

    #[test]
    fn test_duplicate_merge_nanmean_normalization() {
        let mut a = scan(0.0, 1.0);
        a.normalization.fill(f64::NAN);
        let result =
            tessellate_raster(&[a, scan(0.0, 2.0)], FileTolerances::default()).unwrap();
        // One NaN contribution: the mean falls back to the finite value.
        assert_relative_eq!(result.normalization[[0, 0]], 1.0);
    }

    #[test]
    fn test_plane_intensity_single_and_combined() {
        let result = tessellate_raster(&[scan(0.0, 4.0)], FileTolerances::default()).unwrap();
        let single = result.plane_intensity(&[0]);
        assert_relative_eq!(single[0], 4.0 / 100.0);
        let combined = result.plane_intensity(&[0, 1]);
        // nansum(I) / (nanmean(norm) * nansum(monitor)) = 8 / (1 * 200).
        assert_relative_eq!(combined[0], 8.0 / 200.0);
    }

    #[test]
    fn test_plane_intensity_masked_pixel_is_nan() {
        let mut file = scan(0.0, 4.0);
        file.normalization[[3, 0]] = f64::NAN;
        let result = tessellate_raster(&[file], FileTolerances::default()).unwrap();
        let single = result.plane_intensity(&[0]);
        assert!(single[3].is_nan());
        assert!(!single[4].is_nan());
    }

    #[test]
    fn test_q_patches_shrink_with_energy_transfer() {
        use geo::Area;
        let result = tessellate_raster(&[scan(0.0, 1.0)], FileTolerances::default()).unwrap();
        let low = result.q_patches(0);
        let high = result.q_patches(1);
        assert_eq!(low.len(), result.points.len());
        // kf drops with energy transfer, pulling patches toward smaller
        // |Q| and shrinking their area.
        let area_low: f64 = low.iter().map(Area::unsigned_area).sum();
        let area_high: f64 = high.iter().map(Area::unsigned_area).sum();
        assert!(area_high < area_low);
    }

    #[test]
    fn test_plane_energy_mean() {
        let result = tessellate_raster(&[scan(0.0, 1.0)], FileTolerances::default()).unwrap();
        assert_relative_eq!(result.plane_energy(&[0, 1]), 2.5);
    }
}
