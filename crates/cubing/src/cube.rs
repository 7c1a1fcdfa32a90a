//! The data cube and its derived products.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use ifs_common::{DataContainer, Passband, Photometry, SkyCoord, SkyFootprint};
use projection::{CubeShape, CubeWcs, WorldTransform};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::CubingConfig;
use crate::error::{CubingError, Result};
use crate::stats::{nan_max, nan_mean, nan_median, nan_std, nan_sum};
use crate::store;

/// Default sigma-clipping threshold for white images.
pub const DEFAULT_SIGMA_CLIP: f64 = 3.0;

/// Non-finite floats are stored as JSON null; read them back as NaN.
fn nan_if_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Name and integration time of an exposure combined into a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub name: String,
    #[serde(deserialize_with = "nan_if_null")]
    pub exposure_time: f64,
}

/// Outcome of a correction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionStatus {
    Applied,
    Failed,
}

/// One entry of the correction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub status: CorrectionStatus,
    /// Free-form description, e.g. the calibration file used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Metadata carried by a cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeInfo {
    /// Cube identifier.
    pub name: String,
    /// Kernel half-width used for interpolation, in arcseconds.
    #[serde(deserialize_with = "nan_if_null")]
    pub kernel_size_arcsec: f64,
    /// Spatial pixel size, in arcseconds.
    #[serde(deserialize_with = "nan_if_null")]
    pub pixel_size_arcsec: f64,
    /// Effective exposure time of every voxel, laid out like the intensity.
    #[serde(skip)]
    pub pixel_exptime: Vec<f64>,
    /// Exposures combined into the cube, in order.
    pub exposures: Vec<ExposureRecord>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Corrections applied to the data, keyed by name.
    #[serde(default)]
    pub corrections: BTreeMap<String, CorrectionRecord>,
    /// Free-form key/values.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CubeInfo {
    /// Create metadata with the given name and no other content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kernel_size_arcsec: f64::NAN,
            pixel_size_arcsec: f64::NAN,
            pixel_exptime: Vec::new(),
            exposures: Vec::new(),
            created: Utc::now(),
            corrections: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Add a free-form key/value.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Record the outcome of a correction, replacing any earlier entry.
    pub fn record_correction(
        &mut self,
        name: impl Into<String>,
        status: CorrectionStatus,
        detail: Option<String>,
    ) {
        self.corrections
            .insert(name.into(), CorrectionRecord { status, detail });
    }

    /// True when the named correction has been applied.
    pub fn is_corrected(&self, name: &str) -> bool {
        self.corrections
            .get(name)
            .is_some_and(|record| record.status == CorrectionStatus::Applied)
    }
}

impl Default for CubeInfo {
    fn default() -> Self {
        Self::new("cube")
    }
}

/// Statistic used to summarise centroids over a block of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentroidStat {
    #[default]
    Median,
    Mean,
}

impl CentroidStat {
    fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Self::Median => nan_median(values),
            Self::Mean => nan_mean(values),
        }
    }
}

/// A calibrated IFS data cube laid out as (wavelength, row, column).
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    intensity: Vec<f64>,
    variance: Vec<f64>,
    wcs: CubeWcs,
    info: CubeInfo,
}

impl Cube {
    /// Create a cube, checking every array against the WCS shape.
    ///
    /// An empty `pixel_exptime` map is filled with NaN.
    pub fn new(intensity: Vec<f64>, variance: Vec<f64>, wcs: CubeWcs, mut info: CubeInfo) -> Result<Self> {
        let shape = wcs.shape;
        if intensity.len() != shape.len() {
            return Err(CubingError::shape_mismatch("intensity", shape.len(), intensity.len()));
        }
        if variance.len() != shape.len() {
            return Err(CubingError::shape_mismatch("variance", shape.len(), variance.len()));
        }
        if info.pixel_exptime.is_empty() {
            info.pixel_exptime = vec![f64::NAN; shape.len()];
        } else if info.pixel_exptime.len() != shape.len() {
            return Err(CubingError::shape_mismatch(
                "pixel exposure time",
                shape.len(),
                info.pixel_exptime.len(),
            ));
        }

        Ok(Self {
            intensity,
            variance,
            wcs,
            info,
        })
    }

    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    pub fn wcs(&self) -> &CubeWcs {
        &self.wcs
    }

    pub fn info(&self) -> &CubeInfo {
        &self.info
    }

    pub fn shape(&self) -> CubeShape {
        self.wcs.shape
    }

    pub fn n_wavelength(&self) -> usize {
        self.wcs.shape.n_wavelength
    }

    pub fn n_rows(&self) -> usize {
        self.wcs.shape.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.wcs.shape.n_cols
    }

    /// Wavelength of every channel, derived from the WCS.
    pub fn wavelength(&self) -> Vec<f64> {
        self.wcs.wavelengths()
    }

    /// Spectrum of the spatial pixel at (`row`, `col`).
    pub fn spectrum(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        self.column_at(&self.intensity, row, col)
    }

    /// Variance spectrum of the spatial pixel at (`row`, `col`).
    pub fn variance_spectrum(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        self.column_at(&self.variance, row, col)
    }

    fn column_at(&self, data: &[f64], row: usize, col: usize) -> Option<Vec<f64>> {
        let shape = self.shape();
        if row >= shape.n_rows || col >= shape.n_cols {
            return None;
        }
        Some(
            (0..shape.n_wavelength)
                .map(|k| data[shape.index(k, row, col)])
                .collect(),
        )
    }

    /// Replace the intensity with the output of `correction`.
    ///
    /// The correction is recorded as applied in the cube's log.
    pub fn set_intensity_corrected(&mut self, correction: &str, intensity: Vec<f64>) -> Result<()> {
        if intensity.len() != self.shape().len() {
            return Err(CubingError::shape_mismatch(
                "corrected intensity",
                self.shape().len(),
                intensity.len(),
            ));
        }
        debug!(cube = %self.info.name, correction, "Updating cube intensity");
        self.intensity = intensity;
        self.info
            .record_correction(correction, CorrectionStatus::Applied, None);
        Ok(())
    }

    /// Replace the variance with the output of `correction`.
    pub fn set_variance_corrected(&mut self, correction: &str, variance: Vec<f64>) -> Result<()> {
        if variance.len() != self.shape().len() {
            return Err(CubingError::shape_mismatch(
                "corrected variance",
                self.shape().len(),
                variance.len(),
            ));
        }
        debug!(cube = %self.info.name, correction, "Updating cube variance");
        self.variance = variance;
        self.info
            .record_correction(correction, CorrectionStatus::Applied, None);
        Ok(())
    }

    /// True when the named correction has been applied to this cube.
    pub fn is_corrected(&self, correction: &str) -> bool {
        self.info.is_corrected(correction)
    }

    /// Mutable access to the metadata, e.g. to annotate the correction log.
    pub fn info_mut(&mut self) -> &mut CubeInfo {
        &mut self.info
    }

    /// Channel-averaged image, `n_rows × n_cols`.
    ///
    /// Only channels inside `wave_range` (inclusive) are used. With
    /// `sigma_clip = Some(s)`, channels outside `median ± s·std` of each
    /// pixel's spectrum are dropped. Non-finite samples are ignored; pixels
    /// without any remaining sample are NaN.
    pub fn white_image(&self, wave_range: Option<(f64, f64)>, sigma_clip: Option<f64>) -> Vec<f64> {
        let shape = self.shape();
        let wavelength = self.wavelength();
        let channels: Vec<usize> = (0..shape.n_wavelength)
            .filter(|&k| match wave_range {
                Some((lo, hi)) => wavelength[k] >= lo && wavelength[k] <= hi,
                None => true,
            })
            .collect();

        let mut image = Vec::with_capacity(shape.spatial_len());
        for row in 0..shape.n_rows {
            for col in 0..shape.n_cols {
                let samples: Vec<f64> = channels
                    .iter()
                    .map(|&k| self.intensity[shape.index(k, row, col)])
                    .collect();

                let kept: Vec<f64> = match sigma_clip {
                    Some(s) => {
                        let median = nan_median(&samples);
                        let std = nan_std(&samples);
                        samples
                            .into_iter()
                            .filter(|v| *v >= median - s * std && *v <= median + s * std)
                            .collect()
                    }
                    None => samples,
                };
                image.push(nan_mean(&kept));
            }
        }
        image
    }

    /// Flux-weighted centroid (column, row) of every channel.
    ///
    /// Weights are `intensity^power`; non-finite weights are ignored. Each
    /// block of `wavelength_step` channels is replaced by its `stat`.
    pub fn centre_of_mass(
        &self,
        wavelength_step: usize,
        stat: CentroidStat,
        power: f64,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        if wavelength_step == 0 {
            return Err(CubingError::invalid_input("wavelength_step must be > 0"));
        }

        let shape = self.shape();
        let mut cols = Vec::with_capacity(shape.n_wavelength);
        let mut rows = Vec::with_capacity(shape.n_wavelength);

        for k in 0..shape.n_wavelength {
            let (mut sum_w, mut sum_col, mut sum_row) = (0.0, 0.0, 0.0);
            for row in 0..shape.n_rows {
                for col in 0..shape.n_cols {
                    let w = self.intensity[shape.index(k, row, col)].powf(power);
                    if !w.is_finite() {
                        continue;
                    }
                    sum_w += w;
                    sum_col += w * col as f64;
                    sum_row += w * row as f64;
                }
            }
            if sum_w != 0.0 {
                cols.push(sum_col / sum_w);
                rows.push(sum_row / sum_w);
            } else {
                cols.push(f64::NAN);
                rows.push(f64::NAN);
            }
        }

        for start in (0..shape.n_wavelength).step_by(wavelength_step) {
            let end = (start + wavelength_step).min(shape.n_wavelength);
            let col_stat = stat.apply(&cols[start..end]);
            let row_stat = stat.apply(&rows[start..end]);
            cols[start..end].fill(col_stat);
            rows[start..end].fill(row_stat);
        }

        Ok((cols, rows))
    }

    /// Normalised cumulative light of the spatial pixels ranked from
    /// brightest to faintest.
    fn light_curve(&self) -> Option<Vec<f64>> {
        let shape = self.shape();
        let mut collapsed: Vec<f64> = (0..shape.n_rows)
            .flat_map(|row| (0..shape.n_cols).map(move |col| (row, col)))
            .map(|(row, col)| {
                let spectrum: Vec<f64> = (0..shape.n_wavelength)
                    .map(|k| self.intensity[shape.index(k, row, col)])
                    .collect();
                nan_sum(&spectrum)
            })
            .collect();
        collapsed.sort_by(|a, b| b.total_cmp(a));

        let mut running = 0.0;
        let cumulative: Vec<f64> = collapsed
            .iter()
            .map(|v| {
                running += v;
                running
            })
            .collect();

        let max = nan_max(&cumulative);
        if !(max.is_finite() && max > 0.0) {
            return None;
        }
        Some(cumulative.into_iter().map(|v| v / max).collect())
    }

    /// Position in the light curve where `frac` of the light is reached.
    fn light_frac_position(curve: &[f64], frac: f64) -> usize {
        curve
            .iter()
            .position(|&v| v >= frac)
            .unwrap_or(curve.len().saturating_sub(1))
    }

    /// Normalised cumulative light at the first ranked pixel where it
    /// reaches `frac`. NaN when the cube carries no positive light.
    pub fn integrated_light_frac(&self, frac: f64) -> f64 {
        match self.light_curve() {
            Some(curve) => curve[Self::light_frac_position(&curve, frac)],
            None => f64::NAN,
        }
    }

    /// Number of brightest spatial pixels needed to reach `frac` of the light.
    pub fn integrated_light_pixels(&self, frac: f64) -> usize {
        match self.light_curve() {
            Some(curve) => Self::light_frac_position(&curve, frac) + 1,
            None => 0,
        }
    }

    /// RA and Dec offsets (arcsec) of pixel centres from the field centre.
    pub fn spaxel_offsets(&self) -> (Vec<f64>, Vec<f64>) {
        let pixel = self.wcs.pixel_scale_arcsec();
        let offsets = |n: usize| -> Vec<f64> {
            (0..n)
                .map(|i| (i as f64 - (n as f64 - 1.0) / 2.0) * pixel)
                .collect()
        };
        (offsets(self.n_cols()), offsets(self.n_rows()))
    }

    /// Write the cube as a Zarr V3 group at `path`.
    pub fn save_zarr(&self, path: impl AsRef<Path>, config: &CubingConfig) -> Result<()> {
        store::write_cube(self, path.as_ref(), config)
    }

    /// Read a cube written by [`Cube::save_zarr`].
    pub fn load_zarr(path: impl AsRef<Path>) -> Result<Self> {
        store::read_cube(path.as_ref())
    }
}

impl DataContainer for Cube {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn sky_footprint(&self) -> Option<SkyFootprint> {
        SkyFootprint::from_coords(&self.wcs.corners())
    }

    fn spatial_coordinates(&self) -> Vec<SkyCoord> {
        let shape = self.shape();
        (0..shape.n_rows)
            .flat_map(|row| (0..shape.n_cols).map(move |col| (row, col)))
            .map(|(row, col)| self.wcs.pixel_to_sky(col as f64, row as f64))
            .collect()
    }

    fn synthetic_photometry(&self, passband: &Passband) -> Vec<Photometry> {
        let wavelength = self.wavelength();
        let response = passband.resample(&wavelength);
        let shape = self.shape();
        (0..shape.n_rows)
            .flat_map(|row| (0..shape.n_cols).map(move |col| (row, col)))
            .map(|(row, col)| {
                let flux = self.column_at(&self.intensity, row, col).unwrap_or_default();
                let var = self.column_at(&self.variance, row, col).unwrap_or_default();
                Passband::synthetic_flux(&response, &wavelength, &flux, &var)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifs_common::ARCSEC_PER_DEG;
    use projection::{build_wcs, WcsParams};

    fn grid(n_wave: usize, n_rows: usize, n_cols: usize) -> CubeWcs {
        build_wcs(&WcsParams {
            n_wavelength: n_wave,
            n_rows,
            n_cols,
            wavelength_start: 6000.0,
            wavelength_step: 10.0,
            center: SkyCoord::new(45.0, 10.0),
            spatial_pixel_size_deg: 0.5 / ARCSEC_PER_DEG,
        })
        .unwrap()
    }

    fn cube_from(values: impl Fn(usize, usize, usize) -> f64, n: (usize, usize, usize)) -> Cube {
        let wcs = grid(n.0, n.1, n.2);
        let shape = wcs.shape;
        let mut data = vec![0.0; shape.len()];
        for k in 0..n.0 {
            for r in 0..n.1 {
                for c in 0..n.2 {
                    data[shape.index(k, r, c)] = values(k, r, c);
                }
            }
        }
        let var = vec![1.0; shape.len()];
        Cube::new(data, var, wcs, CubeInfo::new("test")).unwrap()
    }

    #[test]
    fn test_accessors() {
        let cube = cube_from(|k, r, c| (k * 100 + r * 10 + c) as f64, (3, 4, 5));
        assert_eq!(cube.n_wavelength(), 3);
        assert_eq!(cube.n_rows(), 4);
        assert_eq!(cube.n_cols(), 5);
        assert_eq!(cube.wavelength(), vec![6000.0, 6010.0, 6020.0]);
        assert_eq!(cube.spectrum(2, 3), Some(vec![23.0, 123.0, 223.0]));
        assert!(cube.spectrum(4, 0).is_none());
        assert_eq!(cube.info().pixel_exptime.len(), 60);
    }

    #[test]
    fn test_shape_checked() {
        let wcs = grid(2, 2, 2);
        assert!(Cube::new(vec![0.0; 7], vec![0.0; 8], wcs.clone(), CubeInfo::default()).is_err());

        let mut cube = Cube::new(vec![0.0; 8], vec![0.0; 8], wcs, CubeInfo::default()).unwrap();
        assert!(cube.set_intensity_corrected("flat", vec![1.0; 3]).is_err());
        assert!(!cube.is_corrected("flat"));
        cube.set_intensity_corrected("flat", vec![1.0; 8]).unwrap();
        cube.set_variance_corrected("flat", vec![2.0; 8]).unwrap();
        assert_eq!(cube.intensity()[0], 1.0);
        assert_eq!(cube.variance()[7], 2.0);
    }

    #[test]
    fn test_correction_log() {
        let mut cube = cube_from(|_, _, _| 1.0, (2, 2, 2));
        assert!(cube.info().corrections.is_empty());

        cube.set_intensity_corrected("flux_calibration", vec![3.0; 8])
            .unwrap();
        assert!(cube.is_corrected("flux_calibration"));
        assert!(!cube.is_corrected("telluric"));

        cube.info_mut().record_correction(
            "telluric",
            CorrectionStatus::Failed,
            Some("no standard star".to_string()),
        );
        assert!(!cube.is_corrected("telluric"));
        assert_eq!(
            cube.info().corrections["telluric"].detail.as_deref(),
            Some("no standard star")
        );

        // Entries survive the JSON metadata round trip
        let json = serde_json::to_value(cube.info()).unwrap();
        assert_eq!(json["corrections"]["flux_calibration"]["status"], "applied");
        let back: CubeInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back.corrections, cube.info().corrections);
    }

    #[test]
    fn test_white_image_clips_outlier() {
        // Constant spectrum with a single cosmic-ray-like spike
        let cube = cube_from(
            |k, r, c| if k == 7 && r == 1 && c == 1 { 1000.0 } else { 2.0 },
            (20, 3, 3),
        );
        let clipped = cube.white_image(None, Some(DEFAULT_SIGMA_CLIP));
        assert!((clipped[4] - 2.0).abs() < 1e-12);

        let unclipped = cube.white_image(None, None);
        assert!((unclipped[4] - (19.0 * 2.0 + 1000.0) / 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_white_image_wave_range() {
        let cube = cube_from(|k, _, _| k as f64, (5, 2, 2));
        // Channels 6010..6030 are 1, 2, 3
        let image = cube.white_image(Some((6010.0, 6030.0)), None);
        assert_eq!(image, vec![2.0; 4]);
    }

    #[test]
    fn test_centre_of_mass() {
        let cube = cube_from(
            |k, r, c| match (r, c) {
                (2, 3) => 3.0,
                (2, 1) => 1.0,
                _ => {
                    if k == 0 {
                        f64::NAN
                    } else {
                        0.0
                    }
                }
            },
            (4, 5, 5),
        );
        let (cols, rows) = cube.centre_of_mass(2, CentroidStat::Median, 1.0).unwrap();
        assert_eq!(cols.len(), 4);
        assert!(cols.iter().all(|&c| (c - 2.5).abs() < 1e-12));
        assert!(rows.iter().all(|&r| (r - 2.0).abs() < 1e-12));

        assert!(cube.centre_of_mass(0, CentroidStat::Mean, 1.0).is_err());
    }

    #[test]
    fn test_centre_of_mass_gaussian_blob() {
        let wcs = grid(3, 15, 15);
        let data = test_utils::gaussian_blob_cube(wcs.shape, 6.4, 8.0, 1.2);
        let var = vec![1.0; wcs.shape.len()];
        let cube = Cube::new(data, var, wcs, CubeInfo::new("blob")).unwrap();

        let (cols, rows) = cube.centre_of_mass(1, CentroidStat::Mean, 1.0).unwrap();
        for (col, row) in cols.iter().zip(&rows) {
            assert!((col - 6.4).abs() < 1e-3, "col = {}", col);
            assert!((row - 8.0).abs() < 1e-3, "row = {}", row);
        }
    }

    #[test]
    fn test_integrated_light() {
        // One bright pixel holding 60% of the light, the rest spread evenly
        let cube = cube_from(
            |_, r, c| if r == 0 && c == 0 { 6.0 } else { 0.5 },
            (1, 3, 3),
        );
        assert!((cube.integrated_light_frac(0.5) - 0.6).abs() < 1e-12);
        assert_eq!(cube.integrated_light_pixels(0.5), 1);
        assert_eq!(cube.integrated_light_pixels(0.65), 2);
        assert!((cube.integrated_light_frac(1.0) - 1.0).abs() < 1e-12);

        let dark = cube_from(|_, _, _| 0.0, (1, 2, 2));
        assert!(dark.integrated_light_frac(0.5).is_nan());
    }

    #[test]
    fn test_integrated_light_ranks_pixels_jointly() {
        // [[1, 5], [4, 0]]: sorting rows and columns independently would pair
        // 5 with 1 first; the joint ranking is 5, 4, 1, 0
        let values = [[1.0, 5.0], [4.0, 0.0]];
        let cube = cube_from(|_, r, c| values[r][c], (1, 2, 2));
        assert!((cube.integrated_light_frac(0.85) - 0.9).abs() < 1e-12);
        assert_eq!(cube.integrated_light_pixels(0.85), 2);
        assert!((cube.integrated_light_frac(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_spaxel_offsets() {
        let cube = cube_from(|_, _, _| 0.0, (1, 3, 4));
        let (ra, dec) = cube.spaxel_offsets();
        assert_eq!(ra.len(), 4);
        assert!((ra[0] + 0.75).abs() < 1e-9);
        assert!((ra[3] - 0.75).abs() < 1e-9);
        assert!((dec[0] + 0.5).abs() < 1e-9);
        assert!(dec[1].abs() < 1e-9);
    }

    #[test]
    fn test_data_container() {
        let cube = cube_from(|_, _, _| 1.0, (3, 4, 6));
        let footprint = cube.sky_footprint().unwrap();
        assert!(footprint.contains(&SkyCoord::new(45.0, 10.0)));
        assert_eq!(cube.spatial_coordinates().len(), 24);

        let band = Passband::top_hat("flat", 5990.0, 6030.0).unwrap();
        let phot = cube.synthetic_photometry(&band);
        assert_eq!(phot.len(), 24);
        assert!((phot[0].flux - 1.0).abs() < 1e-9);
    }
}
