//! Row-stacked spectra exposures and their atmospheric refraction offsets.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{IfsError, IfsResult};
use crate::sky::SkyCoord;

/// serde_json writes non-finite floats as null; read them back as NaN.
fn nan_vec_if_null<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn optional_nan_vec_if_null<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Option<f64>>>::deserialize(deserializer)?;
    Ok(values.map(|v| v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect()))
}

/// One exposure of row-stacked spectra (RSS).
///
/// Each fibre has a sky position and a spectrum sampled on the shared
/// `wavelength` axis. `intensity` and `variance` are stored row-major as
/// `n_fibres × n_wavelength`. Spectra are expected to be already corrected
/// for throughput, extinction, telluric absorption and sky emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exposure {
    /// Exposure identifier (e.g. the raw file stem).
    pub name: String,
    /// Integration time in seconds.
    pub exposure_time: f64,
    /// Wavelength of every spectral channel.
    pub wavelength: Vec<f64>,
    /// Sky position of every fibre.
    pub fibres: Vec<SkyCoord>,
    /// Fibre spectra, `n_fibres × n_wavelength`.
    #[serde(deserialize_with = "nan_vec_if_null")]
    pub intensity: Vec<f64>,
    /// Fibre variances, `n_fibres × n_wavelength`.
    #[serde(deserialize_with = "nan_vec_if_null")]
    pub variance: Vec<f64>,
}

impl Exposure {
    /// Create a validated exposure.
    pub fn new(
        name: impl Into<String>,
        exposure_time: f64,
        wavelength: Vec<f64>,
        fibres: Vec<SkyCoord>,
        intensity: Vec<f64>,
        variance: Vec<f64>,
    ) -> IfsResult<Self> {
        let exposure = Self {
            name: name.into(),
            exposure_time,
            wavelength,
            fibres,
            intensity,
            variance,
        };
        exposure.validate()?;
        Ok(exposure)
    }

    /// Check array shapes and the exposure time.
    pub fn validate(&self) -> IfsResult<()> {
        if !(self.exposure_time.is_finite() && self.exposure_time > 0.0) {
            return Err(IfsError::invalid_exposure(
                &self.name,
                format!("exposure time must be > 0, got {}", self.exposure_time),
            ));
        }

        if self.wavelength.is_empty() {
            return Err(IfsError::invalid_exposure(&self.name, "empty wavelength axis"));
        }

        let expected = self.n_fibres() * self.n_wavelength();
        if self.intensity.len() != expected {
            return Err(IfsError::shape_mismatch(
                format!("{} intensity", self.name),
                expected,
                self.intensity.len(),
            ));
        }
        if self.variance.len() != expected {
            return Err(IfsError::shape_mismatch(
                format!("{} variance", self.name),
                expected,
                self.variance.len(),
            ));
        }

        Ok(())
    }

    /// Number of fibres.
    pub fn n_fibres(&self) -> usize {
        self.fibres.len()
    }

    /// Number of spectral channels.
    pub fn n_wavelength(&self) -> usize {
        self.wavelength.len()
    }

    /// Spectrum of one fibre.
    pub fn fibre_intensity(&self, fibre: usize) -> &[f64] {
        let n = self.n_wavelength();
        &self.intensity[fibre * n..(fibre + 1) * n]
    }

    /// Variance of one fibre.
    pub fn fibre_variance(&self, fibre: usize) -> &[f64] {
        let n = self.n_wavelength();
        &self.variance[fibre * n..(fibre + 1) * n]
    }

    /// Parse an exposure from JSON and validate it.
    pub fn from_json(json: &str) -> IfsResult<Self> {
        let exposure: Exposure = serde_json::from_str(json)?;
        exposure.validate()?;
        Ok(exposure)
    }
}

/// Per-channel atmospheric differential refraction offsets in arcseconds.
///
/// Either axis may be missing, in which case that axis has no offset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdrOffsets {
    /// Offset along right ascension for every channel.
    #[serde(default, deserialize_with = "optional_nan_vec_if_null")]
    pub ra: Option<Vec<f64>>,
    /// Offset along declination for every channel.
    #[serde(default, deserialize_with = "optional_nan_vec_if_null")]
    pub dec: Option<Vec<f64>>,
}

impl AdrOffsets {
    /// Offsets along both axes.
    pub fn new(ra: Vec<f64>, dec: Vec<f64>) -> Self {
        Self {
            ra: Some(ra),
            dec: Some(dec),
        }
    }

    /// True when neither axis carries offsets.
    pub fn is_empty(&self) -> bool {
        self.ra.is_none() && self.dec.is_none()
    }

    /// Check that present axes have one value per channel.
    pub fn validate(&self, n_wavelength: usize) -> IfsResult<()> {
        for (axis, values) in [("ra", &self.ra), ("dec", &self.dec)] {
            if let Some(values) = values {
                if values.len() != n_wavelength {
                    return Err(IfsError::shape_mismatch(
                        format!("ADR {}", axis),
                        n_wavelength,
                        values.len(),
                    ));
                }
            }
        }
        Ok(())
    }
}
