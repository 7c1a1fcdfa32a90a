//! Synthetic photometry through a passband.

use serde::{Deserialize, Serialize};

use crate::error::{IfsError, IfsResult};

/// A photometric filter transmission curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passband {
    /// Filter identifier (e.g. "PANSTARRS_PS1.r").
    pub name: String,
    /// Wavelength samples, strictly increasing.
    pub wavelength: Vec<f64>,
    /// Transmission at each wavelength sample.
    pub response: Vec<f64>,
}

/// Passband-averaged flux density and its 1-sigma error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Photometry {
    pub flux: f64,
    pub error: f64,
}

impl Photometry {
    /// Photometry value for a spectrum with no usable samples.
    pub const MISSING: Photometry = Photometry {
        flux: f64::NAN,
        error: f64::NAN,
    };

    /// Signal-to-noise ratio.
    pub fn snr(&self) -> f64 {
        self.flux / self.error
    }
}

impl Passband {
    /// Create a validated passband.
    pub fn new(name: impl Into<String>, wavelength: Vec<f64>, response: Vec<f64>) -> IfsResult<Self> {
        if wavelength.len() != response.len() {
            return Err(IfsError::shape_mismatch(
                "passband response",
                wavelength.len(),
                response.len(),
            ));
        }
        if wavelength.len() < 2 || wavelength.windows(2).any(|w| w[1] <= w[0]) {
            return Err(IfsError::InvalidInput(
                "passband wavelength must have >= 2 strictly increasing samples".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            wavelength,
            response,
        })
    }

    /// Top-hat passband between two wavelengths.
    pub fn top_hat(name: impl Into<String>, min: f64, max: f64) -> IfsResult<Self> {
        let eps = (max - min).abs() * 1e-9;
        Self::new(
            name,
            vec![min - eps, min, max, max + eps],
            vec![0.0, 1.0, 1.0, 0.0],
        )
    }

    /// Linearly interpolate the response onto another wavelength grid.
    ///
    /// Wavelengths outside the passband definition get zero transmission.
    pub fn resample(&self, wavelength: &[f64]) -> Vec<f64> {
        let first = self.wavelength[0];
        let last = self.wavelength[self.wavelength.len() - 1];

        wavelength
            .iter()
            .map(|&w| {
                if !(w >= first && w <= last) {
                    return 0.0;
                }
                let upper = self.wavelength.partition_point(|&x| x < w).max(1);
                let (x0, x1) = (self.wavelength[upper - 1], self.wavelength[upper]);
                let (y0, y1) = (self.response[upper - 1], self.response[upper]);
                y0 + (y1 - y0) * (w - x0) / (x1 - x0)
            })
            .collect()
    }

    /// Photon-weighted mean flux density of one spectrum through this passband.
    ///
    /// `response` must come from [`Passband::resample`] on the spectrum's wavelength
    /// grid. Samples where either flux or variance is non-finite are ignored.
    /// Slices of unequal length give [`Photometry::MISSING`].
    pub fn synthetic_flux(
        response: &[f64],
        wavelength: &[f64],
        flux: &[f64],
        variance: &[f64],
    ) -> Photometry {
        let n = wavelength.len();
        if response.len() != n || flux.len() != n || variance.len() != n {
            return Photometry::MISSING;
        }

        let mut norm = 0.0;
        let mut sum = 0.0;
        let mut var = 0.0;

        for i in 0..n {
            if !(flux[i].is_finite() && variance[i].is_finite()) {
                continue;
            }
            let w = response[i] * wavelength[i];
            norm += w;
            sum += flux[i] * w;
            var += variance[i] * w * w;
        }

        if norm <= 0.0 {
            return Photometry::MISSING;
        }

        Photometry {
            flux: sum / norm,
            error: var.sqrt() / norm,
        }
    }
}
