//! Linear spectral axis.

use crate::error::{ProjectionError, Result};

/// A linearly sampled wavelength axis: `λ(i) = crval + (i − crpix) · cdelt`.
///
/// `crpix` is 0-based, so with `crpix = 0` channel 0 has wavelength `crval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralAxis {
    /// Wavelength at the reference channel.
    pub crval: f64,
    /// Wavelength step per channel.
    pub cdelt: f64,
    /// Reference channel, 0-based.
    pub crpix: f64,
    /// Number of channels.
    pub len: usize,
}

impl SpectralAxis {
    /// Create a spectral axis starting at `start` with `len` channels of width `step`.
    pub fn new(start: f64, step: f64, len: usize) -> Result<Self> {
        if !(start.is_finite() && step.is_finite()) || step == 0.0 {
            return Err(ProjectionError::InvalidParameters(format!(
                "spectral axis needs finite start and non-zero step (start={}, step={})",
                start, step
            )));
        }
        Ok(Self {
            crval: start,
            cdelt: step,
            crpix: 0.0,
            len,
        })
    }

    /// Wavelength at a (possibly fractional) channel index.
    pub fn wavelength_at(&self, index: f64) -> f64 {
        self.crval + (index - self.crpix) * self.cdelt
    }

    /// Fractional channel index of a wavelength.
    pub fn index_of(&self, wavelength: f64) -> f64 {
        self.crpix + (wavelength - self.crval) / self.cdelt
    }

    /// Wavelength of every channel.
    pub fn wavelengths(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.wavelength_at(i as f64)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelengths() {
        let axis = SpectralAxis::new(6000.0, 2.5, 4).unwrap();
        assert_eq!(axis.wavelengths(), vec![6000.0, 6002.5, 6005.0, 6007.5]);
        assert_eq!(axis.index_of(6005.0), 2.0);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(SpectralAxis::new(6000.0, 0.0, 4).is_err());
    }
}
