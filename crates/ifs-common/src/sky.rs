//! Celestial positions.

use serde::{Deserialize, Serialize};

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// A position on the sky in degrees (ICRS right ascension and declination).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    /// Create a new sky coordinate from RA/Dec in degrees.
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Shift this position by small angular offsets in arcseconds.
    ///
    /// The RA offset is an on-sky distance, so it is divided by cos(dec)
    /// before being applied to the RA coordinate.
    pub fn offset_arcsec(&self, d_ra: f64, d_dec: f64) -> Self {
        let cos_dec = self.dec.to_radians().cos().max(1e-12);
        Self {
            ra: self.ra + d_ra / ARCSEC_PER_DEG / cos_dec,
            dec: self.dec + d_dec / ARCSEC_PER_DEG,
        }
    }

    /// Angular separation from another position in arcseconds (haversine).
    pub fn separation_arcsec(&self, other: &SkyCoord) -> f64 {
        let (ra1, dec1) = (self.ra.to_radians(), self.dec.to_radians());
        let (ra2, dec2) = (other.ra.to_radians(), other.dec.to_radians());
        let sin_ddec = ((dec2 - dec1) / 2.0).sin();
        let sin_dra = ((ra2 - ra1) / 2.0).sin();
        let a = sin_ddec * sin_ddec + dec1.cos() * dec2.cos() * sin_dra * sin_dra;
        2.0 * a.sqrt().min(1.0).asin().to_degrees() * ARCSEC_PER_DEG
    }

    /// True when both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }
}
