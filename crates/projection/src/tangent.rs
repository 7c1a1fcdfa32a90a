//! Gnomonic (TAN) projection.
//!
//! Maps celestial coordinates onto the plane tangent to the celestial sphere
//! at a reference position, then onto pixels through a linear CD matrix:
//!
//! - Sky to intermediate: `(xi, eta)` standard coordinates in degrees
//! - Intermediate to pixel: `(col, row) = CRPIX + CD⁻¹ · (xi, eta)`
//!
//! Pixel coordinates are 0-based with integer values at pixel centres.

use ifs_common::{SkyCoord, ARCSEC_PER_DEG};
use nalgebra::{Matrix2, Vector2};

use crate::error::{ProjectionError, Result};

/// Gnomonic projection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TangentPlane {
    /// Reference sky position (CRVAL1, CRVAL2) in degrees.
    pub crval: SkyCoord,
    /// Reference pixel (column, row), 0-based.
    pub crpix: (f64, f64),
    /// Linear transform from pixel offsets to intermediate coordinates (degrees).
    cd: Matrix2<f64>,
    /// Inverse of `cd`.
    cd_inv: Matrix2<f64>,
}

impl TangentPlane {
    /// Create a projection from a full CD matrix `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    pub fn new(crval: SkyCoord, crpix: (f64, f64), cd: [[f64; 2]; 2]) -> Result<Self> {
        if !crval.is_finite() || !crpix.0.is_finite() || !crpix.1.is_finite() {
            return Err(ProjectionError::InvalidParameters(format!(
                "non-finite reference: crval={:?} crpix={:?}",
                crval, crpix
            )));
        }

        let cd = Matrix2::new(cd[0][0], cd[0][1], cd[1][0], cd[1][1]);
        let cd_inv = cd
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .ok_or_else(|| {
                ProjectionError::InvalidParameters(format!("singular CD matrix: {:?}", cd))
            })?;

        Ok(Self {
            crval,
            crpix,
            cd,
            cd_inv,
        })
    }

    /// Create an unrotated projection with per-axis pixel sizes in degrees.
    pub fn from_scale(crval: SkyCoord, crpix: (f64, f64), cdelt: (f64, f64)) -> Result<Self> {
        Self::new(crval, crpix, [[cdelt.0, 0.0], [0.0, cdelt.1]])
    }

    /// CD matrix as `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    pub fn cd(&self) -> [[f64; 2]; 2] {
        [[self.cd[(0, 0)], self.cd[(0, 1)]], [self.cd[(1, 0)], self.cd[(1, 1)]]]
    }

    /// Convert a sky position to fractional pixel coordinates (column, row).
    ///
    /// Positions more than 90° from the reference cannot be projected and
    /// return NaN coordinates.
    pub fn sky_to_pixel(&self, coord: &SkyCoord) -> (f64, f64) {
        let (sin_dec, cos_dec) = coord.dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.dec.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (coord.ra - self.crval.ra).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0.0 {
            return (f64::NAN, f64::NAN);
        }

        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let offset = self.cd_inv * Vector2::new(xi, eta);
        (self.crpix.0 + offset.x, self.crpix.1 + offset.y)
    }

    /// Convert fractional pixel coordinates (column, row) to a sky position.
    pub fn pixel_to_sky(&self, col: f64, row: f64) -> SkyCoord {
        let inter = self.cd * Vector2::new(col - self.crpix.0, row - self.crpix.1);
        let xi = inter.x.to_radians();
        let eta = inter.y.to_radians();

        let ra0 = self.crval.ra.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.dec.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2((xi * xi + denom * denom).sqrt());

        SkyCoord::new(ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// Mean pixel size along both axes in arcseconds.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let scale_x = self.cd.column(0).norm();
        let scale_y = self.cd.column(1).norm();
        (scale_x + scale_y) / 2.0 * ARCSEC_PER_DEG
    }
}
