//! Common test fixtures for IFS cubing tests.
//!
//! Pre-defined sky positions and grids that show up repeatedly across
//! the test suite.

/// Reference sky positions in degrees.
pub mod positions {
    use ifs_common::SkyCoord;

    /// On the celestial equator, where RA offsets need no cos(dec) correction.
    pub const EQUATOR: SkyCoord = SkyCoord { ra: 180.0, dec: 0.0 };

    /// A typical extragalactic field at moderate declination.
    pub const MID_DEC: SkyCoord = SkyCoord { ra: 150.1, dec: 2.2 };

    /// Southern field near NGC 253.
    pub const SOUTHERN: SkyCoord = SkyCoord { ra: 11.888, dec: -25.288 };

    /// High declination, where RA offsets stretch strongly.
    pub const HIGH_DEC: SkyCoord = SkyCoord { ra: 45.0, dec: 75.0 };
}

/// Common grid specifications for testing.
pub mod grids {
    use ifs_common::{SkyCoord, ARCSEC_PER_DEG};
    use projection::WcsParams;

    /// Grid parameters with square pixels of `pixel_arcsec` arcseconds.
    pub fn params(
        center: SkyCoord,
        n_wavelength: usize,
        n_rows: usize,
        n_cols: usize,
        pixel_arcsec: f64,
    ) -> WcsParams {
        WcsParams {
            n_wavelength,
            n_rows,
            n_cols,
            wavelength_start: 6000.0,
            wavelength_step: 2.0,
            center,
            spatial_pixel_size_deg: pixel_arcsec / ARCSEC_PER_DEG,
        }
    }

    /// 5 × 5 pixels of 1 arcsec with 3 channels.
    pub fn tiny(center: SkyCoord) -> WcsParams {
        params(center, 3, 5, 5, 1.0)
    }

    /// 21 × 21 pixels of 0.5 arcsec with 8 channels.
    pub fn small(center: SkyCoord) -> WcsParams {
        params(center, 8, 21, 21, 0.5)
    }

    /// Non-square grid, useful for catching row/column mix-ups.
    pub fn rectangular(center: SkyCoord) -> WcsParams {
        params(center, 4, 11, 17, 1.0)
    }
}

/// Per-fibre spectra used by the hand-checked resampling cases.
pub mod spectra {
    /// Flux of the reference three-channel fibre.
    pub const FLUX: [f64; 3] = [10.0, 20.0, 30.0];

    /// Variance of the reference three-channel fibre.
    pub const VARIANCE: [f64; 3] = [1.0, 4.0, 9.0];

    /// Exposure time of the reference exposure in seconds.
    pub const EXPOSURE_TIME: f64 = 60.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shapes() {
        let p = grids::tiny(positions::EQUATOR);
        assert_eq!((p.n_wavelength, p.n_rows, p.n_cols), (3, 5, 5));

        let p = grids::rectangular(positions::MID_DEC);
        assert_ne!(p.n_rows, p.n_cols);
    }

    #[test]
    fn test_pixel_size_in_degrees() {
        let p = grids::small(positions::SOUTHERN);
        assert!((p.spatial_pixel_size_deg * 3600.0 - 0.5).abs() < 1e-12);
    }
}
