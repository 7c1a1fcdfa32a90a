//! Three-axis world-coordinate system of a data cube.
//!
//! Combines a [`TangentPlane`] for the two spatial axes with a linear
//! [`SpectralAxis`]. Arrays are laid out as (wavelength, row, column),
//! where rows follow declination and columns follow right ascension.

use ifs_common::SkyCoord;
use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};
use crate::spectral::SpectralAxis;
use crate::tangent::TangentPlane;

/// Pixel-grid dimensions of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeShape {
    pub n_wavelength: usize,
    pub n_rows: usize,
    pub n_cols: usize,
}

impl CubeShape {
    /// Create a new shape.
    pub fn new(n_wavelength: usize, n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_wavelength,
            n_rows,
            n_cols,
        }
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.n_wavelength * self.n_rows * self.n_cols
    }

    /// Check if the cube holds no voxels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of spatial pixels in one wavelength slice.
    pub fn spatial_len(&self) -> usize {
        self.n_rows * self.n_cols
    }

    /// Flat index of voxel (wavelength, row, column).
    #[inline]
    pub fn index(&self, wave: usize, row: usize, col: usize) -> usize {
        (wave * self.n_rows + row) * self.n_cols + col
    }

    /// Shape as `[n_wavelength, n_rows, n_cols]`.
    pub fn as_array(&self) -> [usize; 3] {
        [self.n_wavelength, self.n_rows, self.n_cols]
    }
}

/// World-coordinate operations the cubing core needs from a target grid.
pub trait WorldTransform {
    /// Pixel-grid shape.
    fn shape(&self) -> CubeShape;

    /// Sky position to fractional (column, row) pixel coordinates.
    fn sky_to_pixel(&self, coord: &SkyCoord) -> (f64, f64);

    /// Fractional (column, row) pixel coordinates to a sky position.
    fn pixel_to_sky(&self, col: f64, row: f64) -> SkyCoord;

    /// Spatial pixel size in arcseconds.
    fn pixel_scale_arcsec(&self) -> f64;

    /// Wavelength of a (possibly fractional) spectral channel index.
    fn wavelength_at(&self, index: f64) -> f64;

    /// Wavelength of every channel.
    fn wavelengths(&self) -> Vec<f64> {
        (0..self.shape().n_wavelength)
            .map(|i| self.wavelength_at(i as f64))
            .collect()
    }
}

/// Parameters for constructing a cube grid centred on a sky position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WcsParams {
    /// Number of spectral channels.
    pub n_wavelength: usize,
    /// Number of rows (declination axis).
    pub n_rows: usize,
    /// Number of columns (right ascension axis).
    pub n_cols: usize,
    /// Wavelength of the first channel.
    pub wavelength_start: f64,
    /// Wavelength step per channel.
    pub wavelength_step: f64,
    /// Sky position of the grid centre.
    pub center: SkyCoord,
    /// Spatial pixel size in degrees.
    pub spatial_pixel_size_deg: f64,
}

/// World-coordinate system of a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeWcs {
    pub spatial: TangentPlane,
    pub spectral: SpectralAxis,
    pub shape: CubeShape,
}

/// Build a cube WCS whose reference pixel is the centre of the spatial grid.
pub fn build_wcs(params: &WcsParams) -> Result<CubeWcs> {
    if params.n_wavelength == 0 || params.n_rows == 0 || params.n_cols == 0 {
        return Err(ProjectionError::InvalidParameters(format!(
            "cube dimensions must be > 0, got {}x{}x{}",
            params.n_wavelength, params.n_rows, params.n_cols
        )));
    }
    if !(params.spatial_pixel_size_deg.is_finite() && params.spatial_pixel_size_deg > 0.0) {
        return Err(ProjectionError::InvalidParameters(format!(
            "spatial pixel size must be > 0, got {}",
            params.spatial_pixel_size_deg
        )));
    }

    let crpix = (
        (params.n_cols as f64 - 1.0) / 2.0,
        (params.n_rows as f64 - 1.0) / 2.0,
    );
    let pix = params.spatial_pixel_size_deg;
    let spatial = TangentPlane::from_scale(params.center, crpix, (pix, pix))?;
    let spectral = SpectralAxis::new(
        params.wavelength_start,
        params.wavelength_step,
        params.n_wavelength,
    )?;

    Ok(CubeWcs {
        spatial,
        spectral,
        shape: CubeShape::new(params.n_wavelength, params.n_rows, params.n_cols),
    })
}

impl CubeWcs {
    /// Create a cube WCS from its parts.
    pub fn new(spatial: TangentPlane, spectral: SpectralAxis, shape: CubeShape) -> Result<Self> {
        if spectral.len != shape.n_wavelength {
            return Err(ProjectionError::InvalidParameters(format!(
                "spectral axis has {} channels but shape has {}",
                spectral.len, shape.n_wavelength
            )));
        }
        Ok(Self {
            spatial,
            spectral,
            shape,
        })
    }

    /// Sky positions of the four outer corners of the spatial grid.
    pub fn corners(&self) -> [SkyCoord; 4] {
        let max_col = self.shape.n_cols as f64 - 0.5;
        let max_row = self.shape.n_rows as f64 - 0.5;
        [
            self.spatial.pixel_to_sky(-0.5, -0.5),
            self.spatial.pixel_to_sky(-0.5, max_row),
            self.spatial.pixel_to_sky(max_col, max_row),
            self.spatial.pixel_to_sky(max_col, -0.5),
        ]
    }

    /// Export as FITS-style keywords (1-based reference pixels).
    pub fn to_header(&self) -> WcsHeader {
        let cd = self.spatial.cd();
        WcsHeader {
            ctype: [
                "RA---TAN".to_string(),
                "DEC--TAN".to_string(),
                "WAVE".to_string(),
            ],
            cunit: ["deg".to_string(), "deg".to_string(), "Angstrom".to_string()],
            naxis: [self.shape.n_cols, self.shape.n_rows, self.shape.n_wavelength],
            crpix: [
                self.spatial.crpix.0 + 1.0,
                self.spatial.crpix.1 + 1.0,
                self.spectral.crpix + 1.0,
            ],
            crval: [self.spatial.crval.ra, self.spatial.crval.dec, self.spectral.crval],
            cd,
            cdelt3: self.spectral.cdelt,
            radesys: "ICRS".to_string(),
            equinox: 2000.0,
        }
    }

    /// Rebuild from FITS-style keywords.
    pub fn from_header(header: &WcsHeader) -> Result<Self> {
        if !header.ctype[0].starts_with("RA") || !header.ctype[1].starts_with("DEC") {
            return Err(ProjectionError::UnsupportedHeader(format!(
                "expected RA/DEC spatial axes, got {:?}",
                header.ctype
            )));
        }
        if !header.ctype[0].ends_with("TAN") || !header.ctype[1].ends_with("TAN") {
            return Err(ProjectionError::UnsupportedHeader(format!(
                "only TAN projection is supported, got {:?}",
                header.ctype
            )));
        }

        let spatial = TangentPlane::new(
            SkyCoord::new(header.crval[0], header.crval[1]),
            (header.crpix[0] - 1.0, header.crpix[1] - 1.0),
            header.cd,
        )?;
        let mut spectral = SpectralAxis::new(header.crval[2], header.cdelt3, header.naxis[2])?;
        spectral.crpix = header.crpix[2] - 1.0;

        Self::new(
            spatial,
            spectral,
            CubeShape::new(header.naxis[2], header.naxis[1], header.naxis[0]),
        )
    }
}

impl WorldTransform for CubeWcs {
    fn shape(&self) -> CubeShape {
        self.shape
    }

    fn sky_to_pixel(&self, coord: &SkyCoord) -> (f64, f64) {
        self.spatial.sky_to_pixel(coord)
    }

    fn pixel_to_sky(&self, col: f64, row: f64) -> SkyCoord {
        self.spatial.pixel_to_sky(col, row)
    }

    fn pixel_scale_arcsec(&self) -> f64 {
        self.spatial.pixel_scale_arcsec()
    }

    fn wavelength_at(&self, index: f64) -> f64 {
        self.spectral.wavelength_at(index)
    }
}

/// FITS-style WCS keywords, indexed by axis (1 = RA, 2 = Dec, 3 = wavelength).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct WcsHeader {
    pub ctype: [String; 3],
    pub cunit: [String; 3],
    pub naxis: [usize; 3],
    pub crpix: [f64; 3],
    pub crval: [f64; 3],
    pub cd: [[f64; 2]; 2],
    pub cdelt3: f64,
    pub radesys: String,
    pub equinox: f64,
}
