//! Zarr V3 persistence of data cubes.
//!
//! A cube is stored as a group whose attributes hold the cube metadata, with
//! three arrays:
//!
//! - `FLUX` and `VARIANCE`: `[n_wavelength, n_rows, n_cols]` float64, each
//!   carrying the WCS keywords in a `wcs` attribute
//! - `PIXEL_EXPTIME`: effective exposure time of every voxel, same shape

mod reader;
mod writer;

pub(crate) use reader::read_cube;
pub(crate) use writer::write_cube;

/// Array holding the cube intensity.
pub const FLUX_ARRAY: &str = "/FLUX";
/// Array holding the cube variance.
pub const VARIANCE_ARRAY: &str = "/VARIANCE";
/// Array holding the per-voxel effective exposure time.
pub const PIXEL_EXPTIME_ARRAY: &str = "/PIXEL_EXPTIME";
/// Array attribute holding the WCS keywords.
pub const WCS_ATTRIBUTE: &str = "wcs";
/// Group attribute naming the software that wrote the cube.
pub const CREATOR_ATTRIBUTE: &str = "creator";
