//! Cube building for integral field spectroscopy.
//!
//! Converts row-stacked spectra (RSS) exposures into calibrated data cubes:
//!
//! - [`kernel`]: cumulative Gaussian and cubic interpolation kernels
//! - [`interpolate`]: spreading one fibre spectrum over the grid, with
//!   windowed atmospheric differential refraction (ADR) compensation
//! - [`resample`]: all fibres of one exposure
//! - [`builder`]: combining exposures and normalising by effective exposure time
//! - [`cube`]: the resulting cube, its derived products and Zarr persistence
//!
//! # Example
//!
//! ```ignore
//! use cubing::{CubeBuilder, CubeInfo, CubingConfig};
//!
//! let cube = CubeBuilder::new(CubingConfig::from_env())
//!     .grid(wcs_params)
//!     .info(CubeInfo::new("NGC 253"))
//!     .build(&exposures, None)?;
//! cube.save_zarr("ngc253.zarr", &CubingConfig::default())?;
//! ```

pub mod accumulator;
pub mod builder;
pub mod config;
pub mod cube;
pub mod error;
pub mod interpolate;
pub mod kernel;
pub mod resample;
pub mod stats;
mod store;

pub use accumulator::Accumulators;
pub use builder::{build_cube, CubeBuilder, GridSpec};
pub use config::{CubingConfig, ZarrCompression};
pub use cube::{
    CentroidStat, CorrectionRecord, CorrectionStatus, Cube, CubeInfo, ExposureRecord,
    DEFAULT_SIGMA_CLIP,
};
pub use error::{CubingError, Result};
pub use interpolate::{interpolate_fibre, AdrPixels, FibrePlacement, FibreStats, DEFAULT_ADR_PIXEL_FRAC};
pub use kernel::{kernel_edges, KernelFunction};
pub use resample::{interpolate_rss, ResampleOptions, ResampleStats};
