//! Common types shared by the IFS cubing crates.
//!
//! Row-stacked spectra exposures, sky positions and footprints, passband
//! photometry, and the [`DataContainer`] capability interface implemented by
//! both exposures and cubes.

pub mod container;
pub mod error;
pub mod exposure;
pub mod footprint;
pub mod photometry;
pub mod sky;

pub use container::{combined_footprint, DataContainer};
pub use error::{IfsError, IfsResult};
pub use exposure::{AdrOffsets, Exposure};
pub use footprint::SkyFootprint;
pub use photometry::{Passband, Photometry};
pub use sky::{SkyCoord, ARCSEC_PER_DEG};
