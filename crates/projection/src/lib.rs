//! World-coordinate transforms for IFS data cubes.
//!
//! Provides the gnomonic (TAN) sky projection, a linear spectral axis and
//! the three-axis [`CubeWcs`] that ties them to a pixel grid.

pub mod cube_wcs;
pub mod error;
pub mod spectral;
pub mod tangent;

pub use cube_wcs::{build_wcs, CubeShape, CubeWcs, WcsHeader, WcsParams, WorldTransform};
pub use error::{ProjectionError, Result};
pub use spectral::SpectralAxis;
pub use tangent::TangentPlane;
