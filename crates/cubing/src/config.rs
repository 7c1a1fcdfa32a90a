//! Configuration for cube building and storage.

use serde::{Deserialize, Serialize};

use crate::interpolate::DEFAULT_ADR_PIXEL_FRAC;
use crate::kernel::KernelFunction;
use crate::resample::ResampleOptions;

/// Configuration for the cube builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubingConfig {
    /// Kernel half-width in arcseconds.
    pub kernel_size_arcsec: f64,

    /// Interpolation kernel.
    pub kernel: KernelFunction,

    /// Tolerated ADR drift per spectral window, in pixels.
    pub adr_pixel_frac: f64,

    /// Resample fibres in parallel.
    pub parallel: bool,

    /// Spatial chunk dimension for Zarr arrays (square chunks).
    pub zarr_chunk_spatial: usize,

    /// Spectral chunk dimension for Zarr arrays.
    pub zarr_chunk_spectral: usize,

    /// Compression codec for Zarr arrays.
    pub zarr_compression: ZarrCompression,

    /// Compression level (1-9).
    pub zarr_compression_level: u8,
}

impl Default for CubingConfig {
    fn default() -> Self {
        Self {
            kernel_size_arcsec: 2.0,
            kernel: KernelFunction::Cubic,
            adr_pixel_frac: DEFAULT_ADR_PIXEL_FRAC,
            parallel: false,
            zarr_chunk_spatial: 64,
            zarr_chunk_spectral: 256,
            zarr_compression: ZarrCompression::BloscZstd,
            zarr_compression_level: 1,
        }
    }
}

impl CubingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CUBE_KERNEL_SIZE_ARCSEC") {
            if let Ok(size) = val.parse() {
                config.kernel_size_arcsec = size;
            }
        }

        if let Ok(val) = std::env::var("CUBE_KERNEL") {
            config.kernel = KernelFunction::from_str(&val);
        }

        if let Ok(val) = std::env::var("CUBE_ADR_PIXEL_FRAC") {
            if let Ok(frac) = val.parse() {
                config.adr_pixel_frac = frac;
            }
        }

        if let Ok(val) = std::env::var("CUBE_PARALLEL") {
            config.parallel = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("CUBE_ZARR_CHUNK_SPATIAL") {
            if let Ok(size) = val.parse() {
                config.zarr_chunk_spatial = size;
            }
        }

        if let Ok(val) = std::env::var("CUBE_ZARR_CHUNK_SPECTRAL") {
            if let Ok(size) = val.parse() {
                config.zarr_chunk_spectral = size;
            }
        }

        if let Ok(val) = std::env::var("CUBE_ZARR_COMPRESSION") {
            config.zarr_compression = ZarrCompression::from_str(&val);
        }

        if let Ok(val) = std::env::var("CUBE_ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.zarr_compression_level = level;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.kernel_size_arcsec.is_finite() && self.kernel_size_arcsec > 0.0) {
            return Err("kernel_size_arcsec must be > 0".to_string());
        }

        if !(self.adr_pixel_frac.is_finite() && self.adr_pixel_frac > 0.0) {
            return Err("adr_pixel_frac must be > 0".to_string());
        }

        if self.zarr_chunk_spatial == 0 || self.zarr_chunk_spectral == 0 {
            return Err("zarr chunk sizes must be > 0".to_string());
        }

        if self.zarr_compression_level == 0 || self.zarr_compression_level > 9 {
            return Err("zarr_compression_level must be 1-9".to_string());
        }

        Ok(())
    }

    /// Resampling options derived from this configuration.
    pub fn resample_options(&self) -> ResampleOptions {
        ResampleOptions {
            kernel: self.kernel,
            adr_pixel_frac: self.adr_pixel_frac,
            parallel: self.parallel,
        }
    }
}

/// Compression codec for Zarr arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd.
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
