//! Combination of several RSS exposures into one calibrated cube.
//!
//! Exposures are resampled one after another into shared accumulators. After
//! each pass, the weight added by that exposure alone, normalised by its own
//! maximum, is its contribution mask. The effective exposure time of a voxel
//! is `Σ mask × exposure_time`; flux is divided by it and variance by its
//! square. Voxels nobody contributed to end up non-finite.

use chrono::Utc;
use ifs_common::{AdrOffsets, Exposure};
use projection::{build_wcs, CubeWcs, WcsParams, WorldTransform};
use tracing::{debug, info, warn};

use crate::accumulator::Accumulators;
use crate::config::CubingConfig;
use crate::cube::{Cube, CubeInfo, ExposureRecord};
use crate::error::{CubingError, Result};
use crate::resample::{interpolate_rss, ResampleOptions};
use crate::stats::nan_max;

/// Target grid of a cube build.
#[derive(Debug, Clone, Default)]
pub enum GridSpec {
    /// A ready-made world-coordinate system.
    Wcs(CubeWcs),
    /// Parameters from which the grid is derived.
    Params(WcsParams),
    /// No grid given; building fails.
    #[default]
    None,
}

impl GridSpec {
    /// Resolve into a world-coordinate system.
    pub fn resolve(self) -> Result<CubeWcs> {
        match self {
            Self::Wcs(wcs) => Ok(wcs),
            Self::Params(params) => Ok(build_wcs(&params)?),
            Self::None => Err(CubingError::config(
                "either a WCS or WCS parameters must be provided",
            )),
        }
    }
}

impl From<CubeWcs> for GridSpec {
    fn from(wcs: CubeWcs) -> Self {
        Self::Wcs(wcs)
    }
}

impl From<WcsParams> for GridSpec {
    fn from(params: WcsParams) -> Self {
        Self::Params(params)
    }
}

/// Build a cube from `exposures` with the default resampling options.
///
/// `adr`, when given, must hold one entry per exposure.
pub fn build_cube(
    exposures: &[Exposure],
    grid: GridSpec,
    kernel_size_arcsec: f64,
    adr: Option<&[Option<AdrOffsets>]>,
    info: CubeInfo,
) -> Result<Cube> {
    let wcs = grid.resolve()?;
    combine(
        exposures,
        &wcs,
        kernel_size_arcsec,
        adr,
        &ResampleOptions::default(),
        info,
    )
}

/// Builder-style front end to [`build_cube`] driven by a [`CubingConfig`].
#[derive(Debug, Clone, Default)]
pub struct CubeBuilder {
    config: CubingConfig,
    grid: GridSpec,
    info: Option<CubeInfo>,
}

impl CubeBuilder {
    /// Create a builder with the given configuration.
    pub fn new(config: CubingConfig) -> Self {
        Self {
            config,
            grid: GridSpec::None,
            info: None,
        }
    }

    /// Set the target grid.
    pub fn grid(mut self, grid: impl Into<GridSpec>) -> Self {
        self.grid = grid.into();
        self
    }

    /// Override the kernel half-width in arcseconds.
    pub fn kernel_size_arcsec(mut self, size: f64) -> Self {
        self.config.kernel_size_arcsec = size;
        self
    }

    /// Set the metadata the cube starts from.
    pub fn info(mut self, info: CubeInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &CubingConfig {
        &self.config
    }

    /// Build the cube.
    pub fn build(self, exposures: &[Exposure], adr: Option<&[Option<AdrOffsets>]>) -> Result<Cube> {
        self.config.validate().map_err(CubingError::Config)?;
        let wcs = self.grid.resolve()?;
        combine(
            exposures,
            &wcs,
            self.config.kernel_size_arcsec,
            adr,
            &self.config.resample_options(),
            self.info.unwrap_or_default(),
        )
    }
}

/// Check the inputs of a build before any accumulation happens.
fn validate_inputs(exposures: &[Exposure], adr: Option<&[Option<AdrOffsets>]>) -> Result<()> {
    if exposures.is_empty() {
        return Err(CubingError::config("no exposures to combine"));
    }
    if let Some(adr) = adr {
        if adr.len() != exposures.len() {
            return Err(CubingError::config(format!(
                "got {} ADR entries for {} exposures",
                adr.len(),
                exposures.len()
            )));
        }
    }
    Ok(())
}

/// Add `mask × exposure_time` for one exposure to the effective exposure time.
///
/// Returns false when the exposure contributed no weight.
fn accumulate_exptime(
    exptime: &mut [f64],
    weight_before: &[f64],
    weight_after: &[f64],
    exposure_time: f64,
) -> bool {
    let delta: Vec<f64> = weight_after
        .iter()
        .zip(weight_before)
        .map(|(after, before)| after - before)
        .collect();
    let max = nan_max(&delta);
    if !(max.is_finite() && max > 0.0) {
        return false;
    }

    for (t, d) in exptime.iter_mut().zip(&delta) {
        let mask = d / max;
        if mask.is_finite() {
            *t += mask * exposure_time;
        }
    }
    true
}

fn combine(
    exposures: &[Exposure],
    wcs: &CubeWcs,
    kernel_size_arcsec: f64,
    adr: Option<&[Option<AdrOffsets>]>,
    options: &ResampleOptions,
    mut info: CubeInfo,
) -> Result<Cube> {
    validate_inputs(exposures, adr)?;

    let shape = wcs.shape;
    info!(
        exposures = exposures.len(),
        shape = ?shape.as_array(),
        kernel_size_arcsec,
        kernel = %options.kernel,
        "Starting cube build"
    );

    let mut acc = Accumulators::zeros(shape);
    let mut exptime = vec![0.0; shape.len()];

    for (i, exposure) in exposures.iter().enumerate() {
        let exposure_adr = adr.and_then(|list| list[i].as_ref());
        let weight_before = acc.weight.clone();

        let (updated, stats) =
            interpolate_rss(exposure, wcs, kernel_size_arcsec, Some(acc), exposure_adr, options)?;
        acc = updated;

        if !accumulate_exptime(&mut exptime, &weight_before, &acc.weight, exposure.exposure_time) {
            warn!(
                exposure = %exposure.name,
                fibres_off_grid = stats.fibres_off_grid,
                "Exposure contributed nothing to the cube"
            );
        }
        debug!(exposure = %exposure.name, index = i, "Contribution mask applied");
    }

    let (mut flux, mut variance, _) = acc.into_parts();
    for ((f, v), t) in flux.iter_mut().zip(variance.iter_mut()).zip(&exptime) {
        *f /= t;
        *v /= t * t;
    }

    let empty = exptime.iter().filter(|&&t| t == 0.0).count();
    if empty > 0 {
        debug!(voxels = empty, "Voxels without coverage are left non-finite");
    }

    info.kernel_size_arcsec = kernel_size_arcsec;
    info.pixel_size_arcsec = wcs.pixel_scale_arcsec();
    info.pixel_exptime = exptime;
    info.exposures = exposures
        .iter()
        .map(|e| ExposureRecord {
            name: e.name.clone(),
            exposure_time: e.exposure_time,
        })
        .collect();
    info.created = Utc::now();

    info!(cube = %info.name, "Cube build complete");
    Cube::new(flux, variance, wcs.clone(), info)
}
