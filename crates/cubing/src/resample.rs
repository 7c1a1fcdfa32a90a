//! Resampling of a full RSS exposure onto a cube grid.

use ifs_common::{AdrOffsets, Exposure};
use projection::{CubeShape, WorldTransform};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accumulator::Accumulators;
use crate::error::{CubingError, Result};
use crate::interpolate::{
    interpolate_fibre, AdrPixels, FibrePlacement, FibreStats, DEFAULT_ADR_PIXEL_FRAC,
};
use crate::kernel::KernelFunction;

/// Options controlling how fibres are spread over the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampleOptions {
    pub kernel: KernelFunction,
    /// Tolerated ADR drift per spectral window, in pixels.
    pub adr_pixel_frac: f64,
    /// Process fibres on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            kernel: KernelFunction::Cubic,
            adr_pixel_frac: DEFAULT_ADR_PIXEL_FRAC,
            parallel: false,
        }
    }
}

/// Counters for one resampled exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleStats {
    /// Fibres processed.
    pub fibres: usize,
    /// Fibres whose kernel never touched the grid.
    pub fibres_off_grid: usize,
    /// Spectral windows skipped across all fibres.
    pub skipped_windows: usize,
}

impl ResampleStats {
    fn record(&mut self, fibre: FibreStats) {
        self.fibres += 1;
        self.skipped_windows += fibre.skipped_windows;
        if fibre.fully_off_grid() {
            self.fibres_off_grid += 1;
        }
    }
}

impl std::ops::AddAssign for ResampleStats {
    fn add_assign(&mut self, other: Self) {
        self.fibres += other.fibres;
        self.fibres_off_grid += other.fibres_off_grid;
        self.skipped_windows += other.skipped_windows;
    }
}

/// Convert ADR offsets in arcseconds to pixel offsets along columns and rows.
fn adr_to_pixels(adr: &AdrOffsets, n_wave: usize, pixel_scale: f64) -> AdrPixels {
    let convert = |values: &Option<Vec<f64>>| match values {
        Some(values) => values.iter().map(|v| v / pixel_scale).collect(),
        None => vec![0.0; n_wave],
    };
    AdrPixels {
        cols: convert(&adr.ra),
        rows: convert(&adr.dec),
    }
}

/// Interpolate every fibre of an exposure onto the grid of `transform`.
///
/// Sums are added to `accumulators` (fresh zeros when `None`) and are not
/// normalised. The kernel size and ADR offsets are converted from arcseconds
/// to pixels with the transform's pixel scale.
pub fn interpolate_rss(
    exposure: &Exposure,
    transform: &dyn WorldTransform,
    kernel_size_arcsec: f64,
    accumulators: Option<Accumulators>,
    adr: Option<&AdrOffsets>,
    options: &ResampleOptions,
) -> Result<(Accumulators, ResampleStats)> {
    exposure.validate()?;
    let shape = transform.shape();
    let n_wave = exposure.n_wavelength();

    if n_wave != shape.n_wavelength {
        return Err(CubingError::invalid_input(format!(
            "exposure {} has {} channels but the cube has {}",
            exposure.name, n_wave, shape.n_wavelength
        )));
    }

    let mut acc = accumulators.unwrap_or_else(|| Accumulators::zeros(shape));
    if acc.shape() != shape {
        return Err(CubingError::invalid_input(format!(
            "accumulators of shape {:?} do not match the cube shape {:?}",
            acc.shape(),
            shape
        )));
    }

    let pixel_scale = transform.pixel_scale_arcsec();
    if !(pixel_scale.is_finite() && pixel_scale > 0.0) {
        return Err(CubingError::invalid_input(format!(
            "pixel scale must be > 0 arcsec, got {}",
            pixel_scale
        )));
    }
    if !(kernel_size_arcsec.is_finite() && kernel_size_arcsec > 0.0) {
        return Err(CubingError::invalid_input(format!(
            "kernel size must be > 0 arcsec, got {}",
            kernel_size_arcsec
        )));
    }
    let half_width = kernel_size_arcsec / pixel_scale;

    let adr_pixels = match adr {
        Some(adr) if !adr.is_empty() => {
            adr.validate(n_wave)?;
            Some(adr_to_pixels(adr, n_wave, pixel_scale))
        }
        _ => None,
    };

    let positions: Vec<(f64, f64)> = exposure
        .fibres
        .iter()
        .map(|coord| transform.sky_to_pixel(coord))
        .collect();

    let adr_ref = adr_pixels.as_ref();
    let (kernel, adr_pixel_frac) = (options.kernel, options.adr_pixel_frac);
    let placement_at = move |(col, row): (f64, f64)| FibrePlacement {
        col,
        row,
        half_width,
        adr: adr_ref,
        adr_pixel_frac,
        kernel,
    };

    debug!(
        exposure = %exposure.name,
        fibres = exposure.n_fibres(),
        kernel = %options.kernel,
        half_width_px = half_width,
        adr = adr_pixels.is_some(),
        parallel = options.parallel,
        "Resampling exposure"
    );

    let stats = if options.parallel {
        let (partial, stats) = resample_parallel(exposure, shape, &positions, &placement_at)?;
        acc.merge(&partial)?;
        stats
    } else {
        let mut stats = ResampleStats::default();
        for (fibre, &position) in positions.iter().enumerate() {
            let fibre_stats = interpolate_fibre(
                exposure.fibre_intensity(fibre),
                exposure.fibre_variance(fibre),
                &mut acc,
                &placement_at(position),
            )?;
            if fibre_stats.fully_off_grid() {
                debug!(exposure = %exposure.name, fibre, "Fibre outside the grid");
            }
            stats.record(fibre_stats);
        }
        stats
    };

    info!(
        exposure = %exposure.name,
        fibres = stats.fibres,
        fibres_off_grid = stats.fibres_off_grid,
        skipped_windows = stats.skipped_windows,
        "Exposure resampled"
    );

    Ok((acc, stats))
}

/// Fibre-parallel resampling into per-thread partial accumulators.
fn resample_parallel<'a, F>(
    exposure: &Exposure,
    shape: CubeShape,
    positions: &[(f64, f64)],
    placement_at: &F,
) -> Result<(Accumulators, ResampleStats)>
where
    F: Fn((f64, f64)) -> FibrePlacement<'a> + Sync,
{
    let identity = || (Accumulators::zeros(shape), ResampleStats::default());

    positions
        .par_iter()
        .enumerate()
        .try_fold(identity, |(mut acc, mut stats), (fibre, &position)| {
            let fibre_stats = interpolate_fibre(
                exposure.fibre_intensity(fibre),
                exposure.fibre_variance(fibre),
                &mut acc,
                &placement_at(position),
            )?;
            stats.record(fibre_stats);
            Ok::<_, CubingError>((acc, stats))
        })
        .try_reduce(identity, |(mut acc, mut stats), (other, other_stats)| {
            acc.merge(&other)?;
            stats += other_stats;
            Ok((acc, stats))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifs_common::{SkyCoord, ARCSEC_PER_DEG};
    use projection::{build_wcs, CubeWcs, WcsParams};

    fn wcs(n_wave: usize) -> CubeWcs {
        build_wcs(&WcsParams {
            n_wavelength: n_wave,
            n_rows: 15,
            n_cols: 15,
            wavelength_start: 5000.0,
            wavelength_step: 1.0,
            center: SkyCoord::new(120.0, 30.0),
            spatial_pixel_size_deg: 0.5 / ARCSEC_PER_DEG,
        })
        .unwrap()
    }

    fn exposure(n_wave: usize) -> Exposure {
        let center = SkyCoord::new(120.0, 30.0);
        let fibres = vec![
            center,
            center.offset_arcsec(1.0, 0.0),
            center.offset_arcsec(0.0, -1.5),
            center.offset_arcsec(60.0, 0.0),
        ];
        let n = fibres.len() * n_wave;
        Exposure::new(
            "rss",
            100.0,
            (0..n_wave).map(|k| 5000.0 + k as f64).collect(),
            fibres,
            (0..n).map(|i| i as f64).collect(),
            vec![1.0; n],
        )
        .unwrap()
    }

    #[test]
    fn test_interpolate_rss_counts() {
        let (acc, stats) = interpolate_rss(
            &exposure(3),
            &wcs(3),
            1.0,
            None,
            None,
            &ResampleOptions::default(),
        )
        .unwrap();
        assert_eq!(stats.fibres, 4);
        assert_eq!(stats.fibres_off_grid, 1);
        // Three fibres on the grid, each carrying unit weight per channel
        assert!((acc.slice_weight(0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let exp = exposure(4);
        let grid = wcs(4);
        let sequential =
            interpolate_rss(&exp, &grid, 1.2, None, None, &ResampleOptions::default()).unwrap();
        let options = ResampleOptions {
            parallel: true,
            ..Default::default()
        };
        let parallel = interpolate_rss(&exp, &grid, 1.2, None, None, &options).unwrap();

        assert_eq!(sequential.1, parallel.1);
        for (a, b) in sequential.0.flux.iter().zip(&parallel.0.flux) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_existing_accumulators_are_extended() {
        let exp = exposure(2);
        let grid = wcs(2);
        let options = ResampleOptions::default();
        let (once, _) = interpolate_rss(&exp, &grid, 1.0, None, None, &options).unwrap();
        let (twice, _) = interpolate_rss(&exp, &grid, 1.0, Some(once.clone()), None, &options).unwrap();
        for (a, b) in once.weight.iter().zip(&twice.weight) {
            assert!((2.0 * a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wavelength_mismatch() {
        let err = interpolate_rss(
            &exposure(3),
            &wcs(5),
            1.0,
            None,
            None,
            &ResampleOptions::default(),
        );
        assert!(matches!(err, Err(CubingError::InvalidInput(_))));
    }

    #[test]
    fn test_adr_length_checked() {
        let adr = AdrOffsets {
            ra: Some(vec![0.0; 2]),
            dec: None,
        };
        let err = interpolate_rss(
            &exposure(3),
            &wcs(3),
            1.0,
            None,
            Some(&adr),
            &ResampleOptions::default(),
        );
        assert!(matches!(err, Err(CubingError::Ifs(_))));
    }

    #[test]
    fn test_adr_arcsec_to_pixels() {
        let adr = AdrOffsets {
            ra: Some(vec![1.0, -0.5]),
            dec: None,
        };
        let pixels = adr_to_pixels(&adr, 2, 0.5);
        assert_eq!(pixels.cols, vec![2.0, -1.0]);
        assert_eq!(pixels.rows, vec![0.0, 0.0]);
    }
}
