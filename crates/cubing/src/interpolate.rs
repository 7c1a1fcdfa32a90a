//! Kernel interpolation of a single fibre spectrum onto the accumulators.

use tracing::debug;

use crate::accumulator::Accumulators;
use crate::error::{CubingError, Result};
use crate::kernel::{kernel_edges, KernelFunction};
use crate::stats::{nan_median, nan_range};

/// Default ADR drift, in pixels, tolerated within one spectral window.
pub const DEFAULT_ADR_PIXEL_FRAC: f64 = 0.05;

/// Per-channel ADR offsets in pixels along columns and rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdrPixels {
    pub cols: Vec<f64>,
    pub rows: Vec<f64>,
}

impl AdrPixels {
    /// Largest total drift along either axis, ignoring non-finite values.
    pub fn drift(&self) -> f64 {
        let drift_cols = nan_range(&self.cols);
        let drift_rows = nan_range(&self.rows);
        match (drift_cols.is_finite(), drift_rows.is_finite()) {
            (true, true) => drift_cols.max(drift_rows),
            (true, false) => drift_cols,
            (false, true) => drift_rows,
            (false, false) => f64::NAN,
        }
    }

    /// Median offset (columns, rows) over a channel range; all-NaN counts as zero.
    fn median(&self, range: std::ops::Range<usize>) -> (f64, f64) {
        let zero_if_nan = |v: f64| if v.is_finite() { v } else { 0.0 };
        (
            zero_if_nan(nan_median(&self.cols[range.clone()])),
            zero_if_nan(nan_median(&self.rows[range])),
        )
    }
}

/// Counters for one fibre.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FibreStats {
    /// Spectral windows processed.
    pub windows: usize,
    /// Windows whose kernel fell entirely outside the grid.
    pub skipped_windows: usize,
}

impl FibreStats {
    /// Check if every window fell outside the grid.
    pub fn fully_off_grid(&self) -> bool {
        self.windows > 0 && self.skipped_windows == self.windows
    }
}

impl std::ops::AddAssign for FibreStats {
    fn add_assign(&mut self, other: Self) {
        self.windows += other.windows;
        self.skipped_windows += other.skipped_windows;
    }
}

/// Where and how to spread one fibre.
#[derive(Debug, Clone, Copy)]
pub struct FibrePlacement<'a> {
    /// Fractional pixel column of the fibre.
    pub col: f64,
    /// Fractional pixel row of the fibre.
    pub row: f64,
    /// Kernel half-width in pixels.
    pub half_width: f64,
    /// Per-channel ADR offsets in pixels.
    pub adr: Option<&'a AdrPixels>,
    /// Tolerated ADR drift per spectral window, in pixels.
    pub adr_pixel_frac: f64,
    pub kernel: KernelFunction,
}

/// Pixel range of a kernel window along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisSpan {
    first: usize,
    last: usize,
    truncated_start: bool,
    truncated_end: bool,
}

/// Pixels touched by a kernel of half-width `half_width` centred at `centre`.
///
/// Pixel `j` spans `[j - 0.5, j + 0.5]`. Returns `None` when the kernel does
/// not overlap the axis.
fn axis_span(centre: f64, half_width: f64, n: usize) -> Option<AxisSpan> {
    if n == 0 {
        return None;
    }
    let lo = (centre - half_width - 0.5).floor() + 1.0;
    let hi = (centre + half_width + 0.5).ceil() - 1.0;
    let max = (n - 1) as f64;
    if !(lo.is_finite() && hi.is_finite()) || hi < 0.0 || lo > max || lo > hi {
        return None;
    }

    Some(AxisSpan {
        first: lo.max(0.0) as usize,
        last: hi.min(max) as usize,
        truncated_start: lo < 0.0,
        truncated_end: hi > max,
    })
}

/// Number of channels per spectral window.
fn window_length(n_wave: usize, adr: Option<&AdrPixels>, adr_pixel_frac: f64) -> usize {
    let Some(adr) = adr else {
        return n_wave;
    };
    let drift = adr.drift();
    if !(drift.is_finite() && drift > 0.0) {
        return n_wave;
    }
    let length = (adr_pixel_frac / drift * n_wave as f64).floor();
    if !length.is_finite() {
        return n_wave;
    }
    (length.max(1.0) as usize).clamp(1, n_wave.max(1))
}

/// Spread one fibre spectrum over the accumulators with a separable kernel.
///
/// Non-finite flux or variance samples contribute nothing and receive zero
/// weight. With ADR offsets the spectrum is split into windows within which
/// the kernel centre is shifted by the window's median offset.
pub fn interpolate_fibre(
    flux: &[f64],
    variance: &[f64],
    acc: &mut Accumulators,
    placement: &FibrePlacement<'_>,
) -> Result<FibreStats> {
    let shape = acc.shape();
    let n_wave = shape.n_wavelength;

    if flux.len() != n_wave {
        return Err(CubingError::shape_mismatch("fibre flux", n_wave, flux.len()));
    }
    if variance.len() != n_wave {
        return Err(CubingError::shape_mismatch(
            "fibre variance",
            n_wave,
            variance.len(),
        ));
    }
    if !(placement.half_width.is_finite() && placement.half_width > 0.0) {
        return Err(CubingError::invalid_input(format!(
            "kernel half-width must be > 0 pixels, got {}",
            placement.half_width
        )));
    }
    if let Some(adr) = placement.adr {
        if adr.cols.len() != n_wave || adr.rows.len() != n_wave {
            return Err(CubingError::shape_mismatch(
                "ADR offsets",
                n_wave,
                adr.cols.len().min(adr.rows.len()),
            ));
        }
    }

    // Local copy with invalid samples zeroed
    let mut spectrum = flux.to_vec();
    let mut spectrum_var = variance.to_vec();
    let mut validity = vec![1.0; n_wave];
    for k in 0..n_wave {
        if !(spectrum[k].is_finite() && spectrum_var[k].is_finite()) {
            spectrum[k] = 0.0;
            spectrum_var[k] = 0.0;
            validity[k] = 0.0;
        }
    }

    let window = window_length(n_wave, placement.adr, placement.adr_pixel_frac);
    let mut stats = FibreStats::default();

    for start in (0..n_wave).step_by(window.max(1)) {
        let end = (start + window).min(n_wave);
        stats.windows += 1;

        let (adr_col, adr_row) = placement
            .adr
            .map(|adr| adr.median(start..end))
            .unwrap_or((0.0, 0.0));
        let centre_col = placement.col - adr_col;
        let centre_row = placement.row - adr_row;

        let spans = (
            axis_span(centre_col, placement.half_width, shape.n_cols),
            axis_span(centre_row, placement.half_width, shape.n_rows),
        );
        let (Some(cols), Some(rows)) = spans else {
            debug!(
                col = centre_col,
                row = centre_row,
                channels = ?(start..end),
                "Kernel window outside the grid, skipping"
            );
            stats.skipped_windows += 1;
            continue;
        };

        let col_weights = placement.kernel.weights(
            &kernel_edges(
                centre_col,
                placement.half_width,
                cols.first,
                cols.last,
                cols.truncated_start,
                cols.truncated_end,
            ),
            false,
        );
        let row_weights = placement.kernel.weights(
            &kernel_edges(
                centre_row,
                placement.half_width,
                rows.first,
                rows.last,
                rows.truncated_start,
                rows.truncated_end,
            ),
            false,
        );

        for k in start..end {
            for (dr, &w_row) in row_weights.iter().enumerate() {
                let row = rows.first + dr;
                for (dc, &w_col) in col_weights.iter().enumerate() {
                    let w = w_row * w_col;
                    if w == 0.0 {
                        continue;
                    }
                    let idx = shape.index(k, row, cols.first + dc);
                    acc.flux[idx] += spectrum[k] * w;
                    acc.variance[idx] += spectrum_var[k] * w;
                    acc.weight[idx] += validity[k] * w;
                }
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::CubeShape;

    fn placement(col: f64, row: f64) -> FibrePlacement<'static> {
        FibrePlacement {
            col,
            row,
            half_width: 1.5,
            adr: None,
            adr_pixel_frac: DEFAULT_ADR_PIXEL_FRAC,
            kernel: KernelFunction::Cubic,
        }
    }

    fn slice_sum(values: &[f64], shape: CubeShape, wave: usize) -> f64 {
        let n = shape.spatial_len();
        values[wave * n..(wave + 1) * n].iter().sum()
    }

    #[test]
    fn test_axis_span() {
        let span = axis_span(5.0, 1.5, 20).unwrap();
        assert_eq!((span.first, span.last), (4, 6));
        assert!(!span.truncated_start && !span.truncated_end);

        let span = axis_span(0.2, 1.5, 20).unwrap();
        assert_eq!((span.first, span.last), (0, 2));
        assert!(span.truncated_start);

        assert!(axis_span(-4.0, 1.5, 20).is_none());
        assert!(axis_span(25.0, 1.5, 20).is_none());
        assert!(axis_span(f64::NAN, 1.5, 20).is_none());
    }

    #[test]
    fn test_mass_conservation_interior() {
        let shape = CubeShape::new(3, 11, 11);
        let mut acc = Accumulators::zeros(shape);
        let flux = [10.0, 20.0, 30.0];
        let var = [1.0, 4.0, 9.0];

        let stats = interpolate_fibre(&flux, &var, &mut acc, &placement(5.3, 4.8)).unwrap();
        assert_eq!(stats.windows, 1);
        assert_eq!(stats.skipped_windows, 0);

        for (k, f) in flux.iter().enumerate() {
            assert!((slice_sum(&acc.flux, shape, k) - f).abs() < 1e-9);
            assert!((slice_sum(&acc.variance, shape, k) - var[k]).abs() < 1e-9);
            assert!((slice_sum(&acc.weight, shape, k) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_boundary_window_not_biased() {
        let shape = CubeShape::new(1, 6, 6);
        let mut acc = Accumulators::zeros(shape);
        interpolate_fibre(&[1.0], &[1.0], &mut acc, &placement(0.1, 5.4)).unwrap();
        assert!((slice_sum(&acc.weight, shape, 0) - 1.0).abs() < 1e-9);
        assert!(acc.weight.iter().all(|&w| w >= 0.0));
    }

    #[test]
    fn test_nan_removes_single_channel() {
        let shape = CubeShape::new(4, 7, 7);
        let mut acc = Accumulators::zeros(shape);
        let flux = [1.0, f64::NAN, 3.0, 4.0];
        let var = [1.0, 1.0, f64::INFINITY, 1.0];
        interpolate_fibre(&flux, &var, &mut acc, &placement(3.0, 3.0)).unwrap();

        assert!(acc.flux.iter().all(|v| v.is_finite()));
        assert_eq!(slice_sum(&acc.weight, shape, 1), 0.0);
        assert_eq!(slice_sum(&acc.flux, shape, 1), 0.0);
        assert_eq!(slice_sum(&acc.weight, shape, 2), 0.0);
        assert_eq!(slice_sum(&acc.flux, shape, 2), 0.0);
        assert!((slice_sum(&acc.weight, shape, 0) - 1.0).abs() < 1e-9);
        assert!((slice_sum(&acc.flux, shape, 3) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_additive_and_order_independent() {
        let shape = CubeShape::new(2, 9, 9);
        let a = ([1.0, 2.0], [0.1, 0.2], placement(3.2, 4.1));
        let b = ([5.0, 7.0], [0.5, 0.7], placement(4.9, 3.6));

        let mut ab = Accumulators::zeros(shape);
        interpolate_fibre(&a.0, &a.1, &mut ab, &a.2).unwrap();
        interpolate_fibre(&b.0, &b.1, &mut ab, &b.2).unwrap();

        let mut ba = Accumulators::zeros(shape);
        interpolate_fibre(&b.0, &b.1, &mut ba, &b.2).unwrap();
        interpolate_fibre(&a.0, &a.1, &mut ba, &a.2).unwrap();

        for (x, y) in ab.flux.iter().zip(&ba.flux) {
            assert!((x - y).abs() < 1e-12);
        }
        for (x, y) in ab.weight.iter().zip(&ba.weight) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_off_grid_windows_skipped() {
        let shape = CubeShape::new(2, 5, 5);
        let mut acc = Accumulators::zeros(shape);
        let stats = interpolate_fibre(&[1.0, 1.0], &[1.0, 1.0], &mut acc, &placement(-10.0, 2.0))
            .unwrap();
        assert!(stats.fully_off_grid());
        assert!(acc.weight.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_adr_windows_shift_kernel() {
        let n_wave = 40;
        let shape = CubeShape::new(n_wave, 15, 15);
        let mut acc = Accumulators::zeros(shape);
        // Drift of 4 pixels along columns across the spectrum
        let adr = AdrPixels {
            cols: (0..n_wave).map(|k| 4.0 * k as f64 / (n_wave - 1) as f64).collect(),
            rows: vec![0.0; n_wave],
        };
        let mut p = placement(9.0, 7.0);
        p.adr = Some(&adr);
        p.adr_pixel_frac = 0.5;

        let ones = vec![1.0; n_wave];
        let stats = interpolate_fibre(&ones, &ones, &mut acc, &p).unwrap();
        // floor(0.5 / 4 * 40) = 5 channels per window
        assert_eq!(stats.windows, 8);

        let centroid = |k: usize| {
            let mut num = 0.0;
            let mut den = 0.0;
            for r in 0..shape.n_rows {
                for c in 0..shape.n_cols {
                    let w = acc.weight[shape.index(k, r, c)];
                    num += w * c as f64;
                    den += w;
                }
            }
            num / den
        };
        assert!((centroid(0) - 8.8).abs() < 0.5, "first: {}", centroid(0));
        assert!((centroid(n_wave - 1) - 5.2).abs() < 0.5, "last: {}", centroid(n_wave - 1));
    }

    #[test]
    fn test_zero_drift_single_window() {
        let adr = AdrPixels {
            cols: vec![0.3; 10],
            rows: vec![f64::NAN; 10],
        };
        assert_eq!(window_length(10, Some(&adr), 0.05), 10);
        assert_eq!(window_length(10, None, 0.05), 10);
    }

    #[test]
    fn test_spectrum_length_checked() {
        let mut acc = Accumulators::zeros(CubeShape::new(3, 5, 5));
        let err = interpolate_fibre(&[1.0], &[1.0, 1.0, 1.0], &mut acc, &placement(2.0, 2.0));
        assert!(matches!(err, Err(CubingError::ShapeMismatch { .. })));
    }
}
