//! Synthetic data generators for IFS tests.
//!
//! These generators create predictable, verifiable exposures and cubes
//! that can be used across the test suite.

use ifs_common::{AdrOffsets, Exposure, SkyCoord};
use projection::CubeShape;

/// Linearly sampled wavelength axis.
///
/// # Example
///
/// ```
/// use test_utils::linear_wavelength;
///
/// let wl = linear_wavelength(6000.0, 2.0, 3);
/// assert_eq!(wl, vec![6000.0, 6002.0, 6004.0]);
/// ```
pub fn linear_wavelength(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Square bundle of `n_side × n_side` fibres centred on `center`.
///
/// Fibres are `spacing_arcsec` apart along RA and Dec, ordered row by row
/// from south to north with RA increasing along each row.
pub fn square_bundle(center: SkyCoord, n_side: usize, spacing_arcsec: f64) -> Vec<SkyCoord> {
    let half = (n_side as f64 - 1.0) / 2.0;
    let mut fibres = Vec::with_capacity(n_side * n_side);
    for row in 0..n_side {
        for col in 0..n_side {
            fibres.push(center.offset_arcsec(
                (col as f64 - half) * spacing_arcsec,
                (row as f64 - half) * spacing_arcsec,
            ));
        }
    }
    fibres
}

/// Hexagonally packed fibre bundle with `rings` rings around a central fibre.
///
/// Ring `k` holds `6k` fibres, so the bundle has `1 + 3 rings (rings + 1)`
/// fibres in total.
pub fn hexagonal_bundle(center: SkyCoord, rings: usize, spacing_arcsec: f64) -> Vec<SkyCoord> {
    let mut fibres = vec![center];
    let directions: [(f64, f64); 6] = [
        (1.0, 0.0),
        (0.5, 3f64.sqrt() / 2.0),
        (-0.5, 3f64.sqrt() / 2.0),
        (-1.0, 0.0),
        (-0.5, -(3f64.sqrt()) / 2.0),
        (0.5, -(3f64.sqrt()) / 2.0),
    ];
    for ring in 1..=rings {
        let r = ring as f64;
        // Start at the corner in direction 4 and walk along each side
        let mut pos = (directions[4].0 * r, directions[4].1 * r);
        for side in directions {
            for _ in 0..ring {
                fibres.push(center.offset_arcsec(pos.0 * spacing_arcsec, pos.1 * spacing_arcsec));
                pos = (pos.0 + side.0, pos.1 + side.1);
            }
        }
    }
    fibres
}

/// Circular Gaussian surface-brightness profile.
#[derive(Debug, Clone, Copy)]
pub struct PointSource {
    /// Sky position of the source.
    pub position: SkyCoord,
    /// Full width at half maximum in arcseconds.
    pub fwhm_arcsec: f64,
    /// Peak count rate per fibre, per second.
    pub peak_rate: f64,
}

impl PointSource {
    /// Count rate at a sky position.
    pub fn rate_at(&self, coord: &SkyCoord) -> f64 {
        let sigma = self.fwhm_arcsec / (2.0 * (2.0 * 2f64.ln()).sqrt());
        let r = self.position.separation_arcsec(coord);
        self.peak_rate * (-0.5 * (r / sigma).powi(2)).exp()
    }
}

/// Exposure of a point source observed through the given fibres.
///
/// Every channel receives the same counts, `rate × exposure_time`, with
/// Poisson-like variance equal to the counts plus one.
pub fn point_source_exposure(
    name: &str,
    source: &PointSource,
    fibres: Vec<SkyCoord>,
    wavelength: Vec<f64>,
    exposure_time: f64,
) -> Exposure {
    let n_wave = wavelength.len();
    let mut intensity = Vec::with_capacity(fibres.len() * n_wave);
    for fibre in &fibres {
        let counts = source.rate_at(fibre) * exposure_time;
        intensity.extend(std::iter::repeat(counts).take(n_wave));
    }
    let variance = intensity.iter().map(|c| c + 1.0).collect();
    Exposure::new(name, exposure_time, wavelength, fibres, intensity, variance)
        .expect("Synthetic exposure should be valid")
}

/// Exposure where every fibre has the same spectrum.
pub fn uniform_exposure(
    name: &str,
    fibres: Vec<SkyCoord>,
    wavelength: Vec<f64>,
    spectrum: &[f64],
    variance: &[f64],
    exposure_time: f64,
) -> Exposure {
    let n_fibres = fibres.len();
    let intensity = spectrum.repeat(n_fibres);
    let variance = variance.repeat(n_fibres);
    Exposure::new(name, exposure_time, wavelength, fibres, intensity, variance)
        .expect("Synthetic exposure should be valid")
}

/// ADR offsets drifting linearly from `start` to `end` arcseconds along RA
/// and Dec over `n` channels.
pub fn linear_adr(n: usize, start: (f64, f64), end: (f64, f64)) -> AdrOffsets {
    let ramp = |a: f64, b: f64| -> Vec<f64> {
        (0..n)
            .map(|i| a + (b - a) * i as f64 / (n.max(2) - 1) as f64)
            .collect()
    };
    AdrOffsets::new(ramp(start.0, end.0), ramp(start.1, end.1))
}

/// Cube intensity holding a Gaussian blob centred on pixel (`col`, `row`) in
/// every channel, with the given sigma in pixels.
pub fn gaussian_blob_cube(shape: CubeShape, col: f64, row: f64, sigma: f64) -> Vec<f64> {
    let mut data = vec![0.0; shape.len()];
    for k in 0..shape.n_wavelength {
        for r in 0..shape.n_rows {
            for c in 0..shape.n_cols {
                let d2 = (c as f64 - col).powi(2) + (r as f64 - row).powi(2);
                data[shape.index(k, r, c)] = (-0.5 * d2 / (sigma * sigma)).exp();
            }
        }
    }
    data
}
