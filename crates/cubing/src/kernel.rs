//! One-dimensional cumulative interpolation kernels.
//!
//! A kernel is evaluated through its cumulative profile `C(z)`: the weight of
//! the interval `[z_i, z_{i+1}]` is `C(z_{i+1}) - C(z_i)`. Edges are expressed
//! in units of the kernel half-width, so the kernel support is `[-1, 1]`.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;

/// Shape of the interpolation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelFunction {
    /// Cumulative standard normal, with the half-width as one sigma.
    Gaussian,
    /// Cumulative cubic `(3z - z³ + 2) / 4`.
    #[default]
    Cubic,
}

impl KernelFunction {
    /// Parse from string (case-insensitive). Unknown names fall back to cubic.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gaussian" | "gauss" => Self::Gaussian,
            _ => Self::Cubic,
        }
    }

    /// Get the kernel name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Cubic => "cubic",
        }
    }

    /// Cumulative profile at `z`.
    #[inline]
    pub fn cumulative(&self, z: f64) -> f64 {
        match self {
            Self::Gaussian => 0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2)),
            Self::Cubic => {
                let z = z.clamp(-1.0, 1.0);
                (3.0 * z - z * z * z + 2.0) / 4.0
            }
        }
    }

    /// Weights of the `edges.len() - 1` intervals delimited by `edges`.
    ///
    /// With `normalize` the weights are rescaled to sum to one, unless their
    /// sum is zero.
    pub fn weights(&self, edges: &[f64], normalize: bool) -> Vec<f64> {
        if edges.len() < 2 {
            return Vec::new();
        }

        let cumulative: Vec<f64> = edges.iter().map(|&z| self.cumulative(z)).collect();
        let mut weights: Vec<f64> = cumulative
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).max(0.0))
            .collect();

        if normalize {
            let total: f64 = weights.iter().sum();
            if total > 0.0 {
                weights.iter_mut().for_each(|w| *w /= total);
            }
        }

        weights
    }
}

impl std::fmt::Display for KernelFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalised pixel edges of a kernel window along one axis.
///
/// `first..=last` are the covered pixel indices; pixel `j` spans
/// `[j - 0.5, j + 0.5]`. Edges are `(edge - centre) / half_width`, clipped to
/// `[-1, 1]`. When the window is cut by the start (or end) of the axis, the
/// outermost edge on that side is set to `-1` (or `+1`) so the boundary pixel
/// absorbs the truncated tail of the kernel.
pub fn kernel_edges(
    centre: f64,
    half_width: f64,
    first: usize,
    last: usize,
    truncated_start: bool,
    truncated_end: bool,
) -> Vec<f64> {
    let mut edges: Vec<f64> = (first..=last + 1)
        .map(|j| ((j as f64 - 0.5 - centre) / half_width).clamp(-1.0, 1.0))
        .collect();

    if truncated_start {
        edges[0] = -1.0;
    }
    if truncated_end {
        if let Some(end) = edges.last_mut() {
            *end = 1.0;
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric_edges(n: usize) -> Vec<f64> {
        (0..=n).map(|i| -1.0 + 2.0 * i as f64 / n as f64).collect()
    }

    #[test]
    fn test_cubic_full_support_sums_to_one() {
        let w = KernelFunction::Cubic.weights(&symmetric_edges(6), false);
        assert_eq!(w.len(), 6);
        let total: f64 = w.iter().sum();
        assert!((total - 1.0).abs() < 1e-12, "total = {}", total);
        // Symmetric and peaked at the centre
        assert!((w[0] - w[5]).abs() < 1e-12);
        assert!(w[2] > w[0]);
    }

    #[test]
    fn test_gaussian_unnormalized_below_one() {
        let w = KernelFunction::Gaussian.weights(&symmetric_edges(4), false);
        let total: f64 = w.iter().sum();
        // One sigma either side
        assert!((total - 0.682_689_492).abs() < 1e-6, "total = {}", total);
        assert!(w.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_normalize() {
        for kernel in [KernelFunction::Gaussian, KernelFunction::Cubic] {
            let w = kernel.weights(&[-0.3, 0.1, 0.4, 0.9], true);
            let total: f64 = w.iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "{}: total = {}", kernel, total);
        }
    }

    #[test]
    fn test_zero_weights_not_normalized() {
        let w = KernelFunction::Cubic.weights(&[1.0, 1.0, 1.0], true);
        assert_eq!(w, vec![0.0, 0.0]);
    }

    #[test]
    fn test_too_few_edges() {
        assert!(KernelFunction::Cubic.weights(&[0.5], true).is_empty());
        assert!(KernelFunction::Gaussian.weights(&[], false).is_empty());
    }

    #[test]
    fn test_kernel_edges_interior() {
        // Centre 5.0, half-width 1.5: pixels 4..=6, edges 3.5..6.5
        let edges = kernel_edges(5.0, 1.5, 4, 6, false, false);
        assert_eq!(edges.len(), 4);
        assert!((edges[0] + 1.0).abs() < 1e-12);
        assert!((edges[1] + 1.0 / 3.0).abs() < 1e-12);
        assert!((edges[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_edges_truncated_start() {
        // Centre on pixel 0: the left half of the kernel falls off the grid
        let edges = kernel_edges(0.0, 1.5, 0, 1, true, false);
        assert_eq!(edges[0], -1.0);
        let total: f64 = KernelFunction::Cubic.weights(&edges, false).iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_from_str() {
        assert_eq!(KernelFunction::from_str("GAUSSIAN"), KernelFunction::Gaussian);
        assert_eq!(KernelFunction::from_str("cubic"), KernelFunction::Cubic);
        assert_eq!(KernelFunction::from_str("bogus"), KernelFunction::Cubic);
        assert_eq!(KernelFunction::default(), KernelFunction::Cubic);
    }
}
