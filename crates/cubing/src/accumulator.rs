//! Flux, variance and weight accumulation buffers.

use projection::CubeShape;

use crate::error::{CubingError, Result};

/// Un-normalised flux, variance and weight sums on a cube grid.
///
/// All three buffers share the (wavelength, row, column) row-major layout of
/// `shape` and are only ever added to.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulators {
    shape: CubeShape,
    pub flux: Vec<f64>,
    pub variance: Vec<f64>,
    pub weight: Vec<f64>,
}

impl Accumulators {
    /// Create zero-filled accumulators.
    pub fn zeros(shape: CubeShape) -> Self {
        let len = shape.len();
        Self {
            shape,
            flux: vec![0.0; len],
            variance: vec![0.0; len],
            weight: vec![0.0; len],
        }
    }

    /// Wrap existing buffers, checking their lengths against `shape`.
    pub fn from_parts(
        shape: CubeShape,
        flux: Vec<f64>,
        variance: Vec<f64>,
        weight: Vec<f64>,
    ) -> Result<Self> {
        for (what, buffer) in [("flux", &flux), ("variance", &variance), ("weight", &weight)] {
            if buffer.len() != shape.len() {
                return Err(CubingError::shape_mismatch(
                    format!("{} accumulator", what),
                    shape.len(),
                    buffer.len(),
                ));
            }
        }
        Ok(Self {
            shape,
            flux,
            variance,
            weight,
        })
    }

    /// Grid shape.
    pub fn shape(&self) -> CubeShape {
        self.shape
    }

    /// Add another set of accumulators of the same shape.
    pub fn merge(&mut self, other: &Accumulators) -> Result<()> {
        if other.shape != self.shape {
            return Err(CubingError::invalid_input(format!(
                "cannot merge accumulators of shape {:?} into {:?}",
                other.shape, self.shape
            )));
        }
        add_assign(&mut self.flux, &other.flux);
        add_assign(&mut self.variance, &other.variance);
        add_assign(&mut self.weight, &other.weight);
        Ok(())
    }

    /// Total weight of one wavelength slice.
    pub fn slice_weight(&self, wave: usize) -> f64 {
        let n = self.shape.spatial_len();
        self.weight[wave * n..(wave + 1) * n].iter().sum()
    }

    /// Split into `(flux, variance, weight)`.
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (self.flux, self.variance, self.weight)
    }
}

fn add_assign(target: &mut [f64], source: &[f64]) {
    target
        .iter_mut()
        .zip(source)
        .for_each(|(t, s)| *t += s);
}
