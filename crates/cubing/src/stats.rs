//! NaN-ignoring summary statistics.

use statrs::statistics::{Data, Median, Statistics};

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Median of the finite values, NaN if there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    let finite = finite(values);
    if finite.is_empty() {
        return f64::NAN;
    }
    Data::new(finite).median()
}

/// Mean of the finite values, NaN if there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let finite = finite(values);
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().mean()
}

/// Population standard deviation of the finite values, NaN if there are none.
pub fn nan_std(values: &[f64]) -> f64 {
    let finite = finite(values);
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().population_std_dev()
}

/// Sum of the finite values, zero if there are none.
pub fn nan_sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| v.is_finite()).sum()
}

/// Maximum of the finite values, NaN if there are none.
pub fn nan_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NAN, f64::max)
}

/// Difference between the largest and smallest finite value, NaN if there are none.
pub fn nan_range(values: &[f64]) -> f64 {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        f64::NAN
    } else {
        max - min
    }
}
