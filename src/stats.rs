//! # Descriptive statistics
//!
//! $$
//! s^2=\frac{1}{n-1}\sum_{i=1}^n (x_i-\bar x)^2
//! $$
//!
//! Sample moments shared by the risk and covariance layers. Callers check
//! minimum lengths; the helpers return `0.0` for degenerate input instead of
//! `NaN`.

use std::cmp::Ordering;

use statrs::statistics::Statistics;

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
  if xs.is_empty() {
    0.0
  } else {
    xs.iter().mean()
  }
}

/// Sample variance with the `n - 1` denominator.
pub fn sample_variance(xs: &[f64]) -> f64 {
  if xs.len() < 2 {
    return 0.0;
  }
  xs.iter().variance().max(0.0)
}

/// Sample standard deviation with the `n - 1` denominator.
pub fn sample_std_dev(xs: &[f64]) -> f64 {
  sample_variance(xs).sqrt()
}

/// Sample covariance of two equally long slices.
pub fn sample_covariance(xs: &[f64], ys: &[f64]) -> f64 {
  let n = xs.len().min(ys.len());
  if n < 2 {
    return 0.0;
  }
  xs[..n].iter().covariance(ys[..n].iter())
}

/// Ascending copy, NaN-tolerant.
pub fn sorted(xs: &[f64]) -> Vec<f64> {
  let mut out = xs.to_vec();
  out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
  out
}

/// Lower empirical quantile: element `floor(p * (n - 1))` of the sorted sample.
pub fn lower_quantile(sorted_xs: &[f64], p: f64) -> Option<f64> {
  if sorted_xs.is_empty() {
    return None;
  }
  let idx = (p.clamp(0.0, 1.0) * (sorted_xs.len() - 1) as f64).floor() as usize;
  sorted_xs.get(idx.min(sorted_xs.len() - 1)).copied()
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub(crate) fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
  a.iter()
    .zip(b.iter())
    .map(|(x, y)| (x - y).powi(2))
    .sum::<f64>()
    .sqrt()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn moments_match_hand_computation() {
    let xs = [1.0, 2.0, 3.0, 4.0];
    assert_abs_diff_eq!(mean(&xs), 2.5, epsilon = 1e-12);
    assert_abs_diff_eq!(sample_variance(&xs), 5.0 / 3.0, epsilon = 1e-12);

    let ys = [2.0, 4.0, 6.0, 8.0];
    assert_abs_diff_eq!(sample_covariance(&xs, &ys), 10.0 / 3.0, epsilon = 1e-12);
  }

  #[test]
  fn degenerate_input_is_zero_not_nan() {
    assert_eq!(mean(&[]), 0.0);
    assert_eq!(sample_variance(&[1.0]), 0.0);
    assert_eq!(sample_covariance(&[1.0], &[2.0]), 0.0);
  }

  #[test]
  fn lower_quantile_uses_floor_index() {
    let xs: Vec<f64> = (0..=10).map(|i| i as f64).collect();
    assert_eq!(lower_quantile(&xs, 0.05), Some(0.0));
    assert_eq!(lower_quantile(&xs, 0.5), Some(5.0));
    assert_eq!(lower_quantile(&xs, 1.0), Some(10.0));
    assert_eq!(lower_quantile(&[], 0.5), None);
  }
}
