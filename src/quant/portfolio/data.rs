//! # Portfolio Data
//!
//! $$
//! \hat\Sigma_{ij}=\frac{1}{T-1}\sum_{t=1}^{T}(r_{i,t}-\bar r_i)(r_{j,t}-\bar r_j),
//! \qquad \rho_{ij}=\frac{\Sigma_{ij}}{\sqrt{\Sigma_{ii}\Sigma_{jj}}}
//! $$
//!
//! Covariance estimation over date-aligned return series.

use std::collections::BTreeMap;
use std::collections::HashSet;

use nalgebra::DMatrix;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::series::align;
use crate::quant::series::align_pair;
use crate::quant::series::AlignedReturns;
use crate::quant::series::ReturnSeries;
use crate::stats;

/// Symmetric covariance matrix indexed in instrument order.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
  symbols: Vec<String>,
  values: Array2<f64>,
}

impl CovarianceMatrix {
  /// Build from row-major values.
  ///
  /// Rejects non-square or non-finite input, negative variances and
  /// asymmetry beyond rounding. The stored matrix is mirrored from its upper
  /// triangle so that `get(i, j) == get(j, i)` holds exactly.
  pub fn from_rows(symbols: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
    let n = symbols.len();
    if n == 0 {
      return Err(AnalyticsError::insufficient_data("covariance over zero instruments"));
    }
    if rows.len() != n || rows.iter().any(|r| r.len() != n) {
      return Err(AnalyticsError::invalid(format!(
        "covariance must be {n}x{n} to match its symbols"
      )));
    }

    let mut values = Array2::<f64>::zeros((n, n));
    for i in 0..n {
      if !(rows[i][i].is_finite() && rows[i][i] >= 0.0) {
        return Err(AnalyticsError::invalid(format!(
          "variance of {} must be finite and non-negative, got {}",
          symbols[i], rows[i][i]
        )));
      }
      for j in i..n {
        let (a, b) = (rows[i][j], rows[j][i]);
        if !a.is_finite() || !b.is_finite() {
          return Err(AnalyticsError::invalid(format!(
            "non-finite covariance between {} and {}",
            symbols[i], symbols[j]
          )));
        }
        let scale = a.abs().max(b.abs()).max(1.0);
        if (a - b).abs() > 1e-10 * scale {
          return Err(AnalyticsError::invalid(format!(
            "covariance is not symmetric at ({i}, {j}): {a} vs {b}"
          )));
        }
        values[[i, j]] = a;
        values[[j, i]] = a;
      }
    }

    check_unique(&symbols)?;
    Ok(Self { symbols, values })
  }

  fn from_upper(symbols: Vec<String>, upper: &BTreeMap<(usize, usize), f64>) -> Self {
    let n = symbols.len();
    let mut values = Array2::<f64>::zeros((n, n));
    for (&(i, j), &c) in upper {
      values[[i, j]] = c;
      values[[j, i]] = c;
    }
    Self { symbols, values }
  }

  pub fn dim(&self) -> usize {
    self.symbols.len()
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn get(&self, i: usize, j: usize) -> f64 {
    self.values[[i, j]]
  }

  pub fn variance(&self, i: usize) -> f64 {
    self.values[[i, i]]
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  /// `w' Σ w`. Fails when `weights` does not match the dimension.
  pub fn portfolio_variance(&self, weights: &[f64]) -> Result<f64> {
    if weights.len() != self.dim() {
      return Err(AnalyticsError::invalid(format!(
        "{} weights for a {}x{} covariance matrix",
        weights.len(),
        self.dim(),
        self.dim()
      )));
    }
    Ok(self.quadratic_form(weights))
  }

  /// Unchecked `portfolio_variance`, `weights` must have `dim()` entries.
  pub(crate) fn quadratic_form(&self, weights: &[f64]) -> f64 {
    let n = self.dim();
    let mut acc = 0.0;
    for i in 0..n {
      for j in 0..n {
        acc += weights[i] * self.values[[i, j]] * weights[j];
      }
    }
    acc
  }

  pub(crate) fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
    self
      .values
      .rows()
      .into_iter()
      .map(|row| row.iter().zip(v.iter()).map(|(a, b)| a * b).sum())
      .collect()
  }

  /// Pearson correlation; assets with zero variance get zero off-diagonal
  /// correlation.
  pub fn correlation(&self) -> Array2<f64> {
    let n = self.dim();
    let sd: Vec<f64> = (0..n).map(|i| self.variance(i).max(0.0).sqrt()).collect();
    Array2::from_shape_fn((n, n), |(i, j)| {
      let denom = sd[i] * sd[j];
      if i == j {
        1.0
      } else if denom > 1e-15 {
        (self.values[[i, j]] / denom).clamp(-1.0, 1.0)
      } else {
        0.0
      }
    })
  }

  /// Every entry multiplied by `factor`, e.g. to annualize a per-period matrix.
  pub fn scaled(&self, factor: f64) -> Self {
    Self {
      symbols: self.symbols.clone(),
      values: &self.values * factor,
    }
  }

  pub(crate) fn with_diagonal_shift(&self, shift: f64) -> Self {
    let mut values = self.values.clone();
    for i in 0..self.dim() {
      values[[i, i]] += shift;
    }
    Self {
      symbols: self.symbols.clone(),
      values,
    }
  }

  pub fn to_nalgebra(&self) -> DMatrix<f64> {
    let n = self.dim();
    DMatrix::from_fn(n, n, |i, j| self.values[[i, j]])
  }
}

/// How series of different date ranges are joined before estimation.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignmentPolicy {
  /// One intersection of all timestamps; the matrix is positive semidefinite.
  #[default]
  Global,
  /// Each pair on its own intersection. Pairs with fewer than two common
  /// timestamps are reported in [`CovarianceEstimate::pair_errors`] and
  /// contribute zero.
  Pairwise,
}

/// Output of [`CovarianceEstimator::estimate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceEstimate {
  pub matrix: CovarianceMatrix,
  /// Per-period mean returns in instrument order.
  pub mean_returns: Vec<f64>,
  /// Common periods (global) or the smallest successful pair overlap.
  pub observations: usize,
  /// Pairs whose term could not be estimated, keyed by `(i, j)` with `i <= j`.
  pub pair_errors: Vec<((usize, usize), AnalyticsError)>,
}

/// Sample covariance estimator.
#[derive(Default, Clone, Copy, Debug)]
pub struct CovarianceEstimator {
  pub policy: AlignmentPolicy,
}

fn check_unique(symbols: &[String]) -> Result<()> {
  let mut seen = HashSet::new();
  match symbols.iter().find(|s| !seen.insert(s.as_str())) {
    Some(dup) => Err(AnalyticsError::invalid(format!("duplicate symbol {dup}"))),
    None => Ok(()),
  }
}

fn upper_pairs(n: usize) -> Vec<(usize, usize)> {
  (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect()
}

impl CovarianceEstimator {
  pub fn new(policy: AlignmentPolicy) -> Self {
    Self { policy }
  }

  pub fn estimate(&self, series: &[&ReturnSeries]) -> Result<CovarianceEstimate> {
    if series.is_empty() {
      return Err(AnalyticsError::insufficient_data("no return series supplied"));
    }
    let symbols: Vec<String> = series.iter().map(|s| s.symbol().to_string()).collect();
    check_unique(&symbols)?;
    match self.policy {
      AlignmentPolicy::Global => Self::estimate_aligned(&align(series)?),
      AlignmentPolicy::Pairwise => Self::estimate_pairwise(series),
    }
  }

  /// Estimate from returns that already share their timestamps.
  pub fn estimate_aligned(aligned: &AlignedReturns) -> Result<CovarianceEstimate> {
    let n = aligned.n_assets();
    check_unique(&aligned.symbols)?;
    if aligned.n_periods() < 2 {
      return Err(AnalyticsError::insufficient_overlap(format!(
        "{} common periods, at least 2 required",
        aligned.n_periods()
      )));
    }

    let upper: BTreeMap<(usize, usize), f64> = upper_pairs(n)
      .into_par_iter()
      .map(|(i, j)| {
        (
          (i, j),
          stats::sample_covariance(&aligned.values[i], &aligned.values[j]),
        )
      })
      .collect();

    let matrix = CovarianceMatrix::from_upper(aligned.symbols.clone(), &upper);
    debug!(
      assets = n,
      observations = aligned.n_periods(),
      "covariance estimated on global intersection"
    );

    Ok(CovarianceEstimate {
      matrix,
      mean_returns: aligned.values.iter().map(|v| stats::mean(v)).collect(),
      observations: aligned.n_periods(),
      pair_errors: Vec::new(),
    })
  }

  fn estimate_pairwise(series: &[&ReturnSeries]) -> Result<CovarianceEstimate> {
    let n = series.len();
    let symbols: Vec<String> = series.iter().map(|s| s.symbol().to_string()).collect();

    let terms: BTreeMap<(usize, usize), Result<(f64, usize)>> = upper_pairs(n)
      .into_par_iter()
      .map(|(i, j)| {
        let term = if i == j {
          let values = series[i].values();
          if values.len() < 2 {
            Err(AnalyticsError::insufficient_data(format!(
              "{}: variance needs at least 2 returns",
              symbols[i]
            )))
          } else {
            Ok((stats::sample_variance(&values), values.len()))
          }
        } else {
          align_pair(series[i], series[j])
            .map(|(a, b)| (stats::sample_covariance(&a, &b), a.len()))
        };
        ((i, j), term)
      })
      .collect();

    let mut upper = BTreeMap::new();
    let mut pair_errors = Vec::new();
    let mut observations = usize::MAX;
    for (key, term) in terms {
      match term {
        Ok((c, obs)) => {
          upper.insert(key, c);
          observations = observations.min(obs);
        }
        Err(e) => {
          upper.insert(key, 0.0);
          pair_errors.push((key, e));
        }
      }
    }

    if !pair_errors.is_empty() {
      warn!(
        failed_pairs = pair_errors.len(),
        "pairwise covariance terms set to zero"
      );
    }
    if observations == usize::MAX {
      return Err(AnalyticsError::insufficient_overlap(
        "no pair of series has enough common timestamps",
      ));
    }

    Ok(CovarianceEstimate {
      matrix: CovarianceMatrix::from_upper(symbols, &upper),
      mean_returns: series.iter().map(|s| stats::mean(&s.values())).collect(),
      observations,
      pair_errors,
    })
  }
}
