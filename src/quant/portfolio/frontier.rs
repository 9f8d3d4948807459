//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r)=\min_{\mathbf w\in\mathcal C,\ \mu^\top\mathbf w\ge r}\sqrt{\mathbf w^\top\Sigma\mathbf w},
//! \qquad r_k=r_{\min}+(r_{\max}-r_{\min})\Big(\frac{k}{m-1}\Big)^2
//! $$
//!
//! Minimum-volatility portfolios over quadratically spaced target returns.

use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use super::optimizers::OptimizationProblem;
use super::optimizers::Optimizer;
use super::types::ObjectiveSpec;
use crate::error::AnalyticsError;
use crate::error::Result;

/// One point of the efficient frontier.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub expected_return: f64,
  pub volatility: f64,
  pub weights: Vec<f64>,
  pub converged: bool,
}

/// `n` points from `start` to `end`, denser near `start`.
pub fn quadspace(start: f64, end: f64, n: usize) -> Vec<f64> {
  if n <= 1 {
    return vec![start];
  }
  (0..n)
    .map(|i| {
      let t = i as f64 / (n - 1) as f64;
      start + (end - start) * t * t
    })
    .collect()
}

/// Frontier between the minimum-volatility and the maximum-return portfolios
/// of `problem`'s constraint set. The objective of `problem` is ignored.
///
/// Targets are solved in parallel; points whose optimization fails are
/// skipped. The output is ordered by target return.
pub fn efficient_frontier(
  optimizer: &Optimizer,
  problem: &OptimizationProblem,
  points: usize,
) -> Result<Vec<FrontierPoint>> {
  if points < 2 {
    return Err(AnalyticsError::invalid(format!(
      "efficient frontier needs at least 2 points, got {points}"
    )));
  }

  let min_vol = optimizer.optimize(&problem.with_objective(ObjectiveSpec::MinVolatility))?;
  let max_ret = optimizer.optimize(&problem.with_objective(ObjectiveSpec::MaxReturn))?;
  let targets = quadspace(min_vol.expected_return, max_ret.expected_return, points);

  let solved: Vec<Option<FrontierPoint>> = targets
    .par_iter()
    .map(|&target| {
      let sub = problem.with_objective(ObjectiveSpec::MinVolatilityForTargetReturn { target });
      match optimizer.optimize(&sub) {
        Ok(res) => Some(FrontierPoint {
          target_return: target,
          expected_return: res.expected_return,
          volatility: res.volatility,
          weights: res.weights,
          converged: res.converged,
        }),
        Err(e) => {
          warn!(target, error = %e, "frontier point skipped");
          None
        }
      }
    })
    .collect();

  let frontier: Vec<FrontierPoint> = solved.into_iter().flatten().collect();
  debug!(
    requested = points,
    solved = frontier.len(),
    "efficient frontier computed"
  );
  Ok(frontier)
}
