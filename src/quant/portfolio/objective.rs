//! # Objectives
//!
//! $$
//! \mathrm{RC}_i=\frac{w_i(\Sigma\mathbf w)_i}{\mathbf w^\top\Sigma\mathbf w},\qquad
//! \mathcal L_{\mathrm{RP}}(\mathbf w)=\sum_i\Big(\mathrm{RC}_i-\frac1n\Big)^2
//! $$
//!
//! Scalar costs minimized by the optimizer. Maximization objectives are
//! negated. A breached risk or return target costs more than any admissible
//! point, growing linearly with the breach.

use super::constraints::ConstraintSet;
use super::data::CovarianceMatrix;
use super::types::ObjectiveSpec;
use crate::quant::risk;
use crate::quant::series::AlignedReturns;
use crate::quant::series::ReturnKind;
use crate::stats::dot;

/// Everything an objective evaluation reads, owned by the cost function.
#[derive(Clone, Debug)]
pub(crate) struct Objective {
  pub spec: ObjectiveSpec,
  pub mu: Vec<f64>,
  pub cov: CovarianceMatrix,
  pub risk_free_rate: f64,
  pub scenarios: Option<(Vec<Vec<f64>>, ReturnKind)>,
  pub penalty: f64,
  /// Upper bound of `|μ·w|` over the box.
  return_bound: f64,
  /// Upper bound of `σ_p` over the box.
  risk_bound: f64,
}

/// Portfolio moments of one weight vector.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Moments {
  pub expected_return: f64,
  pub volatility: f64,
}

impl Objective {
  pub fn new(
    spec: ObjectiveSpec,
    mu: Vec<f64>,
    cov: CovarianceMatrix,
    risk_free_rate: f64,
    scenarios: Option<&AlignedReturns>,
    penalty: f64,
    constraints: &ConstraintSet,
  ) -> Self {
    let reach: Vec<f64> = constraints
      .bounds()
      .iter()
      .map(|b| b.lower.abs().max(b.upper.abs()))
      .collect();
    let return_bound = reach.iter().zip(&mu).map(|(b, m)| b * m.abs()).sum();
    let n = reach.len();
    let mut risk_sq = 0.0;
    for i in 0..n {
      for j in 0..n {
        risk_sq += reach[i] * reach[j] * cov.get(i, j).abs();
      }
    }

    Self {
      spec,
      mu,
      cov,
      risk_free_rate,
      scenarios: scenarios.map(|s| (s.values.clone(), s.kind)),
      penalty,
      return_bound,
      risk_bound: risk_sq.sqrt(),
    }
  }

  pub fn moments(&self, w: &[f64]) -> Moments {
    Moments {
      expected_return: dot(&self.mu, w),
      volatility: self.cov.quadratic_form(w).max(0.0).sqrt(),
    }
  }

  fn scenario_returns(&self, w: &[f64]) -> Option<(Vec<f64>, ReturnKind)> {
    let (values, kind) = self.scenarios.as_ref()?;
    let periods = values.first().map(|r| r.len()).unwrap_or(0);
    let mut period = vec![0.0; values.len()];
    let rets = (0..periods)
      .map(|t| {
        for (slot, row) in period.iter_mut().zip(values) {
          *slot = row[t];
        }
        kind.combine(w, &period)
      })
      .collect();
    Some((rets, *kind))
  }

  fn risk_parity_error(&self, w: &[f64]) -> f64 {
    let sigma_w = self.cov.mat_vec(w);
    let port_var = dot(w, &sigma_w);
    if port_var < 1e-30 {
      return 1e10;
    }
    let target = 1.0 / w.len() as f64;
    w.iter()
      .zip(&sigma_w)
      .map(|(wi, sw)| (wi * sw / port_var - target).powi(2))
      .sum()
  }

  /// Cost to minimize; `NaN` maps to `+inf`.
  pub fn cost(&self, w: &[f64]) -> f64 {
    let m = self.moments(w);
    let value = match self.spec {
      ObjectiveSpec::MaxSharpe => -(m.expected_return - self.risk_free_rate) / m.volatility,
      ObjectiveSpec::MinVolatility => m.volatility,
      ObjectiveSpec::MaxReturnForTargetRisk { target } => {
        if m.volatility <= target {
          -m.expected_return
        } else {
          self.return_bound + self.penalty * (m.volatility - target)
        }
      }
      ObjectiveSpec::RiskParity => self.risk_parity_error(w),
      ObjectiveSpec::MaxReturn => -m.expected_return,
      ObjectiveSpec::MinDrawdown => match self.scenario_returns(w) {
        Some((rets, kind)) => risk::max_drawdown_of(&rets, kind).unwrap_or(f64::INFINITY),
        None => f64::INFINITY,
      },
      ObjectiveSpec::MinVar { confidence_level } => match self.scenario_returns(w) {
        Some((rets, _)) => risk::value_at_risk_of(&rets, confidence_level)
          .map(|var| -var)
          .unwrap_or(f64::INFINITY),
        None => f64::INFINITY,
      },
      ObjectiveSpec::MinCvar { confidence_level } => match self.scenario_returns(w) {
        Some((rets, _)) => risk::conditional_value_at_risk_of(&rets, confidence_level)
          .map(|cvar| -cvar)
          .unwrap_or(f64::INFINITY),
        None => f64::INFINITY,
      },
      ObjectiveSpec::MinVolatilityForTargetReturn { target } => {
        if m.expected_return >= target {
          m.volatility
        } else {
          self.risk_bound + self.penalty * (target - m.expected_return)
        }
      }
    };
    if value.is_nan() {
      f64::INFINITY
    } else {
      value
    }
  }

  /// Objective in its natural orientation for reporting.
  pub fn report(&self, w: &[f64]) -> f64 {
    let m = self.moments(w);
    match self.spec {
      ObjectiveSpec::MaxSharpe => -self.cost(w),
      ObjectiveSpec::MaxReturnForTargetRisk { .. } | ObjectiveSpec::MaxReturn => m.expected_return,
      ObjectiveSpec::MinVar { .. } | ObjectiveSpec::MinCvar { .. } => -self.cost(w),
      ObjectiveSpec::MinVolatilityForTargetReturn { .. } => m.volatility,
      ObjectiveSpec::MinVolatility
      | ObjectiveSpec::RiskParity
      | ObjectiveSpec::MinDrawdown => self.cost(w),
    }
  }
}
