//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\mathbb E[R_p]-r_f}{\sigma_p}
//! $$
//!
//! Objectives, optimizer configuration and result containers.

use crate::error::AnalyticsError;
use crate::error::Result;

/// Objective selected for an optimizer run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObjectiveSpec {
  /// Maximize `(μ·w - r_f) / σ_p`.
  MaxSharpe,
  /// Minimize `σ_p`.
  MinVolatility,
  /// Maximize `μ·w` subject to `σ_p <= target`.
  MaxReturnForTargetRisk { target: f64 },
  /// Equalize risk contributions `w_i (Σw)_i / σ_p^2`.
  RiskParity,
  /// Maximize `μ·w`.
  MaxReturn,
  /// Minimize the historical max drawdown of the scenario portfolio.
  MinDrawdown,
  /// Minimize the historical VaR loss of the scenario portfolio.
  MinVar { confidence_level: f64 },
  /// Minimize the historical CVaR loss of the scenario portfolio.
  MinCvar { confidence_level: f64 },
  /// Minimize `σ_p` subject to `μ·w >= target`.
  MinVolatilityForTargetReturn { target: f64 },
}

impl ObjectiveSpec {
  /// Parse an objective key. `target_risk` is required by
  /// `max_return_for_target_risk` and ignored otherwise.
  pub fn from_name(name: &str, target_risk: Option<f64>) -> Result<Self> {
    let spec = match name.to_lowercase().as_str() {
      "max_sharpe" => Self::MaxSharpe,
      "min_vol" | "min_volatility" => Self::MinVolatility,
      "max_return" => Self::MaxReturn,
      "max_return_for_target_risk" => {
        let target = target_risk.ok_or_else(|| {
          AnalyticsError::invalid("max_return_for_target_risk needs a target risk")
        })?;
        Self::MaxReturnForTargetRisk { target }
      }
      "risk_parity" => Self::RiskParity,
      "min_drawdown" => Self::MinDrawdown,
      "min_var" => Self::MinVar {
        confidence_level: 0.95,
      },
      "min_cvar" => Self::MinCvar {
        confidence_level: 0.95,
      },
      other => {
        return Err(AnalyticsError::invalid(format!(
          "unknown objective function {other:?}"
        )))
      }
    };
    spec.validate()?;
    Ok(spec)
  }

  pub fn validate(&self) -> Result<()> {
    match *self {
      Self::MaxReturnForTargetRisk { target } if !(target.is_finite() && target > 0.0) => Err(
        AnalyticsError::invalid(format!("target risk must be positive, got {target}")),
      ),
      Self::MinVolatilityForTargetReturn { target } if !target.is_finite() => Err(
        AnalyticsError::invalid(format!("target return must be finite, got {target}")),
      ),
      Self::MinVar { confidence_level } | Self::MinCvar { confidence_level }
        if !(confidence_level > 0.0 && confidence_level < 1.0) =>
      {
        Err(AnalyticsError::invalid(format!(
          "confidence_level must be in (0, 1), got {confidence_level}"
        )))
      }
      _ => Ok(()),
    }
  }

  /// Whether the objective is evaluated on historical scenario returns.
  pub fn needs_scenarios(&self) -> bool {
    matches!(
      self,
      Self::MinDrawdown | Self::MinVar { .. } | Self::MinCvar { .. }
    )
  }
}

/// Runtime configuration for [`super::Optimizer`].
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerConfig {
  /// Nelder-Mead iteration budget.
  pub max_iterations: u64,
  /// Simplex cost standard deviation that counts as convergence.
  pub convergence_tolerance: f64,
  /// Slack allowed on every constraint of an accepted iterate.
  pub feasibility_tolerance: f64,
  /// Diagonal loading applied to an ill-conditioned covariance matrix.
  pub ridge: f64,
  /// Objective differences below this are ties, broken towards equal weights.
  pub plateau_tolerance: f64,
  /// Slope of the penalty on a breached risk or return target.
  pub target_risk_penalty: f64,
  /// Dykstra sweep cap per projection.
  pub projection_max_sweeps: usize,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      max_iterations: 1000,
      convergence_tolerance: 1e-10,
      feasibility_tolerance: 1e-9,
      ridge: 1e-8,
      plateau_tolerance: 1e-12,
      target_risk_penalty: 1e3,
      projection_max_sweeps: 10_000,
    }
  }
}

impl OptimizerConfig {
  pub fn validate(&self) -> Result<()> {
    let positive = [
      ("convergence_tolerance", self.convergence_tolerance),
      ("feasibility_tolerance", self.feasibility_tolerance),
      ("target_risk_penalty", self.target_risk_penalty),
    ];
    for (name, value) in positive {
      if !(value.is_finite() && value > 0.0) {
        return Err(AnalyticsError::invalid(format!(
          "{name} must be positive, got {value}"
        )));
      }
    }
    for (name, value) in [("ridge", self.ridge), ("plateau_tolerance", self.plateau_tolerance)] {
      if !(value.is_finite() && value >= 0.0) {
        return Err(AnalyticsError::invalid(format!(
          "{name} must be non-negative, got {value}"
        )));
      }
    }
    if self.projection_max_sweeps == 0 {
      return Err(AnalyticsError::invalid("projection_max_sweeps must be at least 1"));
    }
    Ok(())
  }
}

/// Output of an optimizer run.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationResult {
  /// Weights in instrument order.
  pub weights: Vec<f64>,
  /// Objective in its natural orientation (e.g. the Sharpe ratio itself for
  /// `MaxSharpe`, volatility for `MinVolatility`).
  pub objective_value: f64,
  pub iterations_used: u64,
  /// `false` when the iteration budget ran out first.
  pub converged: bool,
  /// `μ·w`.
  pub expected_return: f64,
  /// `sqrt(w'Σw)` on the unregularized matrix.
  pub volatility: f64,
  /// `(expected_return - r_f) / volatility`, `0.0` when volatility vanishes.
  pub sharpe: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_name_maps_known_keys() {
    assert_eq!(
      ObjectiveSpec::from_name("max_sharpe", None).unwrap(),
      ObjectiveSpec::MaxSharpe
    );
    assert_eq!(
      ObjectiveSpec::from_name("min_vol", None).unwrap(),
      ObjectiveSpec::MinVolatility
    );
    assert_eq!(
      ObjectiveSpec::from_name("MIN_VOLATILITY", None).unwrap(),
      ObjectiveSpec::MinVolatility
    );
    assert_eq!(
      ObjectiveSpec::from_name("max_return_for_target_risk", Some(0.15)).unwrap(),
      ObjectiveSpec::MaxReturnForTargetRisk { target: 0.15 }
    );
    assert!(ObjectiveSpec::from_name("min_cvar", None)
      .unwrap()
      .needs_scenarios());
    assert_eq!(
      ObjectiveSpec::from_name("min_var", None).unwrap(),
      ObjectiveSpec::MinVar {
        confidence_level: 0.95
      }
    );
    assert!(ObjectiveSpec::MinVar {
      confidence_level: 1.0
    }
    .validate()
    .is_err());
  }

  #[test]
  fn from_name_rejects_unknown_and_incomplete() {
    for (name, target) in [
      ("maximize_everything", None),
      ("max_return_for_target_risk", None),
      ("max_return_for_target_risk", Some(-0.1)),
    ] {
      assert!(matches!(
        ObjectiveSpec::from_name(name, target),
        Err(AnalyticsError::InvalidParameter(_))
      ));
    }
  }

  #[test]
  fn default_config_is_valid() {
    assert!(OptimizerConfig::default().validate().is_ok());
    let bad = OptimizerConfig {
      feasibility_tolerance: 0.0,
      ..Default::default()
    };
    assert!(bad.validate().is_err());
  }
}
