use tracing::debug;

use super::active_returns;
use super::annualized_return_of;
use super::beta_alpha_of;
use super::conditional_value_at_risk_of;
use super::max_drawdown_of;
use super::ratio;
use super::sharpe_ratio_of;
use super::sortino_ratio_of;
use super::value_at_risk_of;
use super::RiskConfig;
use crate::error::Result;
use crate::quant::series::align_pair;
use crate::quant::series::ReturnSeries;
use crate::stats;

/// Performance of a series measured against a benchmark over their common
/// timestamps. Per-period figures are unscaled; `annualized_*`, `alpha`,
/// `active_*` and the ratios are annualized with the config factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceStats {
  pub observations: usize,
  pub mean_return: f64,
  pub volatility: f64,
  pub cumulative_return: f64,
  pub annualized_return: f64,
  pub annualized_volatility: f64,
  pub alpha: f64,
  pub beta: f64,
  pub sharpe_ratio: f64,
  pub sortino_ratio: f64,
  pub active_return: f64,
  pub active_risk: f64,
  pub information_ratio: f64,
  pub calmar_ratio: f64,
  pub max_drawdown: f64,
  pub value_at_risk: f64,
  pub conditional_value_at_risk: f64,
}

impl PerformanceStats {
  pub fn compute(
    series: &ReturnSeries,
    benchmark: &ReturnSeries,
    config: &RiskConfig,
  ) -> Result<Self> {
    config.validate()?;
    let af = config.annualization_factor;
    let (asset, bench) = align_pair(series, benchmark)?;
    let kind = series.kind();

    let fit = beta_alpha_of(&asset, &bench)?;
    let active = active_returns(&asset, &bench)?;

    let volatility = stats::sample_std_dev(&asset);
    let annualized_return = annualized_return_of(&asset, kind, af)?;
    let max_drawdown = max_drawdown_of(&asset, kind)?;
    let active_risk = stats::sample_std_dev(&active) * af.sqrt();

    let perf = Self {
      observations: asset.len(),
      mean_return: stats::mean(&asset),
      volatility,
      cumulative_return: asset.iter().map(|&r| kind.growth(r)).product::<f64>() - 1.0,
      annualized_return,
      annualized_volatility: volatility * af.sqrt(),
      alpha: fit.alpha * af,
      beta: fit.beta,
      sharpe_ratio: sharpe_ratio_of(&asset, config.risk_free_rate, af)?,
      sortino_ratio: sortino_ratio_of(&asset, config.risk_free_rate, af)?,
      active_return: stats::mean(&active) * af,
      active_risk,
      information_ratio: ratio(stats::mean(&active), stats::sample_std_dev(&active), af),
      calmar_ratio: ratio(annualized_return, max_drawdown, 1.0),
      max_drawdown,
      value_at_risk: value_at_risk_of(&asset, config.confidence_level)?,
      conditional_value_at_risk: conditional_value_at_risk_of(&asset, config.confidence_level)?,
    };

    debug!(
      symbol = series.symbol(),
      benchmark = benchmark.symbol(),
      observations = perf.observations,
      sharpe = perf.sharpe_ratio,
      "performance stats computed"
    );

    Ok(perf)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::error::AnalyticsError;
  use crate::quant::risk;
  use crate::quant::series::fixtures::series_from_returns;

  #[test]
  fn matches_standalone_statistics_on_aligned_window() {
    let bench = series_from_returns("SPY", &[0.01, -0.02, 0.015, 0.005, -0.01, 0.02], 0);
    // extra leading period not covered by the benchmark
    let asset = series_from_returns("A", &[0.5, 0.012, -0.025, 0.02, 0.004, -0.015, 0.03], -1);
    let trimmed = series_from_returns("A", &[0.012, -0.025, 0.02, 0.004, -0.015, 0.03], 0);

    let cfg = RiskConfig {
      risk_free_rate: 0.02,
      ..Default::default()
    };
    let perf = PerformanceStats::compute(&asset, &bench, &cfg).unwrap();

    assert_eq!(perf.observations, 6);
    assert_relative_eq!(
      perf.sharpe_ratio,
      risk::sharpe_ratio(&trimmed, 0.02, 252.0).unwrap(),
      epsilon = 1e-12
    );
    assert_relative_eq!(
      perf.max_drawdown,
      risk::max_drawdown(&trimmed).unwrap(),
      epsilon = 1e-12
    );
    assert_relative_eq!(
      perf.cumulative_return,
      trimmed.cumulative_return(),
      epsilon = 1e-12
    );
    let fit = risk::beta_alpha(&trimmed, &bench).unwrap();
    assert_relative_eq!(perf.beta, fit.beta, epsilon = 1e-12);
    assert_relative_eq!(perf.alpha, fit.alpha * 252.0, epsilon = 1e-12);
    assert!(perf.conditional_value_at_risk <= perf.value_at_risk);
  }

  #[test]
  fn invalid_config_is_rejected() {
    let s = series_from_returns("A", &[0.01, 0.02, 0.03], 0);
    let cfg = RiskConfig {
      annualization_factor: -1.0,
      ..Default::default()
    };
    assert!(matches!(
      PerformanceStats::compute(&s, &s, &cfg),
      Err(AnalyticsError::InvalidParameter(_))
    ));
  }
}
