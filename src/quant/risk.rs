//! # Risk
//!
//! $$
//! \mathrm{SR}=\frac{\bar r-r_f/A}{s}\sqrt{A},\qquad
//! \mathrm{VaR}_c=r_{(\lfloor(1-c)(n-1)\rfloor)},\qquad
//! \mathrm{CVaR}_c=\mathbb E[r\mid r\le \mathrm{VaR}_c]
//! $$
//!
//! Risk and performance statistics of return series. `A` is the
//! annualization factor (periods per year) and `r_f` an annual risk-free rate.
//! Every statistic has a series form and a slice form (`*_of`) for returns
//! that are already aligned.

use linreg::linear_regression;

use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::series::align_pair;
use crate::quant::series::ReturnKind;
use crate::quant::series::ReturnSeries;
use crate::quant::Interval;
use crate::quant::TRADING_DAYS;
use crate::stats;

pub mod performance;

pub use performance::PerformanceStats;

/// Period volatility below which a ratio is reported as a sentinel.
const ZERO_VOLATILITY: f64 = 1e-14;

/// Scalar parameters shared by the risk statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
  /// Periods per year, see [`Interval::annualization_factor`].
  pub annualization_factor: f64,
  /// Annual risk-free rate, decimal.
  pub risk_free_rate: f64,
  /// VaR/CVaR confidence level in `(0, 1)`.
  pub confidence_level: f64,
}

impl Default for RiskConfig {
  fn default() -> Self {
    Self {
      annualization_factor: TRADING_DAYS,
      risk_free_rate: 0.0,
      confidence_level: 0.95,
    }
  }
}

impl RiskConfig {
  /// Defaults annualized for series sampled at `interval`.
  pub fn for_interval(interval: Interval) -> Self {
    Self {
      annualization_factor: interval.annualization_factor(),
      ..Self::default()
    }
  }

  pub fn validate(&self) -> Result<()> {
    check_annualization(self.annualization_factor)?;
    if !self.risk_free_rate.is_finite() {
      return Err(AnalyticsError::invalid("risk_free_rate must be finite"));
    }
    check_confidence(self.confidence_level)
  }
}

/// Slope and intercept of asset returns regressed on benchmark returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaAlpha {
  pub beta: f64,
  /// Per-period intercept.
  pub alpha: f64,
  /// Number of aligned observations used in the fit.
  pub observations: usize,
}

fn check_annualization(af: f64) -> Result<()> {
  if af.is_finite() && af > 0.0 {
    Ok(())
  } else {
    Err(AnalyticsError::invalid(format!(
      "annualization_factor must be positive and finite, got {af}"
    )))
  }
}

fn check_confidence(c: f64) -> Result<()> {
  if c > 0.0 && c < 1.0 {
    Ok(())
  } else {
    Err(AnalyticsError::invalid(format!(
      "confidence_level must be in (0, 1), got {c}"
    )))
  }
}

fn require(returns: &[f64], min: usize, what: &str) -> Result<()> {
  if returns.len() < min {
    return Err(AnalyticsError::insufficient_data(format!(
      "{what} needs at least {min} returns, got {}",
      returns.len()
    )));
  }
  Ok(())
}

/// Ratio of a mean excess to a dispersion, with the zero-dispersion sentinel.
fn ratio(excess: f64, dispersion: f64, af: f64) -> f64 {
  if dispersion < ZERO_VOLATILITY {
    if excess > 0.0 {
      f64::INFINITY
    } else if excess < 0.0 {
      f64::NEG_INFINITY
    } else {
      0.0
    }
  } else {
    excess / dispersion * af.sqrt()
  }
}

pub fn mean_return(series: &ReturnSeries) -> Result<f64> {
  let values = series.values();
  require(&values, 1, "mean return")?;
  Ok(stats::mean(&values))
}

/// Annualized sample standard deviation.
pub fn volatility(series: &ReturnSeries, annualization_factor: f64) -> Result<f64> {
  volatility_of(&series.values(), annualization_factor)
}

pub fn volatility_of(returns: &[f64], annualization_factor: f64) -> Result<f64> {
  check_annualization(annualization_factor)?;
  require(returns, 2, "volatility")?;
  Ok(stats::sample_std_dev(returns) * annualization_factor.sqrt())
}

/// Annualized Sharpe ratio.
///
/// A series with zero volatility yields `+inf`, `-inf` or `0.0` following the
/// sign of its mean excess return.
pub fn sharpe_ratio(
  series: &ReturnSeries,
  risk_free_rate: f64,
  annualization_factor: f64,
) -> Result<f64> {
  sharpe_ratio_of(&series.values(), risk_free_rate, annualization_factor)
}

pub fn sharpe_ratio_of(
  returns: &[f64],
  risk_free_rate: f64,
  annualization_factor: f64,
) -> Result<f64> {
  check_annualization(annualization_factor)?;
  require(returns, 2, "sharpe ratio")?;
  let excess = stats::mean(returns) - risk_free_rate / annualization_factor;
  Ok(ratio(excess, stats::sample_std_dev(returns), annualization_factor))
}

/// Per-period root mean square of returns below `threshold`.
pub fn downside_deviation(series: &ReturnSeries, threshold: f64) -> Result<f64> {
  downside_deviation_of(&series.values(), threshold)
}

pub fn downside_deviation_of(returns: &[f64], threshold: f64) -> Result<f64> {
  require(returns, 2, "downside deviation")?;
  let sq = returns
    .iter()
    .map(|r| (r - threshold).min(0.0).powi(2))
    .sum::<f64>();
  Ok((sq / returns.len() as f64).sqrt())
}

/// Annualized Sortino ratio, downside measured against the per-period
/// risk-free rate. Same sentinel policy as [`sharpe_ratio`].
pub fn sortino_ratio(
  series: &ReturnSeries,
  risk_free_rate: f64,
  annualization_factor: f64,
) -> Result<f64> {
  sortino_ratio_of(&series.values(), risk_free_rate, annualization_factor)
}

pub fn sortino_ratio_of(
  returns: &[f64],
  risk_free_rate: f64,
  annualization_factor: f64,
) -> Result<f64> {
  check_annualization(annualization_factor)?;
  let rf = risk_free_rate / annualization_factor;
  let dd = downside_deviation_of(returns, rf)?;
  let excess = stats::mean(returns) - rf;
  Ok(ratio(excess, dd, annualization_factor))
}

/// Drawdown after each period of the compounded wealth path, as positive
/// fractions of the running peak.
pub fn drawdown_series(series: &ReturnSeries) -> Vec<f64> {
  drawdown_series_of(&series.values(), series.kind())
}

pub fn drawdown_series_of(returns: &[f64], kind: ReturnKind) -> Vec<f64> {
  let mut wealth = 1.0_f64;
  let mut peak = 1.0_f64;
  returns
    .iter()
    .map(|&r| {
      wealth *= kind.growth(r);
      peak = peak.max(wealth);
      if peak > 0.0 {
        1.0 - wealth / peak
      } else {
        1.0
      }
    })
    .collect()
}

/// Largest peak-to-trough decline of the wealth path starting at 1.0.
pub fn max_drawdown(series: &ReturnSeries) -> Result<f64> {
  max_drawdown_of(&series.values(), series.kind())
}

pub fn max_drawdown_of(returns: &[f64], kind: ReturnKind) -> Result<f64> {
  require(returns, 1, "max drawdown")?;
  Ok(
    drawdown_series_of(returns, kind)
      .into_iter()
      .fold(0.0, f64::max),
  )
}

/// Historical VaR: the signed return at the `1 - confidence_level` quantile.
/// A loss is negative.
pub fn value_at_risk(series: &ReturnSeries, confidence_level: f64) -> Result<f64> {
  value_at_risk_of(&series.values(), confidence_level)
}

pub fn value_at_risk_of(returns: &[f64], confidence_level: f64) -> Result<f64> {
  check_confidence(confidence_level)?;
  require(returns, 1, "value at risk")?;
  let sorted = stats::sorted(returns);
  stats::lower_quantile(&sorted, 1.0 - confidence_level)
    .ok_or_else(|| AnalyticsError::insufficient_data("value at risk of an empty sample"))
}

/// Historical CVaR: mean of the returns at or below the VaR threshold.
pub fn conditional_value_at_risk(series: &ReturnSeries, confidence_level: f64) -> Result<f64> {
  conditional_value_at_risk_of(&series.values(), confidence_level)
}

pub fn conditional_value_at_risk_of(returns: &[f64], confidence_level: f64) -> Result<f64> {
  let var = value_at_risk_of(returns, confidence_level)?;
  let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= var).collect();
  Ok(stats::mean(&tail))
}

/// Regression of `series` on `benchmark` over their common timestamps.
pub fn beta_alpha(series: &ReturnSeries, benchmark: &ReturnSeries) -> Result<BetaAlpha> {
  let (asset, bench) = align_pair(series, benchmark)?;
  beta_alpha_of(&asset, &bench)
}

pub fn beta_alpha_of(asset: &[f64], benchmark: &[f64]) -> Result<BetaAlpha> {
  if asset.len() != benchmark.len() {
    return Err(AnalyticsError::invalid(format!(
      "asset has {} returns, benchmark {}",
      asset.len(),
      benchmark.len()
    )));
  }
  if asset.len() < 2 {
    return Err(AnalyticsError::insufficient_overlap(format!(
      "beta needs at least 2 aligned returns, got {}",
      asset.len()
    )));
  }

  let (beta, alpha): (f64, f64) = linear_regression(benchmark, asset)
    .map_err(|e| AnalyticsError::invalid(format!("benchmark regression failed: {e:?}")))?;

  Ok(BetaAlpha {
    beta,
    alpha,
    observations: asset.len(),
  })
}

pub fn cumulative_return(series: &ReturnSeries) -> f64 {
  series.cumulative_return()
}

/// Geometric annualized return.
pub fn annualized_return(series: &ReturnSeries, annualization_factor: f64) -> Result<f64> {
  annualized_return_of(&series.values(), series.kind(), annualization_factor)
}

pub fn annualized_return_of(
  returns: &[f64],
  kind: ReturnKind,
  annualization_factor: f64,
) -> Result<f64> {
  check_annualization(annualization_factor)?;
  require(returns, 1, "annualized return")?;
  let growth: f64 = returns.iter().map(|&r| kind.growth(r)).product();
  if growth <= 0.0 {
    return Ok(-1.0);
  }
  Ok(growth.powf(annualization_factor / returns.len() as f64) - 1.0)
}

/// Annualized return over max drawdown; a series without drawdown follows
/// the sign sentinel of [`sharpe_ratio`].
pub fn calmar_ratio(series: &ReturnSeries, annualization_factor: f64) -> Result<f64> {
  let ann = annualized_return(series, annualization_factor)?;
  let mdd = max_drawdown(series)?;
  Ok(ratio(ann, mdd, 1.0))
}

/// Annualized mean active return over tracking error against `benchmark`.
pub fn information_ratio(
  series: &ReturnSeries,
  benchmark: &ReturnSeries,
  annualization_factor: f64,
) -> Result<f64> {
  let (asset, bench) = align_pair(series, benchmark)?;
  information_ratio_of(&asset, &bench, annualization_factor)
}

pub fn information_ratio_of(
  asset: &[f64],
  benchmark: &[f64],
  annualization_factor: f64,
) -> Result<f64> {
  check_annualization(annualization_factor)?;
  let active = active_returns(asset, benchmark)?;
  Ok(ratio(
    stats::mean(&active),
    stats::sample_std_dev(&active),
    annualization_factor,
  ))
}

pub(crate) fn active_returns(asset: &[f64], benchmark: &[f64]) -> Result<Vec<f64>> {
  if asset.len() != benchmark.len() {
    return Err(AnalyticsError::invalid(format!(
      "asset has {} returns, benchmark {}",
      asset.len(),
      benchmark.len()
    )));
  }
  if asset.len() < 2 {
    return Err(AnalyticsError::insufficient_overlap(format!(
      "active returns need at least 2 aligned returns, got {}",
      asset.len()
    )));
  }
  Ok(asset.iter().zip(benchmark).map(|(a, b)| a - b).collect())
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::quant::series::fixtures::series_from_prices;
  use crate::quant::series::fixtures::series_from_returns;

  fn daily_sample(seed: u64, n: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0005, 0.01).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
  }

  #[test]
  fn config_follows_sampling_interval() {
    let weekly = RiskConfig::for_interval(Interval::OneWeek);
    assert_eq!(weekly.annualization_factor, 52.0);
    assert_eq!(weekly.confidence_level, 0.95);
    assert!(weekly.validate().is_ok());
    assert_eq!(RiskConfig::for_interval(Interval::OneDay), RiskConfig::default());
  }

  #[test]
  fn volatility_scales_with_root_annualization() {
    let s = series_from_returns("A", &[0.01, -0.01, 0.02, -0.02], 0);
    let daily = stats::sample_std_dev(&s.values());
    assert_relative_eq!(volatility(&s, 252.0).unwrap(), daily * 252f64.sqrt());
    assert_relative_eq!(volatility(&s, 1.0).unwrap(), daily);
    assert!(volatility(&s, 0.0).is_err());
  }

  #[test]
  fn sharpe_zero_volatility_sentinels() {
    let up = series_from_returns("UP", &[0.01; 5], 0);
    let down = series_from_returns("DN", &[-0.01; 5], 0);
    let flat = series_from_returns("FL", &[0.0; 5], 0);
    assert_eq!(sharpe_ratio(&up, 0.0, 252.0).unwrap(), f64::INFINITY);
    assert_eq!(sharpe_ratio(&down, 0.0, 252.0).unwrap(), f64::NEG_INFINITY);
    assert_eq!(sharpe_ratio(&flat, 0.0, 252.0).unwrap(), 0.0);
    // risk-free above the constant return flips the sign
    assert_eq!(sharpe_ratio(&up, 5.0, 252.0).unwrap(), f64::NEG_INFINITY);
    assert_eq!(sortino_ratio(&up, 0.0, 252.0).unwrap(), f64::INFINITY);
  }

  #[test]
  fn sharpe_matches_hand_computation() {
    let rets = [0.01, 0.02, -0.005, 0.015, 0.0];
    let s = series_from_returns("A", &rets, 0);
    let rf = 0.0252;
    let expected = (stats::mean(&rets) - rf / 252.0) / stats::sample_std_dev(&rets) * 252f64.sqrt();
    assert_relative_eq!(sharpe_ratio(&s, rf, 252.0).unwrap(), expected, epsilon = 1e-12);
  }

  #[test]
  fn max_drawdown_on_compounded_path() {
    // wealth 1.0 -> 1.2 -> 0.9 -> 1.08 -> 1.3
    let s = series_from_prices("A", &[100.0, 120.0, 90.0, 108.0, 130.0]);
    assert_relative_eq!(max_drawdown(&s).unwrap(), 0.25, epsilon = 1e-12);
    let dd = drawdown_series(&s);
    assert_eq!(dd.len(), 4);
    assert_abs_diff_eq!(dd[0], 0.0);
    assert_relative_eq!(dd[2], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(dd[3], 0.0);

    let rising = series_from_prices("B", &[1.0, 2.0, 3.0]);
    assert_eq!(max_drawdown(&rising).unwrap(), 0.0);
  }

  #[test]
  fn var_and_cvar_on_a_year_of_daily_returns() {
    let rets = daily_sample(7, 252);
    let s = series_from_returns("A", &rets, 0);

    let var = value_at_risk(&s, 0.95).unwrap();
    let sorted = stats::sorted(&rets);
    // floor(0.05 * 251) = 12
    assert_eq!(var, sorted[12]);
    assert!(var < 0.0);

    let below = rets.iter().filter(|&&r| r < var).count();
    assert!(below <= 13);

    let cvar = conditional_value_at_risk(&s, 0.95).unwrap();
    assert!(cvar <= var);
    assert!(cvar.abs() >= var.abs());
    assert_relative_eq!(cvar, stats::mean(&sorted[..13]), epsilon = 1e-15);
  }

  #[test]
  fn confidence_outside_unit_interval_is_rejected() {
    let s = series_from_returns("A", &[0.01, 0.02, 0.03], 0);
    for c in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
      assert!(matches!(
        value_at_risk(&s, c),
        Err(AnalyticsError::InvalidParameter(_))
      ));
      assert!(matches!(
        conditional_value_at_risk(&s, c),
        Err(AnalyticsError::InvalidParameter(_))
      ));
    }
  }

  #[test]
  fn beta_alpha_recovers_linear_relation() {
    let bench = daily_sample(11, 60);
    let asset: Vec<f64> = bench.iter().map(|b| 0.0002 + 1.5 * b).collect();
    let b = series_from_returns("BENCH", &bench, 0);
    let a = series_from_returns("A", &asset, 0);

    let fit = beta_alpha(&a, &b).unwrap();
    assert_relative_eq!(fit.beta, 1.5, epsilon = 1e-9);
    assert_relative_eq!(fit.alpha, 0.0002, epsilon = 1e-9);
    assert_eq!(fit.observations, 60);
  }

  #[test]
  fn beta_alpha_requires_overlap() {
    let a = series_from_returns("A", &[0.01, 0.02, 0.03], 0);
    let b = series_from_returns("B", &[0.01, 0.02, 0.03], 2);
    assert!(matches!(
      beta_alpha(&a, &b),
      Err(AnalyticsError::InsufficientOverlap(_))
    ));
  }

  #[test]
  fn annualized_and_calmar() {
    let s = series_from_returns("A", &[0.1, -0.05, 0.02], 0);
    let growth: f64 = 1.1 * 0.95 * 1.02;
    assert_relative_eq!(
      annualized_return(&s, 3.0).unwrap(),
      growth - 1.0,
      epsilon = 1e-12
    );
    let calmar = calmar_ratio(&s, 3.0).unwrap();
    assert_relative_eq!(calmar, (growth - 1.0) / 0.05, epsilon = 1e-12);
  }

  #[test]
  fn information_ratio_against_itself_is_zero() {
    let s = series_from_returns("A", &daily_sample(3, 30), 0);
    assert_eq!(information_ratio(&s, &s, 252.0).unwrap(), 0.0);
  }

  #[test]
  fn config_validation() {
    assert!(RiskConfig::default().validate().is_ok());
    let bad = RiskConfig {
      confidence_level: 1.0,
      ..Default::default()
    };
    assert!(bad.validate().is_err());
  }
}
