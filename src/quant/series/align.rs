use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use super::returns::ReturnKind;
use super::returns::ReturnSeries;
use crate::error::AnalyticsError;
use crate::error::Result;

/// Return series restricted to the timestamps they all share.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReturns {
  pub symbols: Vec<String>,
  pub timestamps: Vec<NaiveDateTime>,
  /// One row per asset, in `symbols` order.
  pub values: Vec<Vec<f64>>,
  pub kind: ReturnKind,
}

impl AlignedReturns {
  pub fn n_assets(&self) -> usize {
    self.symbols.len()
  }

  pub fn n_periods(&self) -> usize {
    self.timestamps.len()
  }

  /// Period returns of the asset at `index`.
  pub fn asset(&self, index: usize) -> Option<&[f64]> {
    self.values.get(index).map(|v| v.as_slice())
  }

  /// Per-period returns of a portfolio holding `weights`, combined according
  /// to the return kind. Fails when a period's log return is not finite.
  pub fn portfolio_returns(&self, weights: &[f64]) -> Result<Vec<f64>> {
    if weights.len() != self.n_assets() {
      return Err(AnalyticsError::invalid(format!(
        "{} weights for {} assets",
        weights.len(),
        self.n_assets()
      )));
    }

    let mut period = vec![0.0; self.n_assets()];
    let mut out = Vec::with_capacity(self.n_periods());
    for t in 0..self.n_periods() {
      for (slot, row) in period.iter_mut().zip(&self.values) {
        *slot = row[t];
      }
      let r = self.kind.combine(weights, &period);
      if !r.is_finite() {
        return Err(AnalyticsError::invalid(format!(
          "portfolio loses all wealth at {}",
          self.timestamps[t]
        )));
      }
      out.push(r);
    }
    Ok(out)
  }

  /// Portfolio returns wrapped as a series, e.g. for performance statistics.
  pub fn portfolio_series(&self, symbol: &str, weights: &[f64]) -> Result<ReturnSeries> {
    let returns = self.portfolio_returns(weights)?;
    let points = self
      .timestamps
      .iter()
      .zip(returns)
      .map(|(&timestamp, value)| super::ReturnPoint { timestamp, value })
      .collect();
    ReturnSeries::from_points(symbol, self.kind, points)
  }
}

/// Inner join of every series on timestamp.
///
/// Fails with `InsufficientOverlap` when fewer than two timestamps are common
/// to all series, and with `InvalidParameter` when the series mix return kinds.
pub fn align(series: &[&ReturnSeries]) -> Result<AlignedReturns> {
  let Some(first) = series.first() else {
    return Err(AnalyticsError::insufficient_data("no series to align"));
  };

  if let Some(other) = series.iter().find(|s| s.kind() != first.kind()) {
    return Err(AnalyticsError::invalid(format!(
      "{} and {} use different return kinds",
      first.symbol(),
      other.symbol()
    )));
  }

  let mut common: BTreeSet<NaiveDateTime> = first.timestamps().into_iter().collect();
  for s in &series[1..] {
    let ts: BTreeSet<NaiveDateTime> = s.timestamps().into_iter().collect();
    common = common.intersection(&ts).copied().collect();
  }

  if common.len() < 2 {
    let symbols: Vec<&str> = series.iter().map(|s| s.symbol()).collect();
    return Err(AnalyticsError::insufficient_overlap(format!(
      "{} common timestamps across [{}], at least 2 required",
      common.len(),
      symbols.join(", ")
    )));
  }

  let values = series
    .iter()
    .map(|s| {
      s.points()
        .iter()
        .filter(|p| common.contains(&p.timestamp))
        .map(|p| p.value)
        .collect()
    })
    .collect();

  Ok(AlignedReturns {
    symbols: series.iter().map(|s| s.symbol().to_string()).collect(),
    timestamps: common.into_iter().collect(),
    values,
    kind: first.kind(),
  })
}

/// Date-aligned values of two series, `(a, b)`.
pub fn align_pair(a: &ReturnSeries, b: &ReturnSeries) -> Result<(Vec<f64>, Vec<f64>)> {
  let mut aligned = align(&[a, b])?;
  let second = aligned.values.pop().unwrap_or_default();
  let first = aligned.values.pop().unwrap_or_default();
  Ok((first, second))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::quant::series::fixtures::bars;
  use crate::quant::series::fixtures::day;
  use crate::quant::series::fixtures::series_from_returns;
  use crate::quant::series::PriceField;

  #[test]
  fn keeps_only_common_timestamps() {
    let a = series_from_returns("A", &[0.01, 0.02, 0.03, 0.04], 0);
    let b = series_from_returns("B", &[0.10, 0.20, 0.30], 1);
    let c = series_from_returns("C", &[-0.01, -0.02, -0.03, -0.04, -0.05], 0);

    let aligned = align(&[&a, &b, &c]).unwrap();
    assert_eq!(aligned.timestamps, vec![day(1), day(2), day(3)]);
    assert_eq!(aligned.values[0], vec![0.02, 0.03, 0.04]);
    assert_eq!(aligned.values[1], vec![0.10, 0.20, 0.30]);
    assert_eq!(aligned.values[2], vec![-0.02, -0.03, -0.04]);
    assert_eq!(aligned.n_assets(), 3);
    assert_eq!(aligned.n_periods(), 3);
  }

  #[test]
  fn thin_overlap_is_rejected() {
    let a = series_from_returns("A", &[0.01, 0.02, 0.03], 0);
    let b = series_from_returns("B", &[0.01, 0.02, 0.03], 2);
    assert!(matches!(
      align(&[&a, &b]),
      Err(AnalyticsError::InsufficientOverlap(_))
    ));
  }

  #[test]
  fn portfolio_returns_weights_each_period() {
    let a = series_from_returns("A", &[0.01, 0.02], 0);
    let b = series_from_returns("B", &[0.03, -0.02], 0);
    let aligned = align(&[&a, &b]).unwrap();

    let rets = aligned.portfolio_returns(&[0.25, 0.75]).unwrap();
    assert_abs_diff_eq!(rets[0], 0.025, epsilon = 1e-15);
    assert_abs_diff_eq!(rets[1], -0.01, epsilon = 1e-15);

    assert!(aligned.portfolio_returns(&[1.0]).is_err());

    let series = aligned.portfolio_series("PORT", &[0.25, 0.75]).unwrap();
    assert_eq!(series.timestamps(), aligned.timestamps);
  }

  fn log_series(symbol: &str, prices: &[f64]) -> ReturnSeries {
    ReturnSeries::from_prices(symbol, &bars(prices), ReturnKind::Log, PriceField::AdjustedClose)
      .unwrap()
  }

  #[test]
  fn log_portfolio_compounds_in_simple_space() {
    let a = log_series("A", &[100.0, 200.0, 100.0]);
    let b = log_series("B", &[100.0, 50.0, 100.0]);
    let aligned = align(&[&a, &b]).unwrap();

    let port = aligned.portfolio_series("PORT", &[0.5, 0.5]).unwrap();
    assert_eq!(port.kind(), ReturnKind::Log);
    assert_abs_diff_eq!(port.kind().growth(port.values()[0]), 1.25, epsilon = 1e-12);
    assert_abs_diff_eq!(port.kind().growth(port.values()[1]), 1.25, epsilon = 1e-12);
  }

  #[test]
  fn log_portfolio_rejects_total_loss() {
    let a = log_series("A", &[100.0, 110.0, 121.0]);
    let b = log_series("B", &[100.0, 90.0, 81.0]);
    let aligned = align(&[&a, &b]).unwrap();
    assert!(matches!(
      aligned.portfolio_returns(&[-10.0, 0.0]),
      Err(AnalyticsError::InvalidParameter(_))
    ));
  }
}
