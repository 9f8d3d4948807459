use chrono::NaiveDateTime;
use tracing::warn;

use super::price::PriceField;
use super::price::PricePoint;
use crate::error::AnalyticsError;
use crate::error::Result;

/// Simple or logarithmic period returns.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReturnKind {
  #[default]
  Simple,
  Log,
}

impl ReturnKind {
  /// Period return between two positive prices.
  pub fn compute(&self, previous: f64, current: f64) -> f64 {
    match self {
      ReturnKind::Simple => current / previous - 1.0,
      ReturnKind::Log => (current / previous).ln(),
    }
  }

  /// Wealth multiplier of one period return.
  pub fn growth(&self, r: f64) -> f64 {
    match self {
      ReturnKind::Simple => 1.0 + r,
      ReturnKind::Log => r.exp(),
    }
  }

  /// Return of a portfolio holding `weights` over one period in which the
  /// assets return `returns`. Weights not summing to one leave the remainder
  /// in cash.
  ///
  /// Log returns are combined in simple space. A wealth loss of 100% or more
  /// yields a non-finite log return.
  pub fn combine(&self, weights: &[f64], returns: &[f64]) -> f64 {
    let pairs = weights.iter().zip(returns);
    match self {
      ReturnKind::Simple => pairs.map(|(w, r)| w * r).sum(),
      ReturnKind::Log => pairs
        .map(|(w, r)| w * r.exp_m1())
        .sum::<f64>()
        .ln_1p(),
    }
  }
}

/// One period return, stamped with the later of its two prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
  pub timestamp: NaiveDateTime,
  pub value: f64,
}

/// Ordered returns of one instrument at one interval.
///
/// Built from `n` valid prices it holds `n - 1` returns; the first price only
/// anchors the series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
  symbol: String,
  kind: ReturnKind,
  points: Vec<ReturnPoint>,
  dropped_points: usize,
}

impl ReturnSeries {
  /// Convert a price history into period returns.
  ///
  /// Prices that are non-finite or not strictly positive are dropped and
  /// counted in [`ReturnSeries::dropped_points`]; the return then spans the gap.
  pub fn from_prices(
    symbol: impl Into<String>,
    prices: &[PricePoint],
    kind: ReturnKind,
    field: PriceField,
  ) -> Result<Self> {
    let symbol = symbol.into();
    if prices.len() < 2 {
      return Err(AnalyticsError::insufficient_data(format!(
        "{symbol}: {} price points, at least 2 required",
        prices.len()
      )));
    }

    if prices.windows(2).any(|w| w[1].timestamp <= w[0].timestamp) {
      return Err(AnalyticsError::invalid(format!(
        "{symbol}: price timestamps must be strictly increasing"
      )));
    }

    let valid: Vec<(NaiveDateTime, f64)> = prices
      .iter()
      .map(|p| (p.timestamp, p.price(field)))
      .filter(|(_, price)| price.is_finite() && *price > 0.0)
      .collect();

    let dropped_points = prices.len() - valid.len();
    if dropped_points > 0 {
      warn!(
        symbol = %symbol,
        dropped = dropped_points,
        "dropped non-finite or non-positive prices"
      );
    }

    if valid.len() < 2 {
      return Err(AnalyticsError::insufficient_data(format!(
        "{symbol}: {} valid price points after dropping {dropped_points}, at least 2 required",
        valid.len()
      )));
    }

    let points = valid
      .windows(2)
      .map(|w| ReturnPoint {
        timestamp: w[1].0,
        value: kind.compute(w[0].1, w[1].1),
      })
      .collect();

    Ok(Self {
      symbol,
      kind,
      points,
      dropped_points,
    })
  }

  /// Wrap already computed returns, e.g. a benchmark or a portfolio series.
  pub fn from_points(
    symbol: impl Into<String>,
    kind: ReturnKind,
    points: Vec<ReturnPoint>,
  ) -> Result<Self> {
    let symbol = symbol.into();
    if points.is_empty() {
      return Err(AnalyticsError::insufficient_data(format!(
        "{symbol}: empty return series"
      )));
    }
    if points.windows(2).any(|w| w[1].timestamp <= w[0].timestamp) {
      return Err(AnalyticsError::invalid(format!(
        "{symbol}: return timestamps must be strictly increasing"
      )));
    }
    if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
      return Err(AnalyticsError::invalid(format!(
        "{symbol}: non-finite return at {}",
        bad.timestamp
      )));
    }

    Ok(Self {
      symbol,
      kind,
      points,
      dropped_points: 0,
    })
  }

  pub fn symbol(&self) -> &str {
    &self.symbol
  }

  pub fn kind(&self) -> ReturnKind {
    self.kind
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn points(&self) -> &[ReturnPoint] {
    &self.points
  }

  /// Number of price points discarded while building the series.
  pub fn dropped_points(&self) -> usize {
    self.dropped_points
  }

  pub fn values(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.value).collect()
  }

  pub fn timestamps(&self) -> Vec<NaiveDateTime> {
    self.points.iter().map(|p| p.timestamp).collect()
  }

  /// Compounded return over the whole series.
  pub fn cumulative_return(&self) -> f64 {
    self
      .points
      .iter()
      .map(|p| self.kind.growth(p.value))
      .product::<f64>()
      - 1.0
  }

  /// Price path implied by the returns, starting at `initial`.
  ///
  /// The output has `len() + 1` entries and reproduces the valid input prices.
  pub fn reconstruct_prices(&self, initial: f64) -> Vec<f64> {
    let mut prices = Vec::with_capacity(self.points.len() + 1);
    let mut price = initial;
    prices.push(price);
    for p in &self.points {
      price *= self.kind.growth(p.value);
      prices.push(price);
    }
    prices
  }
}
