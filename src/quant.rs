//! # Quant
//!
//! $$
//! r_t=\frac{P_t}{P_{t-1}}-1,\qquad \sigma_p^2=\mathbf w^\top\Sigma\mathbf w
//! $$
//!
//! Return series, risk statistics, portfolio optimization and option-implied
//! volatility.

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::AnalyticsError;
use crate::error::Result;

pub mod portfolio;
pub mod pricing;
pub mod risk;
pub mod series;
pub mod surface;

/// Trading days per year.
pub const TRADING_DAYS: f64 = 252.0;

/// Option type.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum OptionType {
  #[default]
  Call,
  Put,
}

impl Display for OptionType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OptionType::Call => write!(f, "Call"),
      OptionType::Put => write!(f, "Put"),
    }
  }
}

/// Sampling interval of a price series.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Interval {
  OneMinute,
  FiveMinutes,
  FifteenMinutes,
  ThirtyMinutes,
  OneHour,
  #[default]
  OneDay,
  OneWeek,
  OneMonth,
  ThreeMonths,
}

impl Interval {
  /// Number of periods per year, used to annualize per-period statistics.
  ///
  /// Intraday bars assume a 390 minute session.
  pub fn annualization_factor(&self) -> f64 {
    match self {
      Interval::OneMinute => TRADING_DAYS * 390.0,
      Interval::FiveMinutes => TRADING_DAYS * 78.0,
      Interval::FifteenMinutes => TRADING_DAYS * 26.0,
      Interval::ThirtyMinutes => TRADING_DAYS * 13.0,
      Interval::OneHour => TRADING_DAYS * 6.5,
      Interval::OneDay => TRADING_DAYS,
      Interval::OneWeek => 52.0,
      Interval::OneMonth => 12.0,
      Interval::ThreeMonths => 4.0,
    }
  }
}

impl Display for Interval {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Interval::OneMinute => "1m",
      Interval::FiveMinutes => "5m",
      Interval::FifteenMinutes => "15m",
      Interval::ThirtyMinutes => "30m",
      Interval::OneHour => "1h",
      Interval::OneDay => "1d",
      Interval::OneWeek => "1wk",
      Interval::OneMonth => "1mo",
      Interval::ThreeMonths => "3mo",
    };
    write!(f, "{s}")
  }
}

impl FromStr for Interval {
  type Err = AnalyticsError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "1m" => Ok(Interval::OneMinute),
      "5m" => Ok(Interval::FiveMinutes),
      "15m" => Ok(Interval::FifteenMinutes),
      "30m" => Ok(Interval::ThirtyMinutes),
      "1h" => Ok(Interval::OneHour),
      "1d" => Ok(Interval::OneDay),
      "1wk" => Ok(Interval::OneWeek),
      "1mo" => Ok(Interval::OneMonth),
      "3mo" => Ok(Interval::ThreeMonths),
      _ => Err(AnalyticsError::invalid(format!("unsupported interval: {s}"))),
    }
  }
}

/// Actual/365 year fraction between an evaluation date and an expiration date.
pub fn year_fraction(eval: NaiveDate, expiration: NaiveDate) -> Result<f64> {
  let days = expiration.signed_duration_since(eval).num_days();
  if days <= 0 {
    return Err(AnalyticsError::invalid(format!(
      "expiration {expiration} is not after evaluation date {eval}"
    )));
  }
  Ok(days as f64 / 365.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interval_round_trips_through_its_key() {
    for key in ["1m", "5m", "15m", "30m", "1h", "1d", "1wk", "1mo", "3mo"] {
      let interval: Interval = key.parse().unwrap();
      assert_eq!(interval.to_string(), key);
    }
    assert!(matches!(
      "2d".parse::<Interval>(),
      Err(AnalyticsError::InvalidParameter(_))
    ));
  }

  #[test]
  fn daily_interval_annualizes_with_trading_days() {
    assert_eq!(Interval::OneDay.annualization_factor(), 252.0);
    assert_eq!(Interval::OneMonth.annualization_factor(), 12.0);
  }

  #[test]
  fn year_fraction_rejects_past_expiry() {
    let eval = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let exp = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    assert!((year_fraction(eval, exp).unwrap() - 365.0 / 365.0).abs() < 1e-12);
    assert!(year_fraction(exp, eval).is_err());
  }
}
