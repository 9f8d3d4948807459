//! # Series
//!
//! $$
//! r_t^{\text{simple}}=\frac{P_t}{P_{t-1}}-1,\qquad r_t^{\log}=\ln\frac{P_t}{P_{t-1}}
//! $$
//!
//! Price points, return series and timestamp alignment.

pub mod align;
pub mod price;
pub mod returns;

pub use align::align;
pub use align::align_pair;
pub use align::AlignedReturns;
pub use price::Instrument;
pub use price::PriceField;
pub use price::PricePoint;
pub use returns::ReturnKind;
pub use returns::ReturnPoint;
pub use returns::ReturnSeries;

#[cfg(test)]
pub(crate) mod fixtures {
  use chrono::Duration;
  use chrono::NaiveDate;
  use chrono::NaiveDateTime;

  use super::PriceField;
  use super::PricePoint;
  use super::ReturnKind;
  use super::ReturnPoint;
  use super::ReturnSeries;

  pub fn day(offset: i64) -> NaiveDateTime {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    start + Duration::days(offset)
  }

  pub fn bars(prices: &[f64]) -> Vec<PricePoint> {
    prices
      .iter()
      .enumerate()
      .map(|(i, &p)| PricePoint::flat(day(i as i64), p))
      .collect()
  }

  pub fn series_from_prices(symbol: &str, prices: &[f64]) -> ReturnSeries {
    ReturnSeries::from_prices(
      symbol,
      &bars(prices),
      ReturnKind::Simple,
      PriceField::AdjustedClose,
    )
    .unwrap()
  }

  /// Simple returns stamped on consecutive days starting at `start`.
  pub fn series_from_returns(symbol: &str, returns: &[f64], start: i64) -> ReturnSeries {
    let points = returns
      .iter()
      .enumerate()
      .map(|(i, &r)| ReturnPoint {
        timestamp: day(start + i as i64),
        value: r,
      })
      .collect();
    ReturnSeries::from_points(symbol, ReturnKind::Simple, points).unwrap()
  }
}
