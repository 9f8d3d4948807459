use chrono::NaiveDateTime;
use impl_new_derive::ImplNew;

/// One bar of an instrument's price history.
#[derive(ImplNew, Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
  pub timestamp: NaiveDateTime,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  pub close: f64,
  /// Close adjusted for splits and dividends.
  pub adjusted_close: f64,
  pub volume: f64,
}

impl PricePoint {
  /// Bar whose every price field equals `price`.
  pub fn flat(timestamp: NaiveDateTime, price: f64) -> Self {
    Self::new(timestamp, price, price, price, price, price, 0.0)
  }

  pub fn price(&self, field: PriceField) -> f64 {
    match field {
      PriceField::Close => self.close,
      PriceField::AdjustedClose => self.adjusted_close,
    }
  }
}

/// Which price of a bar feeds the return computation.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum PriceField {
  Close,
  #[default]
  AdjustedClose,
}

/// A tradable instrument, joined to its series by `symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instrument {
  pub symbol: String,
  /// Category labels such as an asset class.
  pub categories: Vec<String>,
}

impl Instrument {
  pub fn new(symbol: impl Into<String>) -> Self {
    Self {
      symbol: symbol.into(),
      categories: Vec::new(),
    }
  }

  pub fn with_category(mut self, label: impl Into<String>) -> Self {
    self.categories.push(label.into());
    self
  }

  pub fn has_category(&self, label: &str) -> bool {
    self.categories.iter().any(|c| c == label)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn price_field_selects_column() {
    let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    let bar = PricePoint::new(ts, 10.0, 11.0, 9.5, 10.5, 10.2, 1_000.0);
    assert_eq!(bar.price(PriceField::Close), 10.5);
    assert_eq!(bar.price(PriceField::AdjustedClose), 10.2);
  }

  #[test]
  fn instrument_categories() {
    let btc = Instrument::new("BTC-USD").with_category("CRYPTO");
    assert!(btc.has_category("CRYPTO"));
    assert!(!btc.has_category("EQUITY"));
  }
}
