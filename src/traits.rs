//! # Traits
//!
//! $$
//! \text{Trait contracts: }\mathcal{A}:\text{inputs}\to\text{prices/volatilities}
//! $$
//!
use crate::error::Result;
use crate::quant::surface::SurfaceConfig;

/// Option pricer with greeks and implied volatility inversion.
pub trait PricerExt: TimeExt {
  /// Calculate the call and put price.
  fn calculate_call_put(&self) -> (f64, f64);

  /// Calculate the price of the configured option type.
  fn calculate_price(&self) -> f64;

  /// Derivatives (greeks).
  fn derivatives(&self) -> Vec<f64> {
    vec![]
  }

  /// Volatility that reproduces `market_price`.
  fn implied_volatility(&self, market_price: f64, config: &SurfaceConfig) -> Result<f64>;
}

pub trait TimeExt {
  /// Time to maturity in years.
  fn tau(&self) -> f64;

  /// Calculate tau in days.
  fn calculate_tau_in_days(&self) -> f64 {
    self.tau() * 365.0
  }
}
