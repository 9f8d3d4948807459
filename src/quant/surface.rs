//! # Volatility Surface
//!
//! $$
//! C_{\mathrm{BSM}}(S,K,T,r,\hat\sigma(K,T)) = C_{\mathrm{mkt}}(K,T)
//! $$
//!
//! Implied volatilities inverted per contract and interpolated over strike and
//! expiry.

use std::collections::BTreeMap;

use impl_new_derive::ImplNew;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::pricing::BsmPricer;
use crate::quant::OptionType;

mod grid;
pub mod implied;

pub use implied::implied_volatility;

use grid::ExpirySlice;

/// Root-finding domain and stopping rules of the implied volatility search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceConfig {
  pub vol_lower: f64,
  pub vol_upper: f64,
  pub max_iterations: usize,
  /// Absolute pricing error accepted as a root, also the bracket width at
  /// which the search stops.
  pub price_tolerance: f64,
}

impl Default for SurfaceConfig {
  fn default() -> Self {
    Self {
      vol_lower: 1e-4,
      vol_upper: 5.0,
      max_iterations: 100,
      price_tolerance: 1e-10,
    }
  }
}

impl SurfaceConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.vol_lower > 0.0 && self.vol_lower < self.vol_upper && self.vol_upper.is_finite()) {
      return Err(AnalyticsError::invalid(format!(
        "volatility domain must satisfy 0 < lower < upper, got [{}, {}]",
        self.vol_lower, self.vol_upper
      )));
    }
    if self.max_iterations == 0 {
      return Err(AnalyticsError::invalid("max_iterations must be at least 1"));
    }
    if !(self.price_tolerance > 0.0 && self.price_tolerance.is_finite()) {
      return Err(AnalyticsError::invalid(format!(
        "price_tolerance must be positive, got {}",
        self.price_tolerance
      )));
    }
    Ok(())
  }
}

/// One quoted option. `expiry` is in years.
#[derive(ImplNew, Debug, Clone, Copy, PartialEq)]
pub struct OptionContract {
  pub strike: f64,
  pub expiry: f64,
  pub market_price: f64,
  pub option_type: OptionType,
  pub underlying_price: f64,
  pub risk_free_rate: f64,
}

impl OptionContract {
  fn pricer(&self) -> BsmPricer {
    BsmPricer::new(
      self.underlying_price,
      0.0,
      self.strike,
      self.risk_free_rate,
      None,
      self.expiry,
      self.option_type,
    )
  }

  pub fn implied_volatility(&self, config: &SurfaceConfig) -> Result<f64> {
    if !(self.strike.is_finite() && self.expiry.is_finite()) {
      return Err(AnalyticsError::invalid(format!(
        "non-finite strike or expiry: {self:?}"
      )));
    }
    implied_volatility(&self.pricer(), self.market_price, config)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilitySurfacePoint {
  pub strike: f64,
  pub expiry: f64,
  pub implied_vol: f64,
}

/// A contract left out of the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceFailure {
  /// Position in the input chain.
  pub index: usize,
  pub contract: OptionContract,
  pub error: AnalyticsError,
}

/// Sparse implied volatility grid over `(strike, expiry)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilitySurface {
  points: Vec<VolatilitySurfacePoint>,
  slices: Vec<ExpirySlice>,
  failures: Vec<SurfaceFailure>,
}

type GridKey = (OrderedFloat<f64>, OrderedFloat<f64>);

impl VolatilitySurface {
  /// Invert every contract in parallel and assemble the grid.
  ///
  /// Contracts that fail to invert are kept in [`VolatilitySurface::failures`]
  /// and do not abort the build. Quotes sharing `(strike, expiry)` are
  /// averaged. Fails only when no contract inverts.
  pub fn build(contracts: &[OptionContract], config: &SurfaceConfig) -> Result<Self> {
    config.validate()?;
    if contracts.is_empty() {
      return Err(AnalyticsError::insufficient_data("empty option chain"));
    }

    let inverted: Vec<Result<f64>> = contracts
      .par_iter()
      .map(|c| c.implied_volatility(config))
      .collect();

    let mut grid: BTreeMap<GridKey, (f64, usize)> = BTreeMap::new();
    let mut failures = Vec::new();
    for (index, (contract, result)) in contracts.iter().zip(inverted).enumerate() {
      match result {
        Ok(vol) => {
          let key = (OrderedFloat(contract.expiry), OrderedFloat(contract.strike));
          let entry = grid.entry(key).or_insert((0.0, 0));
          entry.0 += vol;
          entry.1 += 1;
        }
        Err(error) => failures.push(SurfaceFailure {
          index,
          contract: *contract,
          error,
        }),
      }
    }

    if !failures.is_empty() {
      warn!(
        failed = failures.len(),
        total = contracts.len(),
        "option contracts excluded from the volatility surface"
      );
    }
    if grid.is_empty() {
      return Err(AnalyticsError::insufficient_data(format!(
        "none of {} contracts could be inverted",
        contracts.len()
      )));
    }

    let points: Vec<VolatilitySurfacePoint> = grid
      .into_iter()
      .map(|((expiry, strike), (sum, count))| VolatilitySurfacePoint {
        strike: strike.into_inner(),
        expiry: expiry.into_inner(),
        implied_vol: sum / count as f64,
      })
      .collect();
    let slices = grid::slices(&points);

    debug!(
      points = points.len(),
      expiries = slices.len(),
      failures = failures.len(),
      "volatility surface built"
    );

    Ok(Self {
      points,
      slices,
      failures,
    })
  }

  /// Interpolated implied volatility; flat beyond the quoted range.
  pub fn implied_vol(&self, strike: f64, expiry: f64) -> f64 {
    grid::interpolate(&self.slices, strike, expiry)
  }

  /// Volatilities across `strikes` at one expiry.
  pub fn smile(&self, expiry: f64, strikes: &[f64]) -> Vec<f64> {
    strikes.iter().map(|&k| self.implied_vol(k, expiry)).collect()
  }

  /// Volatilities across `expiries` at one strike.
  pub fn term_structure(&self, strike: f64, expiries: &[f64]) -> Vec<f64> {
    expiries.iter().map(|&t| self.implied_vol(strike, t)).collect()
  }

  /// Grid points ordered by expiry, then strike.
  pub fn points(&self) -> &[VolatilitySurfacePoint] {
    &self.points
  }

  pub fn failures(&self) -> &[SurfaceFailure] {
    &self.failures
  }

  /// Distinct quoted strikes, ascending.
  pub fn strikes(&self) -> Vec<f64> {
    let mut strikes: Vec<f64> = self.points.iter().map(|p| p.strike).collect();
    strikes.sort_by(f64::total_cmp);
    strikes.dedup();
    strikes
  }

  /// Distinct quoted expiries, ascending.
  pub fn expiries(&self) -> Vec<f64> {
    self.slices.iter().map(|s| s.expiry).collect()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::traits::PricerExt;

  fn flat_chain(sigma: f64) -> Vec<OptionContract> {
    let mut chain = Vec::new();
    for &expiry in &[0.25, 0.5, 1.0, 2.0] {
      for &strike in &[80.0, 90.0, 100.0, 110.0, 120.0] {
        for option_type in [OptionType::Call, OptionType::Put] {
          let price = BsmPricer::new(100.0, sigma, strike, 0.02, None, expiry, option_type)
            .calculate_price();
          chain.push(OptionContract::new(strike, expiry, price, option_type, 100.0, 0.02));
        }
      }
    }
    chain
  }

  #[test]
  fn flat_chain_round_trips() {
    let surface = VolatilitySurface::build(&flat_chain(0.25), &SurfaceConfig::default()).unwrap();
    assert!(surface.failures().is_empty());
    assert_eq!(surface.points().len(), 20);
    for p in surface.points() {
      assert_abs_diff_eq!(p.implied_vol, 0.25, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(surface.implied_vol(95.0, 0.75), 0.25, epsilon = 1e-6);
    // flat extrapolation outside the hull
    assert_abs_diff_eq!(surface.implied_vol(10.0, 0.01), 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(surface.implied_vol(500.0, 30.0), 0.25, epsilon = 1e-6);
    assert_eq!(surface.strikes(), vec![80.0, 90.0, 100.0, 110.0, 120.0]);
    assert_eq!(surface.expiries(), vec![0.25, 0.5, 1.0, 2.0]);
  }

  #[test]
  fn interpolates_between_slices_and_strikes() {
    let quote = |strike: f64, expiry: f64, sigma: f64| {
      let price = BsmPricer::new(100.0, sigma, strike, 0.0, None, expiry, OptionType::Call)
        .calculate_price();
      OptionContract::new(strike, expiry, price, OptionType::Call, 100.0, 0.0)
    };
    let chain = vec![
      quote(90.0, 1.0, 0.30),
      quote(110.0, 1.0, 0.20),
      quote(90.0, 2.0, 0.40),
      quote(110.0, 2.0, 0.30),
    ];
    let surface = VolatilitySurface::build(&chain, &SurfaceConfig::default()).unwrap();

    assert_abs_diff_eq!(surface.implied_vol(100.0, 1.0), 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(surface.implied_vol(100.0, 1.5), 0.30, epsilon = 1e-6);
    assert_abs_diff_eq!(surface.implied_vol(90.0, 1.25), 0.325, epsilon = 1e-6);

    let smile = surface.smile(2.0, &[80.0, 100.0, 130.0]);
    assert_abs_diff_eq!(smile[0], 0.40, epsilon = 1e-6);
    assert_abs_diff_eq!(smile[1], 0.35, epsilon = 1e-6);
    assert_abs_diff_eq!(smile[2], 0.30, epsilon = 1e-6);

    let term = surface.term_structure(110.0, &[0.5, 1.5, 3.0]);
    assert_abs_diff_eq!(term[0], 0.20, epsilon = 1e-6);
    assert_abs_diff_eq!(term[1], 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(term[2], 0.30, epsilon = 1e-6);
  }

  #[test]
  #[traced_test]
  fn bad_contracts_are_isolated() {
    let mut chain = flat_chain(0.3);
    // below intrinsic
    chain[0].market_price = 0.0;
    chain.push(OptionContract::new(100.0, -1.0, 5.0, OptionType::Call, 100.0, 0.0));

    let surface = VolatilitySurface::build(&chain, &SurfaceConfig::default()).unwrap();
    let failed: Vec<usize> = surface.failures().iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![0, chain.len() - 1]);
    assert!(surface
      .failures()
      .iter()
      .all(|f| matches!(f.error, AnalyticsError::InvalidParameter(_))));
    assert_eq!(surface.points().len(), 20);
    assert!(logs_contain("option contracts excluded from the volatility surface"));
  }

  #[test]
  fn unconverged_contract_is_isolated() {
    // one root-finding step: only quotes at the domain edge resolve
    let config = SurfaceConfig {
      vol_upper: 0.3,
      max_iterations: 1,
      price_tolerance: 1e-14,
      ..Default::default()
    };
    let quote = |strike: f64, sigma: f64| {
      let price = BsmPricer::new(100.0, sigma, strike, 0.01, None, 1.0, OptionType::Call)
        .calculate_price();
      OptionContract::new(strike, 1.0, price, OptionType::Call, 100.0, 0.01)
    };
    let chain = vec![quote(90.0, 0.3), quote(100.0, 0.17), quote(110.0, 0.3)];

    let surface = VolatilitySurface::build(&chain, &config).unwrap();
    assert_eq!(surface.points().len(), 2);
    assert_eq!(surface.strikes(), vec![90.0, 110.0]);
    assert_eq!(surface.failures().len(), 1);
    assert_eq!(surface.failures()[0].index, 1);
    assert!(matches!(
      surface.failures()[0].error,
      AnalyticsError::NoConvergence { iterations: 1, .. }
    ));
  }

  #[test]
  fn duplicate_quotes_are_averaged() {
    let mk = |sigma: f64| {
      let price = BsmPricer::new(100.0, sigma, 100.0, 0.0, None, 1.0, OptionType::Call)
        .calculate_price();
      OptionContract::new(100.0, 1.0, price, OptionType::Call, 100.0, 0.0)
    };
    let surface =
      VolatilitySurface::build(&[mk(0.2), mk(0.3)], &SurfaceConfig::default()).unwrap();
    assert_eq!(surface.points().len(), 1);
    assert_abs_diff_eq!(surface.points()[0].implied_vol, 0.25, epsilon = 1e-6);
  }

  #[test]
  fn all_failures_is_an_error() {
    let chain = vec![OptionContract::new(100.0, 1.0, 1000.0, OptionType::Call, 100.0, 0.0)];
    assert!(matches!(
      VolatilitySurface::build(&chain, &SurfaceConfig::default()),
      Err(AnalyticsError::InsufficientData(_))
    ));
    assert!(VolatilitySurface::build(&[], &SurfaceConfig::default()).is_err());
  }
}
