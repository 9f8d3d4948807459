use roots::find_root_brent;
use roots::SearchError;
use roots::SimpleConvergency;
use tracing::trace;

use super::SurfaceConfig;
use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::pricing::BsmPricer;
use crate::traits::PricerExt;

/// Volatility at which `pricer` reproduces `market_price`.
///
/// Brent's method on the pricing error over `[vol_lower, vol_upper]`, stopped
/// once the error or the bracket falls below `price_tolerance`. Prices outside
/// the no-arbitrage bounds, or not attainable by any volatility of the domain,
/// are `InvalidParameter`; running out of iterations is `NoConvergence`.
pub fn implied_volatility(
  pricer: &BsmPricer,
  market_price: f64,
  config: &SurfaceConfig,
) -> Result<f64> {
  config.validate()?;
  let inputs = [pricer.s, pricer.k, pricer.r, pricer.tau, market_price];
  if inputs.iter().any(|x| !x.is_finite()) || pricer.s <= 0.0 || pricer.k <= 0.0 {
    return Err(AnalyticsError::invalid(format!(
      "inputs must be finite with positive spot and strike: {pricer:?}, price {market_price}"
    )));
  }
  if pricer.tau <= 0.0 {
    return Err(AnalyticsError::invalid(format!(
      "time to expiry must be positive, got {}",
      pricer.tau
    )));
  }

  let (floor, ceiling) = pricer.price_bounds();
  if market_price < floor || market_price >= ceiling {
    return Err(AnalyticsError::invalid(format!(
      "price {market_price} outside no-arbitrage bounds [{floor}, {ceiling})"
    )));
  }

  let tol = config.price_tolerance;
  let (lo, hi) = (config.vol_lower, config.vol_upper);
  let f = |v: f64| pricer.with_volatility(v).calculate_price() - market_price;

  let (f_lo, f_hi) = (f(lo), f(hi));
  if f_lo.abs() < tol {
    return Ok(lo);
  }
  if f_hi.abs() < tol {
    return Ok(hi);
  }
  if f_lo > 0.0 || f_hi < 0.0 {
    return Err(AnalyticsError::invalid(format!(
      "price {market_price} needs a volatility outside [{lo}, {hi}]"
    )));
  }

  let mut convergency = SimpleConvergency {
    eps: tol,
    max_iter: config.max_iterations,
  };
  match find_root_brent(lo, hi, f, &mut convergency) {
    Ok(v) => {
      trace!(v, market_price, "implied volatility converged");
      Ok(v)
    }
    Err(SearchError::NoBracketing) => Err(AnalyticsError::invalid(format!(
      "price {market_price} is not bracketed by [{lo}, {hi}]"
    ))),
    Err(e) => Err(AnalyticsError::NoConvergence {
      message: format!("implied volatility for price {market_price}: {e:?}"),
      iterations: config.max_iterations,
    }),
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::quant::OptionType;

  #[test]
  fn recovers_volatility_across_moneyness() {
    let config = SurfaceConfig::default();
    for option_type in [OptionType::Call, OptionType::Put] {
      for &k in &[60.0, 80.0, 100.0, 120.0, 150.0] {
        for &sigma in &[0.05, 0.2, 0.8, 2.0] {
          let pricer = BsmPricer::new(100.0, sigma, k, 0.03, Some(0.01), 0.5, option_type);
          let price = pricer.calculate_price();
          // far wings carry too little vega to pin the volatility
          if pricer.vega() < 1e-3 {
            continue;
          }
          let iv = pricer.implied_volatility(price, &config).unwrap();
          assert_abs_diff_eq!(iv, sigma, epsilon = 1e-6);
        }
      }
    }
  }

  #[test]
  fn arbitrage_violating_prices_are_rejected() {
    let pricer = BsmPricer::new(100.0, 0.2, 90.0, 0.0, None, 1.0, OptionType::Call);
    let config = SurfaceConfig::default();
    for price in [5.0, 100.0, 150.0, -1.0, f64::NAN] {
      assert!(matches!(
        implied_volatility(&pricer, price, &config),
        Err(AnalyticsError::InvalidParameter(_))
      ));
    }
  }

  #[test]
  fn prices_beyond_the_volatility_domain_are_rejected() {
    let pricer = BsmPricer::new(100.0, 0.2, 100.0, 0.0, None, 1.0, OptionType::Call);
    let config = SurfaceConfig {
      vol_upper: 0.5,
      ..Default::default()
    };
    let rich = pricer.with_volatility(1.5).calculate_price();
    assert!(matches!(
      implied_volatility(&pricer, rich, &config),
      Err(AnalyticsError::InvalidParameter(_))
    ));
  }

  #[test]
  fn iteration_cap_is_reported() {
    let pricer = BsmPricer::new(100.0, 0.2, 130.0, 0.0, None, 1.0, OptionType::Call);
    let price = pricer.with_volatility(0.37).calculate_price();
    let config = SurfaceConfig {
      max_iterations: 1,
      price_tolerance: 1e-14,
      ..Default::default()
    };
    assert!(matches!(
      implied_volatility(&pricer, price, &config),
      Err(AnalyticsError::NoConvergence { iterations: 1, .. })
    ));
  }
}
