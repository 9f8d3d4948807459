use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use statrs::distribution::Continuous;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use crate::error::Result;
use crate::quant::surface::implied_volatility;
use crate::quant::surface::SurfaceConfig;
use crate::quant::year_fraction;
use crate::quant::OptionType;
use crate::traits::PricerExt;
use crate::traits::TimeExt;

/// Black-Scholes-Merton pricer with a continuous dividend yield.
#[derive(ImplNew, Debug, Clone, Copy, PartialEq)]
pub struct BsmPricer {
  /// Underlying price
  pub s: f64,
  /// Volatility
  pub v: f64,
  /// Strike price
  pub k: f64,
  /// Risk-free rate
  pub r: f64,
  /// Dividend yield
  pub q: Option<f64>,
  /// Time to maturity in years
  pub tau: f64,
  /// Option type
  pub option_type: OptionType,
}

impl BsmPricer {
  /// Pricer with maturity taken from an evaluation and an expiration date.
  pub fn from_dates(
    s: f64,
    v: f64,
    k: f64,
    r: f64,
    q: Option<f64>,
    eval: NaiveDate,
    expiration: NaiveDate,
    option_type: OptionType,
  ) -> Result<Self> {
    Ok(Self::new(s, v, k, r, q, year_fraction(eval, expiration)?, option_type))
  }

  /// Same contract at another volatility.
  pub fn with_volatility(&self, v: f64) -> Self {
    Self { v, ..*self }
  }

  fn q(&self) -> f64 {
    self.q.unwrap_or(0.0)
  }

  /// Cost of carry
  fn b(&self) -> f64 {
    self.r - self.q()
  }

  /// `None` when the volatility or maturity leaves no diffusion.
  fn d1_d2(&self) -> Option<(f64, f64)> {
    if !(self.v > 0.0 && self.tau > 0.0) {
      return None;
    }
    let sqrt_t = self.tau.sqrt();
    let d1 = ((self.s / self.k).ln() + (self.b() + 0.5 * self.v.powi(2)) * self.tau)
      / (self.v * sqrt_t);
    Some((d1, d1 - self.v * sqrt_t))
  }

  /// Discounted forward value of the underlying, `S e^{-qT}`.
  pub fn discounted_spot(&self) -> f64 {
    self.s * (-self.q() * self.tau.max(0.0)).exp()
  }

  /// Discounted strike, `K e^{-rT}`.
  pub fn discounted_strike(&self) -> f64 {
    self.k * (-self.r * self.tau.max(0.0)).exp()
  }

  /// No-arbitrage price bounds `(intrinsic, ceiling)` for the option type.
  pub fn price_bounds(&self) -> (f64, f64) {
    let (fs, fk) = (self.discounted_spot(), self.discounted_strike());
    match self.option_type {
      OptionType::Call => ((fs - fk).max(0.0), fs),
      OptionType::Put => ((fk - fs).max(0.0), fk),
    }
  }

  /// Calculate the delta
  pub fn delta(&self) -> f64 {
    let n = Normal::default();
    let exp_qt = (-self.q() * self.tau).exp();
    match (self.d1_d2(), self.option_type) {
      (Some((d1, _)), OptionType::Call) => exp_qt * n.cdf(d1),
      (Some((d1, _)), OptionType::Put) => exp_qt * (n.cdf(d1) - 1.0),
      (None, OptionType::Call) => {
        if self.discounted_spot() > self.discounted_strike() {
          exp_qt
        } else {
          0.0
        }
      }
      (None, OptionType::Put) => {
        if self.discounted_spot() < self.discounted_strike() {
          -exp_qt
        } else {
          0.0
        }
      }
    }
  }

  /// Calculate the gamma
  pub fn gamma(&self) -> f64 {
    let Some((d1, _)) = self.d1_d2() else {
      return 0.0;
    };
    let n = Normal::default();
    (-self.q() * self.tau).exp() * n.pdf(d1) / (self.s * self.v * self.tau.sqrt())
  }

  /// Calculate the vega
  pub fn vega(&self) -> f64 {
    let Some((d1, _)) = self.d1_d2() else {
      return 0.0;
    };
    let n = Normal::default();
    self.s * (-self.q() * self.tau).exp() * n.pdf(d1) * self.tau.sqrt()
  }

  /// Calculate the theta
  pub fn theta(&self) -> f64 {
    let Some((d1, d2)) = self.d1_d2() else {
      return 0.0;
    };
    let n = Normal::default();
    let exp_qt = (-self.q() * self.tau).exp();
    let exp_rt = (-self.r * self.tau).exp();
    let first_term = -self.s * exp_qt * n.pdf(d1) * self.v / (2.0 * self.tau.sqrt());

    match self.option_type {
      OptionType::Call => {
        first_term + self.q() * self.s * exp_qt * n.cdf(d1) - self.r * self.k * exp_rt * n.cdf(d2)
      }
      OptionType::Put => {
        first_term - self.q() * self.s * exp_qt * n.cdf(-d1) + self.r * self.k * exp_rt * n.cdf(-d2)
      }
    }
  }

  /// Calculate the rho
  pub fn rho(&self) -> f64 {
    let Some((_, d2)) = self.d1_d2() else {
      return 0.0;
    };
    let n = Normal::default();
    let exp_rt = (-self.r * self.tau).exp();
    match self.option_type {
      OptionType::Call => self.k * self.tau * exp_rt * n.cdf(d2),
      OptionType::Put => -self.k * self.tau * exp_rt * n.cdf(-d2),
    }
  }

  /// Calculate the vomma
  pub fn vomma(&self) -> f64 {
    match self.d1_d2() {
      Some((d1, d2)) => self.vega() * d1 * d2 / self.v,
      None => 0.0,
    }
  }
}

impl PricerExt for BsmPricer {
  fn calculate_call_put(&self) -> (f64, f64) {
    let (fs, fk) = (self.discounted_spot(), self.discounted_strike());
    match self.d1_d2() {
      Some((d1, d2)) => {
        let n = Normal::default();
        let call = fs * n.cdf(d1) - fk * n.cdf(d2);
        let put = fk * n.cdf(-d2) - fs * n.cdf(-d1);
        (call, put)
      }
      None => ((fs - fk).max(0.0), (fk - fs).max(0.0)),
    }
  }

  fn calculate_price(&self) -> f64 {
    let (call, put) = self.calculate_call_put();
    match self.option_type {
      OptionType::Call => call,
      OptionType::Put => put,
    }
  }

  fn derivatives(&self) -> Vec<f64> {
    vec![
      self.delta(),
      self.gamma(),
      self.theta(),
      self.vega(),
      self.rho(),
    ]
  }

  fn implied_volatility(&self, market_price: f64, config: &SurfaceConfig) -> Result<f64> {
    implied_volatility(self, market_price, config)
  }
}

impl TimeExt for BsmPricer {
  fn tau(&self) -> f64 {
    self.tau
  }
}
