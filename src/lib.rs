//! # Portfolio Analytics
//!
//! $$
//! \max_{\mathbf w}\ \frac{\mathbf w^\top\mu-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ l\le\mathbf w\le u
//! $$
//!
//! Return series and risk statistics, covariance estimation, constrained
//! portfolio optimization and implied volatility surfaces.

pub mod error;
pub mod quant;
pub mod stats;
pub mod traits;

pub use error::AnalyticsError;
pub use error::Result;

pub mod prelude {
  pub use crate::error::AnalyticsError;
  pub use crate::error::Result;
  pub use crate::quant::portfolio::*;
  pub use crate::quant::pricing::BsmPricer;
  pub use crate::quant::risk::PerformanceStats;
  pub use crate::quant::risk::RiskConfig;
  pub use crate::quant::series::*;
  pub use crate::quant::surface::OptionContract;
  pub use crate::quant::surface::SurfaceConfig;
  pub use crate::quant::surface::VolatilitySurface;
  pub use crate::quant::OptionType;
  pub use crate::traits::PricerExt;
}
