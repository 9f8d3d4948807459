//! # Pricing
//!
//! $$
//! V_0=\mathbb E^{\mathbb Q}\!\left[e^{-rT}\,\Pi(S_T)\right]
//! $$
//!
pub mod bsm;

pub use bsm::BsmPricer;
