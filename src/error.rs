//! # Errors
//!
//! Error kinds shared by every computation in the crate.

use thiserror::Error;

/// Failure of an analytics computation.
///
/// Errors scoped to a single item of a batch (one covariance pair, one option
/// contract) are reported next to the partial result instead of aborting it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
  /// Too few price or return points to compute the statistic.
  #[error("insufficient data: {0}")]
  InsufficientData(String),

  /// Too little timestamp overlap between series.
  #[error("insufficient overlap: {0}")]
  InsufficientOverlap(String),

  /// Scalar or structural input outside of its domain.
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  /// No weight vector satisfies all box and categorical constraints.
  #[error("infeasible constraints: {0}")]
  InfeasibleConstraints(String),

  /// A root-find or iteration did not converge within its cap.
  #[error("no convergence after {iterations} iterations: {message}")]
  NoConvergence { message: String, iterations: usize },
}

impl AnalyticsError {
  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidParameter(msg.into())
  }

  pub(crate) fn insufficient_data(msg: impl Into<String>) -> Self {
    Self::InsufficientData(msg.into())
  }

  pub(crate) fn insufficient_overlap(msg: impl Into<String>) -> Self {
    Self::InsufficientOverlap(msg.into())
  }

  pub(crate) fn infeasible(msg: impl Into<String>) -> Self {
    Self::InfeasibleConstraints(msg.into())
  }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_names_the_kind() {
    let err = AnalyticsError::NoConvergence {
      message: "bisection".into(),
      iterations: 100,
    };
    assert_eq!(
      err.to_string(),
      "no convergence after 100 iterations: bisection"
    );
    assert!(AnalyticsError::invalid("confidence_level")
      .to_string()
      .starts_with("invalid parameter"));
  }
}
