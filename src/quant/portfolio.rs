//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Covariance estimation, weight constraints and constrained portfolio
//! optimization.

pub mod constraints;
pub mod data;
pub mod engine;
pub mod frontier;
pub(crate) mod objective;
pub(crate) mod projection;
pub mod optimizers;
pub mod types;

pub use constraints::BoxConstraint;
pub use constraints::CategoricalConstraint;
pub use constraints::ConstraintSet;
pub use constraints::Violation;
pub use data::AlignmentPolicy;
pub use data::CovarianceEstimate;
pub use data::CovarianceEstimator;
pub use data::CovarianceMatrix;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use engine::PortfolioReport;
pub use frontier::efficient_frontier;
pub use frontier::quadspace;
pub use frontier::FrontierPoint;
pub use optimizers::OptimizationProblem;
pub use optimizers::Optimizer;
pub use types::ObjectiveSpec;
pub use types::OptimizationResult;
pub use types::OptimizerConfig;
