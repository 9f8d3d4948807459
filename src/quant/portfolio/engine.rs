//! # Portfolio Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(A\bar{\mathbf r}, A\hat\Sigma, r_f, \mathcal C)
//! $$
//!
//! End-to-end pipeline from price histories to an optimized allocation and
//! its realized performance against a benchmark.

use tracing::debug;
use tracing::info_span;

use super::constraints::ConstraintSet;
use super::data::CovarianceEstimate;
use super::data::CovarianceEstimator;
use super::data::CovarianceMatrix;
use super::frontier::efficient_frontier;
use super::frontier::FrontierPoint;
use super::optimizers::OptimizationProblem;
use super::optimizers::Optimizer;
use super::types::ObjectiveSpec;
use super::types::OptimizationResult;
use super::types::OptimizerConfig;
use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::risk::PerformanceStats;
use crate::quant::risk::RiskConfig;
use crate::quant::series::align;
use crate::quant::series::AlignedReturns;
use crate::quant::series::Instrument;
use crate::quant::series::PriceField;
use crate::quant::series::PricePoint;
use crate::quant::series::ReturnKind;
use crate::quant::series::ReturnSeries;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  pub objective: ObjectiveSpec,
  pub return_kind: ReturnKind,
  pub price_field: PriceField,
  /// Annualization, risk-free rate and VaR confidence.
  pub risk: RiskConfig,
  pub optimizer: OptimizerConfig,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      objective: ObjectiveSpec::MaxSharpe,
      return_kind: ReturnKind::Simple,
      price_field: PriceField::AdjustedClose,
      risk: RiskConfig::default(),
      optimizer: OptimizerConfig::default(),
    }
  }
}

/// Output of [`PortfolioEngine::run`].
#[derive(Clone, Debug)]
pub struct PortfolioReport {
  pub symbols: Vec<String>,
  pub optimization: OptimizationResult,
  /// Per-period estimate on the common timestamps.
  pub covariance: CovarianceEstimate,
  /// Realized returns of the optimized weights.
  pub portfolio_returns: ReturnSeries,
  pub performance: PerformanceStats,
  /// Prices dropped per instrument while building returns.
  pub dropped_points: Vec<(String, usize)>,
}

/// Single entry point for the allocation workflow.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  fn returns(&self, symbol: &str, prices: &[PricePoint]) -> Result<ReturnSeries> {
    ReturnSeries::from_prices(
      symbol,
      prices,
      self.config.return_kind,
      self.config.price_field,
    )
  }

  /// Annualized optimization problem from aligned per-period returns.
  pub fn problem(
    &self,
    aligned: &AlignedReturns,
    constraints: &ConstraintSet,
  ) -> Result<(OptimizationProblem, CovarianceEstimate)> {
    let af = self.config.risk.annualization_factor;
    let estimate = CovarianceEstimator::estimate_aligned(aligned)?;
    let mu = estimate.mean_returns.iter().map(|m| m * af).collect();
    let problem = OptimizationProblem::new(
      mu,
      estimate.matrix.scaled(af),
      constraints.clone(),
      self.config.objective,
    )
    .with_risk_free_rate(self.config.risk.risk_free_rate)
    .with_scenarios(aligned.clone());
    Ok((problem, estimate))
  }

  /// Optimize supplied moments directly.
  pub fn optimize(
    &self,
    expected_returns: &[f64],
    covariance: &CovarianceMatrix,
    constraints: &ConstraintSet,
    scenarios: Option<&AlignedReturns>,
  ) -> Result<OptimizationResult> {
    let mut problem = OptimizationProblem::new(
      expected_returns.to_vec(),
      covariance.clone(),
      constraints.clone(),
      self.config.objective,
    )
    .with_risk_free_rate(self.config.risk.risk_free_rate);
    problem.scenarios = scenarios.cloned();
    Optimizer::new(self.config.optimizer.clone()).optimize(&problem)
  }

  /// Prices to returns, covariance, optimized weights and their performance
  /// against `benchmark`. Assets are weighted in the order given.
  pub fn run(
    &self,
    assets: &[(&Instrument, &[PricePoint])],
    benchmark: (&str, &[PricePoint]),
    constraints: &ConstraintSet,
  ) -> Result<PortfolioReport> {
    let _span = info_span!("portfolio_run", assets = assets.len()).entered();
    self.config.risk.validate()?;
    if assets.len() != constraints.n_assets() {
      return Err(AnalyticsError::invalid(format!(
        "{} assets for constraints over {}",
        assets.len(),
        constraints.n_assets()
      )));
    }

    let series = assets
      .iter()
      .map(|(instrument, prices)| self.returns(&instrument.symbol, prices))
      .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&ReturnSeries> = series.iter().collect();
    let aligned = align(&refs)?;

    let (problem, covariance) = self.problem(&aligned, constraints)?;
    let optimization = Optimizer::new(self.config.optimizer.clone()).optimize(&problem)?;

    let portfolio_returns = aligned.portfolio_series("PORTFOLIO", &optimization.weights)?;
    let bench = self.returns(benchmark.0, benchmark.1)?;
    let performance = PerformanceStats::compute(&portfolio_returns, &bench, &self.config.risk)?;

    debug!(
      periods = aligned.n_periods(),
      sharpe = performance.sharpe_ratio,
      converged = optimization.converged,
      "portfolio pipeline finished"
    );

    Ok(PortfolioReport {
      symbols: aligned.symbols.clone(),
      optimization,
      covariance,
      portfolio_returns,
      performance,
      dropped_points: series
        .iter()
        .map(|s| (s.symbol().to_string(), s.dropped_points()))
        .collect(),
    })
  }

  /// Efficient frontier of the aligned returns under `constraints`.
  pub fn frontier(
    &self,
    aligned: &AlignedReturns,
    constraints: &ConstraintSet,
    points: usize,
  ) -> Result<Vec<FrontierPoint>> {
    let (problem, _) = self.problem(aligned, constraints)?;
    efficient_frontier(
      &Optimizer::new(self.config.optimizer.clone()),
      &problem,
      points,
    )
  }
}
