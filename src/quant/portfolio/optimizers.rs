//! # Portfolio Optimizer
//!
//! $$
//! \min_{\mathbf{x}\in\mathbb R^n}\ \mathcal{L}\big(P_{\mathcal C}(\mathbf x)\big),\qquad
//! \mathcal C=\{\mathbf w:\ \textstyle\sum_i w_i=1,\ l\le\mathbf w\le u,\ L_k\le\sum_{i\in G_k}w_i\le U_k\}
//! $$
//!
//! Nelder-Mead search over unconstrained points mapped onto the feasible
//! polytope by Euclidean projection, so that every evaluated weight vector
//! satisfies the constraints. The best feasible vector seen is kept, with
//! ties broken towards equal weights.

use std::cell::RefCell;
use std::rc::Rc;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::neldermead::NelderMead;
use nalgebra::Cholesky;
use nalgebra::DVector;
use nalgebra::SymmetricEigen;
use tracing::debug;
use tracing::warn;

use super::constraints::ConstraintSet;
use super::data::CovarianceMatrix;
use super::objective::Objective;
use super::projection::project;
use super::types::ObjectiveSpec;
use super::types::OptimizationResult;
use super::types::OptimizerConfig;
use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::series::AlignedReturns;
use crate::stats::l2_distance;

/// Inputs of one optimizer run. Expected returns, covariance and risk-free
/// rate must share one unit of time.
#[derive(Clone, Debug)]
pub struct OptimizationProblem {
  pub expected_returns: Vec<f64>,
  pub covariance: CovarianceMatrix,
  pub constraints: ConstraintSet,
  pub objective: ObjectiveSpec,
  pub risk_free_rate: f64,
  /// Aligned historical returns for scenario objectives.
  pub scenarios: Option<AlignedReturns>,
}

impl OptimizationProblem {
  pub fn new(
    expected_returns: Vec<f64>,
    covariance: CovarianceMatrix,
    constraints: ConstraintSet,
    objective: ObjectiveSpec,
  ) -> Self {
    Self {
      expected_returns,
      covariance,
      constraints,
      objective,
      risk_free_rate: 0.0,
      scenarios: None,
    }
  }

  pub fn with_risk_free_rate(mut self, risk_free_rate: f64) -> Self {
    self.risk_free_rate = risk_free_rate;
    self
  }

  pub fn with_scenarios(mut self, scenarios: AlignedReturns) -> Self {
    self.scenarios = Some(scenarios);
    self
  }

  pub fn with_objective(&self, objective: ObjectiveSpec) -> Self {
    Self {
      objective,
      ..self.clone()
    }
  }

  pub fn n_assets(&self) -> usize {
    self.constraints.n_assets()
  }

  pub fn validate(&self) -> Result<()> {
    let n = self.n_assets();
    if self.expected_returns.len() != n || self.covariance.dim() != n {
      return Err(AnalyticsError::invalid(format!(
        "dimension mismatch: {} expected returns, {}x{} covariance, {} constrained assets",
        self.expected_returns.len(),
        self.covariance.dim(),
        self.covariance.dim(),
        n
      )));
    }
    if let Some(i) = self.expected_returns.iter().position(|m| !m.is_finite()) {
      return Err(AnalyticsError::invalid(format!(
        "expected return {i} is not finite"
      )));
    }
    if !self.risk_free_rate.is_finite() {
      return Err(AnalyticsError::invalid("risk_free_rate must be finite"));
    }
    self.objective.validate()?;

    match &self.scenarios {
      Some(s) if s.n_assets() != n => Err(AnalyticsError::invalid(format!(
        "scenarios cover {} assets, problem has {n}",
        s.n_assets()
      ))),
      Some(s) if s.n_periods() < 2 => Err(AnalyticsError::insufficient_data(format!(
        "{} scenario periods, at least 2 required",
        s.n_periods()
      ))),
      None if self.objective.needs_scenarios() => Err(AnalyticsError::invalid(format!(
        "{:?} needs historical scenario returns",
        self.objective
      ))),
      _ => Ok(()),
    }
  }
}

/// Constrained portfolio optimizer.
#[derive(Clone, Debug, Default)]
pub struct Optimizer {
  config: OptimizerConfig,
}

/// Best feasible point seen during a search.
#[derive(Debug)]
struct Tracker {
  equal: Vec<f64>,
  plateau_tolerance: f64,
  best: Option<Incumbent>,
}

#[derive(Clone, Debug)]
struct Incumbent {
  cost: f64,
  weights: Vec<f64>,
  distance: f64,
}

impl Tracker {
  fn new(n: usize, plateau_tolerance: f64) -> Self {
    Self {
      equal: vec![1.0 / n as f64; n],
      plateau_tolerance,
      best: None,
    }
  }

  fn offer(&mut self, cost: f64, weights: &[f64]) {
    if !cost.is_finite() {
      return;
    }
    let distance = l2_distance(weights, &self.equal);
    let replace = match &self.best {
      None => true,
      Some(b) => {
        cost < b.cost - self.plateau_tolerance
          || ((cost - b.cost).abs() <= self.plateau_tolerance && distance < b.distance)
      }
    };
    if replace {
      self.best = Some(Incumbent {
        cost,
        weights: weights.to_vec(),
        distance,
      });
    }
  }
}

struct SearchCost {
  objective: Objective,
  constraints: ConstraintSet,
  tolerance: f64,
  max_sweeps: usize,
  tracker: Rc<RefCell<Tracker>>,
}

impl SearchCost {
  fn weights(&self, x: &[f64]) -> Option<Vec<f64>> {
    let w = project(x, &self.constraints, self.tolerance, self.max_sweeps);
    self.constraints.feasible(&w, self.tolerance).then_some(w)
  }

  fn evaluate(&self, x: &[f64]) -> f64 {
    match self.weights(x) {
      Some(w) => {
        let cost = self.objective.cost(&w);
        self.tracker.borrow_mut().offer(cost, &w);
        cost
      }
      None => f64::INFINITY,
    }
  }
}

impl CostFunction for SearchCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> anyhow::Result<Self::Output> {
    Ok(self.evaluate(x))
  }
}

/// Add `ridge + max(0, -λ_min)` to the diagonal when the matrix does not
/// factorize or its smallest eigenvalue is below `ridge`.
pub(crate) fn regularize(cov: &CovarianceMatrix, ridge: f64) -> CovarianceMatrix {
  let m = cov.to_nalgebra();
  let lambda_min = SymmetricEigen::new(m.clone())
    .eigenvalues
    .iter()
    .copied()
    .fold(f64::INFINITY, f64::min);
  if Cholesky::new(m).is_some() && lambda_min >= ridge {
    return cov.clone();
  }

  let shift = ridge + (-lambda_min).max(0.0);
  warn!(
    lambda_min,
    shift, "covariance is singular or ill-conditioned, adding ridge to the diagonal"
  );
  cov.with_diagonal_shift(shift)
}

/// Closed-form starting point from the regularized inverse, before projection.
fn analytic_start(
  spec: ObjectiveSpec,
  mu: &[f64],
  risk_free_rate: f64,
  cov: &CovarianceMatrix,
) -> Option<Vec<f64>> {
  let n = mu.len();
  let rhs = match spec {
    ObjectiveSpec::MaxSharpe => DVector::from_iterator(n, mu.iter().map(|m| m - risk_free_rate)),
    ObjectiveSpec::MinVolatility
    | ObjectiveSpec::MinVolatilityForTargetReturn { .. }
    | ObjectiveSpec::MaxReturnForTargetRisk { .. }
    | ObjectiveSpec::MinDrawdown
    | ObjectiveSpec::MinVar { .. }
    | ObjectiveSpec::MinCvar { .. } => DVector::from_element(n, 1.0),
    ObjectiveSpec::RiskParity => {
      let inv_vol: Vec<f64> = (0..n)
        .map(|i| 1.0 / cov.variance(i).max(1e-30).sqrt())
        .collect();
      return normalized(inv_vol);
    }
    ObjectiveSpec::MaxReturn => return None,
  };

  let inverse = Cholesky::new(cov.to_nalgebra())?.inverse();
  normalized((inverse * rhs).iter().copied().collect())
}

fn normalized(v: Vec<f64>) -> Option<Vec<f64>> {
  let total: f64 = v.iter().sum();
  if !total.is_finite() || total <= 1e-12 {
    return None;
  }
  Some(v.into_iter().map(|x| x / total).collect())
}

fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
  let n = x0.len();
  let step = (0.5 / n as f64).clamp(0.02, 0.25);
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.to_vec());
  for i in 0..n {
    let mut point = x0.to_vec();
    point[i] += step;
    simplex.push(point);
  }
  simplex
}

impl Optimizer {
  pub fn new(config: OptimizerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &OptimizerConfig {
    &self.config
  }

  /// Search the feasible set for the weights optimizing `problem.objective`.
  ///
  /// Fails with `InfeasibleConstraints` when no weight vector meets every
  /// bound. Running out of iterations is not an error: the best feasible
  /// point is returned with `converged == false`.
  pub fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationResult> {
    let cfg = &self.config;
    cfg.validate()?;
    problem.validate()?;

    let constraints = &problem.constraints;
    let n = constraints.n_assets();
    let tol = cfg.feasibility_tolerance;
    let feasible_point = constraints.check_feasible(tol, cfg.projection_max_sweeps)?;

    let cov = regularize(&problem.covariance, cfg.ridge);
    let objective = Objective::new(
      problem.objective,
      problem.expected_returns.clone(),
      cov.clone(),
      problem.risk_free_rate,
      problem.scenarios.as_ref(),
      cfg.target_risk_penalty,
      constraints,
    );

    let tracker = Rc::new(RefCell::new(Tracker::new(n, cfg.plateau_tolerance)));
    let search = SearchCost {
      objective,
      constraints: constraints.clone(),
      tolerance: tol,
      max_sweeps: cfg.projection_max_sweeps,
      tracker: Rc::clone(&tracker),
    };

    let mut x0 = feasible_point.clone();
    let mut x0_cost = search.evaluate(&feasible_point);
    let start = analytic_start(
      problem.objective,
      &problem.expected_returns,
      problem.risk_free_rate,
      &cov,
    )
    .and_then(|s| search.weights(&s));
    if let Some(start) = start {
      let cost = search.evaluate(&start);
      if cost < x0_cost {
        x0_cost = cost;
        x0 = start;
      }
    }

    let run = NelderMead::new(initial_simplex(&x0))
      .with_sd_tolerance(cfg.convergence_tolerance)
      .and_then(|solver| {
        Executor::new(search, solver)
          .configure(|state| state.max_iters(cfg.max_iterations))
          .run()
      });

    let (iterations_used, converged) = match run {
      Ok(res) => (
        res.state.iter,
        matches!(
          res.state.termination_status,
          TerminationStatus::Terminated(TerminationReason::SolverConverged)
        ),
      ),
      Err(e) => {
        warn!(error = %e, "nelder-mead search aborted, keeping the best feasible point");
        (0, false)
      }
    };

    let best = tracker.borrow().best.clone().ok_or_else(|| {
      AnalyticsError::infeasible("no feasible weight vector was evaluated")
    })?;

    if !converged {
      warn!(
        max_iterations = cfg.max_iterations,
        best_cost = best.cost,
        "optimizer stopped before convergence"
      );
    }

    let report = Objective::new(
      problem.objective,
      problem.expected_returns.clone(),
      problem.covariance.clone(),
      problem.risk_free_rate,
      problem.scenarios.as_ref(),
      cfg.target_risk_penalty,
      constraints,
    );
    let moments = report.moments(&best.weights);
    let sharpe = if moments.volatility > 1e-15 {
      (moments.expected_return - problem.risk_free_rate) / moments.volatility
    } else {
      0.0
    };

    if let ObjectiveSpec::MaxReturnForTargetRisk { target } = problem.objective {
      if moments.volatility > target + tol {
        warn!(
          target,
          volatility = moments.volatility,
          "target risk is below the least risky feasible portfolio"
        );
      }
    }

    debug!(
      objective = ?problem.objective,
      iterations = iterations_used,
      converged,
      start_cost = x0_cost,
      best_cost = best.cost,
      "portfolio optimized"
    );

    Ok(OptimizationResult {
      objective_value: report.report(&best.weights),
      weights: best.weights,
      iterations_used,
      converged,
      expected_return: moments.expected_return,
      volatility: moments.volatility,
      sharpe,
    })
  }
}
