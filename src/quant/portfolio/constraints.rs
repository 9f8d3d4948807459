//! # Constraints
//!
//! $$
//! \sum_i w_i = 1,\qquad l_i\le w_i\le u_i,\qquad
//! L_k\le\sum_{i\in G_k} w_i\le U_k
//! $$
//!
//! Box and categorical group constraints on portfolio weights.

use std::fmt::Display;

use super::projection::project;
use crate::error::AnalyticsError;
use crate::error::Result;
use crate::quant::series::Instrument;

/// Bounds on a single asset weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxConstraint {
  pub lower: f64,
  pub upper: f64,
}

impl BoxConstraint {
  pub fn new(lower: f64, upper: f64) -> Result<Self> {
    check_bounds("box constraint", lower, upper)?;
    Ok(Self { lower, upper })
  }

  pub fn contains(&self, w: f64, tol: f64) -> bool {
    w >= self.lower - tol && w <= self.upper + tol
  }
}

impl Default for BoxConstraint {
  fn default() -> Self {
    Self {
      lower: 0.0,
      upper: 1.0,
    }
  }
}

fn check_bounds(what: &str, lower: f64, upper: f64) -> Result<()> {
  if !lower.is_finite() || !upper.is_finite() {
    return Err(AnalyticsError::invalid(format!(
      "{what} bounds must be finite, got [{lower}, {upper}]"
    )));
  }
  if lower > upper {
    return Err(AnalyticsError::invalid(format!(
      "{what} lower bound {lower} exceeds upper bound {upper}"
    )));
  }
  Ok(())
}

/// Bound on the summed weight of a labelled subset of assets.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalConstraint {
  label: String,
  members: Vec<bool>,
  lower: f64,
  upper: f64,
}

impl CategoricalConstraint {
  /// `members[i]` flags asset `i` as part of the group.
  pub fn new(label: impl Into<String>, members: Vec<bool>, lower: f64, upper: f64) -> Result<Self> {
    let label = label.into();
    check_bounds(&format!("category {label}"), lower, upper)?;
    Ok(Self {
      label,
      members,
      lower,
      upper,
    })
  }

  /// Group over explicit asset indices out of `n_assets`.
  pub fn from_indices(
    label: impl Into<String>,
    n_assets: usize,
    indices: &[usize],
    lower: f64,
    upper: f64,
  ) -> Result<Self> {
    let label = label.into();
    let mut members = vec![false; n_assets];
    for &i in indices {
      if i >= n_assets {
        return Err(AnalyticsError::invalid(format!(
          "category {label} references asset {i} outside of {n_assets} assets"
        )));
      }
      members[i] = true;
    }
    Self::new(label, members, lower, upper)
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn members(&self) -> &[bool] {
    &self.members
  }

  pub fn lower(&self) -> f64 {
    self.lower
  }

  pub fn upper(&self) -> f64 {
    self.upper
  }

  pub fn member_indices(&self) -> impl Iterator<Item = usize> + '_ {
    self
      .members
      .iter()
      .enumerate()
      .filter(|(_, &m)| m)
      .map(|(i, _)| i)
  }

  pub fn member_count(&self) -> usize {
    self.members.iter().filter(|&&m| m).count()
  }

  /// Summed weight of the members. Fails when `weights` does not cover
  /// every asset of the membership mask.
  pub fn group_weight(&self, weights: &[f64]) -> Result<f64> {
    if weights.len() < self.members.len() {
      return Err(AnalyticsError::invalid(format!(
        "category {} spans {} assets, got {} weights",
        self.label,
        self.members.len(),
        weights.len()
      )));
    }
    Ok(self.weight_of(weights))
  }

  /// Unchecked `group_weight`, `weights` must cover the mask.
  pub(crate) fn weight_of(&self, weights: &[f64]) -> f64 {
    self.member_indices().map(|i| weights[i]).sum()
  }
}

/// A bound violated by a weight vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
  Length { expected: usize, got: usize },
  NonFinite { index: usize },
  Sum { total: f64 },
  Lower { index: usize, weight: f64, bound: f64 },
  Upper { index: usize, weight: f64, bound: f64 },
  GroupLower { label: String, total: f64, bound: f64 },
  GroupUpper { label: String, total: f64, bound: f64 },
}

impl Display for Violation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Violation::Length { expected, got } => {
        write!(f, "expected {expected} weights, got {got}")
      }
      Violation::NonFinite { index } => write!(f, "weight {index} is not finite"),
      Violation::Sum { total } => write!(f, "weights sum to {total}, not 1"),
      Violation::Lower {
        index,
        weight,
        bound,
      } => write!(f, "weight {index} = {weight} below lower bound {bound}"),
      Violation::Upper {
        index,
        weight,
        bound,
      } => write!(f, "weight {index} = {weight} above upper bound {bound}"),
      Violation::GroupLower {
        label,
        total,
        bound,
      } => write!(f, "category {label} = {total} below lower bound {bound}"),
      Violation::GroupUpper {
        label,
        total,
        bound,
      } => write!(f, "category {label} = {total} above upper bound {bound}"),
    }
  }
}

/// Validated box and categorical constraints over `n` assets.
///
/// The full-investment constraint `sum(w) = 1` is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
  bounds: Vec<BoxConstraint>,
  groups: Vec<CategoricalConstraint>,
}

impl ConstraintSet {
  pub fn new(bounds: Vec<BoxConstraint>, groups: Vec<CategoricalConstraint>) -> Result<Self> {
    let n = bounds.len();
    if n == 0 {
      return Err(AnalyticsError::invalid("constraint set over zero assets"));
    }
    for b in &bounds {
      check_bounds("box constraint", b.lower, b.upper)?;
    }
    for g in &groups {
      check_bounds(&format!("category {}", g.label), g.lower, g.upper)?;
      if g.members.len() > n && g.members[n..].iter().any(|&m| m) {
        return Err(AnalyticsError::invalid(format!(
          "category {} references assets outside of {n} assets",
          g.label
        )));
      }
      if g.members.len() < n {
        return Err(AnalyticsError::invalid(format!(
          "category {} has {} membership flags for {n} assets",
          g.label,
          g.members.len()
        )));
      }
    }

    let groups = groups
      .into_iter()
      .map(|mut g| {
        g.members.truncate(n);
        g
      })
      .collect();

    Ok(Self { bounds, groups })
  }

  /// Every weight in `[0, 1]`, no groups.
  pub fn long_only(n: usize) -> Result<Self> {
    Self::new(vec![BoxConstraint::default(); n], Vec::new())
  }

  /// Build from `(lower, upper)` pairs in asset order and
  /// `(label, membership, (lower, upper))` category triples.
  pub fn from_tuples<S: AsRef<str>>(
    bounds: &[(f64, f64)],
    categories: &[(S, Vec<bool>, (f64, f64))],
  ) -> Result<Self> {
    let bounds = bounds
      .iter()
      .map(|&(lo, hi)| BoxConstraint::new(lo, hi))
      .collect::<Result<Vec<_>>>()?;
    let groups = categories
      .iter()
      .map(|(label, members, (lo, hi))| {
        CategoricalConstraint::new(label.as_ref(), members.clone(), *lo, *hi)
      })
      .collect::<Result<Vec<_>>>()?;
    Self::new(bounds, groups)
  }

  /// Derive category masks from instrument labels. A label carried by no
  /// instrument is rejected.
  pub fn from_instruments<S: AsRef<str>>(
    instruments: &[Instrument],
    bounds: &[(f64, f64)],
    categories: &[(S, f64, f64)],
  ) -> Result<Self> {
    if bounds.len() != instruments.len() {
      return Err(AnalyticsError::invalid(format!(
        "{} bounds for {} instruments",
        bounds.len(),
        instruments.len()
      )));
    }
    let triples = categories
      .iter()
      .map(|(label, lo, hi)| {
        let label = label.as_ref();
        let members: Vec<bool> = instruments.iter().map(|i| i.has_category(label)).collect();
        if !members.iter().any(|&m| m) {
          return Err(AnalyticsError::invalid(format!(
            "no instrument carries category {label}"
          )));
        }
        Ok((label.to_string(), members, (*lo, *hi)))
      })
      .collect::<Result<Vec<_>>>()?;
    Self::from_tuples(bounds, &triples)
  }

  pub fn n_assets(&self) -> usize {
    self.bounds.len()
  }

  pub fn bounds(&self) -> &[BoxConstraint] {
    &self.bounds
  }

  pub fn groups(&self) -> &[CategoricalConstraint] {
    &self.groups
  }

  pub(crate) fn lower_sum(&self) -> f64 {
    self.bounds.iter().map(|b| b.lower).sum()
  }

  pub(crate) fn upper_sum(&self) -> f64 {
    self.bounds.iter().map(|b| b.upper).sum()
  }

  /// Every bound `weights` violates by more than `tol`.
  pub fn violations(&self, weights: &[f64], tol: f64) -> Vec<Violation> {
    if weights.len() != self.n_assets() {
      return vec![Violation::Length {
        expected: self.n_assets(),
        got: weights.len(),
      }];
    }
    let mut out: Vec<Violation> = weights
      .iter()
      .enumerate()
      .filter(|(_, w)| !w.is_finite())
      .map(|(index, _)| Violation::NonFinite { index })
      .collect();
    if !out.is_empty() {
      return out;
    }

    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > tol {
      out.push(Violation::Sum { total });
    }
    for (index, (&weight, b)) in weights.iter().zip(&self.bounds).enumerate() {
      if weight < b.lower - tol {
        out.push(Violation::Lower {
          index,
          weight,
          bound: b.lower,
        });
      }
      if weight > b.upper + tol {
        out.push(Violation::Upper {
          index,
          weight,
          bound: b.upper,
        });
      }
    }
    for g in &self.groups {
      let total = g.weight_of(weights);
      if total < g.lower - tol {
        out.push(Violation::GroupLower {
          label: g.label.clone(),
          total,
          bound: g.lower,
        });
      }
      if total > g.upper + tol {
        out.push(Violation::GroupUpper {
          label: g.label.clone(),
          total,
          bound: g.upper,
        });
      }
    }
    out
  }

  /// Whether `weights` sums to one and meets every bound within `tol`.
  pub fn feasible(&self, weights: &[f64], tol: f64) -> bool {
    self.violations(weights, tol).is_empty()
  }

  /// Feasibility pre-check.
  ///
  /// Necessary conditions on the bound sums are checked first; a feasible
  /// point is then searched by projecting the equal-weight vector. On success
  /// the point found is returned.
  pub fn check_feasible(&self, tol: f64, max_sweeps: usize) -> Result<Vec<f64>> {
    let (lo, hi) = (self.lower_sum(), self.upper_sum());
    if lo > 1.0 + tol || hi < 1.0 - tol {
      return Err(AnalyticsError::infeasible(format!(
        "asset bounds allow total weight in [{lo}, {hi}], which excludes 1"
      )));
    }

    for g in &self.groups {
      let members_lo: f64 = g.member_indices().map(|i| self.bounds[i].lower).sum();
      let members_hi: f64 = g.member_indices().map(|i| self.bounds[i].upper).sum();
      let others_lo: f64 = lo - members_lo;
      let others_hi: f64 = hi - members_hi;
      // reachable group weight given the member bounds and the budget left to the rest
      let reach_lo = members_lo.max(1.0 - others_hi);
      let reach_hi = members_hi.min(1.0 - others_lo);
      if reach_lo > g.upper + tol || reach_hi < g.lower - tol {
        return Err(AnalyticsError::infeasible(format!(
          "category {} needs weight in [{}, {}] but its members reach [{reach_lo}, {reach_hi}]",
          g.label, g.lower, g.upper
        )));
      }
    }

    let n = self.n_assets();
    let start = vec![1.0 / n as f64; n];
    let w = project(&start, self, tol, max_sweeps);
    let violations = self.violations(&w, tol);
    if let Some(first) = violations.first() {
      return Err(AnalyticsError::infeasible(format!(
        "no weight vector satisfies all constraints ({first})"
      )));
    }
    Ok(w)
  }
}
