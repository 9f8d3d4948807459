//! # Projection
//!
//! $$
//! P_{\mathcal B}(y)_i=\operatorname{clip}_{[l_i,u_i]}(y_i-\lambda),\qquad
//! \sum_i P_{\mathcal B}(y)_i=1
//! $$
//!
//! Euclidean projection onto the constraint polytope. The box and budget
//! constraints are projected exactly by bisection on the shift `λ`; category
//! slabs are added with Dykstra's alternating projections.

use super::constraints::CategoricalConstraint;
use super::constraints::ConstraintSet;

const BISECTION_STEPS: usize = 200;

/// Projection onto `{l <= w <= u, sum(w) = 1}`.
///
/// Returns the clipped input when the bound sums exclude 1.
pub(crate) fn project_box_budget(y: &[f64], set: &ConstraintSet) -> Vec<f64> {
  let bounds = set.bounds();
  let clip = |lambda: f64| -> Vec<f64> {
    y.iter()
      .zip(bounds)
      .map(|(&yi, b)| (yi - lambda).clamp(b.lower, b.upper))
      .collect()
  };

  if set.lower_sum() > 1.0 || set.upper_sum() < 1.0 {
    return clip(0.0);
  }

  // g(λ) = Σ clip(y - λ) is non-increasing; Σu >= 1 at lo and Σl <= 1 at hi
  let mut lo = y
    .iter()
    .zip(bounds)
    .map(|(&yi, b)| yi - b.upper)
    .fold(f64::INFINITY, f64::min);
  let mut hi = y
    .iter()
    .zip(bounds)
    .map(|(&yi, b)| yi - b.lower)
    .fold(f64::NEG_INFINITY, f64::max);

  for _ in 0..BISECTION_STEPS {
    let mid = 0.5 * (lo + hi);
    if mid <= lo || mid >= hi {
      break;
    }
    let total: f64 = clip(mid).iter().sum();
    if total > 1.0 {
      lo = mid;
    } else {
      hi = mid;
    }
  }

  let mut w = clip(0.5 * (lo + hi));
  spread_residual(&mut w, set);
  w
}

/// Push the rounding residual of the budget onto weights with slack.
fn spread_residual(w: &mut [f64], set: &ConstraintSet) {
  let residual = 1.0 - w.iter().sum::<f64>();
  if residual == 0.0 {
    return;
  }
  for (wi, b) in w.iter_mut().zip(set.bounds()) {
    let room = if residual > 0.0 {
      b.upper - *wi
    } else {
      b.lower - *wi
    };
    let step = if residual > 0.0 {
      room.min(residual)
    } else {
      room.max(residual)
    };
    if step != 0.0 {
      *wi += step;
      return;
    }
  }
}

/// Projection onto `{lower <= m·w <= upper}` for a 0/1 membership mask.
fn project_slab(z: &[f64], group: &CategoricalConstraint) -> Vec<f64> {
  let count = group.member_count();
  let mut out = z.to_vec();
  if count == 0 {
    return out;
  }
  let s = group.weight_of(z);
  let shift = if s < group.lower() {
    (group.lower() - s) / count as f64
  } else if s > group.upper() {
    (group.upper() - s) / count as f64
  } else {
    return out;
  };
  for i in group.member_indices() {
    out[i] += shift;
  }
  out
}

/// Map `y` onto the feasible polytope of `set`.
///
/// Dykstra sweeps stop once the iterate, which always ends on the box and
/// budget set, meets every category bound within `tol`, or after `max_sweeps`.
/// The result is only feasible when the caller's feasibility check says so.
pub(crate) fn project(y: &[f64], set: &ConstraintSet, tol: f64, max_sweeps: usize) -> Vec<f64> {
  let groups = set.groups();
  let x = project_box_budget(y, set);
  if groups.is_empty() || set.feasible(&x, tol) {
    return x;
  }

  let n = y.len();
  let mut x = y.to_vec();
  // one correction term per set, the box-budget set last
  let mut increments = vec![vec![0.0; n]; groups.len() + 1];

  for _ in 0..max_sweeps.max(1) {
    for (k, group) in groups.iter().enumerate() {
      let z: Vec<f64> = x.iter().zip(&increments[k]).map(|(a, p)| a + p).collect();
      let next = project_slab(&z, group);
      for i in 0..n {
        increments[k][i] = z[i] - next[i];
      }
      x = next;
    }

    let last = groups.len();
    let z: Vec<f64> = x.iter().zip(&increments[last]).map(|(a, p)| a + p).collect();
    let next = project_box_budget(&z, set);
    for i in 0..n {
      increments[last][i] = z[i] - next[i];
    }
    x = next;

    if set.feasible(&x, tol) {
      break;
    }
  }

  x
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;

  use super::*;

  #[test]
  fn box_budget_projection_is_exact() {
    let set = ConstraintSet::from_tuples(
      &[(0.0, 0.5), (0.1, 0.6), (0.0, 1.0)],
      &Vec::<(&str, Vec<bool>, (f64, f64))>::new(),
    )
    .unwrap();

    // already feasible points are fixed
    let w = project_box_budget(&[0.2, 0.3, 0.5], &set);
    assert_abs_diff_eq!(w[0], 0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(w[1], 0.3, epsilon = 1e-12);
    assert_abs_diff_eq!(w[2], 0.5, epsilon = 1e-12);

    // equal shift then clip: y - 1/3 -> [2/3, -1/3, -1/3] clipped
    let w = project_box_budget(&[1.0, 0.0, 0.0], &set);
    assert!(set.feasible(&w, 1e-12));
    assert_abs_diff_eq!(w[0], 0.5, epsilon = 1e-12);
  }

  #[test]
  fn random_points_land_in_the_polytope() {
    let set = ConstraintSet::from_tuples(
      &[(0.0, 0.4), (0.0, 0.4), (0.05, 0.5), (0.0, 0.3), (0.0, 1.0)],
      &[
        ("G1", vec![true, true, false, false, false], (0.2, 0.5)),
        ("G2", vec![false, true, true, true, false], (0.3, 0.6)),
      ],
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..200 {
      let y: Vec<f64> = (0..5).map(|_| rng.gen_range(-2.0..2.0)).collect();
      let w = project(&y, &set, 1e-9, 10_000);
      assert!(set.feasible(&w, 1e-9), "{:?}", set.violations(&w, 1e-9));
    }
  }

  #[test]
  fn projection_is_deterministic() {
    let set = ConstraintSet::from_tuples(
      &[(0.0, 1.0); 4],
      &[("G", vec![true, false, true, false], (0.6, 0.8))],
    )
    .unwrap();
    let y = [0.9, 0.4, -0.3, 0.1];
    let a = project(&y, &set, 1e-9, 10_000);
    let b = project(&y, &set, 1e-9, 10_000);
    assert_eq!(a, b);
  }
}
