use super::VolatilitySurfacePoint;

/// Grid points of one expiry, ascending in strike.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExpirySlice {
  pub expiry: f64,
  pub strikes: Vec<f64>,
  pub vols: Vec<f64>,
}

impl ExpirySlice {
  pub fn vol_at(&self, strike: f64) -> f64 {
    interp_flat(&self.strikes, &self.vols, strike)
  }
}

/// Piecewise linear through `(xs, ys)`, flat beyond either end.
///
/// `xs` must be non-empty and strictly ascending. A NaN abscissa yields NaN.
pub(crate) fn interp_flat(xs: &[f64], ys: &[f64], x: f64) -> f64 {
  if x.is_nan() || xs.is_empty() {
    return f64::NAN;
  }
  let last = xs.len() - 1;
  if x <= xs[0] {
    return ys[0];
  }
  if x >= xs[last] {
    return ys[last];
  }
  let i = xs.partition_point(|&v| v <= x);
  let (x0, x1, y0, y1) = (xs[i - 1], xs[i], ys[i - 1], ys[i]);
  y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Group points sorted by `(expiry, strike)` into expiry slices.
pub(crate) fn slices(points: &[VolatilitySurfacePoint]) -> Vec<ExpirySlice> {
  let mut out: Vec<ExpirySlice> = Vec::new();
  for p in points {
    match out.last_mut() {
      Some(slice) if slice.expiry == p.expiry => {
        slice.strikes.push(p.strike);
        slice.vols.push(p.implied_vol);
      }
      _ => out.push(ExpirySlice {
        expiry: p.expiry,
        strikes: vec![p.strike],
        vols: vec![p.implied_vol],
      }),
    }
  }
  out
}

/// Strike interpolation inside the enclosing slices, then linear in expiry.
pub(crate) fn interpolate(slices: &[ExpirySlice], strike: f64, expiry: f64) -> f64 {
  let (Some(first), Some(last)) = (slices.first(), slices.last()) else {
    return f64::NAN;
  };
  if expiry.is_nan() {
    return f64::NAN;
  }
  if expiry <= first.expiry {
    return first.vol_at(strike);
  }
  if expiry >= last.expiry {
    return last.vol_at(strike);
  }

  let i = slices.partition_point(|s| s.expiry <= expiry);
  let (before, after) = (&slices[i - 1], &slices[i]);
  let (v0, v1) = (before.vol_at(strike), after.vol_at(strike));
  v0 + (v1 - v0) * (expiry - before.expiry) / (after.expiry - before.expiry)
}
