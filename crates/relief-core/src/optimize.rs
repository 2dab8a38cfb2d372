//! Bounded minimisation and likelihood helpers for the calibration routines.
//!
//! The minimiser is a projected-gradient method with a Barzilai–Borwein
//! step length and Armijo backtracking along the projection arc. Every run is
//! bounded by `max_iter`; a failed line search or an exhausted iteration
//! budget is reported through [`Minimum::success`], never as an error.

use tracing::debug;

// ── Likelihood ────────────────────────────────────────────────────────────────

/// Floor applied to Poisson means before taking logarithms.
pub const MIN_RATE: f64 = 1e-10;

/// Poisson negative log-likelihood `Σ μ − y·ln μ`, dropping the `ln y!` term.
///
/// Means are clipped to [`MIN_RATE`] from below.
pub fn poisson_nll(y: &[f64], mu: &[f64]) -> f64 {
    y.iter()
        .zip(mu)
        .map(|(&y, &m)| {
            let m = m.max(MIN_RATE);
            m - y * m.ln()
        })
        .sum()
}

// ── Options and result ────────────────────────────────────────────────────────

/// Stopping rules for [`minimize_bounded`].
#[derive(Debug, Clone)]
pub struct MinimizeOptions {
    pub max_iter: usize,
    /// Relative objective decrease below which the run counts as converged.
    pub ftol: f64,
    /// Infinity norm of the projected gradient below which the run counts as converged.
    pub pgtol: f64,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            max_iter: 15_000,
            ftol: 2.220446049250313e-9,
            pgtol: 1e-5,
        }
    }
}

/// Outcome of a bounded minimisation.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub fun: f64,
    pub success: bool,
    pub iterations: usize,
}

// ── Minimiser ─────────────────────────────────────────────────────────────────

fn project(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (xi, &(lo, hi)) in x.iter_mut().zip(bounds) {
        *xi = xi.clamp(lo, hi);
    }
}

fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(g)
        .zip(bounds)
        .map(|((&xi, &gi), &(lo, hi))| (xi - (xi - gi).clamp(lo, hi)).abs())
        .fold(0.0, f64::max)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Minimise `f` subject to box constraints, starting from `x0`.
///
/// `grad` must return a vector the same length as `x0`. `bounds[i]` is the
/// inclusive `(lower, upper)` pair for coordinate `i`.
pub fn minimize_bounded<F, G>(
    f: F,
    grad: G,
    x0: &[f64],
    bounds: &[(f64, f64)],
    options: &MinimizeOptions,
) -> Minimum
where
    F: Fn(&[f64]) -> f64,
    G: Fn(&[f64]) -> Vec<f64>,
{
    let mut x = x0.to_vec();
    project(&mut x, bounds);
    let mut fx = f(&x);
    let mut g = grad(&x);

    let initial_pg = projected_gradient_norm(&x, &g, bounds);
    let mut step = 1.0 / initial_pg.max(1.0);

    for iteration in 0..options.max_iter {
        if projected_gradient_norm(&x, &g, bounds) <= options.pgtol {
            return Minimum {
                x,
                fun: fx,
                success: true,
                iterations: iteration,
            };
        }

        // Armijo backtracking along the projection arc.
        let mut trial_step = step;
        let accepted = loop {
            let mut candidate: Vec<f64> = x.iter().zip(&g).map(|(xi, gi)| xi - trial_step * gi).collect();
            project(&mut candidate, bounds);
            let delta: Vec<f64> = candidate.iter().zip(&x).map(|(c, xi)| c - xi).collect();
            let descent = dot(&g, &delta);
            let f_candidate = f(&candidate);
            if f_candidate.is_finite() && f_candidate <= fx + 1e-4 * descent {
                break Some((candidate, f_candidate, delta));
            }
            trial_step *= 0.5;
            if trial_step < 1e-20 {
                break None;
            }
        };

        let Some((x_new, f_new, s)) = accepted else {
            debug!(iteration, fun = fx, "line search could not decrease objective");
            return Minimum {
                x,
                fun: fx,
                success: false,
                iterations: iteration,
            };
        };

        let g_new = grad(&x_new);
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        step = if sy > 0.0 {
            (dot(&s, &s) / sy).clamp(1e-12, 1e12)
        } else {
            (trial_step * 2.0).min(1e12)
        };

        let scale = fx.abs().max(f_new.abs()).max(1.0);
        let converged = (fx - f_new) / scale <= options.ftol;
        x = x_new;
        fx = f_new;
        g = g_new;
        if converged {
            return Minimum {
                x,
                fun: fx,
                success: true,
                iterations: iteration + 1,
            };
        }
    }

    Minimum {
        x,
        fun: fx,
        success: false,
        iterations: options.max_iter,
    }
}

/// Central-difference gradient of `f` at `x`, one-sided at the bounds.
pub fn numeric_gradient<F>(f: &F, x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut probe = x.to_vec();
    (0..x.len())
        .map(|i| {
            let (lo, hi) = bounds[i];
            let h = 1e-6 * x[i].abs().max(1.0);
            let up = (x[i] + h).min(hi);
            let down = (x[i] - h).max(lo);
            if up <= down {
                return 0.0;
            }
            probe[i] = up;
            let f_up = f(&probe);
            probe[i] = down;
            let f_down = f(&probe);
            probe[i] = x[i];
            (f_up - f_down) / (up - down)
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
