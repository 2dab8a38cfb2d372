//! Per-tier transit delay: cross-correlation lag, then a kernel MLE refinement.

use relief_core::models::{Category, Direction, Tier};
use relief_core::optimize::{minimize_bounded, numeric_gradient, poisson_nll, MinimizeOptions};
use relief_core::settings::{Frequency, TransitConfig};
use relief_extract::{calendar_index, SeriesTable};
use tracing::debug;

/// Score given to lags where either series has no variance.
pub const DEGENERATE_CORR: f64 = -1e9;

const ZERO_TOL: f64 = 1e-8;
const KERNEL_FLOOR: f64 = 1e-8;

// ── Stage 1: cross-correlation ────────────────────────────────────────────────

fn std_dev(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let cov = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum::<f64>() / n;
    cov / (std_dev(x) * std_dev(y))
}

/// `x` delayed by `lag` slots: zero-padded in front, truncated at the back.
fn shifted(x: &[f64], lag: usize) -> Vec<f64> {
    let lag = lag.min(x.len());
    let mut out = vec![0.0; lag];
    out.extend_from_slice(&x[..x.len() - lag]);
    out
}

/// Lag in `0..=max_lag` maximising the correlation of the delayed dispatch
/// series with the arrival series; the earliest lag wins ties.
pub fn xcorr_lag(ship: &[f64], arr: &[f64], max_lag: usize) -> (usize, f64) {
    let mut best = (0, DEGENERATE_CORR);
    if ship.is_empty() || ship.len() != arr.len() {
        return best;
    }
    let arr_ok = std_dev(arr) > 1e-12;
    for lag in 0..=max_lag {
        let s = shifted(ship, lag);
        let corr = if arr_ok && std_dev(&s) > 1e-12 {
            pearson(&s, arr)
        } else {
            DEGENERATE_CORR
        };
        if corr > best.1 {
            best = (lag, corr);
        }
    }
    best
}

// ── Stage 2: kernel MLE ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TauFit {
    pub tau: f64,
    pub objective: f64,
    pub success: bool,
    /// Optimisation was skipped because the inputs were degenerate.
    pub fallback: bool,
}

/// Poisson NLL of `arr` against `ship` convolved with a truncated Gaussian
/// kernel centred at `tau` with width `max(1, tau/2)`.
fn kernel_nll(ship: &[f64], arr: &[f64], tau: f64, tau_min: f64) -> f64 {
    let t = ship.len();
    let tau = tau.max(tau_min);
    let width = (tau / 2.0).max(1.0);
    let kmax = (t - 1).min(((tau * 3.0) as usize).max(5));

    let mut weights: Vec<f64> = (0..=kmax)
        .map(|k| (-0.5 * ((k as f64 - tau) / width).powi(2)).exp())
        .collect();
    let total = weights.iter().sum::<f64>() + 1e-12;
    weights.iter_mut().for_each(|w| *w /= total);

    let mut mu = vec![0.0; t];
    for (k, w) in weights.iter().enumerate() {
        for i in k..t {
            mu[i] += w * ship[i - k];
        }
    }
    mu.iter_mut().for_each(|m| *m = m.max(KERNEL_FLOOR));
    poisson_nll(arr, &mu)
}

/// Refine the delay starting from `init_tau`.
///
/// Fewer than three samples, or an all-zero series, bypasses the optimiser
/// and returns the rounded initial guess with objective 0.
pub fn refine_tau(ship: &[f64], arr: &[f64], init_tau: f64, config: &TransitConfig) -> TauFit {
    let all_zero = |x: &[f64]| x.iter().all(|v| v.abs() <= ZERO_TOL);
    if ship.len() < 3 || ship.len() != arr.len() || all_zero(ship) || all_zero(arr) {
        return TauFit {
            tau: init_tau.round().max(0.0),
            objective: 0.0,
            success: true,
            fallback: true,
        };
    }

    let bounds = [(config.tau_min, config.tau_max)];
    let f = |x: &[f64]| kernel_nll(ship, arr, x[0], config.tau_min);
    let res = minimize_bounded(
        &f,
        |x| numeric_gradient(&f, x, &bounds),
        &[init_tau],
        &bounds,
        &MinimizeOptions::default(),
    );
    TauFit {
        tau: res.x[0],
        objective: res.fun,
        success: res.success,
        fallback: false,
    }
}

// ── Per-tier estimates ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TransitEstimate {
    pub tier: Tier,
    pub lag: usize,
    pub corr: f64,
    pub fit: TauFit,
}

/// One estimate per tier that has both a SHIP and an ARR series, aligned
/// on every calendar slot they span. Lags and delays are in slots.
pub fn estimate_transit_delays(
    table: &SeriesTable,
    config: &TransitConfig,
    frequency: Frequency,
) -> Vec<TransitEstimate> {
    let mut out = Vec::new();
    for tier in Tier::ALL {
        let (Some(ship), Some(arr)) = (
            table.get(&Category::link(tier, Direction::Ship)),
            table.get(&Category::link(tier, Direction::Arr)),
        ) else {
            continue;
        };
        let index = calendar_index([ship, arr], frequency);
        let s = ship.reindex(&index);
        let a = arr.reindex(&index);

        let (lag, corr) = xcorr_lag(&s, &a, config.max_lag);
        let fit = refine_tau(&s, &a, lag as f64, config);
        debug!(
            tier = tier.code(),
            lag,
            corr,
            tau = fit.tau,
            fallback = fit.fallback,
            "transit delay estimated"
        );
        out.push(TransitEstimate {
            tier,
            lag,
            corr,
            fit,
        });
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
