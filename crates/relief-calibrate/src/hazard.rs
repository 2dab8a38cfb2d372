//! Shared latent hazard fitted to the breach and media channels.
//!
//! `breach_t ~ Poisson(α₁·h_t)` and `media_t ~ Poisson(α₂·h_t)` with a
//! roughness penalty `λ·Σ(h_t − h_{t−1})²`. The scales are fitted in log
//! space so they stay positive.

use chrono::NaiveDate;
use relief_core::models::{Category, Series};
use relief_core::optimize::{minimize_bounded, poisson_nll, MinimizeOptions, MIN_RATE};
use relief_core::settings::Frequency;
use relief_extract::{calendar_index, SeriesTable};
use tracing::{debug, warn};

/// Floor applied to `h` inside the likelihood.
const HAZARD_FLOOR: f64 = 1e-8;
const HAZARD_UPPER: f64 = 1e5;
const LOG_ALPHA_BOUND: f64 = 8.0;

#[derive(Debug, Clone)]
pub struct HazardFit {
    pub dates: Vec<NaiveDate>,
    pub hazard: Vec<f64>,
    pub alpha_breach: f64,
    pub alpha_media: f64,
    pub objective: f64,
    /// `false` means the estimate is present but low-confidence.
    pub success: bool,
}

impl HazardFit {
    pub fn mean(&self) -> f64 {
        if self.hazard.is_empty() {
            return 0.0;
        }
        self.hazard.iter().sum::<f64>() / self.hazard.len() as f64
    }

    pub fn peak(&self) -> f64 {
        self.hazard.iter().copied().fold(0.0, f64::max)
    }
}

struct HazardProblem<'a> {
    breach: &'a [f64],
    media: &'a [f64],
    smoothing: f64,
}

impl HazardProblem<'_> {
    fn len(&self) -> usize {
        self.breach.len()
    }

    fn hazard(&self, z: &[f64]) -> Vec<f64> {
        z[..self.len()].iter().map(|v| v.max(HAZARD_FLOOR)).collect()
    }

    fn objective(&self, z: &[f64]) -> f64 {
        let t = self.len();
        let h = self.hazard(z);
        let (a1, a2) = (z[t].exp(), z[t + 1].exp());
        let mu1: Vec<f64> = h.iter().map(|v| a1 * v).collect();
        let mu2: Vec<f64> = h.iter().map(|v| a2 * v).collect();
        let penalty: f64 = h.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        poisson_nll(self.breach, &mu1) + poisson_nll(self.media, &mu2) + self.smoothing * penalty
    }

    fn gradient(&self, z: &[f64]) -> Vec<f64> {
        let t = self.len();
        let h = self.hazard(z);
        let (a1, a2) = (z[t].exp(), z[t + 1].exp());
        let mut g = vec![0.0; t + 2];

        for i in 0..t {
            let mut dh = 0.0;
            for (alpha, y, slot) in [(a1, self.breach[i], t), (a2, self.media[i], t + 1)] {
                let mu = alpha * h[i];
                if mu > MIN_RATE {
                    dh += alpha - y / h[i];
                    g[slot] += mu - y;
                }
            }
            if i > 0 {
                dh += 2.0 * self.smoothing * (h[i] - h[i - 1]);
            }
            if i + 1 < t {
                dh -= 2.0 * self.smoothing * (h[i + 1] - h[i]);
            }
            // Below the floor `h` is constant in `z`.
            g[i] = if z[i] >= HAZARD_FLOOR { dh } else { 0.0 };
        }
        g
    }
}

/// Fit the hazard over every calendar slot spanned by the breach and media
/// series.
///
/// A missing channel counts as all-zero; with both missing there is
/// nothing to fit and `None` is returned.
pub fn estimate_hazard(
    table: &SeriesTable,
    smoothing: f64,
    frequency: Frequency,
) -> Option<HazardFit> {
    let breach = table.get(&Category::Breach);
    let media = table.get(&Category::MediaReq);
    if breach.is_none() && media.is_none() {
        debug!("No breach or media series, skipping hazard fit");
        return None;
    }

    let present: Vec<&Series> = breach.into_iter().chain(media).collect();
    let dates = calendar_index(present, frequency);
    if dates.is_empty() {
        return None;
    }
    let y1 = breach.map(|s| s.reindex(&dates)).unwrap_or_else(|| vec![0.0; dates.len()]);
    let y2 = media.map(|s| s.reindex(&dates)).unwrap_or_else(|| vec![0.0; dates.len()]);

    let problem = HazardProblem {
        breach: &y1,
        media: &y2,
        smoothing,
    };
    let t = dates.len();
    let mut x0: Vec<f64> = y1.iter().zip(&y2).map(|(a, b)| (a + b).max(1.0) * 0.2).collect();
    x0.extend([0.0, 0.0]);
    let mut bounds = vec![(0.0, HAZARD_UPPER); t];
    bounds.extend([(-LOG_ALPHA_BOUND, LOG_ALPHA_BOUND); 2]);

    let res = minimize_bounded(
        |z| problem.objective(z),
        |z| problem.gradient(z),
        &x0,
        &bounds,
        &MinimizeOptions::default(),
    );
    if !res.success {
        warn!(
            iterations = res.iterations,
            objective = res.fun,
            "hazard fit did not converge"
        );
    }

    Some(HazardFit {
        hazard: res.x[..t].iter().map(|v| v.max(0.0)).collect(),
        alpha_breach: res.x[t].exp(),
        alpha_media: res.x[t + 1].exp(),
        objective: res.fun,
        success: res.success,
        dates,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::optimize::numeric_gradient;

    fn day(i: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(1931, 7, 1 + i).unwrap()
    }

    fn series(values: &[f64]) -> Series {
        Series::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (day(i as u32), *v))
                .collect(),
        )
    }

    #[test]
    fn test_both_channels_absent_is_none() {
        let mut table = SeriesTable::new();
        table.insert(Category::Alloc, series(&[1.0, 2.0]));
        assert!(estimate_hazard(&table, 5.0, Frequency::Daily).is_none());
    }

    #[test]
    fn test_all_zero_channels_give_near_zero_hazard() {
        let mut table = SeriesTable::new();
        table.insert(Category::Breach, series(&[0.0; 10]));
        table.insert(Category::MediaReq, series(&[0.0; 10]));
        let fit = estimate_hazard(&table, 5.0, Frequency::Daily).unwrap();
        assert_eq!(fit.hazard.len(), 10);
        assert!(fit.hazard.iter().all(|h| *h < 1e-3), "{:?}", fit.hazard);
        assert!(fit.alpha_breach <= 1.0);
        assert!(fit.alpha_media <= 1.0);
        assert!(fit.objective.is_finite());
    }

    #[test]
    fn test_missing_channel_counts_as_zero() {
        let mut table = SeriesTable::new();
        table.insert(Category::MediaReq, series(&[0.0, 2.0, 4.0, 2.0, 0.0]));
        let fit = estimate_hazard(&table, 5.0, Frequency::Daily).unwrap();
        assert_eq!(fit.dates.len(), 5);
        assert!(fit.hazard.iter().all(|h| *h >= 0.0));
        assert!(fit.objective.is_finite());
    }

    #[test]
    fn test_index_fills_days_between_channels() {
        let mut table = SeriesTable::new();
        table.insert(Category::Breach, Series::new(vec![(day(0), 1.0)]));
        table.insert(Category::MediaReq, Series::new(vec![(day(3), 1.0)]));
        let fit = estimate_hazard(&table, 5.0, Frequency::Daily).unwrap();
        assert_eq!(fit.dates, vec![day(0), day(1), day(2), day(3)]);
        assert_eq!(fit.hazard.len(), 4);
    }

    #[test]
    fn test_symmetric_burst_peaks_in_the_middle() {
        let mut table = SeriesTable::new();
        table.insert(Category::Breach, series(&[0.0, 0.0, 5.0, 0.0, 0.0]));
        table.insert(Category::MediaReq, series(&[0.0, 1.0, 6.0, 1.0, 0.0]));
        let fit = estimate_hazard(&table, 5.0, Frequency::Daily).unwrap();
        assert!(fit.hazard[2] >= fit.hazard[0]);
        assert!(fit.hazard[2] >= fit.hazard[4]);
        assert!((fit.hazard[0] - fit.hazard[4]).abs() < 1e-9);
        assert!(fit.mean() <= fit.peak());
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let breach = [0.0, 3.0, 1.0];
        let media = [1.0, 2.0, 0.0];
        let problem = HazardProblem {
            breach: &breach,
            media: &media,
            smoothing: 2.0,
        };
        let z = [0.5, 1.5, 0.8, 0.3, -0.2];
        let bounds = [(0.0, 1e5), (0.0, 1e5), (0.0, 1e5), (-8.0, 8.0), (-8.0, 8.0)];
        let analytic = problem.gradient(&z);
        let numeric = numeric_gradient(&|x: &[f64]| problem.objective(x), &z, &bounds);
        for (a, n) in analytic.iter().zip(&numeric) {
            assert!((a - n).abs() < 1e-4, "analytic {a} vs numeric {n}");
        }
    }
}
