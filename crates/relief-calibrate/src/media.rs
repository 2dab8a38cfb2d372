//! Media-response regression.
//!
//! `response_t ≈ c₀ + k·g_t(μ)` with `g_t(μ) = Σ_{j≤t} media_{t−j}·e^{−μj}`.
//! For each μ on a fixed grid, `(c₀, k)` is an ordinary least-squares fit;
//! the μ with the smallest RMSE wins.

use relief_core::models::{CalibrationEstimate, Category, Series};
use relief_core::settings::{Frequency, MediaConfig};
use relief_extract::{calendar_index, SeriesTable};
use tracing::debug;

const MIN_MU: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct MediaFit {
    pub k_news: f64,
    pub mu: f64,
    pub intercept: f64,
    pub rmse: f64,
}

/// Outcome of the regression; `Missing` carries the note explaining why no
/// fit was possible.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEstimate {
    Fitted(MediaFit),
    Missing(&'static str),
}

impl MediaEstimate {
    /// `k_news` and `mu_media` records.
    pub fn to_estimates(&self, config: &MediaConfig) -> Vec<CalibrationEstimate> {
        match self {
            MediaEstimate::Fitted(fit) => vec![
                CalibrationEstimate::new(
                    "k_news",
                    fit.k_news,
                    format!("rmse={:.4}, intercept={:.2}", fit.rmse, fit.intercept),
                ),
                CalibrationEstimate::new(
                    "mu_media",
                    fit.mu,
                    format!("gridsearch {}~{}", config.mu_min, config.mu_max),
                ),
            ],
            MediaEstimate::Missing(note) => vec![
                CalibrationEstimate::new("k_news", 0.0, *note),
                CalibrationEstimate::new("mu_media", 0.0, *note),
            ],
        }
    }
}

/// Causal exponential-decay convolution of `media`.
pub fn decay_convolution(media: &[f64], mu: f64) -> Vec<f64> {
    let decay = (-mu).exp();
    let mut acc = 0.0;
    media
        .iter()
        .map(|m| {
            acc = m + decay * acc;
            acc
        })
        .collect()
}

/// Least-squares `(intercept, slope)` of `y` on `x`.
///
/// A constant `x` makes the design rank-deficient; the minimum-norm
/// solution is returned then.
pub fn ols(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    if x.is_empty() {
        return (0.0, 0.0);
    }
    let sx: f64 = x.iter().sum();
    let sy: f64 = y.iter().sum();
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();

    let det = n * sxx - sx * sx;
    if det.abs() <= 1e-12 * (n * sxx).max(1.0) {
        let c = sx / n;
        let mean_y = sy / n;
        let scale = mean_y / (1.0 + c * c);
        return (scale, scale * c);
    }
    let intercept = (sxx * sy - sx * sxy) / det;
    let slope = (n * sxy - sx * sy) / det;
    (intercept, slope)
}

fn grid(config: &MediaConfig) -> Vec<f64> {
    if config.steps <= 1 {
        return vec![config.mu_min];
    }
    let span = config.mu_max - config.mu_min;
    (0..config.steps)
        .map(|i| config.mu_min + span * i as f64 / (config.steps - 1) as f64)
        .collect()
}

fn fit_at(media: &[f64], response: &[f64], mu: f64) -> MediaFit {
    let mu = mu.max(MIN_MU);
    let g = decay_convolution(media, mu);
    let (intercept, k_news) = ols(&g, response);
    let sse: f64 = g
        .iter()
        .zip(response)
        .map(|(gi, yi)| (yi - intercept - k_news * gi).powi(2))
        .sum();
    MediaFit {
        k_news,
        mu,
        intercept,
        rmse: (sse / response.len().max(1) as f64).sqrt(),
    }
}

/// Regress the allocation series (else the summed link series) on the
/// decayed media signal, both spread over every calendar slot they span.
pub fn estimate_media_response(
    table: &SeriesTable,
    config: &MediaConfig,
    frequency: Frequency,
) -> MediaEstimate {
    let Some(media) = table.get(&Category::MediaReq) else {
        return MediaEstimate::Missing("no media series");
    };
    let response = match table.get(&Category::Alloc) {
        Some(alloc) => Some(alloc.clone()),
        None => Series::sum_all(
            table
                .iter()
                .filter(|(category, _)| category.is_link())
                .map(|(_, series)| series),
        ),
    };
    let Some(response) = response else {
        return MediaEstimate::Missing("no response series");
    };

    let index = calendar_index([media, &response], frequency);
    let m = media.reindex(&index);
    let y = response.reindex(&index);

    let mut best: Option<MediaFit> = None;
    for mu in grid(config) {
        let fit = fit_at(&m, &y, mu);
        if best.as_ref().map_or(true, |b| fit.rmse < b.rmse) {
            best = Some(fit);
        }
    }
    match best {
        Some(fit) => {
            debug!(k_news = fit.k_news, mu = fit.mu, rmse = fit.rmse, "media response fitted");
            MediaEstimate::Fitted(fit)
        }
        None => MediaEstimate::Missing("empty grid"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use relief_core::models::{Direction, Tier};

    fn series(values: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(1931, 7, 1).unwrap();
        Series::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + chrono::Duration::days(i as i64), *v))
                .collect(),
        )
    }

    fn media_signal() -> Vec<f64> {
        vec![0.0, 3.0, 0.0, 0.0, 1.0, 5.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 4.0, 0.0, 0.0]
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn test_decay_convolution_matches_direct_sum() {
        let m = [1.0, 2.0, 0.0, 3.0];
        let mu: f64 = 0.3;
        let g = decay_convolution(&m, mu);
        for t in 0..m.len() {
            let direct: f64 = (0..=t).map(|j| m[t - j] * (-mu * j as f64).exp()).sum();
            assert!((g[t] - direct).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ols_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let (c, k) = ols(&x, &y);
        assert!((c - 1.0).abs() < 1e-9);
        assert!((k - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_ols_constant_regressor_is_min_norm() {
        let (c, k) = ols(&[0.0; 4], &[2.0; 4]);
        assert!((c - 2.0).abs() < 1e-12);
        assert_eq!(k, 0.0);
    }

    // ── Regression ────────────────────────────────────────────────────────────

    #[test]
    fn test_recovers_planted_parameters() {
        let m = media_signal();
        let g = decay_convolution(&m, 0.2);
        let y: Vec<f64> = g.iter().map(|v| 2.0 + 3.0 * v).collect();
        let mut table = SeriesTable::new();
        table.insert(Category::MediaReq, series(&m));
        table.insert(Category::Alloc, series(&y));
        let cfg = MediaConfig {
            mu_min: 0.1,
            mu_max: 0.5,
            steps: 5,
        };
        let MediaEstimate::Fitted(fit) = estimate_media_response(&table, &cfg, Frequency::Daily) else {
            panic!("expected a fit");
        };
        assert!((fit.mu - 0.2).abs() < 1e-9);
        assert!((fit.k_news - 3.0).abs() < 1e-6);
        assert!((fit.intercept - 2.0).abs() < 1e-6);
        assert!(fit.rmse < 1e-6);
    }

    #[test]
    fn test_link_sum_used_without_alloc() {
        let m = media_signal();
        let mut table = SeriesTable::new();
        table.insert(Category::MediaReq, series(&m));
        table.insert(Category::link(Tier::Cv, Direction::Arr), series(&[1.0, 2.0]));
        assert!(matches!(
            estimate_media_response(&table, &MediaConfig::default(), Frequency::Daily),
            MediaEstimate::Fitted(_)
        ));
    }

    #[test]
    fn test_disjoint_response_decays_over_calendar_days() {
        // Media on 7/1 only, response on 7/4..7/6: the decay spans the gap.
        let start = NaiveDate::from_ymd_opt(1931, 7, 1).unwrap();
        let day = |n: i64| start + chrono::Duration::days(n);
        let mut table = SeriesTable::new();
        table.insert(Category::MediaReq, Series::new(vec![(day(0), 10.0)]));
        table.insert(
            Category::Alloc,
            Series::new(vec![(day(3), 6.0), (day(4), 4.0), (day(5), 3.0)]),
        );
        let cfg = MediaConfig {
            mu_min: 0.1,
            mu_max: 0.5,
            steps: 5,
        };
        let MediaEstimate::Fitted(fit) = estimate_media_response(&table, &cfg, Frequency::Daily)
        else {
            panic!("expected a fit");
        };
        let expected = fit_at(&[10.0, 0.0, 0.0, 0.0, 0.0, 0.0], &[0.0, 0.0, 0.0, 6.0, 4.0, 3.0], 0.3);
        assert!((fit.mu - 0.3).abs() < 1e-9, "mu = {}", fit.mu);
        assert!((fit.rmse - expected.rmse).abs() < 1e-9);
        assert!((fit.rmse - 1.644_044_8).abs() < 1e-6);
    }

    #[test]
    fn test_missing_inputs_report_zero_with_note() {
        let cfg = MediaConfig::default();
        let table = SeriesTable::new();
        let est = estimate_media_response(&table, &cfg, Frequency::Daily);
        assert_eq!(est, MediaEstimate::Missing("no media series"));
        let records = est.to_estimates(&cfg);
        assert_eq!(records[0].param_id, "k_news");
        assert_eq!(records[0].value, 0.0);
        assert_eq!(records[1].note, "no media series");

        let mut table = SeriesTable::new();
        table.insert(Category::MediaReq, series(&[1.0]));
        table.insert(Category::Breach, series(&[1.0]));
        assert_eq!(
            estimate_media_response(&table, &cfg, Frequency::Daily),
            MediaEstimate::Missing("no response series")
        );
    }

    #[test]
    fn test_fitted_notes() {
        let fit = MediaEstimate::Fitted(MediaFit {
            k_news: 1.5,
            mu: 0.1,
            intercept: 2.345,
            rmse: 0.5,
        });
        let records = fit.to_estimates(&MediaConfig::default());
        assert_eq!(records[0].note, "rmse=0.5000, intercept=2.35");
        assert_eq!(records[1].note, "gridsearch 0.02~0.5");
    }
}
