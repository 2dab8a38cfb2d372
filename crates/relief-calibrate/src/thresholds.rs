//! Capacity and rate thresholds as high quantiles of daily series.

use relief_core::models::{CalibrationEstimate, Category, Direction, Tier};
use relief_core::percentile::percentile_of;
use relief_extract::SeriesTable;

/// `rate_dist` from the village-distribution series and `theta_{Z,P,C}`
/// from each tier's arrival series, at the configured quantile.
pub fn estimate_thresholds(table: &SeriesTable, quantile: f64) -> Vec<CalibrationEstimate> {
    let method = format!("q{quantile}");
    let mut out = Vec::new();

    if let Some(series) = table.get(&Category::VDist) {
        out.push(CalibrationEstimate::new(
            "rate_dist",
            percentile_of(&series.values(), quantile),
            method.clone(),
        ));
    }
    for tier in Tier::ALL {
        if let Some(series) = table.get(&Category::link(tier, Direction::Arr)) {
            out.push(CalibrationEstimate::new(
                format!("theta_{}", tier.level()),
                percentile_of(&series.values(), quantile),
                method.clone(),
            ));
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
