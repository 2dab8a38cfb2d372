use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{CalibError, Result};
use crate::models::{Direction, Tier};

/// Prior delay used when a tier has no positive prior configured.
pub const FALLBACK_PRIOR_DELAY_DAYS: i64 = 5;

// ── Enumerated options ────────────────────────────────────────────────────────

/// Calendar on which aggregated series are resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frequency {
    /// One slot per calendar day.
    Daily,
    /// One slot per week, labelled by the week's closing `anchor` day.
    Weekly { anchor: Weekday },
}

/// How a parsed date range is turned into dated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    /// Only the two boundary dates.
    Endpoints,
    /// Every day of the inclusive span, value spread evenly.
    Uniform,
}

// ── Sub-configs ───────────────────────────────────────────────────────────────

/// Randomised resolution of unresolved link tiers and directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    /// Run the terminal sweep over materialized rows.
    pub reassign_unresolved: bool,
    pub seed: u64,
    pub link_probs: BTreeMap<Tier, f64>,
    pub direction_probs: BTreeMap<Direction, f64>,
    /// Emit interval endpoints as SHIP (earliest) and ARR (latest).
    pub split_endpoints: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reassign_unresolved: true,
            seed: 2025,
            link_probs: BTreeMap::from([(Tier::Zp, 0.33), (Tier::Pc, 0.34), (Tier::Cv, 0.33)]),
            direction_probs: BTreeMap::from([(Direction::Ship, 0.5), (Direction::Arr, 0.5)]),
            split_endpoints: true,
        }
    }
}

/// Synthesis of a missing SHIP or ARR side from the present side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    pub enabled: bool,
    pub scale: f64,
    pub prior_delay_days: BTreeMap<Tier, i64>,
}

impl PairingConfig {
    /// Prior transit delay for `tier` in days, never below one.
    pub fn prior_delay(&self, tier: Tier) -> i64 {
        match self.prior_delay_days.get(&tier) {
            Some(&days) if days > 0 => days,
            _ => FALLBACK_PRIOR_DELAY_DAYS,
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 1.0,
            prior_delay_days: BTreeMap::from([(Tier::Zp, 10), (Tier::Pc, 7), (Tier::Cv, 3)]),
        }
    }
}

/// Search limits for the transit-delay estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub max_lag: usize,
    pub tau_min: f64,
    pub tau_max: f64,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            max_lag: 30,
            tau_min: 0.1,
            tau_max: 60.0,
        }
    }
}

/// Grid for the media-response decay rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub mu_min: f64,
    pub mu_max: f64,
    pub steps: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            mu_min: 0.02,
            mu_max: 0.5,
            steps: 20,
        }
    }
}

// ── CalibConfig ───────────────────────────────────────────────────────────────

/// Every tunable of the extraction and calibration pipeline.
///
/// Threaded explicitly through each stage; there is no process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibConfig {
    pub frequency: Frequency,
    /// Roughness penalty λ of the hazard fit.
    pub hazard_smoothing: f64,
    pub range_mode: RangeMode,
    /// Value used when a row cites no quantity.
    pub default_event_value: f64,
    /// Unit word → kilograms. Approximate; historical units vary by region.
    pub unit_factors: BTreeMap<String, f64>,
    /// Multiplier word → factor.
    pub multipliers: BTreeMap<String, f64>,
    pub fallback: FallbackConfig,
    pub pairing: PairingConfig,
    pub transit: TransitConfig,
    pub media: MediaConfig,
    /// Percentile reported by the rate/threshold estimator.
    pub threshold_quantile: f64,
    pub log_level: String,
}

impl Default for CalibConfig {
    fn default() -> Self {
        let unit_factors = [
            ("吨", 1000.0),
            ("t", 1000.0),
            ("kg", 1.0),
            ("千克", 1.0),
            ("公斤", 1.0),
            ("斤", 0.5),
            ("石", 120.0),
            ("担", 50.0),
            ("斗", 10.0),
            ("升", 0.8),
            ("袋", 50.0),
            ("车", 1000.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let multipliers = [("万", 1e4), ("千", 1e3), ("百", 1e2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        Self {
            frequency: Frequency::Daily,
            hazard_smoothing: 5.0,
            range_mode: RangeMode::Uniform,
            default_event_value: 1.0,
            unit_factors,
            multipliers,
            fallback: FallbackConfig::default(),
            pairing: PairingConfig::default(),
            transit: TransitConfig::default(),
            media: MediaConfig::default(),
            threshold_quantile: 95.0,
            log_level: "INFO".to_string(),
        }
    }
}

impl CalibConfig {
    /// Load a config from a JSON file.
    ///
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            debug!("No config at {}, using defaults", path.display());
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unparseable config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Atomically write the config, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_probs("fallback.link_probs", self.fallback.link_probs.values())?;
        check_probs("fallback.direction_probs", self.fallback.direction_probs.values())?;
        if !(self.pairing.scale > 0.0) {
            return Err(CalibError::Config(format!(
                "pairing.scale must be positive, got {}",
                self.pairing.scale
            )));
        }
        if self.media.steps == 0 {
            return Err(CalibError::Config("media.steps must be at least 1".into()));
        }
        if !(self.media.mu_min > 0.0 && self.media.mu_min < self.media.mu_max) {
            return Err(CalibError::Config(format!(
                "media grid needs 0 < mu_min < mu_max, got {}..{}",
                self.media.mu_min, self.media.mu_max
            )));
        }
        if !(self.transit.tau_min > 0.0 && self.transit.tau_min < self.transit.tau_max) {
            return Err(CalibError::Config(format!(
                "transit bounds need 0 < tau_min < tau_max, got {}..{}",
                self.transit.tau_min, self.transit.tau_max
            )));
        }
        if !(0.0..=100.0).contains(&self.threshold_quantile) {
            return Err(CalibError::Config(format!(
                "threshold_quantile must lie in [0, 100], got {}",
                self.threshold_quantile
            )));
        }
        Ok(())
    }
}

fn check_probs<'a>(name: &str, probs: impl Iterator<Item = &'a f64>) -> Result<()> {
    let mut total = 0.0;
    let mut count = 0;
    for &p in probs {
        if !(p >= 0.0) {
            return Err(CalibError::Config(format!("{name} has a negative weight")));
        }
        total += p;
        count += 1;
    }
    if count == 0 || total <= 0.0 {
        return Err(CalibError::Config(format!("{name} must have positive total weight")));
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
