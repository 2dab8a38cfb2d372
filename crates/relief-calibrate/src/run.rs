//! End-to-end calibration: evidence rows in, series and estimates out.

use std::path::Path;

use relief_core::logging::setup_logging;
use relief_core::models::EvidenceRow;
use relief_core::settings::CalibConfig;
use relief_core::Result;
use relief_extract::{build_series_from_evidence, load_evidence_csv, ExtractionResult, GeoRuleSet};
use tracing::info;

use crate::export::write_all;
use crate::hazard::{estimate_hazard, HazardFit};
use crate::media::estimate_media_response;
use crate::report::{assemble_report, CalibrationReport, ReportInputs};
use crate::thresholds::estimate_thresholds;
use crate::transit::{estimate_transit_delays, TransitEstimate};

/// Everything one calibration pass produces.
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    /// Series, split detail, audit log and run counters.
    pub extraction: ExtractionResult,
    pub hazard: Option<HazardFit>,
    pub transit: Vec<TransitEstimate>,
    pub estimates: CalibrationReport,
}

/// Extract series from `rows` and run every estimator on them.
///
/// Fails only on an invalid configuration; estimator trouble is recorded
/// in the report notes.
pub fn run_calibration(
    rows: &[EvidenceRow],
    geo_rules: &GeoRuleSet,
    config: &CalibConfig,
) -> Result<CalibrationRun> {
    config.validate()?;

    let extraction = build_series_from_evidence(rows, geo_rules, config);
    let table = &extraction.series;

    let hazard = estimate_hazard(table, config.hazard_smoothing, config.frequency);
    let transit = estimate_transit_delays(table, &config.transit, config.frequency);
    let thresholds = estimate_thresholds(table, config.threshold_quantile);
    let media = estimate_media_response(table, &config.media, config.frequency);

    let estimates = assemble_report(ReportInputs {
        hazard: hazard.as_ref(),
        transit: &transit,
        thresholds: &thresholds,
        media: &media,
        media_config: &config.media,
    });
    info!(
        "Calibrated {} parameters from {} series",
        estimates.len(),
        table.len()
    );

    Ok(CalibrationRun {
        extraction,
        hazard,
        transit,
        estimates,
    })
}

/// Load the evidence table (required) and the geo-rule table (optional),
/// then calibrate.
pub fn run_from_paths(
    evidence: &Path,
    geo_rules: Option<&Path>,
    config: &CalibConfig,
) -> Result<CalibrationRun> {
    let rows = load_evidence_csv(evidence)?;
    let rules = geo_rules.map(GeoRuleSet::load).unwrap_or_default();
    run_calibration(&rows, &rules, config)
}

/// Install logging at `config.log_level`, calibrate from files and write
/// every output table into `out_dir`.
pub fn run_and_export(
    evidence: &Path,
    geo_rules: Option<&Path>,
    config: &CalibConfig,
    out_dir: &Path,
) -> Result<CalibrationRun> {
    setup_logging(&config.log_level)?;
    let run = run_from_paths(evidence, geo_rules, config)?;
    write_all(out_dir, &run)?;
    Ok(run)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
