//! Assembly of the calibration report keyed by parameter id.

use std::collections::BTreeMap;

use relief_core::models::CalibrationEstimate;
use relief_core::settings::MediaConfig;

use crate::hazard::HazardFit;
use crate::media::MediaEstimate;
use crate::transit::TransitEstimate;

/// Estimates keyed by `param_id`; a later record replaces an earlier one.
pub type CalibrationReport = BTreeMap<String, CalibrationEstimate>;

/// Inputs to [`assemble_report`], one field per estimator.
pub struct ReportInputs<'a> {
    pub hazard: Option<&'a HazardFit>,
    pub transit: &'a [TransitEstimate],
    pub thresholds: &'a [CalibrationEstimate],
    pub media: &'a MediaEstimate,
    pub media_config: &'a MediaConfig,
}

fn hazard_estimates(fit: &HazardFit) -> Vec<CalibrationEstimate> {
    vec![
        CalibrationEstimate::new(
            "hazard_mean",
            fit.mean(),
            format!("mean of hazard series, success={}", fit.success),
        ),
        CalibrationEstimate::new(
            "hazard_peak",
            fit.peak(),
            format!("peak of hazard series, success={}", fit.success),
        ),
        CalibrationEstimate::new("alpha_breach", fit.alpha_breach, "scale"),
        CalibrationEstimate::new("alpha_media", fit.alpha_media, "scale"),
    ]
}

fn transit_estimate(est: &TransitEstimate) -> CalibrationEstimate {
    let mut note = format!("xcorr={}, cc={:.3}", est.lag, est.corr);
    if est.fit.fallback {
        note.push_str(", fallback");
    } else if !est.fit.success {
        note.push_str(", not converged");
    }
    CalibrationEstimate::new(format!("tau_{}", est.tier.code()), est.fit.tau, note)
}

pub fn assemble_report(inputs: ReportInputs<'_>) -> CalibrationReport {
    let mut records: Vec<CalibrationEstimate> = Vec::new();
    if let Some(fit) = inputs.hazard {
        records.extend(hazard_estimates(fit));
    }
    records.extend(inputs.transit.iter().map(transit_estimate));
    records.extend(inputs.thresholds.iter().cloned());
    records.extend(inputs.media.to_estimates(inputs.media_config));

    records
        .into_iter()
        .map(|e| (e.param_id.clone(), e))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
