//! Parameter calibration for the relief-supply network.
//!
//! Takes the series table produced by `relief-extract` and fits the
//! shared breach/media hazard, per-tier transit delays, capacity
//! thresholds and the media-response kernel, then assembles the estimates
//! into a report and writes the output tables.

pub mod export;
pub mod hazard;
pub mod media;
pub mod report;
pub mod run;
pub mod thresholds;
pub mod transit;

pub use relief_core as core;
pub use relief_extract as extract;

pub use report::CalibrationReport;
pub use run::{run_and_export, run_calibration, run_from_paths, CalibrationRun};
