//! Shared models, configuration and numerics for relief-network calibration.
//!
//! Holds the types every stage exchanges (evidence rows, categories, point
//! rows, series, estimates), the single [`settings::CalibConfig`] value that
//! is threaded through the pipeline, and the percentile and bounded
//! minimisation helpers the estimators rely on.

pub mod error;
pub mod logging;
pub mod models;
pub mod optimize;
pub mod percentile;
pub mod settings;
pub mod text;

pub use error::{CalibError, Result};
