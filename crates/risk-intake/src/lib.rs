//! Questionnaire normalization and risk prediction.
//!
//! `intake` holds the prediction pipeline and its HTTP router; `config`,
//! `telemetry` and `error` carry the service plumbing shared with binaries.

pub mod config;
pub mod error;
pub mod intake;
pub mod telemetry;

pub use error::AppError;
