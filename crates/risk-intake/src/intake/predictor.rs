use serde::Serialize;
use tracing::warn;

use super::encoder::EncodedVector;
use super::scoring::{ScoringError, ScoringFunction};

/// Probability in `[0, 1]`, ready to hand to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    probability: f64,
}

impl PredictionResult {
    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn percentage(&self) -> f64 {
        self.probability * 100.0
    }

    /// One decimal place with a percent sign, e.g. `42.0%`.
    pub fn percentage_label(&self) -> String {
        format!("{:.1}%", self.percentage())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("scoring function failed: {0}")]
    ScoringFailure(#[source] ScoringError),
    #[error("scoring function returned a non-finite value ({0})")]
    InvalidOutput(f64),
}

/// Runs the scorer once. Out-of-range output is clamped into `[0, 1]`
/// rather than rejected; non-finite output is rejected.
pub fn predict(
    vector: &EncodedVector,
    scorer: &dyn ScoringFunction,
) -> Result<PredictionResult, PredictionError> {
    let raw = scorer
        .score(vector.as_slice())
        .map_err(PredictionError::ScoringFailure)?;

    if !raw.is_finite() {
        return Err(PredictionError::InvalidOutput(raw));
    }

    let probability = raw.clamp(0.0, 1.0);
    if probability != raw {
        warn!(raw, probability, "scorer output outside [0, 1]; clamped");
    }

    Ok(PredictionResult { probability })
}
