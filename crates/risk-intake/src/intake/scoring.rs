use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Opaque positional scorer. It knows nothing about feature names.
pub trait ScoringFunction: Send + Sync {
    fn score(&self, features: &[f64]) -> Result<f64, ScoringError>;
}

impl<F> ScoringFunction for F
where
    F: Fn(&[f64]) -> Result<f64, ScoringError> + Send + Sync,
{
    fn score(&self, features: &[f64]) -> Result<f64, ScoringError> {
        self(features)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("scorer expects {expected} features, received {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("scorer failed: {0}")]
    Failed(String),
}

/// Logistic regression exported as `{ "intercept": f64, "coefficients": [f64] }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogisticScorer {
    intercept: f64,
    coefficients: Vec<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to read model {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model definition is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model defines no coefficients")]
    Empty,
}

impl LogisticScorer {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Result<Self, ModelLoadError> {
        if coefficients.is_empty() {
            return Err(ModelLoadError::Empty);
        }
        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self, ModelLoadError> {
        let model: LogisticScorer = serde_json::from_slice(payload)?;
        Self::new(model.intercept, model.coefficients)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let payload = tokio::fs::read(path)
            .await
            .map_err(|source| ModelLoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_slice(&payload)
    }

    pub fn arity(&self) -> usize {
        self.coefficients.len()
    }
}

impl ScoringFunction for LogisticScorer {
    fn score(&self, features: &[f64]) -> Result<f64, ScoringError> {
        if features.len() != self.coefficients.len() {
            return Err(ScoringError::Arity {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }

        let logit = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(weight, value)| weight * value)
                .sum::<f64>();
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

/// Write-once handle through which a scorer becomes available after startup.
#[derive(Clone, Default)]
pub struct ScorerSlot {
    inner: Arc<OnceLock<Arc<dyn ScoringFunction>>>,
}

#[derive(Debug, thiserror::Error)]
#[error("a scoring function is already installed")]
pub struct ScorerAlreadyInstalled;

impl ScorerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, scorer: Arc<dyn ScoringFunction>) -> Result<(), ScorerAlreadyInstalled> {
        self.inner.set(scorer).map_err(|_| ScorerAlreadyInstalled)
    }

    pub fn get(&self) -> Option<Arc<dyn ScoringFunction>> {
        self.inner.get().cloned()
    }

    pub fn is_installed(&self) -> bool {
        self.inner.get().is_some()
    }
}

impl std::fmt::Debug for ScorerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScorerSlot")
            .field("installed", &self.is_installed())
            .finish()
    }
}

/// Bounded poll for the scorer: at most `max_attempts` checks, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scoring function still unavailable after {attempts} attempts")]
pub struct ScorerUnavailable {
    pub attempts: u32,
}

pub async fn wait_for_scorer(
    slot: &ScorerSlot,
    policy: &WaitPolicy,
) -> Result<Arc<dyn ScoringFunction>, ScorerUnavailable> {
    for attempt in 1..=policy.max_attempts {
        if let Some(scorer) = slot.get() {
            debug!(attempt, "scoring function available");
            return Ok(scorer);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(ScorerUnavailable {
        attempts: policy.max_attempts,
    })
}
