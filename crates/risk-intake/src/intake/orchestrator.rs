use axum::http::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::encoder::{encode, EncodingError};
use super::fields::FieldCatalog;
use super::predictor::{predict, PredictionError, PredictionResult};
use super::readiness::{ReadinessHandle, ReadinessState, ReadyContext};
use super::snapshot::FormSnapshot;
use super::ui::{FormReader, ResultRenderer, TriggerControl};
use super::validator::{validate, ValidationFailure};

/// Where the current attempt is. Always back to `Idle` once an attempt ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Stage {
    Idle = 0,
    Validating = 1,
    Encoding = 2,
    Predicting = 3,
    Published = 4,
    Errored = 5,
}

impl Stage {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Stage::Validating,
            2 => Stage::Encoding,
            3 => Stage::Predicting,
            4 => Stage::Published,
            5 => Stage::Errored,
            _ => Stage::Idle,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("prediction is not available: {reason}")]
    NotReady { reason: String, permanent: bool },
    #[error("a prediction is already in progress")]
    Busy,
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

impl IntakeError {
    /// Stable machine-readable tag for logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            IntakeError::NotReady { .. } => "not_ready",
            IntakeError::Busy => "busy",
            IntakeError::Validation(_) => "validation_failure",
            IntakeError::Encoding(EncodingError::MissingValue(_)) => "missing_value",
            IntakeError::Encoding(EncodingError::MissingMapping(_)) => "missing_mapping",
            IntakeError::Encoding(EncodingError::UnmappedValue { .. }) => "unmapped_value",
            IntakeError::Encoding(EncodingError::LengthMismatch { .. }) => "length_mismatch",
            IntakeError::Prediction(PredictionError::ScoringFailure(_)) => "scoring_failure",
            IntakeError::Prediction(PredictionError::InvalidOutput(_)) => "invalid_output",
        }
    }

    /// HTTP status for this failure. Bad answers are the caller's to fix;
    /// schema defects and scorer failures are the deployment's.
    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            IntakeError::Busy => StatusCode::CONFLICT,
            IntakeError::Validation(_)
            | IntakeError::Encoding(EncodingError::UnmappedValue { .. })
            | IntakeError::Encoding(EncodingError::MissingValue(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            IntakeError::Encoding(_) | IntakeError::Prediction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Only a failed startup is unrecoverable without a reload.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IntakeError::NotReady { permanent: true, .. })
    }
}

/// Single entry point for prediction attempts.
///
/// Holds the only mutable state of the pipeline: the busy flag guarding the
/// trigger control and the stage marker. The mapping table and scorer are
/// read from the readiness channel on every attempt and never modified.
#[derive(Debug)]
pub struct IntakeOrchestrator {
    catalog: Arc<FieldCatalog>,
    readiness: ReadinessHandle,
    busy: AtomicBool,
    stage: AtomicU8,
}

impl IntakeOrchestrator {
    pub fn new(catalog: Arc<FieldCatalog>, readiness: ReadinessHandle) -> Self {
        Self {
            catalog,
            readiness,
            busy: AtomicBool::new(false),
            stage: AtomicU8::new(Stage::Idle as u8),
        }
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn readiness(&self) -> ReadinessState {
        self.readiness.current()
    }

    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs one attempt: readiness gate, validation, encoding, scoring,
    /// publication. Every failure is reported to `renderer` except `Busy`,
    /// which leaves the in-flight attempt untouched.
    pub fn submit<F, R, C>(
        &self,
        form: &F,
        renderer: &R,
        control: &C,
    ) -> Result<PredictionResult, IntakeError>
    where
        F: FormReader + ?Sized,
        R: ResultRenderer + ?Sized,
        C: TriggerControl + ?Sized,
    {
        let context = match self.gate() {
            Ok(context) => context,
            Err(err) => {
                renderer.report_error(&err);
                return Err(err);
            }
        };

        let _busy = match BusyGuard::acquire(&self.busy, &self.stage, control) {
            Some(guard) => guard,
            None => {
                debug!("prediction already in flight; ignoring trigger");
                return Err(IntakeError::Busy);
            }
        };

        match self.run_pipeline(form, &context) {
            Ok(result) => {
                self.enter(Stage::Published);
                info!(probability = result.probability(), "prediction complete");
                renderer.publish(&result);
                Ok(result)
            }
            Err(err) => {
                self.enter(Stage::Errored);
                warn!(kind = err.kind(), error = %err, "prediction attempt failed");
                renderer.report_error(&err);
                Err(err)
            }
        }
    }

    fn gate(&self) -> Result<Arc<ReadyContext>, IntakeError> {
        match self.readiness.current() {
            ReadinessState::Ready(context) => Ok(context),
            ReadinessState::Loading => Err(IntakeError::NotReady {
                reason: "prediction data is still loading".to_string(),
                permanent: false,
            }),
            ReadinessState::Failed(reason) => Err(IntakeError::NotReady {
                reason,
                permanent: true,
            }),
        }
    }

    fn run_pipeline<F>(
        &self,
        form: &F,
        context: &ReadyContext,
    ) -> Result<PredictionResult, IntakeError>
    where
        F: FormReader + ?Sized,
    {
        self.enter(Stage::Validating);
        let snapshot = FormSnapshot::capture(form, &self.catalog);
        validate(&snapshot, &self.catalog)?;

        self.enter(Stage::Encoding);
        let vector = encode(&snapshot, &context.table)?;
        debug!(values = ?vector.as_slice(), "encoded form answers");

        self.enter(Stage::Predicting);
        let result = predict(&vector, context.scorer.as_ref())?;
        Ok(result)
    }

    fn enter(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Release);
    }
}

/// Holds the busy flag and keeps the trigger disabled until dropped.
struct BusyGuard<'a, C: TriggerControl + ?Sized> {
    busy: &'a AtomicBool,
    stage: &'a AtomicU8,
    control: &'a C,
}

impl<'a, C: TriggerControl + ?Sized> BusyGuard<'a, C> {
    fn acquire(busy: &'a AtomicBool, stage: &'a AtomicU8, control: &'a C) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        control.disable();
        Some(Self {
            busy,
            stage,
            control,
        })
    }
}

impl<C: TriggerControl + ?Sized> Drop for BusyGuard<'_, C> {
    fn drop(&mut self) {
        self.stage.store(Stage::Idle as u8, Ordering::Release);
        self.control.enable();
        self.busy.store(false, Ordering::Release);
    }
}
