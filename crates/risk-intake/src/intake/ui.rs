//! Seams to whatever front end hosts the questionnaire.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::fields::FieldId;
use super::orchestrator::IntakeError;
use super::predictor::PredictionResult;

/// Reads the current raw answer of a form control.
pub trait FormReader {
    fn read(&self, field: &FieldId) -> Option<String>;

    fn has_value(&self, field: &FieldId) -> bool {
        self.read(field).is_some_and(|value| !value.is_empty())
    }
}

impl FormReader for HashMap<String, String> {
    fn read(&self, field: &FieldId) -> Option<String> {
        self.get(field.as_str()).cloned()
    }
}

impl FormReader for BTreeMap<String, String> {
    fn read(&self, field: &FieldId) -> Option<String> {
        self.get(field.as_str()).cloned()
    }
}

/// Receives the outcome of a prediction attempt.
pub trait ResultRenderer {
    fn publish(&self, result: &PredictionResult);

    fn report_error(&self, error: &IntakeError);
}

/// The control that triggers predictions; disabled while an attempt runs.
pub trait TriggerControl {
    fn disable(&self);

    fn enable(&self);
}

/// Renderer for headless callers that read the returned result instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl ResultRenderer for TracingRenderer {
    fn publish(&self, result: &PredictionResult) {
        info!(percentage = %result.percentage_label(), "prediction published");
    }

    fn report_error(&self, error: &IntakeError) {
        info!(kind = error.kind(), %error, "prediction attempt rejected");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingControl;

impl TriggerControl for TracingControl {
    fn disable(&self) {
        debug!("trigger disabled");
    }

    fn enable(&self) {
        debug!("trigger enabled");
    }
}
