use serde::Serialize;

use super::fields::{FieldCatalog, FormStep};
use super::ui::FormReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub step: FormStep,
    pub number: u8,
    pub label: &'static str,
    pub answered: usize,
    pub total: usize,
    pub complete: bool,
    /// Whether the progress indicator shows this step as reached.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormProgress {
    pub steps: Vec<StepProgress>,
    /// Highest step whose fields are all answered.
    pub active_through: Option<u8>,
}

impl FormProgress {
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|step| step.complete)
    }
}

/// Computes per-step completion. Every step up to the highest complete one is
/// marked active, even when an earlier step still has gaps.
pub fn form_progress<R>(reader: &R, catalog: &FieldCatalog) -> FormProgress
where
    R: FormReader + ?Sized,
{
    let mut steps: Vec<StepProgress> = catalog
        .steps()
        .into_iter()
        .map(|step| {
            let fields = catalog.fields_for_step(step);
            let answered = fields
                .iter()
                .filter(|field| reader.has_value(&field.id))
                .count();
            StepProgress {
                step,
                number: step.number(),
                label: step.label(),
                answered,
                total: fields.len(),
                complete: answered == fields.len(),
                active: false,
            }
        })
        .collect();

    let active_through = steps
        .iter()
        .filter(|step| step.complete)
        .map(|step| step.number)
        .max();

    if let Some(highest) = active_through {
        for step in &mut steps {
            step.active = step.number <= highest;
        }
    }

    FormProgress {
        steps,
        active_through,
    }
}
