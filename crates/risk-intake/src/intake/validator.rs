use super::fields::{FeatureName, FieldCatalog, FieldId};
use super::snapshot::FormSnapshot;

/// First required field found empty, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("required field `{field}` ({feature}) has no answer")]
pub struct ValidationFailure {
    pub field: FieldId,
    pub feature: FeatureName,
}

/// Every catalog field is required and must carry a non-empty answer.
pub fn validate(snapshot: &FormSnapshot, catalog: &FieldCatalog) -> Result<(), ValidationFailure> {
    for field in catalog.fields() {
        let answered = snapshot
            .answer(&field.feature)
            .is_some_and(|value| !value.is_empty());
        if !answered {
            return Err(ValidationFailure {
                field: field.id.clone(),
                feature: field.feature.clone(),
            });
        }
    }

    Ok(())
}

pub fn is_complete(snapshot: &FormSnapshot, catalog: &FieldCatalog) -> bool {
    validate(snapshot, catalog).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::fields::{FieldDescriptor, FormStep};

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            FieldDescriptor::new("a", "A", "First", FormStep::BasicInformation),
            FieldDescriptor::new("b", "B", "Second", FormStep::BasicInformation),
            FieldDescriptor::new("c", "C", "Third", FormStep::LifestyleHabits),
        ])
        .expect("catalog")
    }

    #[test]
    fn complete_snapshot_passes() {
        let snapshot = FormSnapshot::from_answers([("A", "1"), ("B", "2"), ("C", "3")]);
        assert!(validate(&snapshot, &catalog()).is_ok());
        assert!(is_complete(&snapshot, &catalog()));
    }

    #[test]
    fn reports_first_missing_field_in_catalog_order() {
        let snapshot = FormSnapshot::from_answers([("A", "1")]);
        let failure = validate(&snapshot, &catalog()).expect_err("B and C missing");
        assert_eq!(failure.field, FieldId::new("b"));
        assert_eq!(catalog().label_for(&failure.field), Some("Second"));
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let snapshot = FormSnapshot::from_answers([("A", "1"), ("B", ""), ("C", "3")]);
        let failure = validate(&snapshot, &catalog()).expect_err("B blank");
        assert_eq!(failure.feature, FeatureName::new("B"));
        assert!(!is_complete(&snapshot, &catalog()));
    }
}
