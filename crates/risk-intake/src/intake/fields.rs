use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical name of one predictive input dimension, as used by the mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureName(pub String);

impl FeatureName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a form control as the UI knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sections of the questionnaire, in the order the form presents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStep {
    BasicInformation,
    LifestyleHabits,
    MedicalHistory,
    ClinicalTestResults,
}

impl FormStep {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::BasicInformation,
            Self::LifestyleHabits,
            Self::MedicalHistory,
            Self::ClinicalTestResults,
        ]
    }

    /// One-based position used by progress indicators.
    pub const fn number(self) -> u8 {
        match self {
            Self::BasicInformation => 1,
            Self::LifestyleHabits => 2,
            Self::MedicalHistory => 3,
            Self::ClinicalTestResults => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::BasicInformation => "Basic Information",
            Self::LifestyleHabits => "Lifestyle Habits",
            Self::MedicalHistory => "Medical History",
            Self::ClinicalTestResults => "Clinical Test Results",
        }
    }
}

/// Binds a UI field to the feature it feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub feature: FeatureName,
    pub label: String,
    pub step: FormStep,
}

impl FieldDescriptor {
    pub fn new(
        id: impl Into<String>,
        feature: impl Into<String>,
        label: impl Into<String>,
        step: FormStep,
    ) -> Self {
        Self {
            id: FieldId::new(id),
            feature: FeatureName::new(feature),
            label: label.into(),
            step,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("field catalog is empty")]
    Empty,
    #[error("field id `{0}` is declared more than once")]
    DuplicateFieldId(FieldId),
    #[error("feature `{0}` is bound to more than one field")]
    DuplicateFeature(FeatureName),
}

/// Static, bijective table of the questionnaire's required fields.
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
    by_id: HashMap<FieldId, usize>,
    by_feature: HashMap<FeatureName, usize>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, CatalogError> {
        if fields.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut by_id = HashMap::with_capacity(fields.len());
        let mut by_feature = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            if by_id.insert(field.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateFieldId(field.id.clone()));
            }
            if by_feature.insert(field.feature.clone(), index).is_some() {
                return Err(CatalogError::DuplicateFeature(field.feature.clone()));
            }
        }

        Ok(Self {
            fields,
            by_id,
            by_feature,
        })
    }

    /// The fifteen-question cognitive risk questionnaire.
    pub fn standard() -> Self {
        let fields = standard_fields();
        let by_id = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.id.clone(), index))
            .collect();
        let by_feature = fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.feature.clone(), index))
            .collect();

        Self {
            fields,
            by_id,
            by_feature,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn descriptor(&self, id: &FieldId) -> Option<&FieldDescriptor> {
        self.by_id.get(id).map(|index| &self.fields[*index])
    }

    pub fn descriptor_for_feature(&self, feature: &FeatureName) -> Option<&FieldDescriptor> {
        self.by_feature.get(feature).map(|index| &self.fields[*index])
    }

    /// User-facing label for a field id, used when surfacing validation errors.
    pub fn label_for(&self, id: &FieldId) -> Option<&str> {
        self.descriptor(id).map(|field| field.label.as_str())
    }

    pub fn fields_for_step(&self, step: FormStep) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|field| field.step == step).collect()
    }

    /// Steps that own at least one field, in form order.
    pub fn steps(&self) -> Vec<FormStep> {
        FormStep::ordered()
            .into_iter()
            .filter(|step| self.fields.iter().any(|field| field.step == *step))
            .collect()
    }
}

fn standard_fields() -> Vec<FieldDescriptor> {
    use FormStep::*;

    vec![
        FieldDescriptor::new("age_rank", "Age_rank", "Age group", BasicInformation),
        FieldDescriptor::new("sex", "Sex", "Sex", BasicInformation),
        FieldDescriptor::new("Education", "Education", "Education level", BasicInformation),
        FieldDescriptor::new("race", "Race", "Race / ethnicity", BasicInformation),
        FieldDescriptor::new("activities", "Activities", "Physical activity", LifestyleHabits),
        FieldDescriptor::new("dairy", "Dairy", "Dairy intake", LifestyleHabits),
        FieldDescriptor::new("smoke", "Smoke", "Smoking status", LifestyleHabits),
        FieldDescriptor::new("hearing", "Hearing", "Hearing condition", MedicalHistory),
        FieldDescriptor::new("tinnitus", "Tinnitus", "Tinnitus", MedicalHistory),
        FieldDescriptor::new("tg", "TG", "Triglycerides", MedicalHistory),
        FieldDescriptor::new("cho", "CHO", "Total cholesterol", MedicalHistory),
        FieldDescriptor::new("hbp", "HBP", "High blood pressure", ClinicalTestResults),
        FieldDescriptor::new("glu", "GLU", "Blood glucose", ClinicalTestResults),
        FieldDescriptor::new("drink", "Drink", "Alcohol consumption", ClinicalTestResults),
        FieldDescriptor::new("bmi", "BMI_rank", "BMI group", ClinicalTestResults),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_bijective() {
        let standard = FieldCatalog::standard();
        let checked = FieldCatalog::new(standard.fields().to_vec()).expect("standard is valid");
        assert_eq!(checked.len(), 15);
        assert_eq!(
            standard.steps(),
            FormStep::ordered().to_vec(),
            "every step owns at least one field"
        );
    }

    #[test]
    fn standard_catalog_keeps_explicit_id_mapping() {
        let catalog = FieldCatalog::standard();
        let bmi = catalog
            .descriptor(&FieldId::new("bmi"))
            .expect("bmi field present");
        assert_eq!(bmi.feature, FeatureName::new("BMI_rank"));
        assert_eq!(bmi.step, FormStep::ClinicalTestResults);

        let education = catalog
            .descriptor_for_feature(&FeatureName::new("Education"))
            .expect("education bound");
        assert_eq!(education.id, FieldId::new("Education"));
        assert_eq!(catalog.fields_for_step(FormStep::LifestyleHabits).len(), 3);
    }

    #[test]
    fn rejects_duplicate_ids_and_features() {
        let duplicate_id = FieldCatalog::new(vec![
            FieldDescriptor::new("a", "A", "A", FormStep::BasicInformation),
            FieldDescriptor::new("a", "B", "B", FormStep::BasicInformation),
        ]);
        assert_eq!(
            duplicate_id.unwrap_err(),
            CatalogError::DuplicateFieldId(FieldId::new("a"))
        );

        let duplicate_feature = FieldCatalog::new(vec![
            FieldDescriptor::new("a", "A", "A", FormStep::BasicInformation),
            FieldDescriptor::new("b", "A", "B", FormStep::BasicInformation),
        ]);
        assert_eq!(
            duplicate_feature.unwrap_err(),
            CatalogError::DuplicateFeature(FeatureName::new("A"))
        );

        assert_eq!(FieldCatalog::new(Vec::new()).unwrap_err(), CatalogError::Empty);
    }
}
