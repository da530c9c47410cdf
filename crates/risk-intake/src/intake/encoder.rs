use serde::Serialize;

use super::fields::FeatureName;
use super::mapping::MappingTable;
use super::snapshot::FormSnapshot;

/// Positional scorer input; element `i` belongs to `feature_order[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EncodedVector(Vec<f64>);

impl EncodedVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("no answer supplied for feature `{0}`")]
    MissingValue(FeatureName),
    #[error("mapping table has no encodings for feature `{0}`")]
    MissingMapping(FeatureName),
    #[error("answer `{value}` has no encoding for feature `{feature}`")]
    UnmappedValue { feature: FeatureName, value: String },
    #[error("encoded {actual} values but the table orders {expected} features")]
    LengthMismatch { expected: usize, actual: usize },
}

impl EncodingError {
    /// Schema defects point at the deployed table, not at the user's answers.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            EncodingError::MissingMapping(_) | EncodingError::LengthMismatch { .. }
        )
    }
}

pub fn encode(snapshot: &FormSnapshot, table: &MappingTable) -> Result<EncodedVector, EncodingError> {
    let mut values = Vec::with_capacity(table.len());

    for feature in table.feature_order() {
        let raw = snapshot
            .answer(feature)
            .ok_or_else(|| EncodingError::MissingValue(feature.clone()))?;
        let codes = table
            .codes_for(feature)
            .ok_or_else(|| EncodingError::MissingMapping(feature.clone()))?;
        let code = codes
            .get(raw)
            .ok_or_else(|| EncodingError::UnmappedValue {
                feature: feature.clone(),
                value: raw.to_string(),
            })?;
        values.push(*code);
    }

    if values.len() != table.len() {
        return Err(EncodingError::LengthMismatch {
            expected: table.len(),
            actual: values.len(),
        });
    }

    Ok(EncodedVector(values))
}
