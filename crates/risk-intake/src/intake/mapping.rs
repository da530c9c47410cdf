use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::fields::{FeatureName, FieldCatalog};

/// Raw-answer to numeric-code table for a single feature.
pub type ValueCodes = BTreeMap<String, f64>;

/// Feature order and per-feature encodings loaded from `mappings.json`.
///
/// The table is read-only once built; the order of `feature_order` is the
/// only source of truth for vector positions handed to the scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingTable {
    feature_order: Vec<FeatureName>,
    mappings: HashMap<FeatureName, ValueCodes>,
}

#[derive(Debug, thiserror::Error)]
pub enum MappingTableError {
    #[error("mapping payload is missing the `{0}` key")]
    MissingKey(&'static str),
    #[error("feature `{0}` appears more than once in feature_order")]
    DuplicateFeature(FeatureName),
    #[error("mapping payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawMappingTable {
    #[serde(default)]
    feature_order: Option<Vec<FeatureName>>,
    #[serde(default)]
    mappings: Option<HashMap<FeatureName, ValueCodes>>,
}

impl MappingTable {
    pub fn new(
        feature_order: Vec<FeatureName>,
        mappings: HashMap<FeatureName, ValueCodes>,
    ) -> Result<Self, MappingTableError> {
        let mut seen = HashSet::with_capacity(feature_order.len());
        for feature in &feature_order {
            if !seen.insert(feature) {
                return Err(MappingTableError::DuplicateFeature(feature.clone()));
            }
        }

        Ok(Self {
            feature_order,
            mappings,
        })
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self, MappingTableError> {
        let raw: RawMappingTable = serde_json::from_slice(payload)?;
        let feature_order = raw
            .feature_order
            .ok_or(MappingTableError::MissingKey("feature_order"))?;
        let mappings = raw
            .mappings
            .ok_or(MappingTableError::MissingKey("mappings"))?;
        Self::new(feature_order, mappings)
    }

    pub fn feature_order(&self) -> &[FeatureName] {
        &self.feature_order
    }

    pub fn len(&self) -> usize {
        self.feature_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_order.is_empty()
    }

    pub fn codes_for(&self, feature: &FeatureName) -> Option<&ValueCodes> {
        self.mappings.get(feature)
    }

    /// Raw answers accepted for a feature, sorted.
    pub fn options_for(&self, feature: &FeatureName) -> Option<Vec<&str>> {
        self.codes_for(feature)
            .map(|codes| codes.keys().map(String::as_str).collect())
    }

    /// Cross-checks the table against the static field catalog.
    pub fn audit(&self, catalog: &FieldCatalog) -> SchemaAudit {
        let missing_mappings = self
            .feature_order
            .iter()
            .filter(|feature| !self.mappings.contains_key(*feature))
            .cloned()
            .collect();
        let uncovered_features = self
            .feature_order
            .iter()
            .filter(|feature| catalog.descriptor_for_feature(feature).is_none())
            .cloned()
            .collect();
        let unordered_fields = catalog
            .fields()
            .iter()
            .filter(|field| !self.feature_order.contains(&field.feature))
            .map(|field| field.feature.clone())
            .collect();

        SchemaAudit {
            missing_mappings,
            uncovered_features,
            unordered_fields,
        }
    }
}

/// Schema drift between a loaded table and the field catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaAudit {
    /// Ordered features with no entry under `mappings`.
    pub missing_mappings: Vec<FeatureName>,
    /// Ordered features that no form field supplies.
    pub uncovered_features: Vec<FeatureName>,
    /// Catalog features the scorer will never see.
    pub unordered_fields: Vec<FeatureName>,
}

impl SchemaAudit {
    pub fn is_clean(&self) -> bool {
        self.missing_mappings.is_empty()
            && self.uncovered_features.is_empty()
            && self.unordered_fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::fields::{FieldDescriptor, FormStep};

    const SAMPLE: &str = r#"{
        "feature_order": ["A", "B"],
        "mappings": {
            "A": { "x": 1, "y": 0 },
            "B": { "lo": 0, "hi": 1.5 }
        }
    }"#;

    #[test]
    fn parses_order_and_codes() {
        let table = MappingTable::from_slice(SAMPLE.as_bytes()).expect("valid payload");
        assert_eq!(
            table.feature_order(),
            &[FeatureName::new("A"), FeatureName::new("B")]
        );
        let b = table.codes_for(&FeatureName::new("B")).expect("B codes");
        assert_eq!(b.get("hi"), Some(&1.5));
        assert_eq!(
            table.options_for(&FeatureName::new("A")),
            Some(vec!["x", "y"])
        );
    }

    #[test]
    fn missing_keys_are_reported_by_name() {
        let err = MappingTable::from_slice(br#"{"mappings": {}}"#).expect_err("no order");
        assert!(matches!(err, MappingTableError::MissingKey("feature_order")));

        let err = MappingTable::from_slice(br#"{"feature_order": []}"#).expect_err("no mappings");
        assert!(matches!(err, MappingTableError::MissingKey("mappings")));
    }

    #[test]
    fn rejects_non_numeric_codes_and_duplicates() {
        let err = MappingTable::from_slice(
            br#"{"feature_order": ["A"], "mappings": {"A": {"x": "one"}}}"#,
        )
        .expect_err("string code");
        assert!(matches!(err, MappingTableError::Json(_)));

        let err = MappingTable::from_slice(br#"{"feature_order": ["A", "A"], "mappings": {}}"#)
            .expect_err("duplicate order");
        assert!(matches!(err, MappingTableError::DuplicateFeature(name) if name.as_str() == "A"));
    }

    #[test]
    fn table_without_every_mapping_still_loads() {
        let table = MappingTable::from_slice(br#"{"feature_order": ["A", "C"], "mappings": {"A": {"x": 1}}}"#)
            .expect("partial mappings load");
        assert!(table.codes_for(&FeatureName::new("C")).is_none());
    }

    #[test]
    fn audit_reports_schema_drift() {
        let table = MappingTable::from_slice(
            br#"{"feature_order": ["A", "C"], "mappings": {"A": {"x": 1}}}"#,
        )
        .expect("loads");
        let catalog = FieldCatalog::new(vec![
            FieldDescriptor::new("a", "A", "A", FormStep::BasicInformation),
            FieldDescriptor::new("b", "B", "B", FormStep::BasicInformation),
        ])
        .expect("catalog");

        let audit = table.audit(&catalog);
        assert!(!audit.is_clean());
        assert_eq!(audit.missing_mappings, vec![FeatureName::new("C")]);
        assert_eq!(audit.uncovered_features, vec![FeatureName::new("C")]);
        assert_eq!(audit.unordered_fields, vec![FeatureName::new("B")]);
    }
}
