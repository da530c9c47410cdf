use std::collections::HashMap;

use super::fields::{FeatureName, FieldCatalog};
use super::ui::FormReader;

/// Answers keyed by feature, read from the form for a single attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    answers: HashMap<FeatureName, String>,
}

impl FormSnapshot {
    /// Reads every catalog field once. Fields the reader does not know are left absent.
    pub fn capture<R>(reader: &R, catalog: &FieldCatalog) -> Self
    where
        R: FormReader + ?Sized,
    {
        let answers = catalog
            .fields()
            .iter()
            .filter_map(|field| {
                reader
                    .read(&field.id)
                    .map(|value| (field.feature.clone(), value))
            })
            .collect();
        Self { answers }
    }

    pub fn from_answers<I, K, V>(answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|(feature, value)| (FeatureName::new(feature), value.into()))
                .collect(),
        }
    }

    pub fn answer(&self, feature: &FeatureName) -> Option<&str> {
        self.answers.get(feature).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
