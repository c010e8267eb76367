//! Post-execution extraction pass
//!
//! A recipe that wants values back seeds its correlation id into the case
//! property bag under [`EXTRACTOR_DATA_KEY`] and writes extracted values
//! under keys containing that id. After execution the matching case is
//! found, registered keys are turned into [`ExtractedValue`] commands, and
//! every key carrying the id is pruned from the report.

use std::collections::BTreeMap;

use crate::model::ProjectResultReport;

/// Reserved property holding the correlation id
pub const EXTRACTOR_DATA_KEY: &str = "extractorDataId";

/// Pending extraction: correlation id plus property key -> operator target
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractionRequest {
    pub id: String,
    pub operators: BTreeMap<String, String>,
}

impl ExtractionRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operators: BTreeMap::new(),
        }
    }

    pub fn with_operator(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.operators.insert(key.into(), target.into());
        self
    }
}

/// One value for the caller to apply to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedValue {
    pub correlation_id: String,
    pub key: String,
    pub target: String,
    pub value: String,
}

/// Commands produced by one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedValues {
    values: Vec<ExtractedValue>,
}

impl ExtractedValues {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedValue> {
        self.values.iter()
    }

    /// Value extracted for an operator target
    pub fn get(&self, target: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.target == target)
            .map(|v| v.value.as_str())
    }

    /// Hand every command to `apply` in key order
    pub fn apply<F>(&self, mut apply: F)
    where
        F: FnMut(&ExtractedValue),
    {
        for value in &self.values {
            apply(value);
        }
    }

    /// Target -> value
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values
            .into_iter()
            .map(|v| (v.target, v.value))
            .collect()
    }
}

impl IntoIterator for ExtractedValues {
    type Item = ExtractedValue;
    type IntoIter = std::vec::IntoIter<ExtractedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Correlate the report with pending requests and prune bookkeeping keys
///
/// Only the first case whose correlation key names a pending request is
/// touched. With no match the report is left as it was.
pub fn run_extractors(
    report: &mut ProjectResultReport,
    pending: &[ExtractionRequest],
) -> ExtractedValues {
    let mut extracted = ExtractedValues::default();
    if pending.iter().all(|r| r.id.is_empty()) {
        return extracted;
    }

    let matched = report.case_reports_mut().find_map(|case| {
        let request = {
            let id = case.properties.get(EXTRACTOR_DATA_KEY)?;
            pending.iter().find(|r| !r.id.is_empty() && &r.id == id)?
        };
        Some((case, request))
    });

    let Some((case, request)) = matched else {
        tracing::debug!("No test case carries a pending extraction id");
        return extracted;
    };

    let mut keys: Vec<&String> = case.properties.keys().collect();
    keys.sort_unstable();
    for key in keys {
        if let Some(target) = request.operators.get(key) {
            extracted.values.push(ExtractedValue {
                correlation_id: request.id.clone(),
                key: key.clone(),
                target: target.clone(),
                value: case.properties[key].clone(),
            });
        }
    }

    let before = case.properties.len();
    case.properties.retain(|key, _| !key.contains(request.id.as_str()));
    case.properties.remove(EXTRACTOR_DATA_KEY);
    tracing::debug!(
        id = %request.id,
        extracted = extracted.len(),
        pruned = before - case.properties.len(),
        "Extraction pass complete"
    );

    extracted
}
