//! # Signal Extractor
//!
//! Filters a flat telemetry map down to the whitelisted source keys and
//! renames them to their canonical labels.
//!
//! Keys with no table entry are dropped silently.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::labels::{CanonicalLabel, Dialect};
use super::FlatMap;

/// Telemetry signals keyed by canonical label, iterated in table order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilteredMap {
    entries: BTreeMap<CanonicalLabel, Value>,
}

impl FilteredMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a signal, returning the previous value for the label
    pub fn insert(&mut self, label: CanonicalLabel, value: Value) -> Option<Value> {
        self.entries.insert(label, value)
    }

    pub fn get(&self, label: CanonicalLabel) -> Option<&Value> {
        self.entries.get(&label)
    }

    pub fn contains(&self, label: CanonicalLabel) -> bool {
        self.entries.contains_key(&label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels present, in table order
    pub fn labels(&self) -> impl Iterator<Item = CanonicalLabel> + '_ {
        self.entries.keys().copied()
    }

    /// Dialects contributing at least one label, in table order
    pub fn dialects(&self) -> Vec<Dialect> {
        let mut dialects = Vec::new();
        for label in self.labels() {
            let dialect = label.dialect();
            if !dialects.contains(&dialect) {
                dialects.push(dialect);
            }
        }
        dialects
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalLabel, &Value)> {
        self.entries.iter().map(|(label, value)| (*label, value))
    }
}

impl FromIterator<(CanonicalLabel, Value)> for FilteredMap {
    fn from_iter<I: IntoIterator<Item = (CanonicalLabel, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Extract whitelisted signals from a flat map
///
/// # Arguments
///
/// * `flat` - Output of [`flatten`](super::flatten::flatten)
///
/// # Returns
///
/// * `FilteredMap` - Only labels whose source key was present
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uav_log_analyst::telemetry::filter::filter;
/// use uav_log_analyst::telemetry::labels::CanonicalLabel;
/// use uav_log_analyst::telemetry::FlatMap;
///
/// let mut flat = FlatMap::new();
/// flat.insert("STAT.BTemp".to_string(), json!([30, 35, 40]));
/// flat.insert("STAT.Armed".to_string(), json!([1]));
///
/// let filtered = filter(&flat);
/// assert_eq!(filtered.len(), 1);
/// assert_eq!(filtered.get(CanonicalLabel::BatteryTemp), Some(&json!([30, 35, 40])));
/// ```
pub fn filter(flat: &FlatMap) -> FilteredMap {
    let filtered: FilteredMap = CanonicalLabel::ALL
        .into_iter()
        .filter_map(|label| flat.get(label.source_key()).map(|value| (label, value.clone())))
        .collect();

    debug!(
        "Extracted {} of {} flat keys as canonical signals",
        filtered.len(),
        flat.len()
    );
    filtered
}
