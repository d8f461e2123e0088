// Snapshot cache
//
// Last-known-good view of server data, keyed by top-level identifier
// (release name, run id, user id, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a fetched payload lands in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Shallow merge: payload keys replace their entries, other entries stay
    #[default]
    Merge,
    /// Payload is the full collection; entries it lacks are dropped
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: BTreeMap<String, Value>,
    /// Bumped on every applied update; 0 means never populated
    pub revision: u64,
    /// Timestamp (ISO 8601) of the last applied update
    pub updated_at: Option<String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_populated(&self) -> bool {
        self.revision > 0
    }

    /// Shallow top-level merge; nested values are replaced, never merged
    pub fn merge(&mut self, partial: BTreeMap<String, Value>) {
        self.entries.extend(partial);
        self.touch();
    }

    pub fn replace(&mut self, full: BTreeMap<String, Value>) {
        self.entries = full;
        self.touch();
    }

    pub fn apply(&mut self, mode: UpdateMode, payload: BTreeMap<String, Value>) {
        match mode {
            UpdateMode::Merge => self.merge(payload),
            UpdateMode::Replace => self.replace(payload),
        }
    }

    /// Render the entries as one JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_merge_keeps_unrelated_keys() {
        let mut snap = Snapshot::new();
        snap.merge(map(json!({"A": 1, "B": 2})));
        snap.merge(map(json!({"B": 3, "C": 4})));

        assert_eq!(snap.to_value(), json!({"A": 1, "B": 3, "C": 4}));
        assert_eq!(snap.revision, 2);
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut snap = Snapshot::new();
        snap.merge(map(json!({"5.2": {"total": 10, "passed": 8}})));
        snap.merge(map(json!({"5.2": {"total": 12}})));

        assert_eq!(snap.get("5.2"), Some(&json!({"total": 12})));
    }

    #[test]
    fn test_replace_drops_missing_entries() {
        let mut snap = Snapshot::new();
        snap.apply(UpdateMode::Merge, map(json!({"a": 1, "b": 2})));
        snap.apply(UpdateMode::Replace, map(json!({"b": 5})));

        assert_eq!(snap.to_value(), json!({"b": 5}));
        assert!(snap.is_populated());
        assert!(snap.updated_at.is_some());
    }
}
