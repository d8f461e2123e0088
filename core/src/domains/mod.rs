// Data domains polled by the Argus front-end
//
// A domain tells the generic store engine what its interest keys look like,
// how to turn the ledger into request(s), and how to read the payload back.

pub mod assignees;
pub mod catalog;
pub mod release_stats;
pub mod stats;
pub mod test_runs;
pub mod users;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde_json::Value;

use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;
use crate::snapshot::UpdateMode;
use crate::{ArgusError, Result};

/// Identifier for a unit of data a subscriber wants kept fresh
pub trait InterestKey: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {
    /// Counter bumped by this key in burst-threshold scheduling
    fn burst_class(&self) -> Option<&'static str> {
        None
    }
}

impl InterestKey for () {}
impl InterestKey for String {}

/// Domain plugged into `Store`
pub trait PollDomain: Send + Sync + 'static {
    type Key: InterestKey;

    /// Store name used in logs and alert sources, e.g. `AssigneeStore`
    fn name(&self) -> &'static str;

    /// Human name of the data, used in alert text ("refreshing <subject>")
    fn subject(&self) -> &'static str;

    fn policy(&self) -> SchedulePolicy;

    /// Request(s) covering every key in the ledger
    fn build_requests(&self, keys: &[Self::Key]) -> Vec<ApiRequest>;

    /// Turn an `ok` payload into top-level snapshot entries
    fn extract(&self, payload: Value) -> Result<BTreeMap<String, Value>> {
        object_entries(payload)
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Merge
    }
}

/// Entries of a JSON object payload
pub fn object_entries(payload: Value) -> Result<BTreeMap<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(ArgusError::MalformedResponse(format!(
            "expected object payload, got {}",
            kind_of(&other)
        ))),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Per-release body with deduplicated `groups` and `tests` lists
#[derive(Debug, Default)]
pub(crate) struct ReleaseBody {
    pub groups: Vec<String>,
    pub tests: Vec<String>,
}

impl ReleaseBody {
    pub fn add_group(&mut self, group: &str) {
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
    }

    pub fn add_test(&mut self, test: &str) {
        if !self.tests.iter().any(|t| t == test) {
            self.tests.push(test.to_string());
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "groups": self.groups,
            "tests": self.tests,
        })
    }
}

pub(crate) fn releases_to_value(body: BTreeMap<String, ReleaseBody>) -> Value {
    Value::Object(
        body.into_iter()
            .map(|(release, b)| (release, b.to_value()))
            .collect(),
    )
}
