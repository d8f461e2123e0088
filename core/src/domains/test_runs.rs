// Test run polling
//
// `TestRuns` batches the latest runs of many tests (plus pinned extra runs)
// into one POST. `SingleTestRun` keeps individual run ids fresh with a GET.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};

use super::{InterestKey, PollDomain};
use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;

pub const DEFAULT_RUN_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestRunsKey {
    pub test_id: String,
    /// Extra run ids to include beyond the latest `limit`
    pub additional_runs: Vec<String>,
}

impl TestRunsKey {
    pub fn new(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            additional_runs: Vec::new(),
        }
    }

    pub fn with_runs<I, S>(test_id: impl Into<String>, runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut additional_runs: Vec<String> = runs.into_iter().map(Into::into).collect();
        additional_runs.sort();
        additional_runs.dedup();
        Self {
            test_id: test_id.into(),
            additional_runs,
        }
    }
}

impl InterestKey for TestRunsKey {}

#[derive(Debug, Clone, Copy)]
pub struct TestRuns {
    pub limit: u32,
}

impl Default for TestRuns {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RUN_LIMIT,
        }
    }
}

impl PollDomain for TestRuns {
    type Key = TestRunsKey;

    fn name(&self) -> &'static str {
        "TestRunsStore"
    }

    fn subject(&self) -> &'static str {
        "test runs"
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::new()
            .periodic(None, Duration::from_secs(20))
            .refresh_delay(Duration::from_millis(150))
    }

    fn build_requests(&self, keys: &[TestRunsKey]) -> Vec<ApiRequest> {
        // Two keys for one test merge their pinned runs
        let mut runs: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for key in keys {
            let extra = runs.entry(key.test_id.as_str()).or_default();
            for run in &key.additional_runs {
                if !extra.contains(&run.as_str()) {
                    extra.push(run.as_str());
                }
            }
        }
        vec![ApiRequest::post(
            "/api/v1/test_runs/poll",
            json!({
                "limit": self.limit,
                "runs": runs,
            }),
        )]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTestRun;

impl PollDomain for SingleTestRun {
    type Key = String;

    fn name(&self) -> &'static str {
        "TestRunStore"
    }

    fn subject(&self) -> &'static str {
        "test run"
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::new().periodic(Some(Duration::from_secs(10)), Duration::from_secs(120))
    }

    fn build_requests(&self, keys: &[String]) -> Vec<ApiRequest> {
        vec![ApiRequest::get("/api/v1/test_run/poll").with_query("runs", keys.join(","))]
    }
}

/// Runs of `test_id` in a test-runs snapshot entry
pub fn runs_of<'a>(snapshot: &'a crate::Snapshot, test_id: &str) -> &'a [Value] {
    snapshot
        .get(test_id)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_body_merges_pinned_runs() {
        let keys = vec![
            TestRunsKey::new("t1"),
            TestRunsKey::with_runs("t1", ["r9"]),
            TestRunsKey::with_runs("t2", ["r2", "r1", "r2"]),
        ];
        let reqs = TestRuns::default().build_requests(&keys);

        assert_eq!(reqs.len(), 1);
        assert_eq!(
            reqs[0].body,
            Some(json!({
                "limit": 10,
                "runs": {"t1": ["r9"], "t2": ["r1", "r2"]},
            }))
        );
    }

    #[test]
    fn test_single_run_query() {
        let reqs = SingleTestRun.build_requests(&["a".to_string(), "b".to_string()]);
        assert_eq!(reqs[0].query, vec![("runs".to_string(), "a,b".to_string())]);
    }

    #[test]
    fn test_runs_of() {
        let mut snap = crate::Snapshot::new();
        snap.merge(
            [("t1".to_string(), json!([{"id": "r1"}]))]
                .into_iter()
                .collect(),
        );
        assert_eq!(runs_of(&snap, "t1").len(), 1);
        assert!(runs_of(&snap, "t2").is_empty());
    }
}
