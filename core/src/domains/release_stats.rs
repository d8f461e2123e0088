// Per-release statistics (release page widgets)
//
// The endpoint answers one release at a time, so a fetch issues one GET per
// ledger key. Results land under `response.releases`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use super::{kind_of, object_entries, InterestKey, PollDomain};
use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;
use crate::{ArgusError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseStatsKey {
    pub release: String,
    /// Ask the backend for a reduced payload
    pub limited: bool,
    /// Bypass the backend's stats cache
    pub force: bool,
}

impl ReleaseStatsKey {
    pub fn new(release: impl Into<String>, limited: bool, force: bool) -> Self {
        Self {
            release: release.into(),
            limited,
            force,
        }
    }
}

impl InterestKey for ReleaseStatsKey {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseStats;

fn flag(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

impl PollDomain for ReleaseStats {
    type Key = ReleaseStatsKey;

    fn name(&self) -> &'static str {
        "ReleaseStatsStore"
    }

    fn subject(&self) -> &'static str {
        "release stats"
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::new()
            .debounce(Duration::from_millis(50))
            .periodic(Some(Duration::from_secs(1)), Duration::from_secs(60))
    }

    fn build_requests(&self, keys: &[ReleaseStatsKey]) -> Vec<ApiRequest> {
        keys.iter()
            .map(|k| {
                ApiRequest::get("/api/v1/release/stats")
                    .with_query("release", k.release.clone())
                    .with_query("limited", flag(k.limited))
                    .with_query("force", flag(k.force))
            })
            .collect()
    }

    fn extract(&self, payload: Value) -> Result<BTreeMap<String, Value>> {
        match payload {
            Value::Object(mut map) => match map.remove("releases") {
                Some(releases) => object_entries(releases),
                None => Ok(BTreeMap::new()),
            },
            other => Err(ArgusError::MalformedResponse(format!(
                "expected release stats object, got {}",
                kind_of(&other)
            ))),
        }
    }
}
