// Dashboard statistics: releases, their groups and tests in one POST
use std::collections::BTreeMap;
use std::time::Duration;

use super::{releases_to_value, InterestKey, PollDomain, ReleaseBody};
use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;

pub const RELEASE_BURST_THRESHOLD: u32 = 5;
pub const GROUP_BURST_THRESHOLD: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatsKey {
    Release(String),
    Group { release: String, group: String },
    Test { release: String, group: String, test: String },
}

impl StatsKey {
    pub fn release(release: impl Into<String>) -> Self {
        Self::Release(release.into())
    }

    pub fn group(release: impl Into<String>, group: impl Into<String>) -> Self {
        Self::Group {
            release: release.into(),
            group: group.into(),
        }
    }

    pub fn test(
        release: impl Into<String>,
        group: impl Into<String>,
        test: impl Into<String>,
    ) -> Self {
        Self::Test {
            release: release.into(),
            group: group.into(),
            test: test.into(),
        }
    }

    pub fn release_name(&self) -> &str {
        match self {
            Self::Release(r) => r,
            Self::Group { release, .. } | Self::Test { release, .. } => release,
        }
    }
}

impl InterestKey for StatsKey {
    fn burst_class(&self) -> Option<&'static str> {
        match self {
            Self::Release(_) => Some("release"),
            Self::Group { .. } => Some("group"),
            Self::Test { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardStats;

impl PollDomain for DashboardStats {
    type Key = StatsKey;

    fn name(&self) -> &'static str {
        "StatsStore"
    }

    fn subject(&self) -> &'static str {
        "stats"
    }

    fn policy(&self) -> SchedulePolicy {
        let burst_delay = Duration::from_millis(200);
        SchedulePolicy::new()
            .burst("release", RELEASE_BURST_THRESHOLD, burst_delay)
            .burst("group", GROUP_BURST_THRESHOLD, burst_delay)
            .periodic(Some(Duration::from_millis(200)), Duration::from_secs(20))
    }

    fn build_requests(&self, keys: &[StatsKey]) -> Vec<ApiRequest> {
        let mut body: BTreeMap<String, ReleaseBody> = BTreeMap::new();
        for key in keys {
            let release = body.entry(key.release_name().to_string()).or_default();
            match key {
                StatsKey::Release(_) => {}
                StatsKey::Group { group, .. } => release.add_group(group),
                StatsKey::Test { test, .. } => release.add_test(test),
            }
        }
        vec![ApiRequest::post("/api/v1/stats", releases_to_value(body))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_groups_keys_by_release() {
        let keys = vec![
            StatsKey::release("5.2"),
            StatsKey::group("5.2", "longevity"),
            StatsKey::test("5.2", "longevity", "longevity-100gb-4h"),
            StatsKey::group("master", "artifacts"),
        ];
        let reqs = DashboardStats.build_requests(&keys);

        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].path, "/api/v1/stats");
        assert_eq!(
            reqs[0].body,
            Some(json!({
                "5.2": {"groups": ["longevity"], "tests": ["longevity-100gb-4h"]},
                "master": {"groups": ["artifacts"], "tests": []},
            }))
        );
    }

    #[test]
    fn test_burst_classes() {
        assert_eq!(StatsKey::release("a").burst_class(), Some("release"));
        assert_eq!(StatsKey::group("a", "b").burst_class(), Some("group"));
        assert_eq!(StatsKey::test("a", "b", "c").burst_class(), None);
    }
}
