// Today's schedule assignees for release groups and tests
use std::collections::BTreeMap;
use std::time::Duration;

use super::{releases_to_value, InterestKey, PollDomain, ReleaseBody};
use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssigneeKey {
    Group { release: String, group: String },
    /// Tests are addressed by build system id
    Test { release: String, test: String },
}

impl AssigneeKey {
    pub fn group(release: impl Into<String>, group: impl Into<String>) -> Self {
        Self::Group {
            release: release.into(),
            group: group.into(),
        }
    }

    pub fn test(release: impl Into<String>, test: impl Into<String>) -> Self {
        Self::Test {
            release: release.into(),
            test: test.into(),
        }
    }
}

impl InterestKey for AssigneeKey {}

#[derive(Debug, Clone, Copy, Default)]
pub struct Assignees;

impl PollDomain for Assignees {
    type Key = AssigneeKey;

    fn name(&self) -> &'static str {
        "AssigneeStore"
    }

    fn subject(&self) -> &'static str {
        "assignees"
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::new()
            .debounce(Duration::from_millis(250))
            .periodic(None, Duration::from_secs(120))
    }

    fn build_requests(&self, keys: &[AssigneeKey]) -> Vec<ApiRequest> {
        let mut body: BTreeMap<String, ReleaseBody> = BTreeMap::new();
        for key in keys {
            match key {
                AssigneeKey::Group { release, group } => {
                    body.entry(release.clone()).or_default().add_group(group)
                }
                AssigneeKey::Test { release, test } => {
                    body.entry(release.clone()).or_default().add_test(test)
                }
            }
        }
        vec![ApiRequest::post(
            "/api/v1/release/schedules/today/assignees",
            releases_to_value(body),
        )]
    }
}
