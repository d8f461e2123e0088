use std::time::Duration;

use super::PollDomain;
use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;

/// User list keyed by user id; needs no interest keys
#[derive(Debug, Clone, Copy, Default)]
pub struct Users;

impl PollDomain for Users {
    type Key = ();

    fn name(&self) -> &'static str {
        "UserStore"
    }

    fn subject(&self) -> &'static str {
        "users"
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::new().periodic(Some(Duration::from_millis(400)), Duration::from_secs(300))
    }

    fn build_requests(&self, _keys: &[()]) -> Vec<ApiRequest> {
        vec![ApiRequest::get("/api/v1/users")]
    }
}
