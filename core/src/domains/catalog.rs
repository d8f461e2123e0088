// Workspace catalogues: every release, group and test known to Argus
//
// The endpoints return full lists, so the snapshot is replaced wholesale and
// entries are keyed by their `id`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::{kind_of, object_entries, PollDomain};
use crate::envelope::ApiRequest;
use crate::schedule::SchedulePolicy;
use crate::snapshot::UpdateMode;
use crate::{ArgusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Releases,
    Groups,
    Tests,
}

#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    kind: CatalogKind,
}

impl Catalog {
    pub fn new(kind: CatalogKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }
}

fn entry_key(item: &Value) -> Option<String> {
    ["id", "name"]
        .iter()
        .find_map(|field| match item.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

impl PollDomain for Catalog {
    type Key = ();

    fn name(&self) -> &'static str {
        match self.kind {
            CatalogKind::Releases => "ReleaseCatalog",
            CatalogKind::Groups => "GroupCatalog",
            CatalogKind::Tests => "TestCatalog",
        }
    }

    fn subject(&self) -> &'static str {
        match self.kind {
            CatalogKind::Releases => "releases",
            CatalogKind::Groups => "groups",
            CatalogKind::Tests => "tests",
        }
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::new().periodic(Some(Duration::ZERO), Duration::from_secs(120))
    }

    fn build_requests(&self, _keys: &[()]) -> Vec<ApiRequest> {
        vec![ApiRequest::get(format!("/api/v1/{}", self.subject()))]
    }

    fn extract(&self, payload: Value) -> Result<BTreeMap<String, Value>> {
        match payload {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| match entry_key(&item) {
                    Some(key) => Some((key, item)),
                    None => {
                        warn!(target: "store", store = self.name(), item = %item, "Skipping catalogue entry without id");
                        None
                    }
                })
                .collect()),
            Value::Object(_) => object_entries(payload),
            other => Err(ArgusError::MalformedResponse(format!(
                "expected {} list, got {}",
                self.subject(),
                kind_of(&other)
            ))),
        }
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Replace
    }
}
