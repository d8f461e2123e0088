// Argus Core Library
// Client-side polling, request coalescing and snapshot cache for the Argus dashboard

pub mod alerts;
pub mod config;
pub mod domains;
pub mod envelope;
pub mod ledger;
pub mod schedule;
pub mod snapshot;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

// Export core types
pub use alerts::{Alert, AlertHub, AlertKind};
pub use config::{ArgusConfig, StoreOverrides};
pub use domains::{InterestKey, PollDomain};
pub use envelope::{ApiEnvelope, ApiErrorBody, ApiRequest, ApiStatus, HttpMethod};
pub use ledger::RequestLedger;
pub use schedule::{
    BurstPolicy, Controller, DebounceMode, DebouncePolicy, FireReason, PeriodicPolicy,
    SchedulePolicy,
};
pub use snapshot::{Snapshot, UpdateMode};
pub use store::{
    FetchOutcome, InterestGuard, Store, StoreBuilder, StoreState, StoreStats, Subscription,
};
pub use transport::{HttpTransport, Transport};

use domains::{
    assignees::Assignees,
    catalog::{Catalog, CatalogKind},
    release_stats::ReleaseStats,
    stats::DashboardStats,
    test_runs::{SingleTestRun, TestRuns},
    users::Users,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgusError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    #[error("API error {exception}: {message}")]
    Api { exception: String, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ArgusError {
    fn from(err: serde_json::Error) -> Self {
        ArgusError::MalformedResponse(err.to_string())
    }
}

impl From<ApiErrorBody> for ArgusError {
    fn from(body: ApiErrorBody) -> Self {
        let message = body.first_argument();
        ArgusError::Api {
            exception: body.exception,
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArgusError>;

/// Application-scoped runtime owning every polling store
///
/// Constructed once per application instance and handed to whatever hosts the
/// views. Tests build a fresh one per case.
pub struct Argus {
    pub config: ArgusConfig,
    pub alerts: AlertHub,
    pub stats: Store<DashboardStats>,
    pub release_stats: Store<ReleaseStats>,
    pub test_runs: Store<TestRuns>,
    pub test_run: Store<SingleTestRun>,
    pub assignees: Store<Assignees>,
    pub users: Store<Users>,
    pub releases: Store<Catalog>,
    pub groups: Store<Catalog>,
    pub tests: Store<Catalog>,
    shutdown: CancellationToken,
}

impl Argus {
    /// Build the runtime with an HTTP transport pointed at `config.base_url`
    pub fn new(config: ArgusConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build the runtime over any transport (used by tests and embedders)
    pub fn with_transport(config: ArgusConfig, transport: Arc<dyn Transport>) -> Self {
        let alerts = AlertHub::new(config.alert_capacity);
        let shutdown = CancellationToken::new();

        let build = |domain_policy: SchedulePolicy, name: &str| -> (SchedulePolicy, bool) {
            (
                config.overrides.apply(name, domain_policy),
                config.teardown_on_idle,
            )
        };

        macro_rules! store {
            ($domain:expr) => {{
                let domain = $domain;
                let (policy, teardown) = build(domain.policy(), domain.name());
                Store::builder(domain, Arc::clone(&transport), alerts.clone())
                    .policy(policy)
                    .teardown_on_idle(teardown)
                    .parent_token(&shutdown)
                    .build()
            }};
        }

        Self {
            stats: store!(DashboardStats),
            release_stats: store!(ReleaseStats),
            test_runs: store!(TestRuns::default()),
            test_run: store!(SingleTestRun),
            assignees: store!(Assignees),
            users: store!(Users),
            releases: store!(Catalog::new(CatalogKind::Releases)),
            groups: store!(Catalog::new(CatalogKind::Groups)),
            tests: store!(Catalog::new(CatalogKind::Tests)),
            alerts,
            config,
            shutdown,
        }
    }

    /// Stop every store's timers; in-flight fetches still land in their snapshots
    pub fn shutdown(&self) {
        tracing::info!("Shutting down Argus stores...");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for Argus {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
