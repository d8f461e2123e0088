// Polling store
//
// One generic engine per data domain: request ledger + scheduling controller +
// fetch coordinator + snapshot cache + subscription fan-out.

mod coordinator;
mod driver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::AlertHub;
use crate::domains::{InterestKey, PollDomain};
use crate::ledger::RequestLedger;
use crate::schedule::{Controller, SchedulePolicy};
use crate::snapshot::Snapshot;
use crate::transport::Transport;

pub use coordinator::FetchOutcome;
use driver::ScopedTask;

/// Lifecycle state of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// No subscribers; no timers running
    Inactive,
    Idle,
    Fetching,
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    /// Triggers dropped because a fetch was already in flight
    pub fetches_skipped: u64,
    pub last_error: Option<String>,
    pub last_success_at: Option<String>,
}

struct Activation {
    subscribers: usize,
    driver: Option<ScopedTask>,
}

pub(crate) struct StoreInner<D: PollDomain> {
    domain: D,
    ledger: RequestLedger<D::Key>,
    controller: Arc<Mutex<Controller>>,
    wake: Arc<Notify>,
    transport: Arc<dyn Transport>,
    alerts: AlertHub,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    in_flight: Arc<AtomicBool>,
    activation: Mutex<Activation>,
    stats: Mutex<StoreStats>,
    token: CancellationToken,
    teardown_on_idle: bool,
}

/// Handle to a polling store; cheap to clone and share between views
pub struct Store<D: PollDomain> {
    inner: Arc<StoreInner<D>>,
}

impl<D: PollDomain> Clone for Store<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct StoreBuilder<D: PollDomain> {
    domain: D,
    transport: Arc<dyn Transport>,
    alerts: AlertHub,
    policy: Option<SchedulePolicy>,
    teardown_on_idle: bool,
    token: CancellationToken,
}

impl<D: PollDomain> StoreBuilder<D> {
    /// Override the domain's default schedule
    pub fn policy(mut self, policy: SchedulePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn teardown_on_idle(mut self, enabled: bool) -> Self {
        self.teardown_on_idle = enabled;
        self
    }

    /// Tie the store's lifetime to `parent`; cancelling it disposes the store
    pub fn parent_token(mut self, parent: &CancellationToken) -> Self {
        self.token = parent.child_token();
        self
    }

    pub fn build(self) -> Store<D> {
        let policy = self.policy.unwrap_or_else(|| self.domain.policy());
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::new()));
        Store {
            inner: Arc::new(StoreInner {
                domain: self.domain,
                ledger: RequestLedger::new(),
                controller: Arc::new(Mutex::new(Controller::new(policy))),
                wake: Arc::new(Notify::new()),
                transport: self.transport,
                alerts: self.alerts,
                snapshot_tx,
                in_flight: Arc::new(AtomicBool::new(false)),
                activation: Mutex::new(Activation {
                    subscribers: 0,
                    driver: None,
                }),
                stats: Mutex::new(StoreStats::default()),
                token: self.token,
                teardown_on_idle: self.teardown_on_idle,
            }),
        }
    }
}

impl<D: PollDomain> Store<D> {
    pub fn builder(domain: D, transport: Arc<dyn Transport>, alerts: AlertHub) -> StoreBuilder<D> {
        StoreBuilder {
            domain,
            transport,
            alerts,
            policy: None,
            teardown_on_idle: true,
            token: CancellationToken::new(),
        }
    }

    /// Store with the domain's default schedule
    pub fn new(domain: D, transport: Arc<dyn Transport>, alerts: AlertHub) -> Self {
        Self::builder(domain, transport, alerts).build()
    }

    pub fn domain(&self) -> &D {
        &self.inner.domain
    }

    pub fn name(&self) -> &'static str {
        self.inner.domain.name()
    }

    // ---------------------------------------------------------------
    // Interest ledger
    // ---------------------------------------------------------------

    /// Ask for `key` to be kept fresh; returns true when the key is new
    ///
    /// Every call is a registration event for the scheduler, including repeat
    /// registrations of a key that is already held.
    pub fn register(&self, key: D::Key) -> bool {
        let class = key.burst_class();
        let added = self.inner.ledger.register(key);
        self.inner
            .controller
            .lock()
            .on_registration(class, Instant::now());
        self.inner.wake.notify_one();
        added
    }

    /// Register several keys in call order
    pub fn register_all<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = D::Key>,
    {
        let mut added = 0;
        for key in keys {
            if self.register(key) {
                added += 1;
            }
        }
        added
    }

    /// Release one hold on `key`; the cached snapshot entry is kept
    pub fn unregister(&self, key: &D::Key) -> bool {
        let removed = self.inner.ledger.unregister(key);
        if removed {
            self.on_removal();
        }
        removed
    }

    pub fn forget(&self, key: &D::Key) -> bool {
        let removed = self.inner.ledger.forget(key);
        if removed {
            self.on_removal();
        }
        removed
    }

    pub fn forget_where<F>(&self, pred: F) -> usize
    where
        F: FnMut(&D::Key) -> bool,
    {
        let removed = self.inner.ledger.forget_where(pred);
        if removed > 0 {
            self.on_removal();
        }
        removed
    }

    fn on_removal(&self) {
        self.inner.controller.lock().on_removal(Instant::now());
        self.inner.wake.notify_one();
    }

    /// Current interest keys in request order
    pub fn interest(&self) -> Vec<D::Key> {
        self.inner.ledger.keys()
    }

    /// Register `key` for as long as the returned guard lives
    pub fn hold(&self, key: D::Key) -> InterestGuard<D> {
        self.register(key.clone());
        InterestGuard {
            store: self.clone(),
            key: Some(key),
        }
    }

    // ---------------------------------------------------------------
    // Fetching
    // ---------------------------------------------------------------

    /// Schedule a fetch after the policy's refresh delay
    pub fn request_refresh(&self) {
        self.inner
            .controller
            .lock()
            .on_refresh_request(Instant::now());
        self.inner.wake.notify_one();
    }

    /// Run a fetch now and wait for it; skipped if one is already in flight
    pub async fn refresh_now(&self) -> FetchOutcome {
        match self.inner.try_begin() {
            Some(guard) => self.inner.run_fetch(guard).await,
            None => self.inner.record_skip(),
        }
    }

    // ---------------------------------------------------------------
    // Snapshot & subscriptions
    // ---------------------------------------------------------------

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot updates; the first subscriber arms the timers
    pub fn subscribe(&self) -> Subscription<D> {
        let rx = self.inner.snapshot_tx.subscribe();
        StoreInner::acquire_subscriber(&self.inner);
        Subscription {
            rx,
            store: Arc::clone(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.activation.lock().subscribers
    }

    pub fn state(&self) -> StoreState {
        if self.inner.in_flight.load(Ordering::Acquire) {
            return StoreState::Fetching;
        }
        let activation = self.inner.activation.lock();
        match &activation.driver {
            Some(d) if !d.is_finished() => StoreState::Idle,
            _ => StoreState::Inactive,
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.stats.lock().clone()
    }

    /// Burst counter of `class`, for diagnostics
    pub fn burst_count(&self, class: &str) -> u32 {
        self.inner.controller.lock().burst_count(class)
    }

    /// Stop every timer for good; later subscribers get the cached snapshot only
    pub fn dispose(&self) {
        info!(target: "store", store = self.name(), "Disposing store");
        self.inner.token.cancel();
        let driver = self.inner.activation.lock().driver.take();
        drop(driver);
        self.inner.controller.lock().deactivate();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.token.is_cancelled()
    }
}

impl<D: PollDomain> StoreInner<D> {
    fn acquire_subscriber(this: &Arc<Self>) {
        let mut activation = this.activation.lock();
        activation.subscribers += 1;

        let running = activation
            .driver
            .as_ref()
            .is_some_and(|d| !d.is_finished());
        if running || this.token.is_cancelled() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(target: "store", store = this.domain.name(), "No tokio runtime; store stays inactive");
            return;
        }

        let token = this.token.child_token();
        let fut = driver::drive(
            Arc::downgrade(this),
            Arc::clone(&this.controller),
            Arc::clone(&this.wake),
            token.clone(),
            this.domain.name(),
        );
        activation.driver = Some(ScopedTask::spawn(token, fut));
        info!(target: "store", store = this.domain.name(), "Store activated");
    }

    fn release_subscriber(&self) {
        let mut activation = self.activation.lock();
        activation.subscribers = activation.subscribers.saturating_sub(1);
        if activation.subscribers > 0 || !self.teardown_on_idle {
            return;
        }
        if let Some(driver) = activation.driver.take() {
            drop(driver);
            self.controller.lock().deactivate();
            info!(target: "store", store = self.domain.name(), "Last subscriber left; timers stopped");
        }
    }

    fn record_skip(&self) -> FetchOutcome {
        self.stats.lock().fetches_skipped += 1;
        debug!(target: "store", store = self.domain.name(), "Fetch already in flight; trigger dropped");
        FetchOutcome::Skipped
    }
}

/// Live view of a store's snapshot; dropping it unsubscribes
pub struct Subscription<D: PollDomain> {
    rx: watch::Receiver<Arc<Snapshot>>,
    store: Arc<StoreInner<D>>,
}

impl<D: PollDomain> Subscription<D> {
    /// Snapshot as of now, available immediately on subscribe
    pub fn current(&self) -> Arc<Snapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the next applied update
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn store_name(&self) -> &'static str {
        self.store.domain.name()
    }
}

impl<D: PollDomain> Drop for Subscription<D> {
    fn drop(&mut self) {
        self.store.release_subscriber();
    }
}

/// Interest held for a view's lifetime
pub struct InterestGuard<D: PollDomain> {
    store: Store<D>,
    key: Option<D::Key>,
}

impl<D: PollDomain> InterestGuard<D> {
    pub fn key(&self) -> Option<&D::Key> {
        self.key.as_ref()
    }
}

impl<D: PollDomain> Drop for InterestGuard<D> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.store.unregister(&key);
        }
    }
}
