// Fetch coordinator
//
// At most one fetch per store is in flight. The ledger is read when the fetch
// starts, not when it was scheduled. Failures raise one alert each and leave
// the snapshot untouched; the next tick is the retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::StoreInner;
use crate::domains::PollDomain;
use crate::schedule::FireReason;
use crate::snapshot::Snapshot;
use crate::ArgusError;

/// Result of one fetch cycle
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// At least one response was merged; `revision` is the snapshot after it
    Updated { revision: u64 },
    /// Every request of the cycle failed; the snapshot is unchanged
    Failed(ArgusError),
    /// Another fetch was in flight
    Skipped,
    /// The domain built no requests for the current ledger
    Empty,
}

impl FetchOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, FetchOutcome::Updated { .. })
    }
}

/// Holds the in-flight flag; clears it on drop, including on abort or panic
pub(crate) struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<D: PollDomain> StoreInner<D> {
    pub(crate) fn try_begin(&self) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: Arc::clone(&self.in_flight),
            })
    }

    /// Timer callback: start a fetch in the background or drop the trigger
    pub(crate) fn trigger(self: &Arc<Self>, reason: FireReason) {
        let Some(guard) = self.try_begin() else {
            self.record_skip();
            return;
        };
        debug!(target: "store", store = self.domain.name(), reason = ?reason, "Fetch triggered");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_fetch(guard).await;
        });
    }

    pub(crate) async fn run_fetch(&self, guard: InFlightGuard) -> FetchOutcome {
        let name = self.domain.name();
        let keys = self.ledger.keys();
        let requests = self.domain.build_requests(&keys);
        if requests.is_empty() {
            drop(guard);
            return FetchOutcome::Empty;
        }

        self.stats.lock().fetches_started += 1;
        debug!(target: "store", store = name, keys = keys.len(), requests = requests.len(), "Fetching");

        let mut revision = None;
        let mut first_error = None;
        for request in requests {
            match self.fetch_one(request).await {
                Ok(rev) => revision = Some(rev),
                Err(err) => {
                    self.report(&err);
                    first_error.get_or_insert(err);
                }
            }
        }
        drop(guard);

        let mut stats = self.stats.lock();
        match (revision, first_error) {
            (Some(revision), err) => {
                stats.fetches_succeeded += 1;
                stats.last_success_at = self.snapshot_tx.borrow().updated_at.clone();
                if let Some(err) = err {
                    stats.last_error = Some(err.to_string());
                }
                FetchOutcome::Updated { revision }
            }
            (None, Some(err)) => {
                stats.fetches_failed += 1;
                stats.last_error = Some(err.to_string());
                FetchOutcome::Failed(err)
            }
            (None, None) => FetchOutcome::Empty,
        }
    }

    async fn fetch_one(&self, request: crate::ApiRequest) -> crate::Result<u64> {
        let envelope = self.transport.call(request).await?;
        let payload = envelope.into_result()?;
        let entries = self.domain.extract(payload).map_err(|e| {
            warn!(target: "store", store = self.domain.name(), error = %e, "Unexpected payload shape");
            e
        })?;

        let mode = self.domain.update_mode();
        self.snapshot_tx.send_modify(|snap: &mut Arc<Snapshot>| {
            Arc::make_mut(snap).apply(mode, entries);
        });
        Ok(self.snapshot_tx.borrow().revision)
    }

    /// Surface a fetch failure to the user
    fn report(&self, err: &ArgusError) {
        let subject = self.domain.subject();
        let message = match err {
            ArgusError::Api { message, .. } => {
                format!("API Error during fetching {}.\nMessage: {}", subject, message)
            }
            _ => format!("An error occurred refreshing {}", subject),
        };
        warn!(target: "store", store = self.domain.name(), error = %err, "Fetch failed");
        self.alerts
            .error(message, format!("{}::fetch", self.domain.name()));
    }
}
