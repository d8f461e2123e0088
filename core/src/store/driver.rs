// Store driver: realises controller deadlines with tokio timers
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::StoreInner;
use crate::domains::PollDomain;
use crate::schedule::Controller;

/// Background task that is cancelled and aborted when dropped
pub(crate) struct ScopedTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScopedTask {
    pub fn spawn<F>(token: CancellationToken, fut: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(fut),
            token,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Timer loop for one activation of a store
///
/// Holds the store weakly so an abandoned store can drop while armed.
pub(crate) async fn drive<D: PollDomain>(
    store: Weak<StoreInner<D>>,
    controller: Arc<Mutex<Controller>>,
    wake: Arc<Notify>,
    token: CancellationToken,
    name: &'static str,
) {
    // A cancelled driver never touches the controller; teardown already reset
    // it and the next activation may own it by now.
    {
        let mut controller = controller.lock();
        if token.is_cancelled() {
            return;
        }
        controller.activate(Instant::now());
    }
    debug!(target: "store", store = name, "Driver armed");

    loop {
        let deadline = controller.lock().next_deadline();
        let sleep = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = wake.notified() => {}
            _ = sleep => {}
        }

        let mut due = {
            let mut controller = controller.lock();
            if token.is_cancelled() {
                break;
            }
            controller.take_due(Instant::now())
        };
        if due.is_empty() {
            continue;
        }
        let Some(inner) = store.upgrade() else {
            debug!(target: "store", store = name, reasons = ?due, "Store dropped; discarding due timers");
            break;
        };
        // One fetch covers every reason due at this wake-up
        if due.len() > 1 {
            debug!(target: "store", store = name, reasons = ?due, "Coalescing simultaneous triggers");
        }
        inner.trigger(due.swap_remove(0));
    }

    debug!(target: "store", store = name, "Driver stopped");
}
