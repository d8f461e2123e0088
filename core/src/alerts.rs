// Alert hub
//
// Process-wide publish point for user-visible notifications. Stores push fetch
// failures here; whatever renders alerts subscribes through a broadcast channel.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Notification shown to the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub message: String,
    /// Component that raised the alert, e.g. `AssigneeStore::fetch`
    pub source: String,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Error,
    Warning,
    Info,
    Success,
}

/// Broadcasts alerts to every interested consumer
#[derive(Clone)]
pub struct AlertHub {
    sender: broadcast::Sender<Alert>,
    latest: Arc<Mutex<Option<Alert>>>,
}

impl AlertHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Publish a notification and return it
    pub fn notify(
        &self,
        kind: AlertKind,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Alert {
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
            source: source.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        debug!(target: "alerts", id = %alert.id, source = %alert.source, "Publishing alert");
        *self.latest.lock() = Some(alert.clone());
        // No receivers is fine; `latest` still holds it
        let _ = self.sender.send(alert.clone());
        alert
    }

    pub fn error(&self, message: impl Into<String>, source: impl Into<String>) -> Alert {
        self.notify(AlertKind::Error, message, source)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    /// Most recent alert, for consumers that attach late
    pub fn latest(&self) -> Option<Alert> {
        self.latest.lock().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AlertHub {
    fn default() -> Self {
        Self::new(256)
    }
}
