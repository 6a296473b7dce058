//! In-app notifications.

use std::sync::Mutex;

use academy_core::types::DbId;
use async_trait::async_trait;
use serde::Serialize;

/// One notification addressed to one staff user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub user_id: DbId,
    /// Event name that produced it, e.g. `"lead.mentioned"`.
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            user_id = notification.user_id,
            kind = %notification.kind,
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps delivered notifications in memory; used as an inbox in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn for_user(&self, user_id: DbId) -> Vec<Notification> {
        self.delivered()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|e| NotifyError(e.to_string()))?
            .push(notification);
        Ok(())
    }
}
