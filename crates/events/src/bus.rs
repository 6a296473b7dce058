//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PlatformEvent`]s.
//! It is shared via `Arc<EventBus>` across the application.

use academy_core::types::{DbId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names published by the lifecycle.
pub mod event_types {
    pub const LEAD_CREATED: &str = "lead.created";
    pub const LEAD_STATUS_CHANGED: &str = "lead.status_changed";
    pub const LEAD_MENTIONED: &str = "lead.mentioned";
    pub const LEAD_AUTO_LOST: &str = "lead.auto_lost";
    pub const LEAD_PREFERENCES_SUBMITTED: &str = "lead.preferences_submitted";
    pub const STUDENT_ENROLLED: &str = "student.enrolled";
    pub const STUDENT_REACTIVATED: &str = "student.reactivated";
    pub const STUDENT_DEACTIVATED: &str = "student.deactivated";
    pub const STUDENT_GRACE_PERIOD: &str = "student.grace_period";
    pub const APPROVAL_REQUESTED: &str = "approval.requested";
    pub const APPROVAL_RESOLVED: &str = "approval.resolved";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// Staff-facing notice attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub recipients: Vec<DbId>,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    /// External address (e.g. a parent) that also receives the notice by email.
    #[serde(default)]
    pub contact_email: Option<String>,
}

/// A domain event.
///
/// Constructed via [`PlatformEvent::new`] and enriched with the builder
/// methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"lead.status_changed"`.
    pub event_type: String,

    /// Optional source entity kind (e.g. `"lead"`, `"student"`).
    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<DbId>,

    /// `None` for system actions (sweeps, public self-service).
    pub actor_user_id: Option<DbId>,

    pub payload: serde_json::Value,

    pub notice: Option<Notice>,

    pub timestamp: Timestamp,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            notice: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    /// Attach the acting user, if any.
    pub fn with_actor(mut self, user_id: Option<DbId>) -> Self {
        self.actor_user_id = user_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    /// Override the creation time (the lifecycle stamps events with its clock).
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PlatformEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
