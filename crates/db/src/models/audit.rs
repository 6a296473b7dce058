//! Lead audit trail models.
//!
//! Audit entries have no `updated_at` field (immutable records).

use academy_core::types::{DbId, Timestamp};
use serde::Serialize;

/// A single audit entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: DbId,
    pub lead_id: DbId,
    pub actor_id: Option<DbId>,
    pub action_type: String,
    pub description: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry. `actor_id` is `None` for system and
/// public self-service actions.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub lead_id: DbId,
    pub actor_id: Option<DbId>,
    pub action_type: &'static str,
    pub description: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl NewAuditEntry {
    pub fn new(
        lead_id: DbId,
        actor_id: Option<DbId>,
        action_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            lead_id,
            actor_id,
            action_type,
            description: description.into(),
            old_value: None,
            new_value: None,
        }
    }

    /// Attach before/after values.
    pub fn with_change(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}
