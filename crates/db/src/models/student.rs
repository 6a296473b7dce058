//! Student entity model and DTOs.
//!
//! Students are never deleted by the lifecycle; deactivation keeps the row
//! for later re-activation.

use academy_core::types::{Date, DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// A row from the `students` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Student {
    pub id: DbId,
    pub lead_id: DbId,
    pub center_id: DbId,
    pub subscription_plan: String,
    pub subscription_start: Date,
    pub subscription_end: Date,
    pub payment_verified: bool,
    pub payment_proof_ref: Option<String>,
    pub is_active: bool,
    pub renewal_intent: bool,
    pub in_grace_period: bool,
    pub grace_nudge_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Student {
    /// Reset renewal bookkeeping to its initial values.
    pub fn reset_renewal_flags(&mut self) {
        self.renewal_intent = false;
        self.in_grace_period = false;
        self.grace_nudge_count = 0;
    }
}

/// DTO for inserting a new student.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub lead_id: DbId,
    pub center_id: DbId,
    pub subscription_plan: String,
    pub subscription_start: Date,
    pub subscription_end: Date,
    pub payment_verified: bool,
    pub payment_proof_ref: Option<String>,
}
