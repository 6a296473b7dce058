//! Lead entity model and DTOs.
//!
//! A lead is the prospect record that backs a student for life; it is never
//! hard-deleted. Open-ended bookkeeping lives in [`LeadExtras`], a typed
//! JSONB document.

use std::collections::BTreeMap;

use academy_core::status::LeadStatus;
use academy_core::subscription::SubscriptionPlan;
use academy_core::types::{Date, DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single lead (the `leads` table).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lead {
    pub id: DbId,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<Date>,
    pub source: String,
    pub status: LeadStatus,
    pub center_id: DbId,
    pub assigned_user_id: Option<DbId>,
    pub trial_batch_id: Option<DbId>,
    pub trial_date: Option<Date>,
    pub permanent_batch_id: Option<DbId>,
    pub next_follow_up_at: Option<Timestamp>,
    pub reschedule_count: i32,
    pub nudge_count: i32,
    pub do_not_contact: bool,
    pub loss_reason: Option<String>,
    pub loss_reason_notes: Option<String>,
    pub status_at_loss: Option<LeadStatus>,
    pub payment_proof_ref: Option<String>,
    pub call_confirmation_note: Option<String>,
    pub extras: LeadExtras,
    #[serde(skip_serializing)]
    pub public_token: String,
    pub pending_subscription: Option<PendingSubscription>,
    pub created_at: Timestamp,
    pub last_updated_at: Timestamp,
}

/// Typed bookkeeping stored in the `extras` JSONB column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadExtras {
    pub preference_link_sent_at: Option<Timestamp>,
    pub joined_at: Option<Timestamp>,
    pub coach_feedback: Vec<CoachFeedback>,
    pub skill_reports: Vec<SkillReport>,
    pub preferences: Option<LeadPreferences>,
    /// Unrecognised keys are kept verbatim.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A coach's note recorded when a trial is attended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachFeedback {
    pub recorded_at: Timestamp,
    pub coach_id: Option<DbId>,
    pub note: String,
}

/// A skill evaluation: per-skill ratings on a 1-5 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReport {
    pub recorded_at: Timestamp,
    pub coach_id: Option<DbId>,
    pub ratings: BTreeMap<String, i16>,
    pub summary: Option<String>,
}

/// Preferences submitted through the public self-service link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadPreferences {
    pub preferred_batch_id: DbId,
    pub preferred_date: Option<Date>,
    pub notes: Option<String>,
    pub submitted_at: Timestamp,
}

/// Subscription payload staged by the parent, awaiting payment verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubscription {
    pub plan: SubscriptionPlan,
    pub start_date: Date,
    pub batch_ids: Vec<DbId>,
    pub payment_proof_ref: Option<String>,
    pub staged_at: Timestamp,
}

/// Where a lead first came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Manual,
    Import,
    Webhook,
}

impl LeadSource {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadSource::Manual => "manual",
            LeadSource::Import => "import",
            LeadSource::Webhook => "webhook",
        }
    }
}

/// DTO for creating a new lead. New leads always start in `New`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLead {
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<Date>,
    pub source: LeadSource,
    pub center_id: DbId,
    pub assigned_user_id: Option<DbId>,
    pub next_follow_up_at: Option<Timestamp>,
}
