//! Lead audit trail constants and the per-lead integrity chain.

use crate::hashing;
use crate::types::{DbId, Timestamp};

/// Known action types for lead audit entries.
pub mod action_types {
    pub const LEAD_CREATED: &str = "lead_created";
    pub const STATUS_CHANGE: &str = "status_change";
    pub const STATUS_CONFIRMED: &str = "status_confirmed";
    pub const FIELD_UPDATE: &str = "field_update";
    pub const COMMENT: &str = "comment";
    pub const TRIAL_BATCH_CLEARED: &str = "trial_batch_cleared";
    pub const BATCH_ASSIGNMENT: &str = "batch_assignment";
    pub const TRIAL_ATTENDED: &str = "trial_attended";
    pub const TRIAL_NO_SHOW: &str = "trial_no_show";
    pub const NUDGE_SENT: &str = "nudge_sent";
    pub const AUTO_LOST: &str = "auto_lost";
    pub const SKILL_REPORT: &str = "skill_report";
    pub const PREFERENCES_SUBMITTED: &str = "preferences_submitted";
    pub const SUBSCRIPTION_STAGED: &str = "subscription_staged";
    pub const STUDENT_ENROLLED: &str = "student_enrolled";
    pub const STUDENT_REACTIVATED: &str = "student_reactivated";
    pub const STUDENT_DEACTIVATED: &str = "student_deactivated";
    pub const STUDENT_UPDATED: &str = "student_updated";
    pub const STUDENT_DELETED: &str = "student_deleted";
    pub const GRACE_PERIOD_STARTED: &str = "grace_period_started";
    pub const APPROVAL_REQUESTED: &str = "approval_requested";
    pub const APPROVAL_APPROVED: &str = "approval_approved";
    pub const APPROVAL_REJECTED: &str = "approval_rejected";
}

/// Default number of entries returned by a history read.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Upper bound on a history read.
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// Clamp a caller-supplied history limit into `1..=MAX_HISTORY_LIMIT`.
pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// Known seed value for the first entry in a lead's hash chain.
const CHAIN_SEED: &str = "LEAD_AUDIT_CHAIN_SEED_V1";

/// Canonical text form of an audit entry, hashed into the chain.
///
/// Fields are joined with `|`; absent values render as empty strings so the
/// form is stable whether or not optional fields were stored.
#[allow(clippy::too_many_arguments)]
pub fn canonical_entry(
    lead_id: DbId,
    actor_id: Option<DbId>,
    action_type: &str,
    description: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    created_at: Timestamp,
) -> String {
    format!(
        "{lead_id}|{}|{action_type}|{description}|{}|{}|{}",
        actor_id.map(|id| id.to_string()).unwrap_or_default(),
        old_value.unwrap_or_default(),
        new_value.unwrap_or_default(),
        created_at.timestamp_micros(),
    )
}

/// Compute the SHA-256 integrity hash for an audit entry.
///
/// `prev_hash` is the hash of the previous entry for the same lead, or
/// `None` for the lead's first entry (which uses a known seed value).
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}
