//! Approval request models (governance workflow).

use academy_core::approval::ApprovalAction;
use academy_core::status::ApprovalStatus;
use academy_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// A row from the `approval_requests` table.
///
/// `lead_id` is always resolved, even for student-targeted requests, so a
/// lead's history shows every request filed against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRequest {
    pub id: DbId,
    pub requester_id: DbId,
    pub lead_id: DbId,
    pub student_id: Option<DbId>,
    pub request_type: String,
    pub action: ApprovalAction,
    pub current_value: Option<String>,
    pub requested_value: String,
    pub reason: String,
    pub status: ApprovalStatus,
    pub resolver_id: Option<DbId>,
    pub resolution_note: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for inserting a new request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewApprovalRequest {
    pub requester_id: DbId,
    pub lead_id: DbId,
    pub student_id: Option<DbId>,
    pub action: ApprovalAction,
    pub current_value: Option<String>,
    pub reason: String,
}
