//! Approval governance request kinds.
//!
//! Each restricted mutation is one [`ApprovalAction`] variant carrying only
//! the data its apply step needs. The variant decides which target (lead or
//! student) a request must name.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::LeadStatus;
use crate::subscription::SubscriptionPlan;
use crate::types::DbId;

/// Which entity an approval request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Lead,
    Student,
}

/// A restricted mutation awaiting a second approver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Move a lead back to an earlier status.
    StatusReversal { target_status: LeadStatus },
    /// Soft-deactivate a student without touching the lead status.
    Deactivate,
    /// Move a student to another center; batch links are dropped.
    CenterTransfer { center_id: DbId },
    /// Correct a lead's date of birth (and with it the age group).
    DateOfBirth { date_of_birth: NaiveDate },
    /// Replace a student's batch set.
    BatchUpdate { batch_ids: Vec<DbId> },
    /// Change a student's plan and start date; the end date is derived.
    SubscriptionUpdate {
        plan: SubscriptionPlan,
        start_date: NaiveDate,
    },
}

impl ApprovalAction {
    /// Stable name stored in the `request_type` column.
    pub fn request_type(&self) -> &'static str {
        match self {
            ApprovalAction::StatusReversal { .. } => "status_reversal",
            ApprovalAction::Deactivate => "deactivate",
            ApprovalAction::CenterTransfer { .. } => "center_transfer",
            ApprovalAction::DateOfBirth { .. } => "date_of_birth",
            ApprovalAction::BatchUpdate { .. } => "batch_update",
            ApprovalAction::SubscriptionUpdate { .. } => "subscription_update",
        }
    }

    pub fn target_kind(&self) -> TargetKind {
        match self {
            ApprovalAction::StatusReversal { .. } | ApprovalAction::DateOfBirth { .. } => {
                TargetKind::Lead
            }
            ApprovalAction::Deactivate
            | ApprovalAction::CenterTransfer { .. }
            | ApprovalAction::BatchUpdate { .. }
            | ApprovalAction::SubscriptionUpdate { .. } => TargetKind::Student,
        }
    }

    /// Human-readable rendering of the requested value.
    pub fn requested_value(&self) -> String {
        match self {
            ApprovalAction::StatusReversal { target_status } => target_status.label().to_string(),
            ApprovalAction::Deactivate => "Inactive".to_string(),
            ApprovalAction::CenterTransfer { center_id } => format!("center {center_id}"),
            ApprovalAction::DateOfBirth { date_of_birth } => date_of_birth.to_string(),
            ApprovalAction::BatchUpdate { batch_ids } => format_ids(batch_ids),
            ApprovalAction::SubscriptionUpdate { plan, start_date } => {
                format!("{plan}|{start_date}")
            }
        }
    }

    /// Check that the ids required by this action are present.
    pub fn validate_target(
        &self,
        lead_id: Option<DbId>,
        student_id: Option<DbId>,
    ) -> Result<(), CoreError> {
        match (self.target_kind(), lead_id, student_id) {
            (TargetKind::Lead, None, _) => Err(CoreError::Validation(format!(
                "{} requests require a lead id",
                self.request_type()
            ))),
            (TargetKind::Student, _, None) => Err(CoreError::Validation(format!(
                "{} requests require a student id",
                self.request_type()
            ))),
            _ => Ok(()),
        }
    }
}

/// Render an id list as `1, 2, 3` (or `none`).
pub fn format_ids(ids: &[DbId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn student_actions_need_a_student_id() {
        let action = ApprovalAction::Deactivate;
        assert_matches!(action.validate_target(Some(1), None), Err(CoreError::Validation(_)));
        assert!(action.validate_target(None, Some(9)).is_ok());
    }

    #[test]
    fn lead_actions_need_a_lead_id() {
        let action = ApprovalAction::StatusReversal {
            target_status: LeadStatus::TrialAttended,
        };
        assert_matches!(action.validate_target(None, Some(2)), Err(CoreError::Validation(_)));
        assert!(action.validate_target(Some(4), None).is_ok());
    }

    #[test]
    fn serializes_as_tagged_union() {
        let action = ApprovalAction::CenterTransfer { center_id: 3 };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "center_transfer");
        assert_eq!(json["center_id"], 3);

        let back: ApprovalAction = serde_json::from_value(serde_json::json!({
            "type": "subscription_update",
            "plan": "Quarterly",
            "start_date": "2026-02-01"
        }))
        .unwrap();
        assert_eq!(
            back,
            ApprovalAction::SubscriptionUpdate {
                plan: SubscriptionPlan::Quarterly,
                start_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            }
        );
    }

    #[test]
    fn requested_value_renders_subscription_as_encoded_pair() {
        let action = ApprovalAction::SubscriptionUpdate {
            plan: SubscriptionPlan::Monthly,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        };
        assert_eq!(action.requested_value(), "Monthly|2026-01-05");
        assert_eq!(format_ids(&[]), "none");
        assert_eq!(format_ids(&[4, 5]), "4, 5");
    }
}
