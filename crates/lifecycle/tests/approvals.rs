//! Second-approver governance: filing, resolving and applying requests.

mod common;

use academy_core::approval::ApprovalAction;
use academy_core::error::CoreError;
use academy_core::status::{ApprovalStatus, LeadStatus};
use academy_core::subscription::SubscriptionPlan;
use academy_core::types::DbId;
use academy_events::bus::event_types;
use academy_lifecycle::CreateApproval;
use assert_matches::assert_matches;
use chrono::NaiveDate;

use common::*;

fn request(action: ApprovalAction, lead_id: Option<DbId>, student_id: Option<DbId>) -> CreateApproval {
    CreateApproval {
        action,
        reason: "Entered by mistake".to_string(),
        lead_id,
        student_id,
    }
}

// ---------------------------------------------------------------------------
// Filing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approving_roles_cannot_file_requests() {
    let t = setup();
    let lead = t.lead("Aarav").await;
    let action = ApprovalAction::StatusReversal {
        target_status: LeadStatus::Called,
    };

    for actor in [approver(), admin()] {
        let result = t
            .academy
            .approvals
            .create_request(&actor, request(action.clone(), Some(lead.id), None))
            .await;
        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }
}

#[tokio::test]
async fn student_actions_need_a_student_id() {
    let t = setup();
    let lead = t.lead("Diya").await;

    let result = t
        .academy
        .approvals
        .create_request(&counsellor(), request(ApprovalAction::Deactivate, Some(lead.id), None))
        .await;

    assert_matches!(result, Err(CoreError::Validation(_)));
}

#[tokio::test]
async fn blank_reason_is_rejected() {
    let t = setup();
    let lead = t.lead("Kabir").await;
    let mut input = request(
        ApprovalAction::DateOfBirth {
            date_of_birth: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
        },
        Some(lead.id),
        None,
    );
    input.reason = "   ".to_string();

    let result = t.academy.approvals.create_request(&coach(), input).await;
    assert_matches!(result, Err(CoreError::Validation(_)));
}

#[tokio::test]
async fn filing_records_current_value_and_alerts_approvers() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Meera", batch.id).await;
    let mut rx = t.subscribe();

    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(ApprovalAction::CenterTransfer { center_id: 2 }, None, Some(student.id)),
        )
        .await
        .unwrap();

    assert_eq!(filed.status, ApprovalStatus::Pending);
    assert_eq!(filed.lead_id, lead.id);
    assert_eq!(filed.request_type, "center_transfer");
    assert_eq!(filed.current_value.as_deref(), Some("center 1"));
    assert_eq!(filed.requested_value, "center 2");

    let event = drain(&mut rx)
        .into_iter()
        .find(|e| e.event_type == event_types::APPROVAL_REQUESTED)
        .expect("approval event");
    assert_eq!(
        event.notice.unwrap().recipients,
        vec![ADMIN_ID, APPROVER_ID, SECOND_APPROVER_ID]
    );

    let pending = t.academy.approvals.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    let for_student = t.academy.approvals.list_for_student(student.id).await.unwrap();
    assert_eq!(for_student[0].id, filed.id);
    assert!(t
        .audit_actions(lead.id)
        .await
        .contains(&"approval_requested".to_string()));
}

// ---------------------------------------------------------------------------
// Resolving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_approving_roles_resolve() {
    let t = setup();
    let lead = t.lead("Ishaan").await;
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(
                ApprovalAction::StatusReversal {
                    target_status: LeadStatus::Called,
                },
                Some(lead.id),
                None,
            ),
        )
        .await
        .unwrap();

    let result = t
        .academy
        .approvals
        .resolve_request(filed.id, &coach(), true, None)
        .await;
    assert_matches!(result, Err(CoreError::Forbidden(_)));
}

#[tokio::test]
async fn resolving_twice_fails() {
    let t = setup();
    let lead = t.lead("Anaya").await;
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(
                ApprovalAction::StatusReversal {
                    target_status: LeadStatus::Called,
                },
                Some(lead.id),
                None,
            ),
        )
        .await
        .unwrap();

    t.academy
        .approvals
        .resolve_request(filed.id, &approver(), false, Some("Not needed".into()))
        .await
        .unwrap();
    let second = t
        .academy
        .approvals
        .resolve_request(filed.id, &second_approver(), true, None)
        .await;

    assert_matches!(second, Err(CoreError::InvalidTransition(_)));
}

#[tokio::test]
async fn rejection_changes_nothing_but_notifies_the_requester() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Vihaan", batch.id).await;
    let filed = t
        .academy
        .approvals
        .create_request(&counsellor(), request(ApprovalAction::Deactivate, None, Some(student.id)))
        .await
        .unwrap();
    let mut rx = t.subscribe();

    let resolved = t
        .academy
        .approvals
        .resolve_request(filed.id, &approver(), false, Some("Fees are paid".into()))
        .await
        .unwrap();

    assert_eq!(resolved.status, ApprovalStatus::Rejected);
    assert_eq!(resolved.resolver_id, Some(APPROVER_ID));
    assert_eq!(resolved.resolution_note.as_deref(), Some("Fees are paid"));
    assert!(t.academy.conversion.get(student.id).await.unwrap().is_active);

    let event = drain(&mut rx)
        .into_iter()
        .find(|e| e.event_type == event_types::APPROVAL_RESOLVED)
        .expect("resolution event");
    assert_eq!(event.notice.unwrap().recipients, vec![COUNSELLOR_ID]);
    assert!(t
        .audit_actions(lead.id)
        .await
        .contains(&"approval_rejected".to_string()));
}

// ---------------------------------------------------------------------------
// Applying approved requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reversal_out_of_joined_removes_the_student() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Saanvi", batch.id).await;
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(
                ApprovalAction::StatusReversal {
                    target_status: LeadStatus::TrialAttended,
                },
                Some(lead.id),
                None,
            ),
        )
        .await
        .unwrap();
    assert_eq!(filed.student_id, Some(student.id));

    let resolved = t
        .academy
        .approvals
        .resolve_request(filed.id, &approver(), true, None)
        .await
        .unwrap();

    assert_eq!(resolved.status, ApprovalStatus::Approved);
    assert_eq!(resolved.student_id, None);
    assert!(t.academy.conversion.find_by_lead(lead.id).await.unwrap().is_none());
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::TrialAttended);
    assert_eq!(lead.permanent_batch_id, None);
    assert!(t.academy.roster.roster(batch.id).await.unwrap().is_empty());

    let actions = t.audit_actions(lead.id).await;
    assert!(actions.contains(&"student_deleted".to_string()));
    assert_eq!(actions.last().map(String::as_str), Some("approval_approved"));
}

#[tokio::test]
async fn date_of_birth_correction_keeps_the_status() {
    let t = setup();
    let lead = t.lead("Advik").await;
    let dob = NaiveDate::from_ymd_opt(2017, 9, 3).unwrap();
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(ApprovalAction::DateOfBirth { date_of_birth: dob }, Some(lead.id), None),
        )
        .await
        .unwrap();

    t.academy
        .approvals
        .resolve_request(filed.id, &approver(), true, None)
        .await
        .unwrap();

    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.date_of_birth, Some(dob));
    assert_eq!(lead.status, LeadStatus::New);
}

#[tokio::test]
async fn deactivation_leaves_the_lead_joined() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Myra", batch.id).await;
    let filed = t
        .academy
        .approvals
        .create_request(&counsellor(), request(ApprovalAction::Deactivate, None, Some(student.id)))
        .await
        .unwrap();

    t.academy
        .approvals
        .resolve_request(filed.id, &admin(), true, None)
        .await
        .unwrap();

    assert!(!t.academy.conversion.get(student.id).await.unwrap().is_active);
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::Joined);
}

#[tokio::test]
async fn center_transfer_drops_batch_links() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Reyansh", batch.id).await;
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(ApprovalAction::CenterTransfer { center_id: 2 }, None, Some(student.id)),
        )
        .await
        .unwrap();

    t.academy
        .approvals
        .resolve_request(filed.id, &approver(), true, None)
        .await
        .unwrap();

    let student = t.academy.conversion.get(student.id).await.unwrap();
    assert_eq!(student.center_id, 2);
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.center_id, 2);
    assert_eq!(lead.permanent_batch_id, None);
    assert!(t.academy.roster.roster(batch.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn subscription_update_uses_calendar_months() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (_, student) = t.enrolled("Zara", batch.id).await;
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(
                ApprovalAction::SubscriptionUpdate {
                    plan: SubscriptionPlan::Quarterly,
                    start_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
                },
                None,
                Some(student.id),
            ),
        )
        .await
        .unwrap();
    assert_eq!(filed.requested_value, "Quarterly|2026-01-31");

    t.academy
        .approvals
        .resolve_request(filed.id, &approver(), true, None)
        .await
        .unwrap();

    let student = t.academy.conversion.get(student.id).await.unwrap();
    assert_eq!(student.subscription_plan, "Quarterly");
    assert_eq!(student.subscription_end, NaiveDate::from_ymd_opt(2026, 4, 30).unwrap());
}

#[tokio::test]
async fn batch_update_into_a_full_batch_leaves_the_request_pending() {
    let t = setup();
    let current = t.batch("Current", 10).await;
    let full = t.batch("Full", 1).await;
    t.enrolled("Kiara", full.id).await;
    let (_, student) = t.enrolled("Arjun", current.id).await;
    let filed = t
        .academy
        .approvals
        .create_request(
            &counsellor(),
            request(
                ApprovalAction::BatchUpdate {
                    batch_ids: vec![full.id],
                },
                None,
                Some(student.id),
            ),
        )
        .await
        .unwrap();

    let result = t
        .academy
        .approvals
        .resolve_request(filed.id, &approver(), true, None)
        .await;

    assert_matches!(result, Err(CoreError::CapacityReached { .. }));
    let filed = t.academy.approvals.get(filed.id).await.unwrap();
    assert_eq!(filed.status, ApprovalStatus::Pending);
    assert_eq!(t.academy.roster.roster(current.id).await.unwrap().len(), 1);
}
