//! Second-approver governance for restricted mutations.
//!
//! Restricted roles file a request; an approver (or admin) other than the
//! requester resolves it. Approval applies the change through the same
//! engine paths a direct call would take, inside the resolving unit of work.

use academy_core::approval::{format_ids, ApprovalAction, TargetKind};
use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::roles::{can_resolve_approvals, requires_approval, ROLE_ADMIN, ROLE_APPROVER};
use academy_core::status::{ApprovalStatus, LeadStatus};
use academy_core::types::DbId;
use academy_db::models::approval::{ApprovalRequest, NewApprovalRequest};
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::lead::Lead;
use academy_db::models::student::Student;
use academy_db::Repository;
use academy_events::bus::event_types;
use academy_events::PlatformEvent;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditLog;
use crate::context::{Actor, Context};
use crate::conversion::{update_student_in, StudentUpdate};
use crate::engine::{apply_in, lead_link, TransitionFields};
use crate::outbox::{Audience, DraftNotice, Outbox};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateApproval {
    pub action: ApprovalAction,
    pub reason: String,
    #[serde(default)]
    pub lead_id: Option<DbId>,
    #[serde(default)]
    pub student_id: Option<DbId>,
}

#[derive(Clone)]
pub struct ApprovalGovernance {
    ctx: Context,
}

impl ApprovalGovernance {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn get(&self, request_id: DbId) -> Result<ApprovalRequest, CoreError> {
        let mut repo = self.ctx.begin().await?;
        repo.find_approval(request_id).await?.ok_or(CoreError::NotFound {
            entity: "ApprovalRequest",
            id: request_id,
        })
    }

    /// Pending requests, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<ApprovalRequest>, CoreError> {
        let mut repo = self.ctx.begin().await?;
        Ok(repo.list_pending_approvals().await?)
    }

    /// Every request filed against a lead, newest first.
    pub async fn list_for_lead(&self, lead_id: DbId) -> Result<Vec<ApprovalRequest>, CoreError> {
        let mut repo = self.ctx.begin().await?;
        find_lead(repo.as_mut(), lead_id).await?;
        Ok(repo.list_approvals_for_lead(lead_id).await?)
    }

    pub async fn list_for_student(&self, student_id: DbId) -> Result<Vec<ApprovalRequest>, CoreError> {
        let mut repo = self.ctx.begin().await?;
        let student = find_student(repo.as_mut(), student_id).await?;
        Ok(repo
            .list_approvals_for_lead(student.lead_id)
            .await?
            .into_iter()
            .filter(|r| r.student_id == Some(student_id))
            .collect())
    }

    pub async fn create_request(
        &self,
        actor: &Actor,
        input: CreateApproval,
    ) -> Result<ApprovalRequest, CoreError> {
        if !requires_approval(&actor.role) {
            return Err(CoreError::Forbidden(format!(
                "Role '{}' acts directly and cannot file approval requests",
                actor.role
            )));
        }
        input.action.validate_target(input.lead_id, input.student_id)?;
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(CoreError::Validation("A reason is required".to_string()));
        }

        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let (lead, student) = match input.action.target_kind() {
            TargetKind::Lead => {
                let lead_id = input.lead_id.unwrap_or_default();
                let lead = find_lead(repo.as_mut(), lead_id).await?;
                let student = repo.find_student_by_lead(lead_id).await?;
                (lead, student)
            }
            TargetKind::Student => {
                let student = find_student(repo.as_mut(), input.student_id.unwrap_or_default()).await?;
                if input.lead_id.is_some_and(|id| id != student.lead_id) {
                    return Err(CoreError::Validation(format!(
                        "Student {} does not belong to lead {}",
                        student.id,
                        input.lead_id.unwrap_or_default()
                    )));
                }
                let lead = find_lead(repo.as_mut(), student.lead_id).await?;
                (lead, Some(student))
            }
        };

        let current_value = current_value(repo.as_mut(), &input.action, &lead, student.as_ref()).await?;
        let request = repo
            .insert_approval(
                &NewApprovalRequest {
                    requester_id: actor.user_id,
                    lead_id: lead.id,
                    student_id: student.as_ref().map(|s| s.id),
                    action: input.action,
                    current_value,
                    reason: reason.to_string(),
                },
                now,
            )
            .await?;

        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(
                lead.id,
                Some(actor.user_id),
                action_types::APPROVAL_REQUESTED,
                format!("Requested {}: {}", request.request_type, request.reason),
            )
            .with_change(request.current_value.clone(), Some(request.requested_value.clone())),
            now,
        )
        .await?;

        repo.commit().await?;
        tracing::info!(
            request_id = request.id,
            lead_id = lead.id,
            request_type = %request.request_type,
            requester_id = actor.user_id,
            "Approval requested"
        );

        outbox.push_notice(
            PlatformEvent::new(event_types::APPROVAL_REQUESTED)
                .with_source("approval_request", request.id)
                .with_actor(Some(actor.user_id))
                .with_payload(json!({
                    "lead_id": lead.id,
                    "request_type": request.request_type,
                }))
                .at(now),
            DraftNotice::new(
                vec![Audience::Role(ROLE_APPROVER), Audience::Role(ROLE_ADMIN)],
                format!("Approval needed: {}", request.request_type),
                format!(
                    "{} for {}: {}",
                    request.requested_value, lead.full_name, request.reason
                ),
            )
            .link(lead_link(lead.id))
            .excluding(Some(actor.user_id)),
        );
        outbox.flush(ctx).await;
        Ok(request)
    }

    /// Approve or reject a pending request.
    pub async fn resolve_request(
        &self,
        request_id: DbId,
        resolver: &Actor,
        approved: bool,
        note: Option<String>,
    ) -> Result<ApprovalRequest, CoreError> {
        if !can_resolve_approvals(&resolver.role) {
            return Err(CoreError::Forbidden(format!(
                "Role '{}' cannot resolve approval requests",
                resolver.role
            )));
        }

        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut request = repo.lock_approval(request_id).await?.ok_or(CoreError::NotFound {
            entity: "ApprovalRequest",
            id: request_id,
        })?;
        if request.status.is_resolved() {
            return Err(CoreError::InvalidTransition(format!(
                "Approval request {request_id} is already {}",
                request.status
            )));
        }
        if request.requester_id == resolver.user_id {
            return Err(CoreError::Forbidden(
                "Requesters cannot resolve their own approval requests".to_string(),
            ));
        }

        if approved {
            apply_action(ctx, repo.as_mut(), &mut outbox, &mut request, resolver.user_id).await?;
        }

        request.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        request.resolver_id = Some(resolver.user_id);
        request.resolution_note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        request.resolved_at = Some(now);
        let request = repo.update_approval(&request).await?;

        let (action, verdict) = if approved {
            (action_types::APPROVAL_APPROVED, "approved")
        } else {
            (action_types::APPROVAL_REJECTED, "rejected")
        };
        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(
                request.lead_id,
                Some(resolver.user_id),
                action,
                format!("{} request {verdict}", request.request_type),
            )
            .with_change(request.current_value.clone(), Some(request.requested_value.clone())),
            now,
        )
        .await?;

        repo.commit().await?;
        tracing::info!(
            request_id,
            lead_id = request.lead_id,
            resolver_id = resolver.user_id,
            approved,
            "Approval resolved"
        );

        let message = match &request.resolution_note {
            Some(note) => format!("{} ({note})", request.requested_value),
            None => request.requested_value.clone(),
        };
        outbox.push_notice(
            PlatformEvent::new(event_types::APPROVAL_RESOLVED)
                .with_source("approval_request", request.id)
                .with_actor(Some(resolver.user_id))
                .with_payload(json!({
                    "lead_id": request.lead_id,
                    "request_type": request.request_type,
                    "approved": approved,
                }))
                .at(now),
            DraftNotice::new(
                vec![Audience::User(request.requester_id)],
                format!("Your {} request was {verdict}", request.request_type),
                message,
            )
            .link(lead_link(request.lead_id)),
        );
        outbox.flush(ctx).await;
        Ok(request)
    }
}

/// Apply an approved request inside the resolving unit of work.
async fn apply_action(
    ctx: &Context,
    repo: &mut dyn Repository,
    outbox: &mut Outbox,
    request: &mut ApprovalRequest,
    resolver_id: DbId,
) -> Result<(), CoreError> {
    let actor = Some(resolver_id);
    let now = ctx.clock.now();

    match request.action.clone() {
        ApprovalAction::StatusReversal { target_status } => {
            let mut lead = lock_lead(repo, request.lead_id).await?;
            if lead.status == LeadStatus::Joined && target_status != LeadStatus::Joined {
                if let Some(student) = repo.find_student_by_lead(lead.id).await? {
                    repo.delete_student(student.id).await?;
                    if request.student_id == Some(student.id) {
                        request.student_id = None;
                    }
                    let links = repo.list_lead_batches(lead.id).await?;
                    repo.replace_lead_batches(lead.id, &[], now).await?;
                    lead.permanent_batch_id = None;
                    lead.last_updated_at = now;
                    repo.update_lead(&lead).await?;
                    AuditLog::record(
                        repo,
                        NewAuditEntry::new(
                            lead.id,
                            actor,
                            action_types::STUDENT_DELETED,
                            "Enrollment reversed",
                        )
                        .with_change(
                            Some(format!("student {} in batches {}", student.id, format_ids(&links))),
                            None,
                        ),
                        now,
                    )
                    .await?;
                    tracing::info!(lead_id = lead.id, student_id = student.id, "Student removed by reversal");
                }
            }
            apply_in(ctx, repo, outbox, lead.id, target_status, TransitionFields::default(), actor)
                .await?;
        }
        ApprovalAction::DateOfBirth { date_of_birth } => {
            let lead = lock_lead(repo, request.lead_id).await?;
            let fields = TransitionFields {
                date_of_birth: Some(date_of_birth),
                ..Default::default()
            };
            apply_in(ctx, repo, outbox, lead.id, lead.status, fields, actor).await?;
        }
        ApprovalAction::Deactivate => {
            let mut student = lock_student(repo, request.student_id).await?;
            if student.is_active {
                student.is_active = false;
                student.updated_at = now;
                repo.update_student(&student).await?;
                AuditLog::record(
                    repo,
                    NewAuditEntry::new(
                        student.lead_id,
                        actor,
                        action_types::STUDENT_DEACTIVATED,
                        "Student deactivated by approval",
                    )
                    .with_change(Some("active".to_string()), Some("inactive".to_string())),
                    now,
                )
                .await?;
                outbox.push(
                    PlatformEvent::new(event_types::STUDENT_DEACTIVATED)
                        .with_source("student", student.id)
                        .with_actor(actor)
                        .with_payload(json!({ "lead_id": student.lead_id }))
                        .at(now),
                );
            }
        }
        ApprovalAction::CenterTransfer { center_id } => {
            let student = lock_student(repo, request.student_id).await?;
            let update = StudentUpdate {
                center_id: Some(center_id),
                batch_ids: Some(Vec::new()),
                ..Default::default()
            };
            update_student_in(ctx, repo, student.id, update, actor).await?;
        }
        ApprovalAction::BatchUpdate { batch_ids } => {
            let student = lock_student(repo, request.student_id).await?;
            let update = StudentUpdate {
                batch_ids: Some(batch_ids),
                ..Default::default()
            };
            update_student_in(ctx, repo, student.id, update, actor).await?;
        }
        ApprovalAction::SubscriptionUpdate { plan, start_date } => {
            let student = lock_student(repo, request.student_id).await?;
            let update = StudentUpdate {
                plan: Some(plan),
                start_date: Some(start_date),
                ..Default::default()
            };
            update_student_in(ctx, repo, student.id, update, actor).await?;
        }
    }
    Ok(())
}

/// Render the value a request would replace.
async fn current_value(
    repo: &mut dyn Repository,
    action: &ApprovalAction,
    lead: &Lead,
    student: Option<&Student>,
) -> Result<Option<String>, CoreError> {
    let value = match (action, student) {
        (ApprovalAction::StatusReversal { .. }, _) => Some(lead.status.label().to_string()),
        (ApprovalAction::DateOfBirth { .. }, _) => lead.date_of_birth.map(|d| d.to_string()),
        (ApprovalAction::Deactivate, Some(s)) => {
            Some(if s.is_active { "Active" } else { "Inactive" }.to_string())
        }
        (ApprovalAction::CenterTransfer { .. }, Some(s)) => Some(format!("center {}", s.center_id)),
        (ApprovalAction::BatchUpdate { .. }, _) => {
            Some(format_ids(&repo.list_lead_batches(lead.id).await?))
        }
        (ApprovalAction::SubscriptionUpdate { .. }, Some(s)) => {
            Some(format!("{}|{}", s.subscription_plan, s.subscription_start))
        }
        (_, None) => None,
    };
    Ok(value)
}

async fn find_lead(repo: &mut dyn Repository, lead_id: DbId) -> Result<Lead, CoreError> {
    repo.find_lead(lead_id).await?.ok_or(CoreError::NotFound {
        entity: "Lead",
        id: lead_id,
    })
}

async fn lock_lead(repo: &mut dyn Repository, lead_id: DbId) -> Result<Lead, CoreError> {
    repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
        entity: "Lead",
        id: lead_id,
    })
}

async fn find_student(repo: &mut dyn Repository, student_id: DbId) -> Result<Student, CoreError> {
    repo.find_student(student_id).await?.ok_or(CoreError::NotFound {
        entity: "Student",
        id: student_id,
    })
}

async fn lock_student(repo: &mut dyn Repository, student_id: Option<DbId>) -> Result<Student, CoreError> {
    // The student may have been removed after the request was filed.
    let student_id = student_id.ok_or_else(|| {
        CoreError::Conflict("The student targeted by this request no longer exists".to_string())
    })?;
    repo.lock_student(student_id).await?.ok_or(CoreError::NotFound {
        entity: "Student",
        id: student_id,
    })
}
