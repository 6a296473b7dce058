//! Promotion of a lead into an enrolled student.
//!
//! A lead has at most one student row for its whole life. Converting a lead
//! whose student was deactivated re-activates that row in place; a hard
//! delete only ever happens through an approved status reversal.

use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::roles::ROLE_ADMIN;
use academy_core::status::LeadStatus;
use academy_core::subscription::{validate_window, SubscriptionPlan};
use academy_core::types::{Date, DbId};
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::student::{NewStudent, Student};
use academy_db::Repository;
use academy_events::bus::event_types;
use academy_events::PlatformEvent;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditLog;
use crate::context::Context;
use crate::engine::{apply_in, lead_link, TransitionFields};
use crate::outbox::{Audience, DraftNotice, Outbox};
use crate::roster::{dedup, BatchRoster};

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub plan: SubscriptionPlan,
    pub start_date: Date,
    /// Derived from the plan when absent.
    #[serde(default)]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub batch_ids: Vec<DbId>,
    #[serde(default)]
    pub payment_verified: bool,
    #[serde(default)]
    pub payment_proof_ref: Option<String>,
}

/// Partial change to an existing student. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudentUpdate {
    pub center_id: Option<DbId>,
    /// Replaces the whole link set; an empty list clears it.
    pub batch_ids: Option<Vec<DbId>>,
    pub plan: Option<SubscriptionPlan>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

#[derive(Clone)]
pub struct StudentConversion {
    ctx: Context,
}

impl StudentConversion {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn get(&self, student_id: DbId) -> Result<Student, CoreError> {
        let mut repo = self.ctx.begin().await?;
        repo.find_student(student_id).await?.ok_or(CoreError::NotFound {
            entity: "Student",
            id: student_id,
        })
    }

    pub async fn find_by_lead(&self, lead_id: DbId) -> Result<Option<Student>, CoreError> {
        let mut repo = self.ctx.begin().await?;
        Ok(repo.find_student_by_lead(lead_id).await?)
    }

    /// Enroll a lead, or re-activate its inactive student, and move the lead
    /// to `Joined`.
    pub async fn convert(
        &self,
        lead_id: DbId,
        request: ConversionRequest,
        actor: Option<DbId>,
    ) -> Result<Student, CoreError> {
        let mut repo = self.ctx.begin().await?;
        let mut outbox = Outbox::new();
        let student = convert_in(&self.ctx, repo.as_mut(), &mut outbox, lead_id, request, actor).await?;
        repo.commit().await?;
        outbox.flush(&self.ctx).await;
        Ok(student)
    }

    /// Convert using the subscription the parent staged through the public
    /// link. The staged payload is consumed.
    pub async fn verify_payment(&self, lead_id: DbId, actor: Option<DbId>) -> Result<Student, CoreError> {
        let ctx = &self.ctx;
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
            entity: "Lead",
            id: lead_id,
        })?;
        let staged = lead.pending_subscription.take().ok_or_else(|| {
            CoreError::Validation(format!("Lead {lead_id} has no staged subscription to verify"))
        })?;
        lead.last_updated_at = ctx.clock.now();
        repo.update_lead(&lead).await?;

        let request = ConversionRequest {
            plan: staged.plan,
            start_date: staged.start_date,
            end_date: None,
            batch_ids: staged.batch_ids,
            payment_verified: true,
            payment_proof_ref: staged.payment_proof_ref,
        };
        let student = convert_in(ctx, repo.as_mut(), &mut outbox, lead_id, request, actor).await?;

        repo.commit().await?;
        outbox.flush(ctx).await;
        tracing::info!(lead_id, student_id = student.id, "Staged payment verified");
        Ok(student)
    }

    pub async fn update_student(
        &self,
        student_id: DbId,
        update: StudentUpdate,
        actor: Option<DbId>,
    ) -> Result<Student, CoreError> {
        let mut repo = self.ctx.begin().await?;
        let student = update_student_in(&self.ctx, repo.as_mut(), student_id, update, actor).await?;
        repo.commit().await?;
        Ok(student)
    }
}

pub(crate) async fn convert_in(
    ctx: &Context,
    repo: &mut dyn Repository,
    outbox: &mut Outbox,
    lead_id: DbId,
    request: ConversionRequest,
    actor: Option<DbId>,
) -> Result<Student, CoreError> {
    let now = ctx.clock.now();
    let lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
        entity: "Lead",
        id: lead_id,
    })?;

    let end_date = match request.end_date {
        Some(end) => end,
        None => request.plan.end_date(request.start_date)?,
    };
    validate_window(request.start_date, end_date)?;
    let proof = request
        .payment_proof_ref
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    let (student, action, event_type) = match repo.find_student_by_lead(lead_id).await? {
        Some(student) if student.is_active => {
            tracing::debug!(lead_id, student_id = student.id, "Lead already enrolled");
            return Err(CoreError::AlreadyEnrolled { lead_id });
        }
        Some(mut student) => {
            student.center_id = lead.center_id;
            student.subscription_plan = request.plan.to_string();
            student.subscription_start = request.start_date;
            student.subscription_end = end_date;
            student.payment_verified = request.payment_verified;
            student.payment_proof_ref = proof.clone();
            student.is_active = true;
            student.reset_renewal_flags();
            student.updated_at = now;
            let student = repo.update_student(&student).await?;
            (student, action_types::STUDENT_REACTIVATED, event_types::STUDENT_REACTIVATED)
        }
        None => {
            let student = repo
                .insert_student(
                    &NewStudent {
                        lead_id,
                        center_id: lead.center_id,
                        subscription_plan: request.plan.to_string(),
                        subscription_start: request.start_date,
                        subscription_end: end_date,
                        payment_verified: request.payment_verified,
                        payment_proof_ref: proof.clone(),
                    },
                    now,
                )
                .await?;
            (student, action_types::STUDENT_ENROLLED, event_types::STUDENT_ENROLLED)
        }
    };

    let batch_ids = dedup(&request.batch_ids);
    let fields = TransitionFields {
        batch_ids: (!batch_ids.is_empty()).then_some(batch_ids),
        payment_proof_ref: proof,
        ..Default::default()
    };
    let lead = apply_in(ctx, repo, outbox, lead_id, LeadStatus::Joined, fields, actor).await?;

    let reactivated = action == action_types::STUDENT_REACTIVATED;
    let description = if reactivated {
        format!("Re-activated on {} plan", student.subscription_plan)
    } else {
        format!("Enrolled on {} plan", student.subscription_plan)
    };
    AuditLog::record(
        repo,
        NewAuditEntry::new(lead_id, actor, action, description).with_change(
            None,
            Some(format!(
                "{}|{}|{}",
                student.subscription_plan, student.subscription_start, student.subscription_end
            )),
        ),
        now,
    )
    .await?;

    tracing::info!(lead_id, student_id = student.id, reactivated, "Lead converted");
    let title = if reactivated {
        format!("Welcome back, {}", lead.full_name)
    } else {
        format!("Welcome to the academy, {}", lead.full_name)
    };
    outbox.push_notice(
        PlatformEvent::new(event_type)
            .with_source("student", student.id)
            .with_actor(actor)
            .with_payload(json!({
                "lead_id": lead_id,
                "plan": student.subscription_plan,
                "subscription_end": student.subscription_end,
            }))
            .at(now),
        DraftNotice::new(
            lead.assigned_user_id
                .map(Audience::User)
                .into_iter()
                .chain([Audience::Role(ROLE_ADMIN)])
                .collect(),
            title,
            format!(
                "{} plan from {} to {}",
                student.subscription_plan, student.subscription_start, student.subscription_end
            ),
        )
        .link(lead_link(lead_id))
        .contact_email(lead.email.clone())
        .excluding(actor),
    );

    Ok(student)
}

pub(crate) async fn update_student_in(
    ctx: &Context,
    repo: &mut dyn Repository,
    student_id: DbId,
    update: StudentUpdate,
    actor: Option<DbId>,
) -> Result<Student, CoreError> {
    let now = ctx.clock.now();
    let mut student = repo.lock_student(student_id).await?.ok_or(CoreError::NotFound {
        entity: "Student",
        id: student_id,
    })?;
    let lead_id = student.lead_id;
    let mut lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
        entity: "Lead",
        id: lead_id,
    })?;

    let mut audit = Vec::new();
    let mut lead_changed = false;

    if let Some(center_id) = update.center_id.filter(|c| *c != student.center_id) {
        audit.push(
            NewAuditEntry::new(lead_id, actor, action_types::STUDENT_UPDATED, "Center")
                .with_change(Some(student.center_id.to_string()), Some(center_id.to_string())),
        );
        student.center_id = center_id;
        lead.center_id = center_id;
        lead_changed = true;
    }

    if update.plan.is_some() || update.start_date.is_some() || update.end_date.is_some() {
        let plan = match update.plan {
            Some(plan) => plan,
            None => SubscriptionPlan::parse(&student.subscription_plan)?,
        };
        let start = update.start_date.unwrap_or(student.subscription_start);
        let end = match update.end_date {
            Some(end) => end,
            None => plan.end_date(start)?,
        };
        validate_window(start, end)?;

        let old = format!(
            "{}|{}|{}",
            student.subscription_plan, student.subscription_start, student.subscription_end
        );
        let new = format!("{plan}|{start}|{end}");
        if old != new {
            audit.push(
                NewAuditEntry::new(lead_id, actor, action_types::STUDENT_UPDATED, "Subscription")
                    .with_change(Some(old), Some(new)),
            );
            student.subscription_plan = plan.to_string();
            student.subscription_start = start;
            student.subscription_end = end;
            // A new window starts the renewal cycle over.
            student.reset_renewal_flags();
        }
    }

    if let Some(batch_ids) = &update.batch_ids {
        if let Some(entry) =
            BatchRoster::replace_links(repo, &mut lead, batch_ids, ctx.clock.today(), now, actor).await?
        {
            audit.push(entry);
            lead_changed = true;
        }
    }

    if audit.is_empty() {
        return Ok(student);
    }

    student.updated_at = now;
    let student = repo.update_student(&student).await?;
    if lead_changed {
        lead.last_updated_at = now;
        repo.update_lead(&lead).await?;
    }
    AuditLog::record_all(repo, audit, now).await?;
    tracing::info!(student_id, lead_id, "Student updated");
    Ok(student)
}
