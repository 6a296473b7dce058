//! Lead creation, public self-service, and coach reports.
//!
//! The public paths authenticate by the lead's opaque token alone and run
//! without an actor.

use std::collections::BTreeMap;

use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::status::LeadStatus;
use academy_core::subscription::SubscriptionPlan;
use academy_core::types::{Date, DbId};
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::lead::{CreateLead, Lead, LeadPreferences, PendingSubscription, SkillReport};
use academy_db::Repository;
use academy_events::bus::event_types;
use academy_events::PlatformEvent;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditLog;
use crate::context::Context;
use crate::engine::{apply_in, lead_link, TransitionFields};
use crate::outbox::{Audience, DraftNotice, Outbox};
use crate::roster::dedup;

/// Highest rating a skill report accepts (ratings start at 1).
pub const MAX_SKILL_RATING: i16 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct PreferenceSubmission {
    pub preferred_batch_id: DbId,
    #[serde(default)]
    pub preferred_date: Option<Date>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSubmission {
    pub plan: SubscriptionPlan,
    pub start_date: Date,
    #[serde(default)]
    pub batch_ids: Vec<DbId>,
    #[serde(default)]
    pub payment_proof_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillReportInput {
    pub ratings: BTreeMap<String, i16>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Clone)]
pub struct LeadIntake {
    ctx: Context,
}

impl LeadIntake {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Create a lead in `New` with a fresh public token.
    pub async fn create_lead(&self, input: CreateLead, actor: Option<DbId>) -> Result<Lead, CoreError> {
        let full_name = input.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(CoreError::Validation("Lead name must not be empty".to_string()));
        }
        let phone = non_blank(input.phone);
        let email = non_blank(input.email);
        if phone.is_none() && email.is_none() {
            return Err(CoreError::Validation(
                "A phone number or email address is required".to_string(),
            ));
        }
        let input = CreateLead {
            full_name,
            phone,
            email,
            ..input
        };

        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut repo = ctx.begin().await?;
        let lead = repo.insert_lead(&input, &token, now).await?;
        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(
                lead.id,
                actor,
                action_types::LEAD_CREATED,
                format!("Lead created from {}", lead.source),
            )
            .with_change(None, Some(lead.status.label().to_string())),
            now,
        )
        .await?;
        repo.commit().await?;

        tracing::info!(lead_id = lead.id, source = %lead.source, center_id = lead.center_id, "Lead created");
        let mut outbox = Outbox::new();
        outbox.push_notice(
            PlatformEvent::new(event_types::LEAD_CREATED)
                .with_source("lead", lead.id)
                .with_actor(actor)
                .with_payload(json!({ "source": lead.source, "center_id": lead.center_id }))
                .at(now),
            DraftNotice::new(
                lead.assigned_user_id.map(Audience::User).into_iter().collect(),
                format!("New lead: {}", lead.full_name),
                format!("Assigned to you from {}", lead.source),
            )
            .link(lead_link(lead.id))
            .excluding(actor),
        );
        outbox.flush(ctx).await;
        Ok(lead)
    }

    /// Record a parent's preferred batch and book the trial.
    pub async fn submit_preferences(
        &self,
        token: &str,
        input: PreferenceSubmission,
    ) -> Result<Lead, CoreError> {
        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut lead = lead_by_token(repo.as_mut(), token).await?;
        let batch = repo
            .find_batch(input.preferred_batch_id)
            .await?
            .filter(|b| b.is_active && b.center_id == lead.center_id)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Batch {} is not open for this center",
                    input.preferred_batch_id
                ))
            })?;

        let notes = non_blank(input.notes);
        lead.extras.preferences = Some(LeadPreferences {
            preferred_batch_id: batch.id,
            preferred_date: input.preferred_date,
            notes: notes.clone(),
            submitted_at: now,
        });
        lead.last_updated_at = now;
        repo.update_lead(&lead).await?;
        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(
                lead.id,
                None,
                action_types::PREFERENCES_SUBMITTED,
                notes.unwrap_or_else(|| "Preferences submitted".to_string()),
            )
            .with_change(
                None,
                Some(match input.preferred_date {
                    Some(date) => format!("{} on {date}", batch.name),
                    None => batch.name.clone(),
                }),
            ),
            now,
        )
        .await?;

        let fields = TransitionFields {
            trial_batch_id: Some(batch.id),
            trial_date: input.preferred_date,
            ..Default::default()
        };
        let lead = apply_in(ctx, repo.as_mut(), &mut outbox, lead.id, LeadStatus::TrialScheduled, fields, None)
            .await?;

        outbox.push(
            PlatformEvent::new(event_types::LEAD_PREFERENCES_SUBMITTED)
                .with_source("lead", lead.id)
                .with_payload(json!({
                    "batch_id": batch.id,
                    "preferred_date": input.preferred_date,
                }))
                .at(now),
        );
        repo.commit().await?;
        outbox.flush(ctx).await;
        Ok(lead)
    }

    /// Stage a subscription with payment proof for staff verification.
    pub async fn stage_subscription(
        &self,
        token: &str,
        input: SubscriptionSubmission,
    ) -> Result<Lead, CoreError> {
        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut lead = lead_by_token(repo.as_mut(), token).await?;
        let batch_ids = dedup(&input.batch_ids);
        if batch_ids.is_empty() {
            return Err(CoreError::BatchRequired);
        }
        for batch_id in &batch_ids {
            let open = repo
                .find_batch(*batch_id)
                .await?
                .is_some_and(|b| b.is_active && b.center_id == lead.center_id);
            if !open {
                return Err(CoreError::Validation(format!(
                    "Batch {batch_id} is not open for this center"
                )));
            }
        }
        // Fails early on an impossible window; the real end date is set on verification.
        input.plan.end_date(input.start_date)?;

        let proof = non_blank(input.payment_proof_ref);
        lead.pending_subscription = Some(PendingSubscription {
            plan: input.plan,
            start_date: input.start_date,
            batch_ids,
            payment_proof_ref: proof.clone(),
            staged_at: now,
        });
        lead.last_updated_at = now;
        repo.update_lead(&lead).await?;
        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(
                lead.id,
                None,
                action_types::SUBSCRIPTION_STAGED,
                "Subscription submitted for verification",
            )
            .with_change(None, Some(format!("{}|{}", input.plan, input.start_date))),
            now,
        )
        .await?;

        let fields = TransitionFields {
            payment_proof_ref: proof,
            ..Default::default()
        };
        let lead = apply_in(
            ctx,
            repo.as_mut(),
            &mut outbox,
            lead.id,
            LeadStatus::PaymentPendingVerification,
            fields,
            None,
        )
        .await?;

        repo.commit().await?;
        outbox.flush(ctx).await;
        Ok(lead)
    }

    /// Append a coach's skill evaluation to the lead.
    pub async fn add_skill_report(
        &self,
        lead_id: DbId,
        actor: Option<DbId>,
        input: SkillReportInput,
    ) -> Result<Lead, CoreError> {
        if input.ratings.is_empty() {
            return Err(CoreError::Validation("A skill report needs at least one rating".to_string()));
        }
        if let Some((skill, rating)) = input
            .ratings
            .iter()
            .find(|(_, r)| !(1..=MAX_SKILL_RATING).contains(*r))
        {
            return Err(CoreError::Validation(format!(
                "Rating for '{skill}' must be between 1 and {MAX_SKILL_RATING}, got {rating}"
            )));
        }

        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
            entity: "Lead",
            id: lead_id,
        })?;

        let summary = non_blank(input.summary);
        let rendered = input
            .ratings
            .iter()
            .map(|(skill, rating)| format!("{skill}={rating}"))
            .collect::<Vec<_>>()
            .join(", ");
        lead.extras.skill_reports.push(SkillReport {
            recorded_at: now,
            coach_id: actor,
            ratings: input.ratings,
            summary: summary.clone(),
        });
        lead.last_updated_at = now;
        let lead = repo.update_lead(&lead).await?;
        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(
                lead_id,
                actor,
                action_types::SKILL_REPORT,
                summary.unwrap_or_else(|| "Skill report added".to_string()),
            )
            .with_change(None, Some(rendered)),
            now,
        )
        .await?;
        repo.commit().await?;

        tracing::info!(lead_id, reports = lead.extras.skill_reports.len(), "Skill report added");
        Ok(lead)
    }
}

async fn lead_by_token(repo: &mut dyn Repository, token: &str) -> Result<Lead, CoreError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CoreError::Unauthorized("Missing access token".to_string()));
    }
    repo.find_lead_by_token(token)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("Unknown or expired link".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
