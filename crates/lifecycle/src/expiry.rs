//! Subscription expiry sweep.
//!
//! Active students whose subscription has ended are first flagged as in
//! grace, then demoted once the grace window has passed. Every change is
//! attributed to the system (no actor).

use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::status::LeadStatus;
use academy_core::types::DbId;
use academy_db::models::audit::NewAuditEntry;
use academy_events::bus::event_types;
use academy_events::PlatformEvent;
use serde_json::json;

use crate::audit::AuditLog;
use crate::context::Context;
use crate::engine::{apply_in, lead_link, TransitionFields};
use crate::outbox::{Audience, DraftNotice, Outbox};

/// What the sweep did to one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpiryOutcome {
    Unchanged,
    GraceStarted,
    Demoted,
}

#[derive(Clone)]
pub struct ExpiryScheduler {
    ctx: Context,
}

impl ExpiryScheduler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Classify every expired active student. Returns the ids that changed.
    ///
    /// Running it again without time passing changes nothing.
    pub async fn sweep(&self) -> Result<Vec<DbId>, CoreError> {
        let today = self.ctx.clock.today();
        let expired: Vec<DbId> = {
            let mut repo = self.ctx.begin().await?;
            repo.list_expired_students(today)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect()
        };

        let mut affected = Vec::new();
        let (mut in_grace, mut demoted) = (0usize, 0usize);
        for student_id in expired {
            match self.process(student_id).await {
                Ok(ExpiryOutcome::Unchanged) => {}
                Ok(ExpiryOutcome::GraceStarted) => {
                    in_grace += 1;
                    affected.push(student_id);
                }
                Ok(ExpiryOutcome::Demoted) => {
                    demoted += 1;
                    affected.push(student_id);
                }
                Err(e) => tracing::error!(student_id, error = %e, "Expiry sweep failed for student"),
            }
        }

        tracing::info!(in_grace, demoted, "Expiry sweep complete");
        Ok(affected)
    }

    async fn process(&self, student_id: DbId) -> Result<ExpiryOutcome, CoreError> {
        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let today = ctx.clock.today();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let Some(mut student) = repo.lock_student(student_id).await? else {
            return Ok(ExpiryOutcome::Unchanged);
        };
        if !student.is_active || student.subscription_end >= today {
            return Ok(ExpiryOutcome::Unchanged);
        }
        let lead_id = student.lead_id;
        let days_past = (today - student.subscription_end).num_days();

        let outcome = if ctx.policy.within_grace(days_past) {
            if student.in_grace_period {
                return Ok(ExpiryOutcome::Unchanged);
            }
            student.in_grace_period = true;
            student.updated_at = now;
            repo.update_student(&student).await?;
            AuditLog::record(
                repo.as_mut(),
                NewAuditEntry::new(
                    lead_id,
                    None,
                    action_types::GRACE_PERIOD_STARTED,
                    format!("Subscription ended {}", student.subscription_end),
                )
                .with_change(Some("false".to_string()), Some("true".to_string())),
                now,
            )
            .await?;

            let lead = repo.find_lead(lead_id).await?;
            outbox.push_notice(
                PlatformEvent::new(event_types::STUDENT_GRACE_PERIOD)
                    .with_source("student", student_id)
                    .with_payload(json!({
                        "lead_id": lead_id,
                        "subscription_end": student.subscription_end,
                        "days_past": days_past,
                    }))
                    .at(now),
                DraftNotice::new(
                    lead.as_ref()
                        .and_then(|l| l.assigned_user_id)
                        .map(Audience::User)
                        .into_iter()
                        .collect(),
                    "Subscription expired",
                    format!(
                        "{}'s subscription ended on {}; renewal is due",
                        lead.as_ref().map_or("A student", |l| l.full_name.as_str()),
                        student.subscription_end
                    ),
                )
                .link(lead_link(lead_id)),
            );
            ExpiryOutcome::GraceStarted
        } else {
            student.reset_renewal_flags();
            student.updated_at = now;
            repo.update_student(&student).await?;

            let status = repo.find_lead(lead_id).await?.map(|l| l.status);
            if status == Some(LeadStatus::Joined) {
                // OnBreak deactivates the student as a side effect.
                apply_in(
                    ctx,
                    repo.as_mut(),
                    &mut outbox,
                    lead_id,
                    LeadStatus::OnBreak,
                    TransitionFields {
                        comment: Some(format!(
                            "Subscription ended {} and the grace period has passed",
                            student.subscription_end
                        )),
                        ..Default::default()
                    },
                    None,
                )
                .await?;
            }

            if let Some(mut current) = repo.lock_student(student_id).await? {
                if current.is_active {
                    current.is_active = false;
                    current.updated_at = now;
                    repo.update_student(&current).await?;
                    AuditLog::record(
                        repo.as_mut(),
                        NewAuditEntry::new(
                            lead_id,
                            None,
                            action_types::STUDENT_DEACTIVATED,
                            "Subscription expired",
                        )
                        .with_change(Some("active".to_string()), Some("inactive".to_string())),
                        now,
                    )
                    .await?;
                    outbox.push(
                        PlatformEvent::new(event_types::STUDENT_DEACTIVATED)
                            .with_source("student", student_id)
                            .with_payload(json!({ "lead_id": lead_id }))
                            .at(now),
                    );
                }
            }
            tracing::info!(student_id, lead_id, days_past, "Expired student demoted");
            ExpiryOutcome::Demoted
        };

        repo.commit().await?;
        outbox.flush(ctx).await;
        Ok(outcome)
    }
}
