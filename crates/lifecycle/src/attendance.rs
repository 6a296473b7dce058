//! Trial attendance outcomes and the no-show strike rule.

use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::policy::LOSS_REASON_NO_SHOW;
use academy_core::status::LeadStatus;
use academy_core::types::DbId;
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::lead::{CoachFeedback, Lead};
use serde::{Deserialize, Serialize};

use crate::audit::AuditLog;
use crate::engine::{apply_in, force_loss, LifecycleEngine, TransitionFields};
use crate::outbox::Outbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attendance {
    Present,
    Absent,
}

impl LifecycleEngine {
    /// Record the outcome of a scheduled trial.
    ///
    /// Leads that are not in `TrialScheduled` are returned unchanged.
    pub async fn mark_attendance(
        &self,
        lead_id: DbId,
        attendance: Attendance,
        note: Option<String>,
        actor: Option<DbId>,
    ) -> Result<Lead, CoreError> {
        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
            entity: "Lead",
            id: lead_id,
        })?;
        if lead.status != LeadStatus::TrialScheduled {
            tracing::debug!(lead_id, status = %lead.status, "Attendance ignored outside trial");
            return Ok(lead);
        }
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let lead = match attendance {
            Attendance::Present => {
                let fields = TransitionFields {
                    next_follow_up_at: Some(ctx.policy.trial_follow_up(now)),
                    ..Default::default()
                };
                let mut lead = apply_in(
                    ctx,
                    repo.as_mut(),
                    &mut outbox,
                    lead_id,
                    LeadStatus::TrialAttended,
                    fields,
                    actor,
                )
                .await?;
                if let Some(note) = &note {
                    lead.extras.coach_feedback.push(CoachFeedback {
                        recorded_at: now,
                        coach_id: actor,
                        note: note.clone(),
                    });
                    lead = repo.update_lead(&lead).await?;
                }
                AuditLog::record(
                    repo.as_mut(),
                    NewAuditEntry::new(
                        lead_id,
                        actor,
                        action_types::TRIAL_ATTENDED,
                        note.unwrap_or_else(|| "Trial attended".to_string()),
                    ),
                    now,
                )
                .await?;
                lead
            }
            Attendance::Absent => {
                let previous = lead.reschedule_count;
                lead.reschedule_count += 1;
                lead.last_updated_at = now;
                let strikes = lead.reschedule_count;
                let limit = ctx.policy.no_show_strike_limit;
                if strikes < limit {
                    lead.next_follow_up_at = Some(ctx.policy.reschedule_follow_up(now));
                }
                let lead = repo.update_lead(&lead).await?;

                AuditLog::record(
                    repo.as_mut(),
                    NewAuditEntry::new(
                        lead_id,
                        actor,
                        action_types::TRIAL_NO_SHOW,
                        note.unwrap_or_else(|| format!("No-show {strikes} of {limit}")),
                    )
                    .with_change(Some(previous.to_string()), Some(strikes.to_string())),
                    now,
                )
                .await?;
                tracing::info!(lead_id, strikes, limit, "Trial no-show recorded");

                if strikes >= limit {
                    force_loss(ctx, repo.as_mut(), &mut outbox, lead_id, LOSS_REASON_NO_SHOW).await?
                } else {
                    lead
                }
            }
        };

        repo.commit().await?;
        outbox.flush(ctx).await;
        Ok(lead)
    }
}
