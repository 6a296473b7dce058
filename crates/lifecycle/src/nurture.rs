//! Re-engagement nudges and the no-response strike rule.

use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::policy::LOSS_REASON_NO_RESPONSE;
use academy_core::status::LeadStatus;
use academy_core::types::DbId;
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::lead::Lead;

use crate::audit::AuditLog;
use crate::engine::{force_loss, LifecycleEngine};
use crate::outbox::Outbox;

impl LifecycleEngine {
    /// Count one re-engagement attempt on a parked lead.
    ///
    /// A `Nurture` lead that reaches the strike limit is marked lost in the
    /// same unit of work.
    pub async fn nudge(&self, lead_id: DbId, actor: Option<DbId>) -> Result<Lead, CoreError> {
        let ctx = &self.ctx;
        let now = ctx.clock.now();
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
            entity: "Lead",
            id: lead_id,
        })?;
        if !matches!(lead.status, LeadStatus::Nurture | LeadStatus::OnBreak) {
            return Err(CoreError::InvalidTransition(format!(
                "Nudges apply to Nurture or On Break leads, not {}",
                lead.status
            )));
        }

        let previous = lead.nudge_count;
        lead.nudge_count += 1;
        lead.last_updated_at = now;
        let mut lead = repo.update_lead(&lead).await?;
        AuditLog::record(
            repo.as_mut(),
            NewAuditEntry::new(lead_id, actor, action_types::NUDGE_SENT, "Re-engagement nudge sent")
                .with_change(Some(previous.to_string()), Some(lead.nudge_count.to_string())),
            now,
        )
        .await?;
        tracing::info!(lead_id, nudges = lead.nudge_count, "Nudge recorded");

        if lead.status == LeadStatus::Nurture && lead.nudge_count >= ctx.policy.nudge_strike_limit {
            lead = force_loss(ctx, repo.as_mut(), &mut outbox, lead_id, LOSS_REASON_NO_RESPONSE).await?;
        }

        repo.commit().await?;
        outbox.flush(ctx).await;
        Ok(lead)
    }

    /// Mark lost every `Nurture` lead at or over the nudge limit.
    ///
    /// Each lead is handled in its own unit of work; a failure is logged and
    /// does not stop the sweep. Returns the ids that were marked lost.
    pub async fn nurture_sweep(&self) -> Result<Vec<DbId>, CoreError> {
        let ctx = &self.ctx;
        let limit = ctx.policy.nudge_strike_limit;
        let candidates: Vec<DbId> = {
            let mut repo = ctx.begin().await?;
            repo.list_leads_by_status(LeadStatus::Nurture)
                .await?
                .into_iter()
                .filter(|lead| lead.nudge_count >= limit)
                .map(|lead| lead.id)
                .collect()
        };

        let mut affected = Vec::new();
        for lead_id in candidates {
            match self.expire_nurture_lead(lead_id).await {
                Ok(true) => affected.push(lead_id),
                Ok(false) => {}
                Err(e) => tracing::error!(lead_id, error = %e, "Nurture sweep failed for lead"),
            }
        }

        if !affected.is_empty() {
            tracing::info!(count = affected.len(), "Nurture sweep marked leads lost");
        }
        Ok(affected)
    }

    async fn expire_nurture_lead(&self, lead_id: DbId) -> Result<bool, CoreError> {
        let ctx = &self.ctx;
        let mut repo = ctx.begin().await?;
        let mut outbox = Outbox::new();

        // Re-check under the row lock; the lead may have moved since listing.
        let Some(lead) = repo.lock_lead(lead_id).await? else {
            return Ok(false);
        };
        if lead.status != LeadStatus::Nurture || lead.nudge_count < ctx.policy.nudge_strike_limit {
            return Ok(false);
        }

        force_loss(ctx, repo.as_mut(), &mut outbox, lead_id, LOSS_REASON_NO_RESPONSE).await?;
        repo.commit().await?;
        outbox.flush(ctx).await;
        Ok(true)
    }
}
