//! Batch definitions and roster membership.

use std::collections::BTreeSet;

use academy_core::approval::format_ids;
use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::types::{Date, DbId, Timestamp};
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::batch::{Batch, CreateBatch, UpdateBatch};
use academy_db::models::lead::Lead;
use academy_db::Repository;
use chrono::NaiveTime;

use crate::audit::AuditLog;
use crate::capacity::CapacityChecker;
use crate::context::Context;

#[derive(Clone)]
pub struct BatchRoster {
    ctx: Context,
}

impl BatchRoster {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn get(&self, batch_id: DbId) -> Result<Batch, CoreError> {
        let mut repo = self.ctx.begin().await?;
        find_batch(repo.as_mut(), batch_id).await
    }

    pub async fn create_batch(&self, input: CreateBatch) -> Result<Batch, CoreError> {
        validate_name(&input.name)?;
        validate_schedule(&input.days_of_week, input.start_time, input.end_time)?;
        validate_capacity(input.max_capacity)?;

        let input = CreateBatch {
            days_of_week: normalize_days(&input.days_of_week),
            name: input.name.trim().to_string(),
            ..input
        };

        let mut repo = self.ctx.begin().await?;
        let batch = repo.insert_batch(&input, self.ctx.clock.now()).await?;
        repo.commit().await?;

        tracing::info!(batch_id = batch.id, center_id = batch.center_id, "Batch created");
        Ok(batch)
    }

    /// Patch a batch. Capacity may not drop below today's occupancy.
    pub async fn update_batch(&self, batch_id: DbId, input: UpdateBatch) -> Result<Batch, CoreError> {
        let mut repo = self.ctx.begin().await?;
        let mut batch = lock_batch(repo.as_mut(), batch_id).await?;

        if let Some(name) = &input.name {
            validate_name(name)?;
            batch.name = name.trim().to_string();
        }
        if let Some(days) = &input.days_of_week {
            batch.days_of_week = normalize_days(days);
        }
        batch.start_time = input.start_time.unwrap_or(batch.start_time);
        batch.end_time = input.end_time.unwrap_or(batch.end_time);
        validate_schedule(&batch.days_of_week, batch.start_time, batch.end_time)?;

        if let Some(capacity) = input.max_capacity {
            validate_capacity(capacity)?;
            if capacity < batch.max_capacity {
                let occupied = repo.count_occupancy(batch_id, self.ctx.clock.today()).await?;
                if i64::from(capacity) < occupied {
                    return Err(CoreError::Validation(format!(
                        "Capacity {capacity} is below current occupancy {occupied}"
                    )));
                }
            }
            batch.max_capacity = capacity;
        }
        if let Some(active) = input.is_active {
            batch.is_active = active;
        }
        batch.updated_at = self.ctx.clock.now();

        let batch = repo.update_batch(&batch).await?;
        repo.commit().await?;
        tracing::info!(batch_id, "Batch updated");
        Ok(batch)
    }

    /// Stop new assignments; existing roster links stay.
    pub async fn deactivate_batch(&self, batch_id: DbId) -> Result<Batch, CoreError> {
        self.update_batch(
            batch_id,
            UpdateBatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn assign_coach(
        &self,
        batch_id: DbId,
        coach_id: Option<DbId>,
    ) -> Result<Batch, CoreError> {
        let mut repo = self.ctx.begin().await?;
        let mut batch = lock_batch(repo.as_mut(), batch_id).await?;
        batch.coach_id = coach_id;
        batch.updated_at = self.ctx.clock.now();
        let batch = repo.update_batch(&batch).await?;
        repo.commit().await?;
        tracing::info!(batch_id, ?coach_id, "Coach assigned");
        Ok(batch)
    }

    /// Delete a batch and its roster links. Each lead that lost a link gets
    /// an audit entry.
    pub async fn delete_batch(&self, batch_id: DbId, actor: Option<DbId>) -> Result<(), CoreError> {
        let now = self.ctx.clock.now();
        let mut repo = self.ctx.begin().await?;
        lock_batch(repo.as_mut(), batch_id).await?;

        let members = repo.list_batch_leads(batch_id).await?;
        let mut before = Vec::with_capacity(members.len());
        for lead_id in &members {
            before.push((*lead_id, repo.list_lead_batches(*lead_id).await?));
        }

        repo.delete_batch(batch_id).await?;

        for (lead_id, old) in before {
            let new: Vec<DbId> = old.iter().copied().filter(|id| *id != batch_id).collect();
            let entry = NewAuditEntry::new(
                lead_id,
                actor,
                action_types::BATCH_ASSIGNMENT,
                format!("Batch {batch_id} deleted"),
            )
            .with_change(Some(format_ids(&old)), Some(format_ids(&new)));
            AuditLog::record(repo.as_mut(), entry, now).await?;
        }

        repo.commit().await?;
        tracing::info!(batch_id, members = members.len(), "Batch deleted");
        Ok(())
    }

    /// Leads currently linked to a batch.
    pub async fn roster(&self, batch_id: DbId) -> Result<Vec<Lead>, CoreError> {
        let mut repo = self.ctx.begin().await?;
        find_batch(repo.as_mut(), batch_id).await?;
        let mut leads = Vec::new();
        for lead_id in repo.list_batch_leads(batch_id).await? {
            if let Some(lead) = repo.find_lead(lead_id).await? {
                leads.push(lead);
            }
        }
        Ok(leads)
    }

    /// Replace the link set of `lead` within an open transaction.
    ///
    /// Batches not already linked are capacity-checked for `date` (in id
    /// order, so concurrent callers lock in the same order). Sets the lead's
    /// permanent batch to the first id of the new set. Returns the audit
    /// entry describing the change, or `None` if the set is unchanged.
    pub async fn replace_links(
        repo: &mut dyn Repository,
        lead: &mut Lead,
        batch_ids: &[DbId],
        date: Date,
        now: Timestamp,
        actor: Option<DbId>,
    ) -> Result<Option<NewAuditEntry>, CoreError> {
        let new = dedup(batch_ids);
        let old = repo.list_lead_batches(lead.id).await?;
        if old == new {
            return Ok(None);
        }

        let existing: BTreeSet<DbId> = old.iter().copied().collect();
        let added: BTreeSet<DbId> = new.iter().copied().filter(|id| !existing.contains(id)).collect();
        for batch_id in added {
            CapacityChecker::ensure_seat(repo, batch_id, date, Some(lead)).await?;
        }

        repo.replace_lead_batches(lead.id, &new, now).await?;
        lead.permanent_batch_id = new.first().copied();

        Ok(Some(
            NewAuditEntry::new(lead.id, actor, action_types::BATCH_ASSIGNMENT, "Batch assignments")
                .with_change(Some(format_ids(&old)), Some(format_ids(&new))),
        ))
    }
}

/// Drop zero ids and duplicates, keeping first-seen order.
pub(crate) fn dedup(ids: &[DbId]) -> Vec<DbId> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .copied()
        .filter(|id| *id > 0 && seen.insert(*id))
        .collect()
}

async fn find_batch(repo: &mut dyn Repository, batch_id: DbId) -> Result<Batch, CoreError> {
    repo.find_batch(batch_id).await?.ok_or(CoreError::NotFound {
        entity: "Batch",
        id: batch_id,
    })
}

async fn lock_batch(repo: &mut dyn Repository, batch_id: DbId) -> Result<Batch, CoreError> {
    repo.lock_batch(batch_id).await?.ok_or(CoreError::NotFound {
        entity: "Batch",
        id: batch_id,
    })
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Batch name must not be empty".to_string()));
    }
    Ok(())
}

fn validate_capacity(capacity: i32) -> Result<(), CoreError> {
    if capacity <= 0 {
        return Err(CoreError::Validation(format!(
            "Batch capacity must be positive, got {capacity}"
        )));
    }
    Ok(())
}

fn validate_schedule(days: &[i16], start: NaiveTime, end: NaiveTime) -> Result<(), CoreError> {
    if let Some(day) = days.iter().find(|d| !(1..=7).contains(*d)) {
        return Err(CoreError::Validation(format!(
            "Invalid day of week {day}; expected 1 (Monday) to 7 (Sunday)"
        )));
    }
    if end <= start {
        return Err(CoreError::Validation(format!(
            "Batch end time {end} must be after start time {start}"
        )));
    }
    Ok(())
}

fn normalize_days(days: &[i16]) -> Vec<i16> {
    days.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}
