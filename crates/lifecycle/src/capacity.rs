//! Batch seat accounting.

use academy_core::error::CoreError;
use academy_core::status::LeadStatus;
use academy_core::types::{Date, DbId};
use academy_db::models::batch::{Batch, Occupancy};
use academy_db::models::lead::Lead;
use academy_db::Repository;

use crate::context::Context;

#[derive(Clone)]
pub struct CapacityChecker {
    ctx: Context,
}

impl CapacityChecker {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Occupancy of a batch on `date` (today when `None`).
    pub async fn occupancy(&self, batch_id: DbId, date: Option<Date>) -> Result<Occupancy, CoreError> {
        let date = date.unwrap_or_else(|| self.ctx.clock.today());
        let mut repo = self.ctx.begin().await?;
        Self::occupancy_in(repo.as_mut(), batch_id, date).await
    }

    pub async fn occupancy_in(
        repo: &mut dyn Repository,
        batch_id: DbId,
        date: Date,
    ) -> Result<Occupancy, CoreError> {
        let batch = repo.find_batch(batch_id).await?.ok_or(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        })?;
        let occupied = repo.count_occupancy(batch_id, date).await?;
        Ok(Occupancy::new(batch_id, date, occupied, batch.max_capacity))
    }

    /// Lock `batch_id` and confirm a seat is free on `date`.
    ///
    /// The lock is held until the surrounding transaction ends, so the seat
    /// cannot be taken concurrently between this check and the assignment.
    /// A trial seat already held by `holder` in this batch is not counted
    /// against it.
    pub async fn ensure_seat(
        repo: &mut dyn Repository,
        batch_id: DbId,
        date: Date,
        holder: Option<&Lead>,
    ) -> Result<Batch, CoreError> {
        let batch = repo.lock_batch(batch_id).await?.ok_or(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        })?;
        if !batch.is_active {
            return Err(CoreError::Validation(format!(
                "Batch {batch_id} is inactive and cannot take new assignments"
            )));
        }

        let mut occupied = repo.count_occupancy(batch_id, date).await?;
        if holder.is_some_and(|lead| holds_trial_seat(lead, batch_id, date)) {
            occupied -= 1;
        }

        if occupied >= i64::from(batch.max_capacity) {
            tracing::debug!(
                batch_id,
                occupied,
                max_capacity = batch.max_capacity,
                "Batch full"
            );
            return Err(CoreError::CapacityReached {
                batch_id,
                max_capacity: batch.max_capacity,
            });
        }
        Ok(batch)
    }
}

fn holds_trial_seat(lead: &Lead, batch_id: DbId, date: Date) -> bool {
    lead.status == LeadStatus::TrialScheduled
        && lead.trial_batch_id == Some(batch_id)
        && lead.trial_date.map_or(true, |d| d == date)
}
