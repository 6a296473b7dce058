//! Repository for the `batches` table.

use academy_core::status::{LeadStatus, StatusId};
use academy_core::types::{Date, DbId, Timestamp};
use sqlx::PgConnection;

use crate::models::batch::{Batch, CreateBatch};
use crate::store::{StoreError, StoreResult};

/// Column list for `batches` queries.
const COLUMNS: &str = "\
    id, center_id, name, days_of_week, start_time, end_time, max_capacity, \
    coach_id, is_active, created_at, updated_at";

/// Lead statuses whose roster links hold a seat.
const SEAT_STATUSES: [StatusId; 2] = [
    LeadStatus::Joined as StatusId,
    LeadStatus::PaymentPendingVerification as StatusId,
];

pub struct BatchRepo;

impl BatchRepo {
    pub async fn find_by_id(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<Batch>> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE id = $1");
        Ok(sqlx::query_as::<_, Batch>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?)
    }

    /// Row-lock a batch so concurrent enrolments into it serialise.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<Batch>> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Batch>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?)
    }

    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateBatch,
        now: Timestamp,
    ) -> StoreResult<Batch> {
        let query = format!(
            "INSERT INTO batches
                (center_id, name, days_of_week, start_time, end_time, max_capacity,
                 coach_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Batch>(&query)
            .bind(input.center_id)
            .bind(&input.name)
            .bind(&input.days_of_week)
            .bind(input.start_time)
            .bind(input.end_time)
            .bind(input.max_capacity)
            .bind(input.coach_id)
            .bind(now)
            .fetch_one(conn)
            .await?)
    }

    pub async fn update(conn: &mut PgConnection, batch: &Batch) -> StoreResult<Batch> {
        let query = format!(
            "UPDATE batches SET
                name = $2, days_of_week = $3, start_time = $4, end_time = $5,
                max_capacity = $6, coach_id = $7, is_active = $8, updated_at = $9
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(batch.id)
            .bind(&batch.name)
            .bind(&batch.days_of_week)
            .bind(batch.start_time)
            .bind(batch.end_time)
            .bind(batch.max_capacity)
            .bind(batch.coach_id)
            .bind(batch.is_active)
            .bind(batch.updated_at)
            .fetch_optional(conn)
            .await?
            .ok_or(StoreError::Missing {
                entity: "Batch",
                id: batch.id,
            })
    }

    /// Delete a batch. Roster links cascade; lead references are cleared
    /// first so trial dates go with the trial batch.
    pub async fn delete(conn: &mut PgConnection, id: DbId) -> StoreResult<bool> {
        sqlx::query(
            "UPDATE leads SET trial_batch_id = NULL, trial_date = NULL WHERE trial_batch_id = $1",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        sqlx::query("UPDATE leads SET permanent_batch_id = NULL WHERE permanent_batch_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Seats in use on `date`.
    pub async fn count_occupancy(
        conn: &mut PgConnection,
        batch_id: DbId,
        date: Date,
    ) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT
                (SELECT COUNT(*) FROM batch_assignments ba
                   JOIN leads l ON l.id = ba.lead_id
                  WHERE ba.batch_id = $1 AND l.status_id = ANY($2))
              + (SELECT COUNT(*) FROM leads
                  WHERE trial_batch_id = $1 AND status_id = $3
                    AND (trial_date IS NULL OR trial_date = $4))",
        )
        .bind(batch_id)
        .bind(&SEAT_STATUSES[..])
        .bind(LeadStatus::TrialScheduled.id())
        .bind(date)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }
}
