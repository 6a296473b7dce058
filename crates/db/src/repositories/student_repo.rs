//! Repository for the `students` table.

use academy_core::types::{Date, DbId, Timestamp};
use sqlx::PgConnection;

use crate::models::student::{NewStudent, Student};
use crate::store::{StoreError, StoreResult};

/// Column list for `students` queries.
const COLUMNS: &str = "\
    id, lead_id, center_id, subscription_plan, subscription_start, subscription_end, \
    payment_verified, payment_proof_ref, is_active, renewal_intent, in_grace_period, \
    grace_nudge_count, created_at, updated_at";

pub struct StudentRepo;

impl StudentRepo {
    pub async fn find_by_id(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<Student>> {
        let query = format!("SELECT {COLUMNS} FROM students WHERE id = $1");
        Ok(sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?)
    }

    pub async fn lock(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<Student>> {
        let query = format!("SELECT {COLUMNS} FROM students WHERE id = $1 FOR UPDATE");
        Ok(sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?)
    }

    /// At most one student exists per lead (unique `lead_id`).
    pub async fn find_by_lead(
        conn: &mut PgConnection,
        lead_id: DbId,
    ) -> StoreResult<Option<Student>> {
        let query = format!("SELECT {COLUMNS} FROM students WHERE lead_id = $1");
        Ok(sqlx::query_as::<_, Student>(&query)
            .bind(lead_id)
            .fetch_optional(conn)
            .await?)
    }

    pub async fn create(
        conn: &mut PgConnection,
        input: &NewStudent,
        now: Timestamp,
    ) -> StoreResult<Student> {
        let query = format!(
            "INSERT INTO students
                (lead_id, center_id, subscription_plan, subscription_start, subscription_end,
                 payment_verified, payment_proof_ref, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Student>(&query)
            .bind(input.lead_id)
            .bind(input.center_id)
            .bind(&input.subscription_plan)
            .bind(input.subscription_start)
            .bind(input.subscription_end)
            .bind(input.payment_verified)
            .bind(&input.payment_proof_ref)
            .bind(now)
            .fetch_one(conn)
            .await?)
    }

    pub async fn update(conn: &mut PgConnection, student: &Student) -> StoreResult<Student> {
        let query = format!(
            "UPDATE students SET
                center_id = $2, subscription_plan = $3, subscription_start = $4,
                subscription_end = $5, payment_verified = $6, payment_proof_ref = $7,
                is_active = $8, renewal_intent = $9, in_grace_period = $10,
                grace_nudge_count = $11, updated_at = $12
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Student>(&query)
            .bind(student.id)
            .bind(student.center_id)
            .bind(&student.subscription_plan)
            .bind(student.subscription_start)
            .bind(student.subscription_end)
            .bind(student.payment_verified)
            .bind(&student.payment_proof_ref)
            .bind(student.is_active)
            .bind(student.renewal_intent)
            .bind(student.in_grace_period)
            .bind(student.grace_nudge_count)
            .bind(student.updated_at)
            .fetch_optional(conn)
            .await?
            .ok_or(StoreError::Missing {
                entity: "Student",
                id: student.id,
            })
    }

    /// Hard-delete a student. Only status reversals out of Joined do this.
    pub async fn delete(conn: &mut PgConnection, id: DbId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active students whose subscription ended before `today`.
    pub async fn list_expired(conn: &mut PgConnection, today: Date) -> StoreResult<Vec<Student>> {
        let query = format!(
            "SELECT {COLUMNS} FROM students
             WHERE is_active = true AND subscription_end < $1
             ORDER BY subscription_end ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, Student>(&query)
            .bind(today)
            .fetch_all(conn)
            .await?)
    }
}
