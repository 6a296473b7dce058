//! Repository for the `batch_assignments` roster link table.

use academy_core::types::{DbId, Timestamp};
use sqlx::PgConnection;

use crate::store::StoreResult;

pub struct AssignmentRepo;

impl AssignmentRepo {
    /// Batch ids linked to a lead, in link order.
    pub async fn list_for_lead(conn: &mut PgConnection, lead_id: DbId) -> StoreResult<Vec<DbId>> {
        Ok(sqlx::query_scalar(
            "SELECT batch_id FROM batch_assignments WHERE lead_id = $1 ORDER BY id ASC",
        )
        .bind(lead_id)
        .fetch_all(conn)
        .await?)
    }

    pub async fn list_for_batch(
        conn: &mut PgConnection,
        batch_id: DbId,
    ) -> StoreResult<Vec<DbId>> {
        Ok(sqlx::query_scalar(
            "SELECT lead_id FROM batch_assignments WHERE batch_id = $1 ORDER BY id ASC",
        )
        .bind(batch_id)
        .fetch_all(conn)
        .await?)
    }

    /// Replace a lead's link set. An empty slice removes every link.
    pub async fn replace_for_lead(
        conn: &mut PgConnection,
        lead_id: DbId,
        batch_ids: &[DbId],
        now: Timestamp,
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM batch_assignments WHERE lead_id = $1")
            .bind(lead_id)
            .execute(&mut *conn)
            .await?;
        if batch_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO batch_assignments (lead_id, batch_id, created_at)
             SELECT $1, batch_id, $3 FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS t(batch_id, ord)
             ORDER BY ord",
        )
        .bind(lead_id)
        .bind(batch_ids)
        .bind(now)
        .execute(conn)
        .await?;
        Ok(())
    }
}
