//! Repository for the append-only `lead_audit_logs` table.
//!
//! There is no update or delete method; a database trigger also rejects
//! both.

use academy_core::types::{DbId, Timestamp};
use sqlx::PgConnection;

use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::store::StoreResult;

/// Column list for lead_audit_logs queries.
const COLUMNS: &str = "\
    id, lead_id, actor_id, action_type, description, old_value, new_value, \
    integrity_hash, created_at";

pub struct AuditRepo;

impl AuditRepo {
    pub async fn append(
        conn: &mut PgConnection,
        entry: &NewAuditEntry,
        integrity_hash: &str,
        created_at: Timestamp,
    ) -> StoreResult<AuditEntry> {
        let query = format!(
            "INSERT INTO lead_audit_logs
                (lead_id, actor_id, action_type, description, old_value, new_value,
                 integrity_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        Ok(sqlx::query_as::<_, AuditEntry>(&query)
            .bind(entry.lead_id)
            .bind(entry.actor_id)
            .bind(entry.action_type)
            .bind(&entry.description)
            .bind(&entry.old_value)
            .bind(&entry.new_value)
            .bind(integrity_hash)
            .bind(created_at)
            .fetch_one(conn)
            .await?)
    }

    /// Hash of the lead's most recent entry, for chaining.
    pub async fn last_hash(conn: &mut PgConnection, lead_id: DbId) -> StoreResult<Option<String>> {
        Ok(sqlx::query_scalar(
            "SELECT integrity_hash FROM lead_audit_logs
             WHERE lead_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(lead_id)
        .fetch_optional(conn)
        .await?)
    }

    /// Newest first, bounded.
    pub async fn list_for_lead(
        conn: &mut PgConnection,
        lead_id: DbId,
        limit: i64,
    ) -> StoreResult<Vec<AuditEntry>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lead_audit_logs
             WHERE lead_id = $1 ORDER BY id DESC LIMIT $2"
        );
        Ok(sqlx::query_as::<_, AuditEntry>(&query)
            .bind(lead_id)
            .bind(limit)
            .fetch_all(conn)
            .await?)
    }

    /// The whole chain, oldest first.
    pub async fn list_chain(conn: &mut PgConnection, lead_id: DbId) -> StoreResult<Vec<AuditEntry>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lead_audit_logs WHERE lead_id = $1 ORDER BY id ASC"
        );
        Ok(sqlx::query_as::<_, AuditEntry>(&query)
            .bind(lead_id)
            .fetch_all(conn)
            .await?)
    }
}
