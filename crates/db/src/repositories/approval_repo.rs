//! Repository for the `approval_requests` table.

use academy_core::approval::ApprovalAction;
use academy_core::status::ApprovalStatus;
use academy_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgConnection;

use crate::models::approval::{ApprovalRequest, NewApprovalRequest};
use crate::store::{StoreError, StoreResult};

/// Column list for `approval_requests` queries.
const COLUMNS: &str = "\
    id, requester_id, lead_id, student_id, request_type, action, current_value, \
    requested_value, reason, status_id, resolver_id, resolution_note, resolved_at, created_at";

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    id: DbId,
    requester_id: DbId,
    lead_id: DbId,
    student_id: Option<DbId>,
    request_type: String,
    action: Json<ApprovalAction>,
    current_value: Option<String>,
    requested_value: String,
    reason: String,
    status_id: i16,
    resolver_id: Option<DbId>,
    resolution_note: Option<String>,
    resolved_at: Option<Timestamp>,
    created_at: Timestamp,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = StoreError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        let status = ApprovalStatus::from_id(row.status_id).ok_or_else(|| StoreError::Decode {
            table: "approval_requests",
            reason: format!("unknown status id {}", row.status_id),
        })?;
        Ok(ApprovalRequest {
            id: row.id,
            requester_id: row.requester_id,
            lead_id: row.lead_id,
            student_id: row.student_id,
            request_type: row.request_type,
            action: row.action.0,
            current_value: row.current_value,
            requested_value: row.requested_value,
            reason: row.reason,
            status,
            resolver_id: row.resolver_id,
            resolution_note: row.resolution_note,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
        })
    }
}

fn decode_all(rows: Vec<ApprovalRow>) -> StoreResult<Vec<ApprovalRequest>> {
    rows.into_iter().map(ApprovalRequest::try_from).collect()
}

/// Provides CRUD operations for approval requests.
pub struct ApprovalRepo;

impl ApprovalRepo {
    pub async fn create(
        conn: &mut PgConnection,
        input: &NewApprovalRequest,
        now: Timestamp,
    ) -> StoreResult<ApprovalRequest> {
        let query = format!(
            "INSERT INTO approval_requests
                (requester_id, lead_id, student_id, request_type, action, current_value,
                 requested_value, reason, status_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(input.requester_id)
            .bind(input.lead_id)
            .bind(input.student_id)
            .bind(input.action.request_type())
            .bind(Json(&input.action))
            .bind(&input.current_value)
            .bind(input.action.requested_value())
            .bind(&input.reason)
            .bind(ApprovalStatus::Pending.id())
            .bind(now)
            .fetch_one(conn)
            .await?;
        ApprovalRequest::try_from(row)
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> StoreResult<Option<ApprovalRequest>> {
        let query = format!("SELECT {COLUMNS} FROM approval_requests WHERE id = $1");
        let row = sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(ApprovalRequest::try_from).transpose()
    }

    /// Lock a request so two approvers cannot resolve it concurrently.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<ApprovalRequest>> {
        let query = format!("SELECT {COLUMNS} FROM approval_requests WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(ApprovalRequest::try_from).transpose()
    }

    /// Persist a resolution. Only the resolution columns are mutable.
    pub async fn resolve(
        conn: &mut PgConnection,
        request: &ApprovalRequest,
    ) -> StoreResult<ApprovalRequest> {
        let query = format!(
            "UPDATE approval_requests
             SET status_id = $2, resolver_id = $3, resolution_note = $4, resolved_at = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(request.id)
            .bind(request.status.id())
            .bind(request.resolver_id)
            .bind(&request.resolution_note)
            .bind(request.resolved_at)
            .fetch_optional(conn)
            .await?
            .ok_or(StoreError::Missing {
                entity: "ApprovalRequest",
                id: request.id,
            })?;
        ApprovalRequest::try_from(row)
    }

    /// Pending requests, oldest first.
    pub async fn list_pending(conn: &mut PgConnection) -> StoreResult<Vec<ApprovalRequest>> {
        let query = format!(
            "SELECT {COLUMNS} FROM approval_requests WHERE status_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(ApprovalStatus::Pending.id())
            .fetch_all(conn)
            .await?;
        decode_all(rows)
    }

    /// All requests filed against a lead (or its student), newest first.
    pub async fn list_for_lead(
        conn: &mut PgConnection,
        lead_id: DbId,
    ) -> StoreResult<Vec<ApprovalRequest>> {
        let query = format!(
            "SELECT {COLUMNS} FROM approval_requests WHERE lead_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(lead_id)
            .fetch_all(conn)
            .await?;
        decode_all(rows)
    }
}
