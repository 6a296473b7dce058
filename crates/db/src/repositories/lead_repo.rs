//! Repository for the `leads` table.

use academy_core::status::LeadStatus;
use academy_core::types::{Date, DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgConnection;

use crate::models::lead::{CreateLead, Lead, LeadExtras, PendingSubscription};
use crate::store::{StoreError, StoreResult};

/// Column list for `leads` queries.
const COLUMNS: &str = "\
    id, full_name, phone, email, date_of_birth, source, status_id, center_id, \
    assigned_user_id, trial_batch_id, trial_date, permanent_batch_id, \
    next_follow_up_at, reschedule_count, nudge_count, do_not_contact, \
    loss_reason, loss_reason_notes, status_at_loss_id, payment_proof_ref, \
    call_confirmation_note, extras, public_token, pending_subscription, \
    created_at, last_updated_at";

/// Raw `leads` row; statuses are still SMALLINT ids.
#[derive(sqlx::FromRow)]
struct LeadRow {
    id: DbId,
    full_name: String,
    phone: Option<String>,
    email: Option<String>,
    date_of_birth: Option<Date>,
    source: String,
    status_id: i16,
    center_id: DbId,
    assigned_user_id: Option<DbId>,
    trial_batch_id: Option<DbId>,
    trial_date: Option<Date>,
    permanent_batch_id: Option<DbId>,
    next_follow_up_at: Option<Timestamp>,
    reschedule_count: i32,
    nudge_count: i32,
    do_not_contact: bool,
    loss_reason: Option<String>,
    loss_reason_notes: Option<String>,
    status_at_loss_id: Option<i16>,
    payment_proof_ref: Option<String>,
    call_confirmation_note: Option<String>,
    extras: Json<LeadExtras>,
    public_token: String,
    pending_subscription: Option<Json<PendingSubscription>>,
    created_at: Timestamp,
    last_updated_at: Timestamp,
}

fn decode_status(id: i16) -> StoreResult<LeadStatus> {
    LeadStatus::from_id(id).ok_or_else(|| StoreError::Decode {
        table: "leads",
        reason: format!("unknown status id {id}"),
    })
}

impl TryFrom<LeadRow> for Lead {
    type Error = StoreError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: row.id,
            full_name: row.full_name,
            phone: row.phone,
            email: row.email,
            date_of_birth: row.date_of_birth,
            source: row.source,
            status: decode_status(row.status_id)?,
            center_id: row.center_id,
            assigned_user_id: row.assigned_user_id,
            trial_batch_id: row.trial_batch_id,
            trial_date: row.trial_date,
            permanent_batch_id: row.permanent_batch_id,
            next_follow_up_at: row.next_follow_up_at,
            reschedule_count: row.reschedule_count,
            nudge_count: row.nudge_count,
            do_not_contact: row.do_not_contact,
            loss_reason: row.loss_reason,
            loss_reason_notes: row.loss_reason_notes,
            status_at_loss: row.status_at_loss_id.map(decode_status).transpose()?,
            payment_proof_ref: row.payment_proof_ref,
            call_confirmation_note: row.call_confirmation_note,
            extras: row.extras.0,
            public_token: row.public_token,
            pending_subscription: row.pending_subscription.map(|json| json.0),
            created_at: row.created_at,
            last_updated_at: row.last_updated_at,
        })
    }
}

fn decode_all(rows: Vec<LeadRow>) -> StoreResult<Vec<Lead>> {
    rows.into_iter().map(Lead::try_from).collect()
}

/// Provides CRUD operations for leads. Leads are never deleted.
pub struct LeadRepo;

impl LeadRepo {
    pub async fn find_by_id(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<Lead>> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1");
        let row = sqlx::query_as::<_, LeadRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(Lead::try_from).transpose()
    }

    /// Fetch and row-lock a lead until the transaction ends.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> StoreResult<Option<Lead>> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, LeadRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        row.map(Lead::try_from).transpose()
    }

    pub async fn find_by_token(conn: &mut PgConnection, token: &str) -> StoreResult<Option<Lead>> {
        let query = format!("SELECT {COLUMNS} FROM leads WHERE public_token = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, LeadRow>(&query)
            .bind(token)
            .fetch_optional(conn)
            .await?;
        row.map(Lead::try_from).transpose()
    }

    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateLead,
        public_token: &str,
        now: Timestamp,
    ) -> StoreResult<Lead> {
        let query = format!(
            "INSERT INTO leads
                (full_name, phone, email, date_of_birth, source, status_id, center_id,
                 assigned_user_id, next_follow_up_at, extras, public_token,
                 created_at, last_updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, LeadRow>(&query)
            .bind(&input.full_name)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(input.date_of_birth)
            .bind(input.source.as_str())
            .bind(LeadStatus::New.id())
            .bind(input.center_id)
            .bind(input.assigned_user_id)
            .bind(input.next_follow_up_at)
            .bind(Json(LeadExtras::default()))
            .bind(public_token)
            .bind(now)
            .fetch_one(conn)
            .await?;
        Lead::try_from(row)
    }

    /// Write back every mutable column of `lead`.
    pub async fn update(conn: &mut PgConnection, lead: &Lead) -> StoreResult<Lead> {
        let query = format!(
            "UPDATE leads SET
                full_name = $2, phone = $3, email = $4, date_of_birth = $5,
                status_id = $6, center_id = $7, assigned_user_id = $8,
                trial_batch_id = $9, trial_date = $10, permanent_batch_id = $11,
                next_follow_up_at = $12, reschedule_count = $13, nudge_count = $14,
                do_not_contact = $15, loss_reason = $16, loss_reason_notes = $17,
                status_at_loss_id = $18, payment_proof_ref = $19,
                call_confirmation_note = $20, extras = $21,
                pending_subscription = $22, last_updated_at = $23
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, LeadRow>(&query)
            .bind(lead.id)
            .bind(&lead.full_name)
            .bind(&lead.phone)
            .bind(&lead.email)
            .bind(lead.date_of_birth)
            .bind(lead.status.id())
            .bind(lead.center_id)
            .bind(lead.assigned_user_id)
            .bind(lead.trial_batch_id)
            .bind(lead.trial_date)
            .bind(lead.permanent_batch_id)
            .bind(lead.next_follow_up_at)
            .bind(lead.reschedule_count)
            .bind(lead.nudge_count)
            .bind(lead.do_not_contact)
            .bind(&lead.loss_reason)
            .bind(&lead.loss_reason_notes)
            .bind(lead.status_at_loss.map(LeadStatus::id))
            .bind(&lead.payment_proof_ref)
            .bind(&lead.call_confirmation_note)
            .bind(Json(&lead.extras))
            .bind(lead.pending_subscription.as_ref().map(Json))
            .bind(lead.last_updated_at)
            .fetch_optional(conn)
            .await?
            .ok_or(StoreError::Missing {
                entity: "Lead",
                id: lead.id,
            })?;
        Lead::try_from(row)
    }

    pub async fn touch(conn: &mut PgConnection, id: DbId, at: Timestamp) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE leads SET last_updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List leads in one status, oldest activity first.
    pub async fn list_by_status(
        conn: &mut PgConnection,
        status: LeadStatus,
    ) -> StoreResult<Vec<Lead>> {
        let query = format!(
            "SELECT {COLUMNS} FROM leads WHERE status_id = $1 ORDER BY last_updated_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, LeadRow>(&query)
            .bind(status.id())
            .fetch_all(conn)
            .await?;
        decode_all(rows)
    }
}
