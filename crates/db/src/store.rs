//! Transactional storage seam.
//!
//! Every lifecycle operation runs inside one [`Repository`] obtained from
//! [`Store::begin`]. Dropping a repository without calling
//! [`Repository::commit`] rolls back every write made through it.

use academy_core::error::CoreError;
use academy_core::status::LeadStatus;
use academy_core::types::{Date, DbId, Timestamp};
use async_trait::async_trait;

use crate::models::approval::{ApprovalRequest, NewApprovalRequest};
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::batch::{Batch, CreateBatch};
use crate::models::lead::{CreateLead, Lead};
use crate::models::student::{NewStudent, Student};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row in {table}: {reason}")]
    Decode { table: &'static str, reason: String },

    #[error("{entity} with id {id} vanished mid-transaction")]
    Missing { entity: &'static str, id: DbId },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { entity, id } => CoreError::NotFound { entity, id },
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// Opens transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn Repository>>;
}

/// One open transaction.
///
/// `lock_*` methods take a row lock held until commit or rollback; plain
/// `find_*` methods read without locking.
#[async_trait]
pub trait Repository: Send {
    // -- leads --
    async fn find_lead(&mut self, id: DbId) -> StoreResult<Option<Lead>>;
    async fn lock_lead(&mut self, id: DbId) -> StoreResult<Option<Lead>>;
    async fn find_lead_by_token(&mut self, token: &str) -> StoreResult<Option<Lead>>;
    async fn insert_lead(
        &mut self,
        input: &CreateLead,
        public_token: &str,
        now: Timestamp,
    ) -> StoreResult<Lead>;
    /// Persist every mutable column of `lead`.
    async fn update_lead(&mut self, lead: &Lead) -> StoreResult<Lead>;
    /// Bump `last_updated_at` only. Returns `false` if the lead does not exist.
    async fn touch_lead(&mut self, id: DbId, at: Timestamp) -> StoreResult<bool>;
    async fn list_leads_by_status(&mut self, status: LeadStatus) -> StoreResult<Vec<Lead>>;

    // -- students --
    async fn find_student(&mut self, id: DbId) -> StoreResult<Option<Student>>;
    async fn lock_student(&mut self, id: DbId) -> StoreResult<Option<Student>>;
    async fn find_student_by_lead(&mut self, lead_id: DbId) -> StoreResult<Option<Student>>;
    async fn insert_student(&mut self, input: &NewStudent, now: Timestamp) -> StoreResult<Student>;
    async fn update_student(&mut self, student: &Student) -> StoreResult<Student>;
    async fn delete_student(&mut self, id: DbId) -> StoreResult<bool>;
    /// Active students whose subscription ended strictly before `today`.
    async fn list_expired_students(&mut self, today: Date) -> StoreResult<Vec<Student>>;

    // -- batches --
    async fn find_batch(&mut self, id: DbId) -> StoreResult<Option<Batch>>;
    async fn lock_batch(&mut self, id: DbId) -> StoreResult<Option<Batch>>;
    async fn insert_batch(&mut self, input: &CreateBatch, now: Timestamp) -> StoreResult<Batch>;
    async fn update_batch(&mut self, batch: &Batch) -> StoreResult<Batch>;
    /// Delete a batch, its roster links, and any lead references to it.
    async fn delete_batch(&mut self, id: DbId) -> StoreResult<bool>;
    /// Seats in use on `date`: links of seat-holding leads plus trials
    /// booked into the batch for that day.
    async fn count_occupancy(&mut self, batch_id: DbId, date: Date) -> StoreResult<i64>;

    // -- roster links --
    async fn list_lead_batches(&mut self, lead_id: DbId) -> StoreResult<Vec<DbId>>;
    /// Replace a lead's link set with exactly `batch_ids`.
    async fn replace_lead_batches(
        &mut self,
        lead_id: DbId,
        batch_ids: &[DbId],
        now: Timestamp,
    ) -> StoreResult<()>;
    async fn list_batch_leads(&mut self, batch_id: DbId) -> StoreResult<Vec<DbId>>;

    // -- approvals --
    async fn insert_approval(
        &mut self,
        input: &NewApprovalRequest,
        now: Timestamp,
    ) -> StoreResult<ApprovalRequest>;
    async fn find_approval(&mut self, id: DbId) -> StoreResult<Option<ApprovalRequest>>;
    async fn lock_approval(&mut self, id: DbId) -> StoreResult<Option<ApprovalRequest>>;
    async fn update_approval(&mut self, request: &ApprovalRequest) -> StoreResult<ApprovalRequest>;
    async fn list_pending_approvals(&mut self) -> StoreResult<Vec<ApprovalRequest>>;
    async fn list_approvals_for_lead(&mut self, lead_id: DbId) -> StoreResult<Vec<ApprovalRequest>>;

    // -- audit --
    async fn last_audit_hash(&mut self, lead_id: DbId) -> StoreResult<Option<String>>;
    async fn insert_audit(
        &mut self,
        entry: &NewAuditEntry,
        integrity_hash: &str,
        created_at: Timestamp,
    ) -> StoreResult<AuditEntry>;
    /// Newest first.
    async fn list_audit_for_lead(&mut self, lead_id: DbId, limit: i64)
        -> StoreResult<Vec<AuditEntry>>;
    /// Oldest first, unbounded.
    async fn list_audit_chain(&mut self, lead_id: DbId) -> StoreResult<Vec<AuditEntry>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
