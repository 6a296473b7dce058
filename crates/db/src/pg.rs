//! Postgres-backed [`Store`].

use academy_core::status::LeadStatus;
use academy_core::types::{Date, DbId, Timestamp};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::models::approval::{ApprovalRequest, NewApprovalRequest};
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::batch::{Batch, CreateBatch};
use crate::models::lead::{CreateLead, Lead};
use crate::models::student::{NewStudent, Student};
use crate::repositories::{
    ApprovalRepo, AssignmentRepo, AuditRepo, BatchRepo, LeadRepo, StudentRepo,
};
use crate::store::{Repository, Store, StoreResult};
use crate::DbPool;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn Repository>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgRepository { tx }))
    }
}

/// One open Postgres transaction. Dropping it rolls back.
struct PgRepository {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_lead(&mut self, id: DbId) -> StoreResult<Option<Lead>> {
        LeadRepo::find_by_id(&mut self.tx, id).await
    }

    async fn lock_lead(&mut self, id: DbId) -> StoreResult<Option<Lead>> {
        LeadRepo::lock(&mut self.tx, id).await
    }

    async fn find_lead_by_token(&mut self, token: &str) -> StoreResult<Option<Lead>> {
        LeadRepo::find_by_token(&mut self.tx, token).await
    }

    async fn insert_lead(
        &mut self,
        input: &CreateLead,
        public_token: &str,
        now: Timestamp,
    ) -> StoreResult<Lead> {
        LeadRepo::create(&mut self.tx, input, public_token, now).await
    }

    async fn update_lead(&mut self, lead: &Lead) -> StoreResult<Lead> {
        LeadRepo::update(&mut self.tx, lead).await
    }

    async fn touch_lead(&mut self, id: DbId, at: Timestamp) -> StoreResult<bool> {
        LeadRepo::touch(&mut self.tx, id, at).await
    }

    async fn list_leads_by_status(&mut self, status: LeadStatus) -> StoreResult<Vec<Lead>> {
        LeadRepo::list_by_status(&mut self.tx, status).await
    }

    async fn find_student(&mut self, id: DbId) -> StoreResult<Option<Student>> {
        StudentRepo::find_by_id(&mut self.tx, id).await
    }

    async fn lock_student(&mut self, id: DbId) -> StoreResult<Option<Student>> {
        StudentRepo::lock(&mut self.tx, id).await
    }

    async fn find_student_by_lead(&mut self, lead_id: DbId) -> StoreResult<Option<Student>> {
        StudentRepo::find_by_lead(&mut self.tx, lead_id).await
    }

    async fn insert_student(&mut self, input: &NewStudent, now: Timestamp) -> StoreResult<Student> {
        StudentRepo::create(&mut self.tx, input, now).await
    }

    async fn update_student(&mut self, student: &Student) -> StoreResult<Student> {
        StudentRepo::update(&mut self.tx, student).await
    }

    async fn delete_student(&mut self, id: DbId) -> StoreResult<bool> {
        StudentRepo::delete(&mut self.tx, id).await
    }

    async fn list_expired_students(&mut self, today: Date) -> StoreResult<Vec<Student>> {
        StudentRepo::list_expired(&mut self.tx, today).await
    }

    async fn find_batch(&mut self, id: DbId) -> StoreResult<Option<Batch>> {
        BatchRepo::find_by_id(&mut self.tx, id).await
    }

    async fn lock_batch(&mut self, id: DbId) -> StoreResult<Option<Batch>> {
        BatchRepo::lock(&mut self.tx, id).await
    }

    async fn insert_batch(&mut self, input: &CreateBatch, now: Timestamp) -> StoreResult<Batch> {
        BatchRepo::create(&mut self.tx, input, now).await
    }

    async fn update_batch(&mut self, batch: &Batch) -> StoreResult<Batch> {
        BatchRepo::update(&mut self.tx, batch).await
    }

    async fn delete_batch(&mut self, id: DbId) -> StoreResult<bool> {
        BatchRepo::delete(&mut self.tx, id).await
    }

    async fn count_occupancy(&mut self, batch_id: DbId, date: Date) -> StoreResult<i64> {
        BatchRepo::count_occupancy(&mut self.tx, batch_id, date).await
    }

    async fn list_lead_batches(&mut self, lead_id: DbId) -> StoreResult<Vec<DbId>> {
        AssignmentRepo::list_for_lead(&mut self.tx, lead_id).await
    }

    async fn replace_lead_batches(
        &mut self,
        lead_id: DbId,
        batch_ids: &[DbId],
        now: Timestamp,
    ) -> StoreResult<()> {
        AssignmentRepo::replace_for_lead(&mut self.tx, lead_id, batch_ids, now).await
    }

    async fn list_batch_leads(&mut self, batch_id: DbId) -> StoreResult<Vec<DbId>> {
        AssignmentRepo::list_for_batch(&mut self.tx, batch_id).await
    }

    async fn insert_approval(
        &mut self,
        input: &NewApprovalRequest,
        now: Timestamp,
    ) -> StoreResult<ApprovalRequest> {
        ApprovalRepo::create(&mut self.tx, input, now).await
    }

    async fn find_approval(&mut self, id: DbId) -> StoreResult<Option<ApprovalRequest>> {
        ApprovalRepo::find_by_id(&mut self.tx, id).await
    }

    async fn lock_approval(&mut self, id: DbId) -> StoreResult<Option<ApprovalRequest>> {
        ApprovalRepo::lock(&mut self.tx, id).await
    }

    async fn update_approval(&mut self, request: &ApprovalRequest) -> StoreResult<ApprovalRequest> {
        ApprovalRepo::resolve(&mut self.tx, request).await
    }

    async fn list_pending_approvals(&mut self) -> StoreResult<Vec<ApprovalRequest>> {
        ApprovalRepo::list_pending(&mut self.tx).await
    }

    async fn list_approvals_for_lead(&mut self, lead_id: DbId) -> StoreResult<Vec<ApprovalRequest>> {
        ApprovalRepo::list_for_lead(&mut self.tx, lead_id).await
    }

    async fn last_audit_hash(&mut self, lead_id: DbId) -> StoreResult<Option<String>> {
        AuditRepo::last_hash(&mut self.tx, lead_id).await
    }

    async fn insert_audit(
        &mut self,
        entry: &NewAuditEntry,
        integrity_hash: &str,
        created_at: Timestamp,
    ) -> StoreResult<AuditEntry> {
        AuditRepo::append(&mut self.tx, entry, integrity_hash, created_at).await
    }

    async fn list_audit_for_lead(
        &mut self,
        lead_id: DbId,
        limit: i64,
    ) -> StoreResult<Vec<AuditEntry>> {
        AuditRepo::list_for_lead(&mut self.tx, lead_id, limit).await
    }

    async fn list_audit_chain(&mut self, lead_id: DbId) -> StoreResult<Vec<AuditEntry>> {
        AuditRepo::list_chain(&mut self.tx, lead_id).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
