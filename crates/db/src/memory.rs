//! In-process [`Store`] used when no database is configured, and by tests.
//!
//! A transaction holds the store mutex for its whole lifetime and works on a
//! private copy of the state; commit swaps the copy in. Transactions are
//! therefore fully serialised, which trivially satisfies the row-lock
//! contract of [`Repository`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use academy_core::status::{ApprovalStatus, LeadStatus};
use academy_core::types::{Date, DbId, Timestamp};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::approval::{ApprovalRequest, NewApprovalRequest};
use crate::models::audit::{AuditEntry, NewAuditEntry};
use crate::models::batch::{Batch, BatchAssignment, CreateBatch};
use crate::models::lead::{CreateLead, Lead, LeadExtras};
use crate::models::student::{NewStudent, Student};
use crate::store::{Repository, Store, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sequences: HashMap<&'static str, DbId>,
    leads: BTreeMap<DbId, Lead>,
    students: BTreeMap<DbId, Student>,
    batches: BTreeMap<DbId, Batch>,
    links: Vec<BatchAssignment>,
    approvals: BTreeMap<DbId, ApprovalRequest>,
    audit: Vec<AuditEntry>,
}

impl MemoryState {
    fn next_id(&mut self, table: &'static str) -> DbId {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn Repository>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryRepository { guard, work }))
    }
}

struct MemoryRepository {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn existing<T: Clone>(map: &BTreeMap<DbId, T>, entity: &'static str, id: DbId) -> StoreResult<T> {
    map.get(&id).cloned().ok_or(StoreError::Missing { entity, id })
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_lead(&mut self, id: DbId) -> StoreResult<Option<Lead>> {
        Ok(self.work.leads.get(&id).cloned())
    }

    async fn lock_lead(&mut self, id: DbId) -> StoreResult<Option<Lead>> {
        self.find_lead(id).await
    }

    async fn find_lead_by_token(&mut self, token: &str) -> StoreResult<Option<Lead>> {
        Ok(self
            .work
            .leads
            .values()
            .find(|lead| lead.public_token == token)
            .cloned())
    }

    async fn insert_lead(
        &mut self,
        input: &CreateLead,
        public_token: &str,
        now: Timestamp,
    ) -> StoreResult<Lead> {
        let id = self.work.next_id("leads");
        let lead = Lead {
            id,
            full_name: input.full_name.clone(),
            phone: input.phone.clone(),
            email: input.email.clone(),
            date_of_birth: input.date_of_birth,
            source: input.source.as_str().to_string(),
            status: LeadStatus::New,
            center_id: input.center_id,
            assigned_user_id: input.assigned_user_id,
            trial_batch_id: None,
            trial_date: None,
            permanent_batch_id: None,
            next_follow_up_at: input.next_follow_up_at,
            reschedule_count: 0,
            nudge_count: 0,
            do_not_contact: false,
            loss_reason: None,
            loss_reason_notes: None,
            status_at_loss: None,
            payment_proof_ref: None,
            call_confirmation_note: None,
            extras: LeadExtras::default(),
            public_token: public_token.to_string(),
            pending_subscription: None,
            created_at: now,
            last_updated_at: now,
        };
        self.work.leads.insert(id, lead.clone());
        Ok(lead)
    }

    async fn update_lead(&mut self, lead: &Lead) -> StoreResult<Lead> {
        let slot = self
            .work
            .leads
            .get_mut(&lead.id)
            .ok_or(StoreError::Missing { entity: "Lead", id: lead.id })?;
        *slot = lead.clone();
        Ok(lead.clone())
    }

    async fn touch_lead(&mut self, id: DbId, at: Timestamp) -> StoreResult<bool> {
        Ok(match self.work.leads.get_mut(&id) {
            Some(lead) => {
                lead.last_updated_at = at;
                true
            }
            None => false,
        })
    }

    async fn list_leads_by_status(&mut self, status: LeadStatus) -> StoreResult<Vec<Lead>> {
        Ok(self
            .work
            .leads
            .values()
            .filter(|lead| lead.status == status)
            .cloned()
            .collect())
    }

    async fn find_student(&mut self, id: DbId) -> StoreResult<Option<Student>> {
        Ok(self.work.students.get(&id).cloned())
    }

    async fn lock_student(&mut self, id: DbId) -> StoreResult<Option<Student>> {
        self.find_student(id).await
    }

    async fn find_student_by_lead(&mut self, lead_id: DbId) -> StoreResult<Option<Student>> {
        Ok(self
            .work
            .students
            .values()
            .find(|student| student.lead_id == lead_id)
            .cloned())
    }

    async fn insert_student(&mut self, input: &NewStudent, now: Timestamp) -> StoreResult<Student> {
        let id = self.work.next_id("students");
        let student = Student {
            id,
            lead_id: input.lead_id,
            center_id: input.center_id,
            subscription_plan: input.subscription_plan.clone(),
            subscription_start: input.subscription_start,
            subscription_end: input.subscription_end,
            payment_verified: input.payment_verified,
            payment_proof_ref: input.payment_proof_ref.clone(),
            is_active: true,
            renewal_intent: false,
            in_grace_period: false,
            grace_nudge_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.work.students.insert(id, student.clone());
        Ok(student)
    }

    async fn update_student(&mut self, student: &Student) -> StoreResult<Student> {
        existing(&self.work.students, "Student", student.id)?;
        self.work.students.insert(student.id, student.clone());
        Ok(student.clone())
    }

    async fn delete_student(&mut self, id: DbId) -> StoreResult<bool> {
        for request in self.work.approvals.values_mut() {
            if request.student_id == Some(id) {
                request.student_id = None;
            }
        }
        Ok(self.work.students.remove(&id).is_some())
    }

    async fn list_expired_students(&mut self, today: Date) -> StoreResult<Vec<Student>> {
        Ok(self
            .work
            .students
            .values()
            .filter(|s| s.is_active && s.subscription_end < today)
            .cloned()
            .collect())
    }

    async fn find_batch(&mut self, id: DbId) -> StoreResult<Option<Batch>> {
        Ok(self.work.batches.get(&id).cloned())
    }

    async fn lock_batch(&mut self, id: DbId) -> StoreResult<Option<Batch>> {
        self.find_batch(id).await
    }

    async fn insert_batch(&mut self, input: &CreateBatch, now: Timestamp) -> StoreResult<Batch> {
        let id = self.work.next_id("batches");
        let batch = Batch {
            id,
            center_id: input.center_id,
            name: input.name.clone(),
            days_of_week: input.days_of_week.clone(),
            start_time: input.start_time,
            end_time: input.end_time,
            max_capacity: input.max_capacity,
            coach_id: input.coach_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.work.batches.insert(id, batch.clone());
        Ok(batch)
    }

    async fn update_batch(&mut self, batch: &Batch) -> StoreResult<Batch> {
        existing(&self.work.batches, "Batch", batch.id)?;
        self.work.batches.insert(batch.id, batch.clone());
        Ok(batch.clone())
    }

    async fn delete_batch(&mut self, id: DbId) -> StoreResult<bool> {
        if self.work.batches.remove(&id).is_none() {
            return Ok(false);
        }
        self.work.links.retain(|link| link.batch_id != id);
        for lead in self.work.leads.values_mut() {
            if lead.trial_batch_id == Some(id) {
                lead.trial_batch_id = None;
                lead.trial_date = None;
            }
            if lead.permanent_batch_id == Some(id) {
                lead.permanent_batch_id = None;
            }
        }
        Ok(true)
    }

    async fn count_occupancy(&mut self, batch_id: DbId, date: Date) -> StoreResult<i64> {
        let leads = &self.work.leads;
        let enrolled = self
            .work
            .links
            .iter()
            .filter(|link| link.batch_id == batch_id)
            .filter(|link| {
                leads
                    .get(&link.lead_id)
                    .is_some_and(|lead| lead.status.occupies_seat())
            })
            .count();
        let trials = leads
            .values()
            .filter(|lead| {
                lead.status == LeadStatus::TrialScheduled
                    && lead.trial_batch_id == Some(batch_id)
                    && lead.trial_date.map_or(true, |d| d == date)
            })
            .count();
        Ok((enrolled + trials) as i64)
    }

    async fn list_lead_batches(&mut self, lead_id: DbId) -> StoreResult<Vec<DbId>> {
        Ok(self
            .work
            .links
            .iter()
            .filter(|link| link.lead_id == lead_id)
            .map(|link| link.batch_id)
            .collect())
    }

    async fn replace_lead_batches(
        &mut self,
        lead_id: DbId,
        batch_ids: &[DbId],
        now: Timestamp,
    ) -> StoreResult<()> {
        self.work.links.retain(|link| link.lead_id != lead_id);
        for batch_id in batch_ids {
            let id = self.work.next_id("batch_assignments");
            self.work.links.push(BatchAssignment {
                id,
                lead_id,
                batch_id: *batch_id,
                created_at: now,
            });
        }
        Ok(())
    }

    async fn list_batch_leads(&mut self, batch_id: DbId) -> StoreResult<Vec<DbId>> {
        Ok(self
            .work
            .links
            .iter()
            .filter(|link| link.batch_id == batch_id)
            .map(|link| link.lead_id)
            .collect())
    }

    async fn insert_approval(
        &mut self,
        input: &NewApprovalRequest,
        now: Timestamp,
    ) -> StoreResult<ApprovalRequest> {
        let id = self.work.next_id("approval_requests");
        let request = ApprovalRequest {
            id,
            requester_id: input.requester_id,
            lead_id: input.lead_id,
            student_id: input.student_id,
            request_type: input.action.request_type().to_string(),
            action: input.action.clone(),
            current_value: input.current_value.clone(),
            requested_value: input.action.requested_value(),
            reason: input.reason.clone(),
            status: ApprovalStatus::Pending,
            resolver_id: None,
            resolution_note: None,
            resolved_at: None,
            created_at: now,
        };
        self.work.approvals.insert(id, request.clone());
        Ok(request)
    }

    async fn find_approval(&mut self, id: DbId) -> StoreResult<Option<ApprovalRequest>> {
        Ok(self.work.approvals.get(&id).cloned())
    }

    async fn lock_approval(&mut self, id: DbId) -> StoreResult<Option<ApprovalRequest>> {
        self.find_approval(id).await
    }

    async fn update_approval(&mut self, request: &ApprovalRequest) -> StoreResult<ApprovalRequest> {
        existing(&self.work.approvals, "ApprovalRequest", request.id)?;
        self.work.approvals.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn list_pending_approvals(&mut self) -> StoreResult<Vec<ApprovalRequest>> {
        Ok(self
            .work
            .approvals
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_approvals_for_lead(&mut self, lead_id: DbId) -> StoreResult<Vec<ApprovalRequest>> {
        let mut requests: Vec<_> = self
            .work
            .approvals
            .values()
            .filter(|r| r.lead_id == lead_id)
            .cloned()
            .collect();
        requests.reverse();
        Ok(requests)
    }

    async fn last_audit_hash(&mut self, lead_id: DbId) -> StoreResult<Option<String>> {
        Ok(self
            .work
            .audit
            .iter()
            .rev()
            .find(|entry| entry.lead_id == lead_id)
            .map(|entry| entry.integrity_hash.clone()))
    }

    async fn insert_audit(
        &mut self,
        entry: &NewAuditEntry,
        integrity_hash: &str,
        created_at: Timestamp,
    ) -> StoreResult<AuditEntry> {
        let id = self.work.next_id("lead_audit_logs");
        let row = AuditEntry {
            id,
            lead_id: entry.lead_id,
            actor_id: entry.actor_id,
            action_type: entry.action_type.to_string(),
            description: entry.description.clone(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
            integrity_hash: integrity_hash.to_string(),
            created_at,
        };
        self.work.audit.push(row.clone());
        Ok(row)
    }

    async fn list_audit_for_lead(
        &mut self,
        lead_id: DbId,
        limit: i64,
    ) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .work
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.lead_id == lead_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn list_audit_chain(&mut self, lead_id: DbId) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .work
            .audit
            .iter()
            .filter(|entry| entry.lead_id == lead_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryRepository { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Utc};

    use super::*;
    use crate::models::lead::LeadSource;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn lead_input() -> CreateLead {
        CreateLead {
            full_name: "Asha Rao".to_string(),
            phone: Some("+15550100".to_string()),
            email: None,
            date_of_birth: None,
            source: LeadSource::Manual,
            center_id: 1,
            assigned_user_id: None,
            next_follow_up_at: None,
        }
    }

    fn batch_input(capacity: i32) -> CreateBatch {
        CreateBatch {
            center_id: 1,
            name: "U10 Evening".to_string(),
            days_of_week: vec![1, 3, 5],
            start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            max_capacity: capacity,
            coach_id: None,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut repo = store.begin().await.unwrap();
            repo.insert_lead(&lead_input(), "tok", now()).await.unwrap();
        }
        let mut repo = store.begin().await.unwrap();
        assert!(repo.find_lead(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let mut repo = store.begin().await.unwrap();
        let lead = repo.insert_lead(&lead_input(), "tok", now()).await.unwrap();
        repo.commit().await.unwrap();

        let mut repo = store.begin().await.unwrap();
        let found = repo.find_lead_by_token("tok").await.unwrap().unwrap();
        assert_eq!(found.id, lead.id);
        assert_eq!(found.status, LeadStatus::New);
    }

    #[tokio::test]
    async fn occupancy_counts_only_seat_holding_links() {
        let store = MemoryStore::new();
        let mut repo = store.begin().await.unwrap();
        let batch = repo.insert_batch(&batch_input(10), now()).await.unwrap();

        let mut joined = repo.insert_lead(&lead_input(), "a", now()).await.unwrap();
        joined.status = LeadStatus::Joined;
        repo.update_lead(&joined).await.unwrap();
        repo.replace_lead_batches(joined.id, &[batch.id], now()).await.unwrap();

        let mut on_break = repo.insert_lead(&lead_input(), "b", now()).await.unwrap();
        on_break.status = LeadStatus::OnBreak;
        repo.update_lead(&on_break).await.unwrap();
        repo.replace_lead_batches(on_break.id, &[batch.id], now()).await.unwrap();

        let mut trial = repo.insert_lead(&lead_input(), "c", now()).await.unwrap();
        trial.status = LeadStatus::TrialScheduled;
        trial.trial_batch_id = Some(batch.id);
        trial.trial_date = Some(now().date_naive());
        repo.update_lead(&trial).await.unwrap();

        let today = now().date_naive();
        assert_eq!(repo.count_occupancy(batch.id, today).await.unwrap(), 2);
        let tomorrow = today.succ_opt().unwrap();
        assert_eq!(repo.count_occupancy(batch.id, tomorrow).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_a_batch_clears_references() {
        let store = MemoryStore::new();
        let mut repo = store.begin().await.unwrap();
        let batch = repo.insert_batch(&batch_input(5), now()).await.unwrap();
        let mut lead = repo.insert_lead(&lead_input(), "a", now()).await.unwrap();
        lead.permanent_batch_id = Some(batch.id);
        repo.update_lead(&lead).await.unwrap();
        repo.replace_lead_batches(lead.id, &[batch.id], now()).await.unwrap();

        assert!(repo.delete_batch(batch.id).await.unwrap());
        let lead = repo.find_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(lead.permanent_batch_id, None);
        assert!(repo.list_lead_batches(lead.id).await.unwrap().is_empty());
        assert!(!repo.delete_batch(batch.id).await.unwrap());
    }
}
