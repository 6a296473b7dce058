//! Shared fixtures for lifecycle integration tests.
//!
//! Every fixture runs on the in-memory store with a pinned clock, so
//! time-driven rules are deterministic.
#![allow(dead_code)]

use std::sync::Arc;

use academy_core::clock::{Clock, FixedClock};
use academy_core::roles::{ROLE_ADMIN, ROLE_APPROVER, ROLE_COACH, ROLE_COUNSELLOR};
use academy_core::status::LeadStatus;
use academy_core::subscription::SubscriptionPlan;
use academy_core::types::{Date, DbId, Timestamp};
use academy_db::models::batch::{Batch, CreateBatch};
use academy_db::models::lead::{CreateLead, Lead, LeadSource};
use academy_db::models::student::Student;
use academy_db::MemoryStore;
use academy_events::{DirectoryUser, EventBus, PlatformEvent, StaticDirectory};
use academy_lifecycle::{Academy, Actor, Context, ConversionRequest, TransitionFields};
use chrono::{NaiveTime, TimeZone, Utc};
use tokio::sync::broadcast;

pub const CENTER: DbId = 1;
pub const ADMIN_ID: DbId = 1;
pub const APPROVER_ID: DbId = 2;
pub const COUNSELLOR_ID: DbId = 3;
pub const COACH_ID: DbId = 4;
pub const SECOND_APPROVER_ID: DbId = 5;

/// Monday 2 March 2026, 09:00 UTC.
pub fn start_time() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn admin() -> Actor {
    Actor::new(ADMIN_ID, ROLE_ADMIN)
}

pub fn approver() -> Actor {
    Actor::new(APPROVER_ID, ROLE_APPROVER)
}

pub fn second_approver() -> Actor {
    Actor::new(SECOND_APPROVER_ID, ROLE_APPROVER)
}

pub fn counsellor() -> Actor {
    Actor::new(COUNSELLOR_ID, ROLE_COUNSELLOR)
}

pub fn coach() -> Actor {
    Actor::new(COACH_ID, ROLE_COACH)
}

fn user(id: DbId, username: &str, role: &str) -> DirectoryUser {
    DirectoryUser {
        id,
        username: username.to_string(),
        role: role.to_string(),
        email: Some(format!("{username}@academy.test")),
        is_active: true,
    }
}

pub struct TestAcademy {
    pub academy: Academy,
    pub clock: Arc<FixedClock>,
    pub bus: Arc<EventBus>,
}

/// Build an academy with a small staff directory.
pub fn setup() -> TestAcademy {
    let clock = Arc::new(FixedClock::new(start_time()));
    let bus = Arc::new(EventBus::default());
    let directory = StaticDirectory::new(vec![
        user(ADMIN_ID, "asha", ROLE_ADMIN),
        user(APPROVER_ID, "priya", ROLE_APPROVER),
        user(COUNSELLOR_ID, "ravi", ROLE_COUNSELLOR),
        user(COACH_ID, "sam", ROLE_COACH),
        user(SECOND_APPROVER_ID, "omar", ROLE_APPROVER),
    ]);
    let ctx = Context::new(Arc::new(MemoryStore::new()), Arc::clone(&bus))
        .with_clock(clock.clone())
        .with_directory(Arc::new(directory));

    TestAcademy {
        academy: Academy::new(ctx),
        clock,
        bus,
    }
}

impl TestAcademy {
    pub fn today(&self) -> Date {
        self.clock.today()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.bus.subscribe()
    }

    pub async fn lead(&self, name: &str) -> Lead {
        self.academy
            .leads
            .create_lead(
                CreateLead {
                    full_name: name.to_string(),
                    phone: Some("+91 98450 00000".to_string()),
                    email: Some(format!("{}@parents.test", name.to_lowercase())),
                    date_of_birth: None,
                    source: LeadSource::Manual,
                    center_id: CENTER,
                    assigned_user_id: Some(COUNSELLOR_ID),
                    next_follow_up_at: None,
                },
                Some(COUNSELLOR_ID),
            )
            .await
            .unwrap()
    }

    pub async fn batch(&self, name: &str, max_capacity: i32) -> Batch {
        self.academy
            .roster
            .create_batch(CreateBatch {
                center_id: CENTER,
                name: name.to_string(),
                days_of_week: vec![1, 3, 5],
                start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                max_capacity,
                coach_id: Some(COACH_ID),
            })
            .await
            .unwrap()
    }

    /// A lead booked for a trial today in `batch_id`.
    pub async fn scheduled_lead(&self, name: &str, batch_id: DbId) -> Lead {
        let lead = self.lead(name).await;
        self.academy
            .engine
            .transition(
                lead.id,
                LeadStatus::TrialScheduled,
                TransitionFields {
                    trial_batch_id: Some(batch_id),
                    ..Default::default()
                },
                Some(COUNSELLOR_ID),
            )
            .await
            .unwrap()
    }

    /// A lead converted into an active student on a monthly plan.
    pub async fn enrolled(&self, name: &str, batch_id: DbId) -> (Lead, Student) {
        let lead = self.lead(name).await;
        let student = self
            .academy
            .conversion
            .convert(lead.id, monthly(self.today(), vec![batch_id]), Some(COUNSELLOR_ID))
            .await
            .unwrap();
        let lead = self.academy.engine.get_lead(lead.id).await.unwrap();
        (lead, student)
    }

    /// Audit action types for a lead, oldest first.
    pub async fn audit_actions(&self, lead_id: DbId) -> Vec<String> {
        let mut entries = self
            .academy
            .audit
            .list_for_lead(lead_id, Some(500))
            .await
            .unwrap();
        entries.reverse();
        entries.into_iter().map(|e| e.action_type).collect()
    }
}

pub fn monthly(start_date: Date, batch_ids: Vec<DbId>) -> ConversionRequest {
    ConversionRequest {
        plan: SubscriptionPlan::Monthly,
        start_date,
        end_date: None,
        batch_ids,
        payment_verified: true,
        payment_proof_ref: Some("UPI-1001".to_string()),
    }
}

/// Drain every event published so far.
pub fn drain(rx: &mut broadcast::Receiver<PlatformEvent>) -> Vec<PlatformEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
