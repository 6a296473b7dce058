//! Subscription expiry sweep: grace flagging and demotion.

mod common;

use academy_core::clock::Clock;
use academy_core::status::LeadStatus;
use academy_events::bus::event_types;
use chrono::{Duration, TimeZone, Utc};

use common::*;

// Enrolled on 2026-03-02 with a monthly plan, so the subscription ends on
// 2026-04-02.

#[tokio::test]
async fn nothing_happens_on_the_last_day() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    t.enrolled("Aarav", batch.id).await;
    t.clock.set(Utc.with_ymd_and_hms(2026, 4, 2, 23, 0, 0).unwrap());

    assert!(t.academy.expiry.sweep().await.unwrap().is_empty());
}

#[tokio::test]
async fn grace_is_flagged_once() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Diya", batch.id).await;
    t.clock.set(Utc.with_ymd_and_hms(2026, 4, 4, 6, 0, 0).unwrap());
    let mut rx = t.subscribe();

    let first = t.academy.expiry.sweep().await.unwrap();
    assert_eq!(first, vec![student.id]);
    let student = t.academy.conversion.get(student.id).await.unwrap();
    assert!(student.in_grace_period);
    assert!(student.is_active);
    let audit_len = t.audit_actions(lead.id).await.len();

    let second = t.academy.expiry.sweep().await.unwrap();
    assert!(second.is_empty());
    assert_eq!(t.audit_actions(lead.id).await.len(), audit_len);

    let events = drain(&mut rx);
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type == event_types::STUDENT_GRACE_PERIOD)
            .count(),
        1
    );
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::Joined);
}

#[tokio::test]
async fn the_last_grace_day_is_still_grace() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Kabir", batch.id).await;
    t.clock.set(Utc.with_ymd_and_hms(2026, 4, 6, 12, 0, 0).unwrap());

    t.academy.expiry.sweep().await.unwrap();

    assert!(t.academy.conversion.get(student.id).await.unwrap().is_active);
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::Joined);
}

#[tokio::test]
async fn past_grace_puts_the_lead_on_break() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, student) = t.enrolled("Meera", batch.id).await;
    t.clock.set(Utc.with_ymd_and_hms(2026, 4, 4, 6, 0, 0).unwrap());
    t.academy.expiry.sweep().await.unwrap();
    t.clock.set(Utc.with_ymd_and_hms(2026, 4, 7, 6, 0, 0).unwrap());

    let demoted = t.academy.expiry.sweep().await.unwrap();

    assert_eq!(demoted, vec![student.id]);
    let student = t.academy.conversion.get(student.id).await.unwrap();
    assert!(!student.is_active);
    assert!(!student.in_grace_period);
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::OnBreak);
    assert_eq!(lead.next_follow_up_at, None);
    assert_eq!(lead.last_updated_at, t.clock.now());

    let entries = t.academy.audit.list_for_lead(lead.id, None).await.unwrap();
    let status_change = entries
        .iter()
        .find(|e| e.action_type == "status_change")
        .expect("status change");
    assert_eq!(status_change.actor_id, None);
    assert_eq!(status_change.new_value.as_deref(), Some("On Break"));

    assert!(t.academy.expiry.sweep().await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_students_are_skipped() {
    let t = setup();
    let batch = t.batch("U10 Evening", 10).await;
    let (lead, _) = t.enrolled("Ishaan", batch.id).await;
    t.academy
        .engine
        .transition(
            lead.id,
            LeadStatus::OnBreak,
            academy_lifecycle::TransitionFields::default(),
            Some(COUNSELLOR_ID),
        )
        .await
        .unwrap();
    t.clock.advance(Duration::days(60));

    assert!(t.academy.expiry.sweep().await.unwrap().is_empty());
}
