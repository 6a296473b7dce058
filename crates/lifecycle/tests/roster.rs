//! Batch management, roster membership and occupancy.

mod common;

use academy_core::error::CoreError;
use academy_core::status::LeadStatus;
use academy_db::models::batch::UpdateBatch;
use academy_lifecycle::{StudentUpdate, TransitionFields};
use assert_matches::assert_matches;
use chrono::Duration;

use common::*;

// ---------------------------------------------------------------------------
// Test: batch definitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn capacity_cannot_drop_below_occupancy() {
    let t = setup();
    let batch = t.batch("U12 Morning", 5).await;
    t.enrolled("Aarav", batch.id).await;
    t.enrolled("Diya", batch.id).await;

    let result = t
        .academy
        .roster
        .update_batch(
            batch.id,
            UpdateBatch {
                max_capacity: Some(1),
                ..Default::default()
            },
        )
        .await;
    assert_matches!(result, Err(CoreError::Validation(_)));

    let batch = t
        .academy
        .roster
        .update_batch(
            batch.id,
            UpdateBatch {
                max_capacity: Some(2),
                name: Some("  U12 Early ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(batch.max_capacity, 2);
    assert_eq!(batch.name, "U12 Early");
}

#[tokio::test]
async fn inactive_batches_take_no_new_students() {
    let t = setup();
    let batch = t.batch("U12 Morning", 5).await;
    t.academy.roster.deactivate_batch(batch.id).await.unwrap();
    let lead = t.lead("Kabir").await;

    let result = t
        .academy
        .conversion
        .convert(lead.id, monthly(t.today(), vec![batch.id]), Some(COUNSELLOR_ID))
        .await;

    assert_matches!(result, Err(CoreError::Validation(_)));
    assert!(t.academy.conversion.find_by_lead(lead.id).await.unwrap().is_none());
}

#[tokio::test]
async fn coach_can_be_reassigned_and_removed() {
    let t = setup();
    let batch = t.batch("U12 Morning", 5).await;

    let batch = t.academy.roster.assign_coach(batch.id, None).await.unwrap();
    assert_eq!(batch.coach_id, None);
    let batch = t
        .academy
        .roster
        .assign_coach(batch.id, Some(COACH_ID))
        .await
        .unwrap();
    assert_eq!(batch.coach_id, Some(COACH_ID));
}

// ---------------------------------------------------------------------------
// Test: membership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn roster_lists_linked_leads() {
    let t = setup();
    let batch = t.batch("U12 Morning", 5).await;
    let (aarav, _) = t.enrolled("Aarav", batch.id).await;
    let (meera, _) = t.enrolled("Meera", batch.id).await;
    t.scheduled_lead("Trialist", batch.id).await;

    let mut ids: Vec<_> = t
        .academy
        .roster
        .roster(batch.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, vec![aarav.id, meera.id]);
}

#[tokio::test]
async fn multi_batch_students_take_the_first_as_permanent() {
    let t = setup();
    let weekday = t.batch("U12 Weekday", 5).await;
    let weekend = t.batch("U12 Weekend", 5).await;
    let (_, student) = t.enrolled("Vihaan", weekday.id).await;

    t.academy
        .conversion
        .update_student(
            student.id,
            StudentUpdate {
                batch_ids: Some(vec![weekend.id, weekday.id, weekend.id]),
                ..Default::default()
            },
            Some(ADMIN_ID),
        )
        .await
        .unwrap();

    let lead = t.academy.engine.get_lead(student.lead_id).await.unwrap();
    assert_eq!(lead.permanent_batch_id, Some(weekend.id));
    assert_eq!(t.academy.roster.roster(weekend.id).await.unwrap().len(), 1);
    assert_eq!(t.academy.roster.roster(weekday.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_batch_drops_links_and_audits_members() {
    let t = setup();
    let batch = t.batch("U12 Morning", 5).await;
    let (lead, _) = t.enrolled("Anaya", batch.id).await;

    t.academy
        .roster
        .delete_batch(batch.id, Some(ADMIN_ID))
        .await
        .unwrap();

    assert_matches!(
        t.academy.roster.get(batch.id).await,
        Err(CoreError::NotFound { entity: "Batch", .. })
    );
    let entries = t.academy.audit.list_for_lead(lead.id, Some(1)).await.unwrap();
    assert_eq!(entries[0].action_type, "batch_assignment");
    assert_eq!(entries[0].old_value.as_deref(), Some(batch.id.to_string().as_str()));
    assert_eq!(entries[0].new_value.as_deref(), Some("none"));
    let lead = t.academy.engine.get_lead(lead.id).await.unwrap();
    assert_eq!(lead.permanent_batch_id, None);
}

// ---------------------------------------------------------------------------
// Test: occupancy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn occupancy_counts_members_and_trials_for_the_day() {
    let t = setup();
    let batch = t.batch("U12 Morning", 3).await;
    t.enrolled("Aarav", batch.id).await;
    t.scheduled_lead("Diya", batch.id).await;

    let today = t.academy.capacity.occupancy(batch.id, None).await.unwrap();
    assert_eq!(today.occupied, 2);
    assert_eq!(today.available, 1);
    assert!(!today.is_full);

    let tomorrow = t
        .academy
        .capacity
        .occupancy(batch.id, Some(t.today() + Duration::days(1)))
        .await
        .unwrap();
    assert_eq!(tomorrow.occupied, 1);
}

#[tokio::test]
async fn leaving_the_funnel_frees_the_seat() {
    let t = setup();
    let batch = t.batch("U12 Morning", 1).await;
    let lead = t.scheduled_lead("Kiara", batch.id).await;
    assert!(t.academy.capacity.occupancy(batch.id, None).await.unwrap().is_full);

    t.academy
        .engine
        .transition(
            lead.id,
            LeadStatus::Nurture,
            TransitionFields::default(),
            Some(COUNSELLOR_ID),
        )
        .await
        .unwrap();

    assert_eq!(
        t.academy.capacity.occupancy(batch.id, None).await.unwrap().occupied,
        0
    );
}

#[tokio::test]
async fn occupancy_of_unknown_batch_is_not_found() {
    let t = setup();
    assert_matches!(
        t.academy.capacity.occupancy(42, None).await,
        Err(CoreError::NotFound { entity: "Batch", .. })
    );
}
