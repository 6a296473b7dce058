//! Lead lifecycle engine.
//!
//! [`LifecycleEngine::transition`] is the only way a lead's status changes.
//! The `(from, to)` pair is resolved against the transition table in
//! `academy_core::transitions`; guards run before anything is written, field
//! changes are applied next, then the table's side effects. Everything
//! happens in one unit of work and notifications go out after commit.

use academy_core::audit::action_types;
use academy_core::error::CoreError;
use academy_core::mentions::extract_mentions;
use academy_core::status::LeadStatus;
use academy_core::transitions::{validate_transition, Effect, Guard};
use academy_core::types::{Date, DbId, Timestamp};
use academy_db::models::audit::NewAuditEntry;
use academy_db::models::lead::Lead;
use academy_db::Repository;
use academy_events::bus::event_types;
use academy_events::PlatformEvent;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditLog;
use crate::capacity::CapacityChecker;
use crate::context::Context;
use crate::outbox::{Audience, DraftNotice, Outbox};
use crate::roster::{dedup, BatchRoster};

/// Optional field changes carried by a transition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransitionFields {
    pub next_follow_up_at: Option<Timestamp>,
    pub comment: Option<String>,
    pub date_of_birth: Option<Date>,
    pub trial_batch_id: Option<DbId>,
    /// Day of the trial; defaults to the follow-up date, else today.
    pub trial_date: Option<Date>,
    pub permanent_batch_id: Option<DbId>,
    pub batch_ids: Option<Vec<DbId>>,
    pub loss_reason: Option<String>,
    pub loss_reason_notes: Option<String>,
    pub payment_proof_ref: Option<String>,
    pub call_confirmation_note: Option<String>,
}

impl TransitionFields {
    fn trial_batch(&self) -> Option<DbId> {
        self.trial_batch_id.filter(|id| *id > 0)
    }

    fn permanent_batch(&self) -> Option<DbId> {
        self.permanent_batch_id.filter(|id| *id > 0)
    }

    /// The supplied multi-batch list, if it names at least one batch.
    fn batch_list(&self) -> Option<Vec<DbId>> {
        self.batch_ids
            .as_deref()
            .map(dedup)
            .filter(|ids| !ids.is_empty())
    }
}

#[derive(Clone)]
pub struct LifecycleEngine {
    pub(crate) ctx: Context,
}

impl LifecycleEngine {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn get_lead(&self, lead_id: DbId) -> Result<Lead, CoreError> {
        let mut repo = self.ctx.begin().await?;
        repo.find_lead(lead_id).await?.ok_or(CoreError::NotFound {
            entity: "Lead",
            id: lead_id,
        })
    }

    /// Move a lead to `target`, applying `fields` and the table's effects.
    pub async fn transition(
        &self,
        lead_id: DbId,
        target: LeadStatus,
        fields: TransitionFields,
        actor: Option<DbId>,
    ) -> Result<Lead, CoreError> {
        let mut repo = self.ctx.begin().await?;
        let mut outbox = Outbox::new();
        let before = repo.last_audit_hash(lead_id).await?;
        let lead = apply_in(&self.ctx, repo.as_mut(), &mut outbox, lead_id, target, fields, actor).await?;
        if repo.last_audit_hash(lead_id).await? == before {
            let confirm =
                NewAuditEntry::new(lead_id, actor, action_types::STATUS_CONFIRMED, "Status confirmed")
                    .with_change(None, Some(target.label().to_string()));
            AuditLog::record(repo.as_mut(), confirm, self.ctx.clock.now()).await?;
        }
        repo.commit().await?;
        outbox.flush(&self.ctx).await;
        Ok(lead)
    }
}

/// Apply a transition inside an open unit of work.
///
/// Every other component that moves a lead (attendance, conversion,
/// governance, sweeps) goes through here so the same rules apply.
pub(crate) async fn apply_in(
    ctx: &Context,
    repo: &mut dyn Repository,
    outbox: &mut Outbox,
    lead_id: DbId,
    target: LeadStatus,
    fields: TransitionFields,
    actor: Option<DbId>,
) -> Result<Lead, CoreError> {
    let now = ctx.clock.now();
    let today = ctx.clock.today();

    let mut lead = repo.lock_lead(lead_id).await?.ok_or(CoreError::NotFound {
        entity: "Lead",
        id: lead_id,
    })?;
    let from = lead.status;
    let status_changes = from != target;

    let resolved = validate_transition(from, target).map_err(|msg| {
        tracing::debug!(lead_id, %from, to = %target, "Transition rejected");
        CoreError::InvalidTransition(msg)
    })?;

    let trial = fields.trial_batch();
    let permanent = fields.permanent_batch();
    let batch_list = fields.batch_list();
    let existing_links = repo.list_lead_batches(lead_id).await?;

    // -- guards --
    if resolved.has_guard(Guard::RequireTrialBatch) && trial.or(lead.trial_batch_id).is_none() {
        tracing::debug!(lead_id, "Trial batch required");
        return Err(CoreError::TrialBatchRequired);
    }
    if resolved.has_guard(Guard::RequirePermanentBatch)
        && batch_list.is_none()
        && permanent.is_none()
        && lead.permanent_batch_id.is_none()
        && existing_links.is_empty()
    {
        tracing::debug!(lead_id, "Permanent batch required");
        return Err(CoreError::BatchRequired);
    }

    let mut audit = Vec::new();
    let entry = |action: &'static str, description: &str, old: Option<String>, new: Option<String>| {
        NewAuditEntry::new(lead_id, actor, action, description).with_change(old, new)
    };

    if status_changes {
        audit.push(entry(
            action_types::STATUS_CHANGE,
            "Status",
            Some(from.label().to_string()),
            Some(target.label().to_string()),
        ));
    }

    // -- trial batch --
    let entering_trial = status_changes && target == LeadStatus::TrialScheduled;
    if let Some(trial_id) = trial.filter(|id| lead.trial_batch_id != Some(*id)) {
        let trial_date = trial_day(&fields, today);
        CapacityChecker::ensure_seat(repo, trial_id, trial_date, None).await?;
        audit.push(entry(
            action_types::BATCH_ASSIGNMENT,
            "Trial batch",
            lead.trial_batch_id.map(|id| id.to_string()),
            Some(trial_id.to_string()),
        ));
        lead.trial_batch_id = Some(trial_id);
        lead.trial_date = Some(trial_date);
    } else if let Some(trial_date) = entering_trial
        .then(|| trial_day(&fields, today))
        .or(fields.trial_date)
    {
        // A new day on the same batch needs its own seat.
        let moves_seat = target == LeadStatus::TrialScheduled && lead.trial_date != Some(trial_date);
        if let Some(trial_id) = lead.trial_batch_id.filter(|_| moves_seat) {
            CapacityChecker::ensure_seat(repo, trial_id, trial_date, Some(&lead)).await?;
        }
        lead.trial_date = Some(trial_date);
    }

    // -- permanent batch and roster links --
    let new_links = match (&batch_list, permanent) {
        (Some(list), _) => Some(list.clone()),
        (None, Some(id)) if existing_links.contains(&id) => {
            let mut links = existing_links.clone();
            links.retain(|other| *other != id);
            links.insert(0, id);
            Some(links)
        }
        (None, Some(id)) => Some(vec![id]),
        (None, None) => None,
    };
    if let Some(links) = new_links {
        let old_permanent = lead.permanent_batch_id;
        if let Some(change) =
            BatchRoster::replace_links(repo, &mut lead, &links, today, now, actor).await?
        {
            audit.push(change);
        }
        if lead.permanent_batch_id != old_permanent {
            audit.push(entry(
                action_types::BATCH_ASSIGNMENT,
                "Permanent batch",
                old_permanent.map(|id| id.to_string()),
                lead.permanent_batch_id.map(|id| id.to_string()),
            ));
        }
    }

    // -- plain fields --
    if let Some(dob) = fields.date_of_birth.filter(|d| lead.date_of_birth != Some(*d)) {
        if dob > today {
            return Err(CoreError::Validation(format!(
                "Date of birth {dob} is in the future"
            )));
        }
        audit.push(entry(
            action_types::FIELD_UPDATE,
            "Date of birth",
            lead.date_of_birth.map(|d| d.to_string()),
            Some(dob.to_string()),
        ));
        lead.date_of_birth = Some(dob);
    }
    if let Some(reason) = changed(&lead.loss_reason, &fields.loss_reason) {
        audit.push(entry(
            action_types::FIELD_UPDATE,
            "Loss reason",
            lead.loss_reason.clone(),
            Some(reason.clone()),
        ));
        lead.loss_reason = Some(reason);
    }
    if let Some(notes) = changed(&lead.loss_reason_notes, &fields.loss_reason_notes) {
        audit.push(entry(
            action_types::FIELD_UPDATE,
            "Loss reason notes",
            lead.loss_reason_notes.clone(),
            Some(notes.clone()),
        ));
        lead.loss_reason_notes = Some(notes);
    }
    if let Some(proof) = changed(&lead.payment_proof_ref, &fields.payment_proof_ref) {
        audit.push(entry(
            action_types::FIELD_UPDATE,
            "Payment proof",
            lead.payment_proof_ref.clone(),
            Some(proof.clone()),
        ));
        lead.payment_proof_ref = Some(proof);
    }
    if let Some(note) = changed(&lead.call_confirmation_note, &fields.call_confirmation_note) {
        audit.push(entry(
            action_types::FIELD_UPDATE,
            "Call confirmation note",
            lead.call_confirmation_note.clone(),
            Some(note.clone()),
        ));
        lead.call_confirmation_note = Some(note);
    }
    if let Some(at) = fields.next_follow_up_at.filter(|at| lead.next_follow_up_at != Some(*at)) {
        audit.push(entry(
            action_types::FIELD_UPDATE,
            "Next follow-up",
            lead.next_follow_up_at.map(|t| t.to_rfc3339()),
            Some(at.to_rfc3339()),
        ));
        lead.next_follow_up_at = Some(at);
    }

    // -- side effects --
    for effect in &resolved.effects {
        match effect {
            Effect::ClearTrialBatch => {
                if let Some(old) = lead.trial_batch_id.take() {
                    lead.trial_date = None;
                    audit.push(entry(
                        action_types::TRIAL_BATCH_CLEARED,
                        "Trial batch cleared",
                        Some(old.to_string()),
                        None,
                    ));
                }
            }
            Effect::SnapshotLoss => lead.status_at_loss = Some(from),
            Effect::ForceDoNotContact => lead.do_not_contact = true,
            Effect::ClearDoNotContact => lead.do_not_contact = false,
            Effect::ClearFollowUp => {
                if fields.next_follow_up_at.is_none() {
                    lead.next_follow_up_at = None;
                }
            }
            Effect::StampPreferenceLink => {
                lead.extras.preference_link_sent_at.get_or_insert(now);
            }
            Effect::StampJoined => {
                lead.extras.joined_at.get_or_insert(now);
            }
            Effect::DeactivateStudent => {
                if let Some(mut student) = repo.find_student_by_lead(lead_id).await? {
                    if student.is_active {
                        student.is_active = false;
                        student.updated_at = now;
                        repo.update_student(&student).await?;
                        audit.push(entry(
                            action_types::STUDENT_DEACTIVATED,
                            "Student deactivated",
                            Some("active".to_string()),
                            Some("inactive".to_string()),
                        ));
                        outbox.push(
                            PlatformEvent::new(event_types::STUDENT_DEACTIVATED)
                                .with_source("student", student.id)
                                .with_actor(actor)
                                .with_payload(json!({ "lead_id": lead_id, "status": target }))
                                .at(now),
                        );
                    }
                }
            }
            Effect::ReactivateStudent => {
                if let Some(mut student) = repo.find_student_by_lead(lead_id).await? {
                    if !student.is_active {
                        student.is_active = true;
                        student.reset_renewal_flags();
                        student.updated_at = now;
                        repo.update_student(&student).await?;
                        audit.push(entry(
                            action_types::STUDENT_REACTIVATED,
                            "Student re-activated",
                            Some("inactive".to_string()),
                            Some("active".to_string()),
                        ));
                        outbox.push(
                            PlatformEvent::new(event_types::STUDENT_REACTIVATED)
                                .with_source("student", student.id)
                                .with_actor(actor)
                                .with_payload(json!({ "lead_id": lead_id }))
                                .at(now),
                        );
                    }
                }
            }
        }
    }

    lead.status = target;
    lead.last_updated_at = now;
    let lead = repo.update_lead(&lead).await?;
    AuditLog::record_all(repo, audit, now).await?;

    if let Some(comment) = fields.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        record_comment(repo, outbox, &lead, comment, actor, now).await?;
    }

    if status_changes {
        tracing::info!(lead_id, %from, to = %target, ?actor, "Lead status changed");
        let mut notice = DraftNotice::new(
            lead.assigned_user_id.map(Audience::User).into_iter().collect(),
            format!("{} is now {}", lead.full_name, target),
            format!("Status changed from {from} to {target}"),
        )
        .link(lead_link(lead_id))
        .excluding(actor);
        if target == LeadStatus::Joined {
            notice.audience.push(Audience::Role(academy_core::roles::ROLE_ADMIN));
        }
        outbox.push_notice(
            PlatformEvent::new(event_types::LEAD_STATUS_CHANGED)
                .with_source("lead", lead_id)
                .with_actor(actor)
                .with_payload(json!({ "from": from, "to": target }))
                .at(now),
            notice,
        );
    }

    Ok(lead)
}

/// Force a lead into `DeadNotInterested` on behalf of the system.
pub(crate) async fn force_loss(
    ctx: &Context,
    repo: &mut dyn Repository,
    outbox: &mut Outbox,
    lead_id: DbId,
    reason: &str,
) -> Result<Lead, CoreError> {
    let now = ctx.clock.now();
    let fields = TransitionFields {
        loss_reason: Some(reason.to_string()),
        ..Default::default()
    };
    let lead = apply_in(ctx, repo, outbox, lead_id, LeadStatus::DeadNotInterested, fields, None).await?;
    AuditLog::record(
        repo,
        NewAuditEntry::new(lead_id, None, action_types::AUTO_LOST, format!("Marked lost: {reason}")),
        now,
    )
    .await?;

    tracing::info!(lead_id, reason, "Lead auto-marked lost");
    outbox.push_notice(
        PlatformEvent::new(event_types::LEAD_AUTO_LOST)
            .with_source("lead", lead_id)
            .with_payload(json!({ "reason": reason }))
            .at(now),
        DraftNotice::new(
            lead.assigned_user_id.map(Audience::User).into_iter().collect(),
            format!("{} marked lost", lead.full_name),
            reason.to_string(),
        )
        .link(lead_link(lead_id)),
    );
    Ok(lead)
}

async fn record_comment(
    repo: &mut dyn Repository,
    outbox: &mut Outbox,
    lead: &Lead,
    comment: &str,
    actor: Option<DbId>,
    now: Timestamp,
) -> Result<(), CoreError> {
    AuditLog::record(
        repo,
        NewAuditEntry::new(lead.id, actor, action_types::COMMENT, comment),
        now,
    )
    .await?;

    let mentions = extract_mentions(comment);
    if !mentions.is_empty() {
        outbox.push_notice(
            PlatformEvent::new(event_types::LEAD_MENTIONED)
                .with_source("lead", lead.id)
                .with_actor(actor)
                .with_payload(json!({ "mentions": mentions }))
                .at(now),
            DraftNotice::new(
                vec![Audience::Mentions(mentions)],
                format!("You were mentioned on {}", lead.full_name),
                comment.to_string(),
            )
            .link(lead_link(lead.id))
            .excluding(actor),
        );
    }
    Ok(())
}

/// `Some(new)` when a supplied value differs from the current one.
fn changed(current: &Option<String>, supplied: &Option<String>) -> Option<String> {
    supplied
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && current.as_deref() != Some(*v))
        .map(str::to_string)
}

fn trial_day(fields: &TransitionFields, today: Date) -> Date {
    fields
        .trial_date
        .or(fields.next_follow_up_at.map(|at| at.date_naive()))
        .unwrap_or(today)
}

pub(crate) fn lead_link(lead_id: DbId) -> String {
    format!("/leads/{lead_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_ignores_blank_and_equal_values() {
        let current = Some("Paid via UPI".to_string());
        assert_eq!(changed(&current, &None), None);
        assert_eq!(changed(&current, &Some("  ".into())), None);
        assert_eq!(changed(&current, &Some("Paid via UPI".into())), None);
        assert_eq!(
            changed(&current, &Some(" Cash ".into())),
            Some("Cash".to_string())
        );
    }

    #[test]
    fn zero_ids_are_not_supplied() {
        let fields = TransitionFields {
            permanent_batch_id: Some(0),
            trial_batch_id: Some(0),
            batch_ids: Some(vec![0]),
            ..Default::default()
        };
        assert_eq!(fields.permanent_batch(), None);
        assert_eq!(fields.trial_batch(), None);
        assert_eq!(fields.batch_list(), None);
    }

    #[test]
    fn trial_day_prefers_explicit_date() {
        let today = Date::from_ymd_opt(2026, 4, 1).unwrap();
        let explicit = Date::from_ymd_opt(2026, 4, 3).unwrap();
        let fields = TransitionFields {
            trial_date: Some(explicit),
            ..Default::default()
        };
        assert_eq!(trial_day(&fields, today), explicit);
        assert_eq!(trial_day(&TransitionFields::default(), today), today);
    }
}
