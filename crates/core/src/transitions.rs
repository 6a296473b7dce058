//! Lead lifecycle transition table.
//!
//! Every status change is looked up in [`TRANSITION_TABLE`]. A change is
//! legal when at least one [`RowKind::Allow`] row matches the `(from, to)`
//! pair; the guards and side effects of *all* matching rows (allow and
//! augment) are collected in table order. Adding a rule is a table edit.

use crate::status::LeadStatus;
use crate::status::LeadStatus::*;

/// Precondition checked before any mutation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// A trial batch must be supplied in the call or already be on the lead.
    RequireTrialBatch,
    /// A permanent batch (single id, multi-batch list, or existing assignment)
    /// must resolve.
    RequirePermanentBatch,
}

/// Side effect applied after the field changes of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop the trial batch reference, if any.
    ClearTrialBatch,
    /// Record the pre-transition status in `status_at_loss`.
    SnapshotLoss,
    ForceDoNotContact,
    ClearDoNotContact,
    /// Clear the next follow-up unless the caller supplied one.
    ClearFollowUp,
    /// Stamp the preference-link timestamp once.
    StampPreferenceLink,
    /// Stamp the first-joined timestamp once.
    StampJoined,
    /// Soft-deactivate the linked student.
    DeactivateStudent,
    /// Re-activate the linked student.
    ReactivateStudent,
}

/// Which statuses a row applies to.
#[derive(Debug, Clone, Copy)]
pub enum Statuses {
    Any,
    Only(&'static [LeadStatus]),
}

impl Statuses {
    fn contains(self, status: LeadStatus) -> bool {
        match self {
            Statuses::Any => true,
            Statuses::Only(list) => list.contains(&status),
        }
    }
}

/// Whether a row makes a pair legal or only contributes behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Allow,
    Augment,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRow {
    pub kind: RowKind,
    pub from: Statuses,
    pub to: Statuses,
    pub guards: &'static [Guard],
    pub effects: &'static [Effect],
}

const fn allow(
    from: Statuses,
    to: LeadStatus,
    guards: &'static [Guard],
    effects: &'static [Effect],
) -> TransitionRow {
    TransitionRow {
        kind: RowKind::Allow,
        from,
        to: Statuses::Only(single(to)),
        guards,
        effects,
    }
}

const fn augment(from: Statuses, to: Statuses, effects: &'static [Effect]) -> TransitionRow {
    TransitionRow {
        kind: RowKind::Augment,
        from,
        to,
        guards: &[],
        effects,
    }
}

const fn single(status: LeadStatus) -> &'static [LeadStatus] {
    match status {
        New => &[New],
        Called => &[Called],
        TrialScheduled => &[TrialScheduled],
        TrialAttended => &[TrialAttended],
        FollowedUpWithMessage => &[FollowedUpWithMessage],
        PaymentPendingVerification => &[PaymentPendingVerification],
        Joined => &[Joined],
        OnBreak => &[OnBreak],
        Nurture => &[Nurture],
        DeadNotInterested => &[DeadNotInterested],
    }
}

const ANY: Statuses = Statuses::Any;
const FROM_JOINED: Statuses = Statuses::Only(&[Joined]);

pub const TRANSITION_TABLE: &[TransitionRow] = &[
    allow(ANY, New, &[], &[Effect::ClearTrialBatch]),
    allow(ANY, Called, &[], &[Effect::ClearTrialBatch]),
    allow(ANY, TrialScheduled, &[Guard::RequireTrialBatch], &[]),
    allow(ANY, TrialAttended, &[], &[]),
    allow(ANY, FollowedUpWithMessage, &[], &[Effect::StampPreferenceLink]),
    allow(ANY, PaymentPendingVerification, &[], &[]),
    allow(
        ANY,
        Joined,
        &[Guard::RequirePermanentBatch],
        &[Effect::StampJoined],
    ),
    // A break only makes sense for an enrolled student.
    allow(
        FROM_JOINED,
        OnBreak,
        &[],
        &[Effect::ClearFollowUp, Effect::DeactivateStudent],
    ),
    allow(ANY, Nurture, &[], &[Effect::SnapshotLoss, Effect::ClearFollowUp]),
    allow(
        ANY,
        DeadNotInterested,
        &[],
        &[
            Effect::SnapshotLoss,
            Effect::ForceDoNotContact,
            Effect::ClearFollowUp,
        ],
    ),
    augment(
        FROM_JOINED,
        Statuses::Only(&[Nurture, DeadNotInterested]),
        &[Effect::DeactivateStudent],
    ),
    augment(
        Statuses::Only(&[OnBreak]),
        Statuses::Only(&[Joined]),
        &[Effect::ReactivateStudent],
    ),
    augment(
        Statuses::Only(&[DeadNotInterested]),
        ANY,
        &[Effect::ClearDoNotContact],
    ),
];

/// Guards and effects resolved for one `(from, to)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTransition {
    pub guards: Vec<Guard>,
    pub effects: Vec<Effect>,
}

impl ResolvedTransition {
    pub fn has_guard(&self, guard: Guard) -> bool {
        self.guards.contains(&guard)
    }

    pub fn has_effect(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}

/// Resolve a status change against the table.
///
/// A same-status call resolves to no guards and no effects (field-only
/// update). Returns `None` for an illegal pair.
pub fn resolve(from: LeadStatus, to: LeadStatus) -> Option<ResolvedTransition> {
    resolve_in(TRANSITION_TABLE, from, to)
}

pub fn resolve_in(
    table: &[TransitionRow],
    from: LeadStatus,
    to: LeadStatus,
) -> Option<ResolvedTransition> {
    if from == to {
        return Some(ResolvedTransition::default());
    }

    let mut allowed = false;
    let mut resolved = ResolvedTransition::default();

    for row in table
        .iter()
        .filter(|row| row.from.contains(from) && row.to.contains(to))
    {
        allowed |= row.kind == RowKind::Allow;
        for guard in row.guards {
            if !resolved.guards.contains(guard) {
                resolved.guards.push(*guard);
            }
        }
        for effect in row.effects {
            if !resolved.effects.contains(effect) {
                resolved.effects.push(*effect);
            }
        }
    }

    allowed.then_some(resolved)
}

/// Whether the table permits changing `from` into `to`.
pub fn can_transition(from: LeadStatus, to: LeadStatus) -> bool {
    resolve(from, to).is_some()
}

/// Validate a status change, returning a message for illegal ones.
pub fn validate_transition(from: LeadStatus, to: LeadStatus) -> Result<ResolvedTransition, String> {
    resolve(from, to).ok_or_else(|| format!("{from} -> {to} is not a permitted status change"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_break_only_from_joined() {
        for from in LeadStatus::ALL {
            let allowed = can_transition(*from, OnBreak);
            assert_eq!(allowed, matches!(from, Joined | OnBreak), "{from} -> On Break");
        }
    }

    #[test]
    fn every_other_pair_is_listed() {
        for from in LeadStatus::ALL {
            for to in LeadStatus::ALL {
                if *to == OnBreak {
                    continue;
                }
                assert!(can_transition(*from, *to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn same_status_is_field_only() {
        let resolved = resolve(Joined, Joined).unwrap();
        assert!(resolved.guards.is_empty());
        assert!(resolved.effects.is_empty());
    }

    #[test]
    fn joined_requires_permanent_batch_and_stamps() {
        let resolved = resolve(TrialAttended, Joined).unwrap();
        assert_eq!(resolved.guards, vec![Guard::RequirePermanentBatch]);
        assert_eq!(resolved.effects, vec![Effect::StampJoined]);
    }

    #[test]
    fn trial_scheduled_requires_trial_batch() {
        let resolved = resolve(New, TrialScheduled).unwrap();
        assert!(resolved.has_guard(Guard::RequireTrialBatch));
    }

    #[test]
    fn return_from_break_reactivates() {
        let resolved = resolve(OnBreak, Joined).unwrap();
        assert!(resolved.has_effect(Effect::StampJoined));
        assert!(resolved.has_effect(Effect::ReactivateStudent));
        assert!(!resolve(Nurture, Joined)
            .unwrap()
            .has_effect(Effect::ReactivateStudent));
    }

    #[test]
    fn leaving_joined_into_an_off_ramp_deactivates() {
        for to in [OnBreak, Nurture, DeadNotInterested] {
            assert!(resolve(Joined, to).unwrap().has_effect(Effect::DeactivateStudent));
        }
        assert!(!resolve(Joined, Called)
            .unwrap()
            .has_effect(Effect::DeactivateStudent));
    }

    #[test]
    fn dead_snapshots_and_blocks_contact() {
        let resolved = resolve(Called, DeadNotInterested).unwrap();
        assert_eq!(
            resolved.effects,
            vec![
                Effect::SnapshotLoss,
                Effect::ForceDoNotContact,
                Effect::ClearFollowUp
            ]
        );
    }

    #[test]
    fn leaving_dead_clears_do_not_contact() {
        let resolved = resolve(DeadNotInterested, Called).unwrap();
        assert!(resolved.has_effect(Effect::ClearTrialBatch));
        assert!(resolved.has_effect(Effect::ClearDoNotContact));
    }

    #[test]
    fn nurture_snapshots_but_on_break_does_not() {
        assert!(resolve(Called, Nurture).unwrap().has_effect(Effect::SnapshotLoss));
        assert!(!resolve(Joined, OnBreak).unwrap().has_effect(Effect::SnapshotLoss));
    }

    #[test]
    fn augment_rows_alone_do_not_allow() {
        let table = [augment(ANY, ANY, &[Effect::ClearDoNotContact])];
        assert!(resolve_in(&table, New, Called).is_none());
    }

    #[test]
    fn validate_reports_both_statuses() {
        let err = validate_transition(Called, OnBreak).unwrap_err();
        assert!(err.contains("Called"));
        assert!(err.contains("On Break"));
    }
}
