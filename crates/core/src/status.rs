//! Status enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant, in seed-data order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Human-readable label, as shown in audit entries.
            pub fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Look up a variant by its database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(id: StatusId) -> Result<Self, Self::Error> {
                $name::from_id(id).ok_or_else(|| {
                    CoreError::Validation(format!(
                        concat!("Unknown ", stringify!($name), " id {}"),
                        id
                    ))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

define_status_enum! {
    /// Sales-funnel position of a lead.
    LeadStatus {
        New = 1 => "New",
        Called = 2 => "Called",
        TrialScheduled = 3 => "Trial Scheduled",
        TrialAttended = 4 => "Trial Attended",
        FollowedUpWithMessage = 5 => "Followed up with message",
        PaymentPendingVerification = 6 => "Payment Pending Verification",
        Joined = 7 => "Joined",
        OnBreak = 8 => "On Break",
        Nurture = 9 => "Nurture",
        DeadNotInterested = 10 => "Dead/Not Interested",
    }
}

define_status_enum! {
    /// Approval request workflow status.
    ApprovalStatus {
        Pending = 1 => "Pending",
        Approved = 2 => "Approved",
        Rejected = 3 => "Rejected",
    }
}

impl LeadStatus {
    /// Statuses whose batch links hold a seat in the roster.
    pub fn occupies_seat(self) -> bool {
        matches!(self, LeadStatus::Joined | LeadStatus::PaymentPendingVerification)
    }
}

impl ApprovalStatus {
    pub fn is_resolved(self) -> bool {
        self != ApprovalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_status_ids_match_seed_data() {
        assert_eq!(LeadStatus::New.id(), 1);
        assert_eq!(LeadStatus::TrialScheduled.id(), 3);
        assert_eq!(LeadStatus::Joined.id(), 7);
        assert_eq!(LeadStatus::DeadNotInterested.id(), 10);
        assert_eq!(LeadStatus::ALL.len(), 10);
    }

    #[test]
    fn from_id_round_trips_every_variant() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::from_id(status.id()), Some(*status));
        }
        assert_eq!(LeadStatus::from_id(0), None);
        assert!(LeadStatus::try_from(11).is_err());
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = ApprovalStatus::Rejected.into();
        assert_eq!(id, 3);
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&LeadStatus::FollowedUpWithMessage).unwrap();
        assert_eq!(json, "\"followed_up_with_message\"");
        let back: LeadStatus = serde_json::from_str("\"dead_not_interested\"").unwrap();
        assert_eq!(back, LeadStatus::DeadNotInterested);
    }

    #[test]
    fn seat_holding_statuses() {
        assert!(LeadStatus::Joined.occupies_seat());
        assert!(LeadStatus::PaymentPendingVerification.occupies_seat());
        assert!(!LeadStatus::OnBreak.occupies_seat());
        assert!(!LeadStatus::TrialScheduled.occupies_seat());
    }
}
