//! Subscription plans and their calendar arithmetic.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Known subscription plans and their length in calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPlan {
    #[serde(rename = "Monthly")]
    Monthly,
    #[serde(rename = "Quarterly")]
    Quarterly,
    #[serde(rename = "6 Months")]
    HalfYearly,
    #[serde(rename = "Yearly")]
    Yearly,
}

impl SubscriptionPlan {
    pub const ALL: &'static [SubscriptionPlan] = &[
        SubscriptionPlan::Monthly,
        SubscriptionPlan::Quarterly,
        SubscriptionPlan::HalfYearly,
        SubscriptionPlan::Yearly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SubscriptionPlan::Monthly => "Monthly",
            SubscriptionPlan::Quarterly => "Quarterly",
            SubscriptionPlan::HalfYearly => "6 Months",
            SubscriptionPlan::Yearly => "Yearly",
        }
    }

    pub fn months(self) -> u32 {
        match self {
            SubscriptionPlan::Monthly => 1,
            SubscriptionPlan::Quarterly => 3,
            SubscriptionPlan::HalfYearly => 6,
            SubscriptionPlan::Yearly => 12,
        }
    }

    /// Parse a plan name, case-insensitively.
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|plan| plan.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown subscription plan '{trimmed}'. Must be one of: {}",
                    Self::ALL
                        .iter()
                        .map(|p| p.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    /// End date of a subscription starting on `start`.
    ///
    /// Adds whole calendar months; a start day past the end of the target
    /// month clamps to that month's last day (Jan 31 + 1 month = Feb 28/29).
    pub fn end_date(self, start: NaiveDate) -> Result<NaiveDate, CoreError> {
        start
            .checked_add_months(Months::new(self.months()))
            .ok_or_else(|| CoreError::Validation(format!("Subscription end date overflows for {start}")))
    }
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate that a subscription window is not inverted.
pub fn validate_window(start: NaiveDate, end: NaiveDate) -> Result<(), CoreError> {
    if end < start {
        return Err(CoreError::Validation(format!(
            "Subscription end {end} is before start {start}"
        )));
    }
    Ok(())
}
