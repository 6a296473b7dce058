//! Tunable lifecycle thresholds.
//!
//! The defaults reproduce the academy's standing rules; deployments may
//! override them through environment variables without changing the shape of
//! the state machine.

use chrono::{Duration, NaiveTime, TimeZone, Utc};

use crate::types::Timestamp;

/// Default number of trial no-shows before a lead is marked lost.
pub const DEFAULT_NO_SHOW_STRIKE_LIMIT: i32 = 2;

/// Default number of unanswered re-engagement nudges before a lead is marked lost.
pub const DEFAULT_NUDGE_STRIKE_LIMIT: i32 = 3;

/// Default days after subscription expiry before a student is demoted.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 4;

/// Default follow-up escalation after an attended trial.
pub const DEFAULT_TRIAL_FOLLOW_UP_HOURS: i64 = 24;

/// Default hour (UTC) of the next-day reschedule call after a no-show.
pub const DEFAULT_RESCHEDULE_FOLLOW_UP_HOUR: u32 = 10;

/// Loss reason recorded by the no-show rule.
pub const LOSS_REASON_NO_SHOW: &str = "Repeated No-Show";

/// Loss reason recorded by the nudge rule.
pub const LOSS_REASON_NO_RESPONSE: &str = "No response to re-engagement";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub no_show_strike_limit: i32,
    pub nudge_strike_limit: i32,
    pub grace_period_days: i64,
    pub trial_follow_up_hours: i64,
    pub reschedule_follow_up_hour: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            no_show_strike_limit: DEFAULT_NO_SHOW_STRIKE_LIMIT,
            nudge_strike_limit: DEFAULT_NUDGE_STRIKE_LIMIT,
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
            trial_follow_up_hours: DEFAULT_TRIAL_FOLLOW_UP_HOURS,
            reschedule_follow_up_hour: DEFAULT_RESCHEDULE_FOLLOW_UP_HOUR,
        }
    }
}

impl PolicyConfig {
    /// Load policy overrides from environment variables.
    ///
    /// | Env Var                     | Default |
    /// |-----------------------------|---------|
    /// | `NO_SHOW_STRIKE_LIMIT`      | `2`     |
    /// | `NUDGE_STRIKE_LIMIT`        | `3`     |
    /// | `GRACE_PERIOD_DAYS`         | `4`     |
    /// | `TRIAL_FOLLOW_UP_HOURS`     | `24`    |
    /// | `RESCHEDULE_FOLLOW_UP_HOUR` | `10`    |
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        Self {
            no_show_strike_limit: var("NO_SHOW_STRIKE_LIMIT", defaults.no_show_strike_limit).max(1),
            nudge_strike_limit: var("NUDGE_STRIKE_LIMIT", defaults.nudge_strike_limit).max(1),
            grace_period_days: var("GRACE_PERIOD_DAYS", defaults.grace_period_days).max(0),
            trial_follow_up_hours: var("TRIAL_FOLLOW_UP_HOURS", defaults.trial_follow_up_hours),
            reschedule_follow_up_hour: var(
                "RESCHEDULE_FOLLOW_UP_HOUR",
                defaults.reschedule_follow_up_hour,
            )
            .min(23),
        }
    }

    /// Follow-up time after an attended trial.
    pub fn trial_follow_up(&self, now: Timestamp) -> Timestamp {
        now + Duration::hours(self.trial_follow_up_hours)
    }

    /// Follow-up time after a no-show: tomorrow at the reschedule hour.
    pub fn reschedule_follow_up(&self, now: Timestamp) -> Timestamp {
        let tomorrow = now.date_naive() + Duration::days(1);
        let time = NaiveTime::from_hms_opt(self.reschedule_follow_up_hour, 0, 0)
            .unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&tomorrow.and_time(time))
    }

    /// Whether a student `days_past` days past expiry is still in grace.
    pub fn within_grace(&self, days_past: i64) -> bool {
        days_past <= self.grace_period_days
    }
}
