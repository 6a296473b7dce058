//! Shared query parameter types for API handlers.

use academy_core::types::Date;
use serde::Deserialize;

/// `?limit=` for history endpoints. Clamped by the audit log.
#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// `?date=YYYY-MM-DD`; today when absent.
#[derive(Debug, Deserialize)]
pub struct DateParams {
    pub date: Option<Date>,
}
