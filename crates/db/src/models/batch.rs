//! Batch (class/cohort) models and roster links.

use academy_core::types::{Date, DbId, Timestamp};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A row from the `batches` table.
///
/// `days_of_week` uses ISO numbering without offset: 1 = Monday .. 7 = Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Batch {
    pub id: DbId,
    pub center_id: DbId,
    pub name: String,
    pub days_of_week: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub coach_id: Option<DbId>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatch {
    pub center_id: DbId,
    pub name: String,
    pub days_of_week: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub coach_id: Option<DbId>,
}

/// DTO for patching a batch. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBatch {
    pub name: Option<String>,
    pub days_of_week: Option<Vec<i16>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub max_capacity: Option<i32>,
    pub is_active: Option<bool>,
}

/// A row from the `batch_assignments` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BatchAssignment {
    pub id: DbId,
    pub lead_id: DbId,
    pub batch_id: DbId,
    pub created_at: Timestamp,
}

/// Seat usage of a batch on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub batch_id: DbId,
    pub date: Date,
    pub occupied: i64,
    pub max_capacity: i32,
    pub available: i64,
    pub is_full: bool,
}

impl Occupancy {
    pub fn new(batch_id: DbId, date: Date, occupied: i64, max_capacity: i32) -> Self {
        let available = (i64::from(max_capacity) - occupied).max(0);
        Self {
            batch_id,
            date,
            occupied,
            max_capacity,
            available,
            is_full: occupied >= i64::from(max_capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_reports_full_at_capacity() {
        let date = Date::from_ymd_opt(2026, 4, 1).unwrap();
        let occ = Occupancy::new(1, date, 20, 20);
        assert!(occ.is_full);
        assert_eq!(occ.available, 0);

        let over = Occupancy::new(1, date, 22, 20);
        assert_eq!(over.available, 0);

        let spare = Occupancy::new(1, date, 3, 20);
        assert!(!spare.is_full);
        assert_eq!(spare.available, 17);
    }
}
