use crate::types::DbId;

/// Stable failure categories surfaced to callers.
///
/// Several [`CoreError`] variants share a kind; the kind is what callers
/// branch on, the variant carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    CapacityReached,
    AlreadyEnrolled,
    Unauthorized,
    Validation,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("A permanent batch assignment is required to join")]
    BatchRequired,

    #[error("A trial batch is required to schedule a trial")]
    TrialBatchRequired,

    #[error("Batch {batch_id} is full ({max_capacity} seats)")]
    CapacityReached { batch_id: DbId, max_capacity: i32 },

    #[error("Lead {lead_id} already has an active student record")]
    AlreadyEnrolled { lead_id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidTransition(_)
            | CoreError::BatchRequired
            | CoreError::TrialBatchRequired
            | CoreError::Conflict(_) => ErrorKind::InvalidTransition,
            CoreError::CapacityReached { .. } => ErrorKind::CapacityReached,
            CoreError::AlreadyEnrolled { .. } => ErrorKind::AlreadyEnrolled,
            CoreError::Unauthorized(_) | CoreError::Forbidden(_) => ErrorKind::Unauthorized,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::InvalidTransition(_) => "INVALID_TRANSITION",
            CoreError::BatchRequired => "BATCH_REQUIRED",
            CoreError::TrialBatchRequired => "TRIAL_BATCH_REQUIRED",
            CoreError::CapacityReached { .. } => "CAPACITY_REACHED",
            CoreError::AlreadyEnrolled { .. } => "ALREADY_ENROLLED",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying (possibly with another batch) may succeed.
    ///
    /// Only capacity conflicts are racy; every other failure needs corrected input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::CapacityReached { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_failures_share_the_invalid_transition_kind() {
        assert_eq!(CoreError::BatchRequired.kind(), ErrorKind::InvalidTransition);
        assert_eq!(CoreError::TrialBatchRequired.kind(), ErrorKind::InvalidTransition);
        assert_eq!(
            CoreError::InvalidTransition("x".into()).kind(),
            ErrorKind::InvalidTransition
        );
    }

    #[test]
    fn guard_failures_keep_distinct_codes() {
        assert_eq!(CoreError::BatchRequired.code(), "BATCH_REQUIRED");
        assert_eq!(CoreError::TrialBatchRequired.code(), "TRIAL_BATCH_REQUIRED");
    }

    #[test]
    fn only_capacity_is_retryable() {
        let full = CoreError::CapacityReached {
            batch_id: 3,
            max_capacity: 20,
        };
        assert!(full.is_retryable());
        assert_eq!(full.kind(), ErrorKind::CapacityReached);
        assert!(!CoreError::AlreadyEnrolled { lead_id: 1 }.is_retryable());
        assert!(!CoreError::Validation("bad date".into()).is_retryable());
    }

    #[test]
    fn capacity_message_names_the_batch() {
        let err = CoreError::CapacityReached {
            batch_id: 7,
            max_capacity: 12,
        };
        assert_eq!(err.to_string(), "Batch 7 is full (12 seats)");
    }
}
