//! Engine error taxonomy and the uniform operation boundary
//!
//! Every mutating operation is caught at the boundary and returned as a
//! structured [`OperationOutcome`] rather than thrown past it. The taxonomy
//! distinguishes retryable contention (`Busy`), stale-client conflicts
//! (`Conflict`), user-fixable input problems (`Validation`, `Capacity`), and
//! fatal configuration faults.

use crate::delta::MutationDelta;
use muster_blueprint::{ConfigError, Coordinate};
use muster_grid::{GridError, LeaseError};
use std::time::Duration;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Blueprint references something undefined; fatal, not retryable
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Coordinate or identity no longer resolvable; client state is stale
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic check failed: the coordinate changed since the last read
    #[error("conflict at {at}: expected '{expected}', found '{found}'")]
    Conflict {
        /// The identity cell that was re-read
        at: Coordinate,
        /// Identity the client last saw
        expected: String,
        /// Identity live in the grid
        found: String,
    },

    /// Destination pool has no free coordinate
    #[error("'{pool}' is full ({capacity} slots)")]
    Capacity {
        /// Pool display name
        pool: String,
        /// Pool capacity
        capacity: usize,
    },

    /// Store-wide lease not acquired within the bounded wait
    #[error("store busy: lease not acquired within {0:?}")]
    Busy(Duration),

    /// Input rejected; fixable by changing it
    #[error("validation failed: {0}")]
    Validation(String),

    /// Grid or cache tier failure
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
}

impl From<LeaseError> for EngineError {
    fn from(e: LeaseError) -> Self {
        match e {
            LeaseError::Busy(waited) => Self::Busy(waited),
            LeaseError::Backend(msg) => Self::Grid(GridError::Backend(msg)),
        }
    }
}

impl EngineError {
    /// Whether retrying can succeed without changing the input
    ///
    /// `Busy` retries after a short delay; `Conflict` retries after the
    /// client refreshes its view.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Conflict { .. })
    }

    /// Whether the error is user-facing and fixable by changing input
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Capacity { .. })
    }
}

/// Boundary status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The write batch fully committed
    Ok,
    /// Nothing was written
    Failed,
}

/// Uniform result shape returned to callers
///
/// No operation leaves the caller with a "maybe it worked" state: `Ok`
/// means the batch committed; `Failed` means no write was issued (or a
/// mid-write fault was logged as fatal and the caches purged).
#[derive(Debug)]
pub struct OperationOutcome {
    /// Whether the operation committed
    pub status: OperationStatus,
    /// Human-readable summary
    pub message: String,
    /// The structured delta for the notification layer, on success
    pub delta: Option<MutationDelta>,
}

impl OperationOutcome {
    /// Fold an operation result into the uniform shape, logging the error
    /// with enough context to reproduce
    #[must_use]
    pub fn from_result(operation: &str, result: Result<MutationDelta, EngineError>) -> Self {
        match result {
            Ok(delta) => Self {
                status: OperationStatus::Ok,
                message: format!("{operation} completed"),
                delta: Some(delta),
            },
            Err(e) => {
                tracing::error!(operation, error = %e, retryable = e.is_retryable(), "operation failed");
                Self {
                    status: OperationStatus::Failed,
                    message: e.to_string(),
                    delta: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(EngineError::Busy(Duration::from_secs(15)).is_retryable());
        assert!(EngineError::Conflict {
            at: Coordinate::new("A", 1, 1),
            expected: "a".into(),
            found: "b".into(),
        }
        .is_retryable());
        assert!(!EngineError::NotFound("x".into()).is_retryable());
        assert!(!EngineError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn user_error_classification() {
        assert!(EngineError::Validation("dup".into()).is_user_error());
        assert!(EngineError::Capacity {
            pool: "p".into(),
            capacity: 2
        }
        .is_user_error());
        assert!(!EngineError::Busy(Duration::ZERO).is_user_error());
    }

    #[test]
    fn lease_busy_maps_to_busy() {
        let e: EngineError = LeaseError::Busy(Duration::from_millis(500)).into();
        assert!(matches!(e, EngineError::Busy(_)));
    }

    #[test]
    fn outcome_from_error_carries_message() {
        let outcome =
            OperationOutcome::from_result("recruit", Err(EngineError::Validation("dup".into())));
        assert_eq!(outcome.status, OperationStatus::Failed);
        assert!(outcome.message.contains("dup"));
        assert!(outcome.delta.is_none());
    }
}
