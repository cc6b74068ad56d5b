//! Mutual-exclusion lease collaborator
//!
//! Mutations serialize through a single whole-store lease. Acquisition is
//! bounded: exceeding the timeout is a retryable Busy condition, distinct
//! from an optimistic-concurrency conflict.

use async_trait::async_trait;
use std::time::Duration;

/// Opaque proof of lease ownership
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseToken(u64);

impl LeaseToken {
    /// Wrap a backend-issued token id
    #[inline]
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Backend token id
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Lease acquisition failures
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// The lease was not acquired within the bounded wait
    #[error("lease not acquired within {0:?}")]
    Busy(Duration),

    /// The lease backend itself failed
    #[error("lease backend: {0}")]
    Backend(String),
}

/// The lease collaborator
#[async_trait]
pub trait LeaseService: Send + Sync {
    /// Acquire the store-wide lease, waiting at most `timeout`
    async fn acquire(&self, timeout: Duration) -> Result<LeaseToken, LeaseError>;

    /// Release a previously acquired lease
    async fn release(&self, token: LeaseToken) -> Result<(), LeaseError>;
}
