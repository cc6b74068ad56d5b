//! Muster Engine - roster resolution and synchronization
//!
//! The behavioral side of the roster engine:
//! - [`materialize`]: raw cell blocks to typed [`Person`] records and back
//! - [`allocator`]: seniority-packed slot allocation within pools
//! - [`guard`]: optimistic concurrency via live identity re-reads
//! - [`RosterEngine`]: the mutation orchestrator tying blueprint, grid,
//!   caches, and lease together
//!
//! # Example
//!
//! ```rust,ignore
//! use muster_engine::{RecruitRequest, RosterEngine};
//!
//! let engine = RosterEngine::new(config, store, cache, lease)?;
//! let outcome = engine.recruit(RecruitRequest { /* ... */ }).await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregate;
pub mod allocator;
pub mod delta;
pub mod engine;
pub mod error;
pub mod guard;
pub mod materialize;
pub mod person;
pub mod validate;

pub use aggregate::{AggregateCache, AvailabilityMap, PathAvailability, RosterView, SlotCount};
pub use allocator::{seniority_cmp, PoolChange, PoolPlan};
pub use delta::MutationDelta;
pub use engine::{FieldUpdates, ReassignRequest, RecruitRequest, RosterEngine};
pub use error::{EngineError, OperationOutcome, OperationStatus};
pub use materialize::{
    clear_writes, extract_email, field_writes, materialize, parse_date, person_writes,
};
pub use person::{LeaveDetails, Person};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
