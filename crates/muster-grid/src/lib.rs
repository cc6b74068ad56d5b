//! Muster Grid - collaborator interfaces and the sheet cache tier
//!
//! The physical side of the roster engine:
//! - [`GridStore`]: the raw, authoritative grid collaborator
//! - [`CacheService`]: the external key/value cache collaborator
//! - [`LeaseService`]: the store-wide mutual-exclusion lease
//! - [`SheetCache`]: the two-tier snapshot cache fronting the grid

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod error;
pub mod lease;
pub mod store;

pub use cache::{CacheService, EnsureReport, SheetCache, SheetCacheConfig, SoftFailure};
pub use error::GridError;
pub use lease::{LeaseError, LeaseService, LeaseToken};
pub use store::{CellValue, CellWrite, GridStore, SheetSnapshot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
