//! Muster Blueprint - organization model and compiled index
//!
//! The declarative side of the roster engine:
//! - The blueprint document: ranks, layouts, slot groups, the org tree, and
//!   operational settings
//! - The compiled [`BlueprintIndex`] mapping grid coordinates to
//!   organizational meaning
//! - Nearest-ancestor inheritance for sheet and layout names
//!
//! # Example
//!
//! ```rust,ignore
//! use muster_blueprint::{BlueprintConfig, BlueprintIndex, Coordinate};
//!
//! let config = BlueprintConfig::from_json(doc)?;
//! let index = BlueprintIndex::build(&config)?;
//! let ctx = index.context_at(&Coordinate::new("Alpha", 14, 4));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod coord;
pub mod error;
pub mod index;
pub mod layout;
pub mod node;
pub mod rank;
pub mod slot;

pub use config::{
    BlueprintConfig, CacheSettings, CustomFieldDef, TrainingGate, UsernameRules, ValidationRules,
};
pub use coord::Coordinate;
pub use error::ConfigError;
pub use index::{BlueprintIndex, NodeContext, PathCapacity, PoolRef, SlotContext};
pub use layout::{FieldKey, Layout, Offset, Rect};
pub use node::{nearest, NodeLocation, NodePath, OrgNode};
pub use rank::{Rank, RankTable, UNKNOWN_RANK};
pub use slot::{CellLoc, Slot, SlotLocation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
