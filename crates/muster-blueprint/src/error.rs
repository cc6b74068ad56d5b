//! Blueprint configuration errors
//!
//! Malformed blueprints are surfaced verbatim, never repaired.

use crate::coord::Coordinate;

/// Errors raised while loading or compiling a blueprint document
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Document failed to parse
    #[error("invalid blueprint document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A slot or node references a layout the document does not define
    #[error("unknown layout '{0}'")]
    UnknownLayout(String),

    /// A node references a reusable slot group the document does not define
    #[error("unknown slot group '{0}'")]
    UnknownSlotGroup(String),

    /// No layout resolvable for a slot via its node path
    #[error("no layout resolvable for slot {slot} under '{path}'")]
    LayoutUnresolved {
        /// Dotted node path
        path: String,
        /// Slot index within the node
        slot: usize,
    },

    /// No sheet name resolvable for a node that carries slots
    #[error("no sheet name resolvable for '{path}'")]
    SheetUnresolved {
        /// Dotted node path
        path: String,
    },

    /// Slot has a column anchor but no row specification
    #[error("slot {slot} under '{path}' has no row specification")]
    MissingRows {
        /// Dotted node path
        path: String,
        /// Slot index within the node
        slot: usize,
    },

    /// Slot resolves no column anchor at all
    #[error("slot {slot} under '{path}' resolves no column anchor")]
    MissingColumn {
        /// Dotted node path
        path: String,
        /// Slot index within the node
        slot: usize,
    },

    /// Two slots claim the same physical coordinate
    #[error("coordinate {0} is claimed by more than one slot")]
    DuplicateCoordinate(Coordinate),

    /// A configured pattern (e.g. username rule) failed to compile
    #[error("invalid configured pattern: {0}")]
    InvalidPattern(String),
}
