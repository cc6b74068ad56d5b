//! Mutation deltas
//!
//! Every mutation returns a structured delta that the (out-of-scope)
//! notification layer consumes. The engine makes no assumption about
//! whether or how the delta is delivered.

use crate::aggregate::AvailabilityMap;
use crate::person::Person;
use muster_blueprint::Coordinate;
use serde::{Deserialize, Serialize};

/// What a committed mutation changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationDelta {
    /// Existing records whose position or fields changed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<Person>,

    /// Records created by this mutation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created: Vec<Person>,

    /// Coordinate freed by a remove
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Coordinate>,

    /// Availability after the mutation
    pub availability: AvailabilityMap,
}
