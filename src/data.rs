use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::manager::FixReport;
use crate::room::Gender;

// Type aliases for clarity
pub type RoomId = u32;
pub type CapsuleIndex = usize;

/// A capsule listing: for each capsule, the sorted ids of its rooms.
pub type Solution = Vec<Vec<RoomId>>;

/// Constraint tables, keyed by room id.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsInput {
    /// Pairs of rooms that must end up in the same capsule.
    #[serde(default)]
    pub connecting: Vec<(RoomId, RoomId)>,
    /// Rooms that refuse to share a capsule with the other gender.
    #[serde(default)]
    pub gender: Vec<RoomId>,
    /// Room-specific limits on the number of rooms in the capsule holding them.
    #[serde(default)]
    pub max_room_count: BTreeMap<RoomId, usize>,
    pub global_max_room_count: Option<usize>,
    /// Applies the gender rule to every capsule.
    #[serde(default)]
    pub global_gender: bool,
}

/// Tunables for a solve request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverConfig {
    pub capsules_count: usize,
    pub max_tries_count: usize,
    pub max_fixes_count: usize,
    #[serde(default = "default_generate_count")]
    pub generate_count: usize,
    /// Fixed seed for reproducible output. Entropy is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Rooms whose occupants have no known gender are treated as male.
    #[serde(default = "default_assume_gender")]
    pub assume_gender: bool,
    /// Returns the fix rounds that led to each solution.
    #[serde(default)]
    pub include_trail: bool,
}

impl SolverConfig {
    /// The most fix rounds this request can run: tries × fixes × generations.
    pub fn work_budget(&self) -> u64 {
        [self.max_tries_count, self.max_fixes_count, self.generate_count]
            .into_iter()
            .fold(1u64, |total, count| {
                total.saturating_mul(u64::try_from(count).unwrap_or(u64::MAX))
            })
    }
}

fn default_generate_count() -> usize {
    1
}

fn default_assume_gender() -> bool {
    true
}

/// The complete input for an allocation problem.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationInput {
    /// Occupant names per room. Room ids start at 1, in list order.
    pub rooms: Vec<Vec<String>>,
    #[serde(default)]
    pub genders: BTreeMap<String, Gender>,
    #[serde(default)]
    pub constraints: ConstraintsInput,
    pub config: SolverConfig,
    #[serde(default)]
    pub existing_room_mapping: Option<BTreeMap<RoomId, Option<CapsuleIndex>>>,
}

/// The final output of the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOutput {
    /// Distinct solutions, in the order they were first found.
    pub solutions: Vec<Solution>,
    pub attempts: usize,
    pub failed_attempts: usize,
    /// Fix rounds of the try that first found each solution, index-aligned
    /// with `solutions`. Only present when `includeTrail` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trails: Option<Vec<Vec<FixReport>>>,
}
