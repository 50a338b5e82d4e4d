use itertools::Itertools;
use log::debug;
use rand::Rng;

use crate::constraint::{Action, Constraint, Verdict};
use crate::data::{CapsuleIndex, RoomId};
use crate::error::AllocationError;
use crate::mapping::RoomMapping;
use crate::room::{Room, RoomSet};

/// A group of rooms, derived from the room mapping.
///
/// A capsule never changes on its own: it is rebuilt from the mapping
/// after every mutation, so its room and constraint lists are never stale.
#[derive(Debug, Clone)]
pub struct Capsule<'a> {
    index: CapsuleIndex,
    rooms: Vec<&'a Room>,
    constraints: Vec<&'a Constraint>,
}

/// A broken constraint together with its suggested repair.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub constraint: Constraint,
    pub actions: Vec<Action>,
}

impl<'a> Capsule<'a> {
    /// Collects the rooms mapped to `index` and the constraints they carry.
    pub fn from_mapping(index: CapsuleIndex, rooms: &'a RoomSet, mapping: &RoomMapping) -> Self {
        let rooms: Vec<&'a Room> = mapping
            .rooms_in(index)
            .filter_map(|id| rooms.get(&id))
            .collect();
        let constraints = rooms
            .iter()
            .flat_map(|&room| room.constraints.iter())
            .collect();
        Self {
            index,
            rooms,
            constraints,
        }
    }

    pub fn index(&self) -> CapsuleIndex {
        self.index
    }

    pub fn rooms(&self) -> &[&'a Room] {
        &self.rooms
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|room| room.id).collect()
    }

    /// Constraints carried by the member rooms.
    pub fn constraints(&self) -> &[&'a Constraint] {
        &self.constraints
    }

    /// Checks the capsule against its own constraints plus `global_constraints`.
    ///
    /// Constraints run in ascending [`Constraint::order`]; the first broken
    /// one short-circuits with its suggested actions. The globals are only
    /// borrowed for this check and never stored on the capsule.
    pub fn apply_constraints<R: Rng + ?Sized>(
        &self,
        global_constraints: &[Constraint],
        rng: &mut R,
    ) -> Result<Option<Violation>, AllocationError> {
        let mut ordered: Vec<&Constraint> = self
            .constraints
            .iter()
            .copied()
            .chain(global_constraints)
            .collect();
        ordered.sort_by_key(|constraint| constraint.order());

        for constraint in ordered {
            if let Verdict::Invalid(actions) = constraint.evaluate(self.index, &self.rooms, rng)? {
                debug!(
                    "Capsule {} rejected by {}: [{}]",
                    self.index,
                    constraint,
                    actions.iter().join(", ")
                );
                return Ok(Some(Violation {
                    constraint: constraint.clone(),
                    actions,
                }));
            }
        }
        Ok(None)
    }
}
