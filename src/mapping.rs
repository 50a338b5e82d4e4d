use std::collections::BTreeMap;

use crate::data::{CapsuleIndex, RoomId};
use crate::room::RoomSet;

/// The shared room → capsule state.
///
/// Every room id is a key for the whole lifetime of the mapping; only the
/// value changes. `None` marks a room unassigned during repair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomMapping(BTreeMap<RoomId, Option<CapsuleIndex>>);

impl RoomMapping {
    /// A mapping with every room unassigned.
    pub fn unassigned_for(rooms: &RoomSet) -> Self {
        Self(rooms.keys().map(|&id| (id, None)).collect())
    }

    pub fn get(&self, room: RoomId) -> Option<CapsuleIndex> {
        self.0.get(&room).copied().flatten()
    }

    /// Assigns or clears a room. Ids outside the mapping are ignored.
    pub fn set(&mut self, room: RoomId, capsule: Option<CapsuleIndex>) {
        if let Some(slot) = self.0.get_mut(&room) {
            *slot = capsule;
        }
    }

    pub fn contains(&self, room: RoomId) -> bool {
        self.0.contains_key(&room)
    }

    /// Rooms currently without a capsule, in ascending id order.
    pub fn unassigned(&self) -> Vec<RoomId> {
        self.0
            .iter()
            .filter(|(_, capsule)| capsule.is_none())
            .map(|(&room, _)| room)
            .collect()
    }

    /// Rooms assigned to `capsule`, in ascending id order.
    pub fn rooms_in(&self, capsule: CapsuleIndex) -> impl Iterator<Item = RoomId> + '_ {
        self.0
            .iter()
            .filter(move |(_, assigned)| **assigned == Some(capsule))
            .map(|(&room, _)| room)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoomId, Option<CapsuleIndex>)> + '_ {
        self.0.iter().map(|(&room, &capsule)| (room, capsule))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(RoomId, Option<CapsuleIndex>)> for RoomMapping {
    fn from_iter<I: IntoIterator<Item = (RoomId, Option<CapsuleIndex>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
