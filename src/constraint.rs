use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{CapsuleIndex, RoomId};
use crate::error::AllocationError;
use crate::mapping::RoomMapping;
use crate::room::Room;

const CONNECTING_ORDER: usize = 10;
const GENDER_ORDER: usize = 20;
const ROOM_COUNT_ORDER: usize = 30;

/// A rule a capsule's room set must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Constraint {
    /// Both rooms share a capsule, or neither is in it.
    Connecting { a: RoomId, b: RoomId },
    /// All rooms of the capsule have the same gender.
    Gender,
    /// The capsule holds at most `max` rooms.
    RoomCount { max: usize },
}

/// The outcome of evaluating one constraint against one capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Broken, with the actions that would repair it.
    Invalid(Vec<Action>),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

impl Constraint {
    /// Evaluation priority. Lower values are checked first; looser room
    /// limits come after tighter ones.
    pub fn order(&self) -> usize {
        match self {
            Self::Connecting { .. } => CONNECTING_ORDER,
            Self::Gender => GENDER_ORDER,
            Self::RoomCount { max } => ROOM_COUNT_ORDER.saturating_add(*max),
        }
    }

    /// Checks the rooms of capsule `capsule` and suggests a repair if broken.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        capsule: CapsuleIndex,
        rooms: &[&Room],
        rng: &mut R,
    ) -> Result<Verdict, AllocationError> {
        match self {
            Self::Connecting { a, b } => Ok(evaluate_connecting(capsule, rooms, *a, *b)),
            Self::Gender => evaluate_gender(capsule, rooms),
            Self::RoomCount { max } => Ok(evaluate_room_count(capsule, rooms, *max, rng)),
        }
    }
}

fn evaluate_connecting(capsule: CapsuleIndex, rooms: &[&Room], a: RoomId, b: RoomId) -> Verdict {
    let has_a = rooms.iter().any(|room| room.id == a);
    let has_b = rooms.iter().any(|room| room.id == b);
    match (has_a, has_b) {
        (true, false) => Verdict::Invalid(vec![Action::Add { capsule, room: b }]),
        (false, true) => Verdict::Invalid(vec![Action::Add { capsule, room: a }]),
        _ => Verdict::Valid,
    }
}

// The minority gender is unassigned. On a tie, the gender whose first room
// comes later in id order is the one reduced.
fn evaluate_gender(capsule: CapsuleIndex, rooms: &[&Room]) -> Result<Verdict, AllocationError> {
    let distinct: Vec<_> = rooms.iter().map(|room| room.gender).unique().collect();
    match distinct.as_slice() {
        [] | [_] => Ok(Verdict::Valid),
        [first, second] => {
            let counts = rooms.iter().map(|room| room.gender).counts();
            let minority = if counts[first] < counts[second] {
                *first
            } else {
                *second
            };
            Ok(Verdict::Invalid(
                rooms
                    .iter()
                    .filter(|room| room.gender == minority)
                    .map(|room| Action::Reduce {
                        capsule,
                        room: room.id,
                    })
                    .collect(),
            ))
        }
        more => Err(AllocationError::TooManyGenders(more.len())),
    }
}

fn evaluate_room_count<R: Rng + ?Sized>(
    capsule: CapsuleIndex,
    rooms: &[&Room],
    max: usize,
    rng: &mut R,
) -> Verdict {
    if rooms.len() <= max {
        return Verdict::Valid;
    }
    let excess = rooms.len() - max;
    Verdict::Invalid(
        rooms
            .choose_multiple(rng, excess)
            .map(|room| Action::Reduce {
                capsule,
                room: room.id,
            })
            .collect(),
    )
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting { a, b } => write!(f, "Connecting({a}, {b})"),
            Self::Gender => write!(f, "Gender"),
            Self::RoomCount { max } => write!(f, "RoomCount({max})"),
        }
    }
}

/// A single mutation of the room mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Moves `room` into `capsule`.
    Add { capsule: CapsuleIndex, room: RoomId },
    /// Takes `room` out of `capsule`, leaving it unassigned.
    Reduce { capsule: CapsuleIndex, room: RoomId },
}

impl Action {
    pub fn apply(&self, mapping: &mut RoomMapping) {
        match *self {
            Self::Add { capsule, room } => mapping.set(room, Some(capsule)),
            Self::Reduce { room, .. } => mapping.set(room, None),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { capsule, room } => write!(f, "add room {room} to capsule {capsule}"),
            Self::Reduce { capsule, room } => {
                write!(f, "reduce room {room} from capsule {capsule}")
            }
        }
    }
}
