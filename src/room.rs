use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constraint::Constraint;
use crate::data::RoomId;
use crate::error::AllocationError;

/// Rooms keyed by id. Ordered, so iteration is reproducible.
pub type RoomSet = BTreeMap<RoomId, Room>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "GenderRepr")]
pub enum Gender {
    Female,
    Male,
}

// Genders arrive either as codes (0 = female, 1 = male) or by name.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenderRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<GenderRepr> for Gender {
    type Error = String;

    fn try_from(repr: GenderRepr) -> Result<Self, Self::Error> {
        match repr {
            GenderRepr::Code(0) => Ok(Gender::Female),
            GenderRepr::Code(1) => Ok(Gender::Male),
            GenderRepr::Name(name) if name.eq_ignore_ascii_case("female") => Ok(Gender::Female),
            GenderRepr::Name(name) if name.eq_ignore_ascii_case("male") => Ok(Gender::Male),
            GenderRepr::Code(code) => Err(format!("unknown gender code {code}")),
            GenderRepr::Name(name) => Err(format!("unknown gender {name:?}")),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Female => write!(f, "Female"),
            Gender::Male => write!(f, "Male"),
        }
    }
}

/// An indivisible allocation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub occupants: Vec<String>,
    pub gender: Gender,
    /// Constraints that follow this room into whichever capsule holds it.
    pub constraints: Vec<Constraint>,
}

impl Room {
    pub fn new(id: RoomId, occupants: Vec<String>, gender: Gender) -> Self {
        Self {
            id,
            occupants,
            gender,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }
}

/// Builds rooms from occupant lists, numbering them from 1.
///
/// A room takes the gender of its first occupant found in `genders`. When no
/// occupant is listed the room is assumed male if `assume_gender` is set,
/// otherwise the build fails. A wrongly listed first occupant decides the
/// gender of the whole room.
pub fn build_rooms(
    occupants: &[Vec<String>],
    genders: &BTreeMap<String, Gender>,
    assume_gender: bool,
) -> Result<RoomSet, AllocationError> {
    let mut rooms = RoomSet::new();
    for (id, names) in (1..).zip(occupants) {
        let gender = match names.iter().find_map(|name| genders.get(name)) {
            Some(gender) => *gender,
            None if assume_gender => Gender::Male,
            None => return Err(AllocationError::MissingGender(id)),
        };
        rooms.insert(id, Room::new(id, names.clone(), gender));
    }
    Ok(rooms)
}
