//! Error types for capsule allocation.

use crate::data::{CapsuleIndex, RoomId};

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// Every try ran out of fixes before the capsules became valid.
    #[error("reached maximum try attempts ({tries})")]
    Exhausted { tries: usize },

    /// A capsule held more genders than the binary model allows.
    /// Malformed input, never retried.
    #[error("cannot have {0} genders in one capsule")]
    TooManyGenders(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("room {0} does not exist")]
    UnknownRoom(RoomId),

    #[error("room {room} is mapped to capsule {capsule}, which does not exist")]
    CapsuleOutOfRange { room: RoomId, capsule: CapsuleIndex },

    #[error("could not find gender for room {0}")]
    MissingGender(RoomId),

    /// None of the generated attempts produced a valid allocation.
    #[error("no solution found in {attempts} attempts")]
    NoSolution { attempts: usize },
}

impl AllocationError {
    /// Returns `true` when the request itself is malformed, as opposed to
    /// a well-formed problem the solver could not satisfy.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Exhausted { .. } | Self::NoSolution { .. })
    }
}
