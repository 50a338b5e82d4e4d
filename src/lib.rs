//! Randomized capsule allocation.
//!
//! Rooms are spread over a fixed number of capsules at random, then broken
//! capsules are repaired one at a time until every constraint holds or the
//! fix budget runs out, in which case the whole try starts over.

pub mod capsule;
pub mod config;
pub mod constraint;
pub mod data;
pub mod error;
pub mod manager;
pub mod mapping;
pub mod room;
pub mod server;
pub mod solver;

pub use capsule::{Capsule, Violation};
pub use constraint::{Action, Constraint, Verdict};
pub use data::{AllocationInput, AllocationOutput, CapsuleIndex, RoomId, Solution};
pub use error::AllocationError;
pub use manager::{Allocation, CapsulesManager, FixReport, Limits};
pub use mapping::RoomMapping;
pub use room::{Gender, Room, RoomSet, build_rooms};
