use log::{debug, info, trace};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::capsule::Capsule;
use crate::constraint::{Action, Constraint};
use crate::data::{CapsuleIndex, RoomId, Solution};
use crate::error::AllocationError;
use crate::mapping::RoomMapping;
use crate::room::RoomSet;

/// Retry budget: `max_tries_count` fresh starts, each allowed
/// `max_fixes_count` fix rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_tries_count: usize,
    pub max_fixes_count: usize,
}

/// What a single fix round did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixReport {
    /// The capsule that was repaired, if any was invalid.
    pub capsule: Option<CapsuleIndex>,
    pub violated: Option<Constraint>,
    pub actions: Vec<Action>,
    /// Orphaned rooms that were randomly allocated again.
    pub reallocated: Vec<RoomId>,
}

impl FixReport {
    pub fn needed_fixing(&self) -> bool {
        self.capsule.is_some() || !self.reallocated.is_empty()
    }
}

/// A valid assignment of every room.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub mapping: RoomMapping,
    /// Canonical listing, see [`CapsulesManager::get_capsules`].
    pub capsules: Solution,
}

/// Searches for a single valid combination of capsules.
///
/// Each try starts from a random room mapping (or the caller's existing one)
/// and commits a limited number of fixes, one broken capsule per round.
/// When a try runs out of fixes the state is thrown away and a new try
/// begins.
pub struct CapsulesManager<'a, R> {
    rooms: &'a RoomSet,
    capsules_count: usize,
    global_constraints: &'a [Constraint],
    limits: Limits,
    existing_room_mapping: Option<RoomMapping>,
    rng: R,
    room_mapping: RoomMapping,
    capsules: Vec<Capsule<'a>>,
    trail: Vec<FixReport>,
    starting_mappings: Vec<RoomMapping>,
}

impl<'a, R: Rng> CapsulesManager<'a, R> {
    pub fn new(
        rooms: &'a RoomSet,
        capsules_count: usize,
        global_constraints: &'a [Constraint],
        limits: Limits,
        rng: R,
    ) -> Result<Self, AllocationError> {
        if capsules_count == 0 {
            return Err(AllocationError::InvalidConfig(
                "capsules count must be positive".to_string(),
            ));
        }
        if limits.max_tries_count == 0 || limits.max_fixes_count == 0 {
            return Err(AllocationError::InvalidConfig(
                "try and fix budgets must be positive".to_string(),
            ));
        }

        let all_constraints = rooms
            .values()
            .flat_map(|room| room.constraints.iter())
            .chain(global_constraints);
        for constraint in all_constraints {
            if let Constraint::Connecting { a, b } = constraint {
                for id in [a, b] {
                    if !rooms.contains_key(id) {
                        return Err(AllocationError::UnknownRoom(*id));
                    }
                }
            }
        }

        Ok(Self {
            rooms,
            capsules_count,
            global_constraints,
            limits,
            existing_room_mapping: None,
            rng,
            room_mapping: RoomMapping::unassigned_for(rooms),
            capsules: Vec::new(),
            trail: Vec::new(),
            starting_mappings: Vec::new(),
        })
    }

    /// Starts every try from `existing` instead of a random mapping.
    ///
    /// Rooms missing from `existing` start unassigned and get allocated in
    /// the first fix round.
    pub fn with_existing_mapping(mut self, existing: RoomMapping) -> Result<Self, AllocationError> {
        let mut mapping = RoomMapping::unassigned_for(self.rooms);
        for (room, capsule) in existing.iter() {
            if !mapping.contains(room) {
                return Err(AllocationError::UnknownRoom(room));
            }
            if let Some(capsule) = capsule.filter(|&capsule| capsule >= self.capsules_count) {
                return Err(AllocationError::CapsuleOutOfRange { room, capsule });
            }
            mapping.set(room, capsule);
        }
        self.existing_room_mapping = Some(mapping);
        Ok(self)
    }

    /// Runs tries until one succeeds or the try budget is spent.
    pub fn run(&mut self) -> Result<Allocation, AllocationError> {
        let max_tries_count = self.limits.max_tries_count;
        self.starting_mappings.clear();
        for try_count in 0..max_tries_count {
            info!(
                "Start building capsules, attempt {}/{}",
                try_count + 1,
                max_tries_count
            );
            if self.build_capsules()? {
                info!("Found valid capsules: {:?}", self.get_capsules());
                return Ok(Allocation {
                    mapping: self.room_mapping.clone(),
                    capsules: self.get_capsules(),
                });
            }
        }
        Err(AllocationError::Exhausted {
            tries: max_tries_count,
        })
    }

    /// One try. Returns `false` when the fix budget runs out.
    pub fn build_capsules(&mut self) -> Result<bool, AllocationError> {
        match &self.existing_room_mapping {
            Some(existing) => self.room_mapping = existing.clone(),
            None => self.randomize_room_mapping(),
        }
        self.starting_mappings.push(self.room_mapping.clone());
        self.trail.clear();
        self.update_capsules();

        let max_fixes_count = self.limits.max_fixes_count;
        for fix_count in 0..max_fixes_count {
            debug!(
                "Attempting to fix capsules ({}/{})",
                fix_count + 1,
                max_fixes_count
            );
            let report = self.fix_capsules()?;
            let needed_fixing = report.needed_fixing();
            self.trail.push(report);
            if !needed_fixing {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One fix round.
    ///
    /// Repairs the first invalid capsule found in random order, then
    /// reallocates any rooms left orphaned.
    pub fn fix_capsules(&mut self) -> Result<FixReport, AllocationError> {
        trace!("{:?}", self.get_capsules());
        let mut report = FixReport::default();

        let mut order: Vec<usize> = (0..self.capsules.len()).collect();
        order.shuffle(&mut self.rng);
        for position in order {
            let capsule = &self.capsules[position];
            let index = capsule.index();
            if let Some(violation) = capsule.apply_constraints(self.global_constraints, &mut self.rng)? {
                for action in &violation.actions {
                    debug!("Committing action: {action}");
                    action.apply(&mut self.room_mapping);
                }
                // Actions only touch the mapping, so the capsules must follow.
                self.update_capsules();
                report.capsule = Some(index);
                report.violated = Some(violation.constraint);
                report.actions = violation.actions;
                break;
            }
        }

        let orphans = self.room_mapping.unassigned();
        if !orphans.is_empty() {
            self.allocate_rooms_randomly(&orphans);
            self.update_capsules();
            report.reallocated = orphans;
        }
        Ok(report)
    }

    /// Randomly spreads `room_ids` over the capsules.
    ///
    /// The shuffled rooms are cut into one block of `len / capsules_count`
    /// per capsule, in shuffled capsule order. The leftover rooms go one
    /// each to distinct capsules from a second shuffle. Only the mapping is
    /// touched; rooms not listed keep their capsule.
    pub fn allocate_rooms_randomly(&mut self, room_ids: &[RoomId]) {
        let mut shuffled_rooms = room_ids.to_vec();
        shuffled_rooms.shuffle(&mut self.rng);
        let mut shuffled_capsules: Vec<CapsuleIndex> = (0..self.capsules_count).collect();
        shuffled_capsules.shuffle(&mut self.rng);

        let factor = shuffled_rooms.len() / self.capsules_count;
        let (blocks, remainder) = shuffled_rooms.split_at(factor * self.capsules_count);
        if factor > 0 {
            for (&capsule, block) in shuffled_capsules.iter().zip(blocks.chunks(factor)) {
                for &room in block {
                    self.assign(room, capsule);
                }
            }
        }

        // remainder.len() < capsules_count, so every leftover gets a capsule
        shuffled_capsules.shuffle(&mut self.rng);
        for (&capsule, &room) in shuffled_capsules.iter().zip(remainder) {
            self.assign(room, capsule);
        }
    }

    /// Allocates every room from scratch.
    pub fn randomize_room_mapping(&mut self) {
        let all_rooms: Vec<RoomId> = self.rooms.keys().copied().collect();
        self.allocate_rooms_randomly(&all_rooms);
    }

    fn assign(&mut self, room: RoomId, capsule: CapsuleIndex) {
        debug!("Randomly allocating room {room} to capsule {capsule}");
        self.room_mapping.set(room, Some(capsule));
    }

    fn update_capsules(&mut self) {
        self.capsules = (0..self.capsules_count)
            .map(|index| Capsule::from_mapping(index, self.rooms, &self.room_mapping))
            .collect();
    }

    /// Sorted room ids per capsule, ordered by first room id with empty
    /// capsules first.
    pub fn get_capsules(&self) -> Solution {
        let mut capsules: Solution = self.capsules.iter().map(Capsule::room_ids).collect();
        capsules.sort_by_key(|rooms| rooms.first().copied());
        capsules
    }

    pub fn capsules(&self) -> &[Capsule<'a>] {
        &self.capsules
    }

    pub fn room_mapping(&self) -> &RoomMapping {
        &self.room_mapping
    }

    /// The mapping each try of the last [`run`](Self::run) started from.
    pub fn starting_mappings(&self) -> &[RoomMapping] {
        &self.starting_mappings
    }

    /// Fix rounds of the current (or last successful) try.
    pub fn trail(&self) -> &[FixReport] {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{Gender, Room};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const LIMITS: Limits = Limits {
        max_tries_count: 20,
        max_fixes_count: 50,
    };

    fn rooms_of(genders: &[Gender]) -> RoomSet {
        (1..)
            .zip(genders)
            .map(|(id, &gender)| (id, Room::new(id, vec![format!("occupant-{id}")], gender)))
            .collect()
    }

    fn capsule_sizes(mapping: &RoomMapping, capsules_count: usize) -> Vec<usize> {
        (0..capsules_count)
            .map(|capsule| mapping.rooms_in(capsule).count())
            .collect()
    }

    #[test]
    fn rejects_empty_budgets_and_capsules() {
        let rooms = rooms_of(&[Gender::Male]);

        let no_capsules = CapsulesManager::new(&rooms, 0, &[], LIMITS, StdRng::seed_from_u64(1));
        assert!(matches!(no_capsules, Err(AllocationError::InvalidConfig(_))));

        let no_fixes = Limits {
            max_tries_count: 1,
            max_fixes_count: 0,
        };
        let result = CapsulesManager::new(&rooms, 1, &[], no_fixes, StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(AllocationError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_connecting_to_unknown_room() {
        let rooms = rooms_of(&[Gender::Male, Gender::Male]);
        let globals = [Constraint::Connecting { a: 1, b: 9 }];

        let result = CapsulesManager::new(&rooms, 1, &globals, LIMITS, StdRng::seed_from_u64(1));

        assert!(matches!(result, Err(AllocationError::UnknownRoom(9))));
    }

    #[test]
    fn rejects_existing_mapping_outside_capsules() {
        let rooms = rooms_of(&[Gender::Male, Gender::Male]);
        let manager =
            CapsulesManager::new(&rooms, 2, &[], LIMITS, StdRng::seed_from_u64(1)).unwrap();
        let existing: RoomMapping = [(1, Some(0)), (2, Some(2))].into_iter().collect();

        let result = manager.with_existing_mapping(existing);

        assert!(matches!(
            result,
            Err(AllocationError::CapsuleOutOfRange { room: 2, capsule: 2 })
        ));
    }

    #[test]
    fn full_allocation_spreads_rooms_evenly() {
        let rooms = rooms_of(&[Gender::Male; 7]);
        for seed in 0..20 {
            let mut manager =
                CapsulesManager::new(&rooms, 3, &[], LIMITS, StdRng::seed_from_u64(seed)).unwrap();

            manager.randomize_room_mapping();

            let mapping = manager.room_mapping();
            assert!(mapping.unassigned().is_empty());
            let sizes = capsule_sizes(mapping, 3);
            assert_eq!(sizes.iter().sum::<usize>(), 7);
            assert!(sizes.iter().all(|&size| size == 2 || size == 3));
        }
    }

    #[test]
    fn subset_allocation_leaves_other_rooms_alone() {
        let rooms = rooms_of(&[Gender::Male; 5]);
        for seed in 0..20 {
            let mut manager =
                CapsulesManager::new(&rooms, 3, &[], LIMITS, StdRng::seed_from_u64(seed)).unwrap();

            manager.allocate_rooms_randomly(&[2, 4]);

            let mapping = manager.room_mapping();
            assert_eq!(mapping.unassigned(), vec![1, 3, 5]);
            let (first, second) = (mapping.get(2).unwrap(), mapping.get(4).unwrap());
            assert!(first < 3 && second < 3);
            // Fewer rooms than capsules: each leftover lands in its own capsule.
            assert_ne!(first, second);
        }
    }

    #[test]
    fn fix_round_on_valid_mapping_changes_nothing() {
        let rooms = rooms_of(&[Gender::Male, Gender::Male, Gender::Female]);
        let globals = [Constraint::Gender, Constraint::RoomCount { max: 2 }];
        let existing: RoomMapping = [(1, Some(1)), (2, Some(1)), (3, Some(0))].into_iter().collect();
        let mut manager = CapsulesManager::new(&rooms, 2, &globals, LIMITS, StdRng::seed_from_u64(3))
            .unwrap()
            .with_existing_mapping(existing.clone())
            .unwrap();

        assert!(manager.build_capsules().unwrap());
        assert_eq!(manager.trail().len(), 1);
        assert!(!manager.trail()[0].needed_fixing());

        let report = manager.fix_capsules().unwrap();
        assert_eq!(report, FixReport::default());
        assert_eq!(manager.room_mapping(), &existing);
        assert_eq!(manager.get_capsules(), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn orphans_from_existing_mapping_are_allocated() {
        let rooms = rooms_of(&[Gender::Male, Gender::Male, Gender::Male]);
        let existing: RoomMapping = [(1, Some(0))].into_iter().collect();
        let mut manager = CapsulesManager::new(&rooms, 2, &[], LIMITS, StdRng::seed_from_u64(5))
            .unwrap()
            .with_existing_mapping(existing)
            .unwrap();

        let allocation = manager.run().unwrap();

        assert!(allocation.mapping.unassigned().is_empty());
        assert_eq!(allocation.mapping.get(1), Some(0));
        assert_eq!(manager.trail()[0].reallocated, vec![2, 3]);
        assert!(!manager.trail().last().unwrap().needed_fixing());
    }

    #[test]
    fn listing_sorts_empty_capsules_first() {
        let rooms = rooms_of(&[Gender::Male, Gender::Male, Gender::Male]);
        let existing: RoomMapping = [(1, Some(2)), (2, Some(0)), (3, Some(2))].into_iter().collect();
        let mut manager = CapsulesManager::new(&rooms, 3, &[], LIMITS, StdRng::seed_from_u64(5))
            .unwrap()
            .with_existing_mapping(existing)
            .unwrap();

        let allocation = manager.run().unwrap();

        assert_eq!(allocation.capsules, vec![vec![], vec![1, 3], vec![2]]);
    }

    #[test]
    fn every_try_restarts_from_existing_mapping() {
        let rooms = rooms_of(&[Gender::Male, Gender::Female]);
        let globals = [Constraint::Gender, Constraint::RoomCount { max: 1 }];
        let limits = Limits {
            max_tries_count: 3,
            max_fixes_count: 2,
        };
        let existing: RoomMapping = [(1, Some(0)), (2, Some(0))].into_iter().collect();
        let mut manager = CapsulesManager::new(&rooms, 1, &globals, limits, StdRng::seed_from_u64(8))
            .unwrap()
            .with_existing_mapping(existing.clone())
            .unwrap();

        let err = manager.run().unwrap_err();

        assert!(matches!(err, AllocationError::Exhausted { tries: 3 }));
        assert_eq!(manager.starting_mappings(), &[existing.clone(), existing.clone(), existing]);
        // The last try's first round repaired the given mapping, not a random one.
        let first = &manager.trail()[0];
        assert_eq!(first.capsule, Some(0));
        assert_eq!(first.violated, Some(Constraint::Gender));
        assert_eq!(first.actions, vec![Action::Reduce { capsule: 0, room: 2 }]);
        assert_eq!(first.reallocated, vec![2]);
    }

    #[test]
    fn every_try_without_existing_mapping_is_randomized_afresh() {
        let rooms = rooms_of(&[Gender::Male; 10]);
        let globals = [Constraint::RoomCount { max: 1 }];
        let limits = Limits {
            max_tries_count: 5,
            max_fixes_count: 2,
        };
        let mut manager =
            CapsulesManager::new(&rooms, 3, &globals, limits, StdRng::seed_from_u64(8)).unwrap();

        let err = manager.run().unwrap_err();

        assert!(matches!(err, AllocationError::Exhausted { tries: 5 }));
        let starts = manager.starting_mappings();
        assert_eq!(starts.len(), 5);
        assert!(starts.iter().all(|start| start.unassigned().is_empty()));
        assert!(starts.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn same_seed_same_run() {
        let rooms = rooms_of(&[
            Gender::Male,
            Gender::Female,
            Gender::Male,
            Gender::Female,
            Gender::Male,
            Gender::Female,
        ]);
        let globals = [Constraint::Gender, Constraint::RoomCount { max: 3 }];

        let run = |seed| {
            let mut manager =
                CapsulesManager::new(&rooms, 2, &globals, LIMITS, StdRng::seed_from_u64(seed)).unwrap();
            let allocation = manager.run().unwrap();
            (allocation, manager.trail().to_vec())
        };

        assert_eq!(run(11), run(11));
    }
}
