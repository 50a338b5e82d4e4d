use crate::constraint::Constraint;
use crate::data::{AllocationInput, AllocationOutput, ConstraintsInput, RoomId, Solution};
use crate::error::AllocationError;
use crate::manager::{CapsulesManager, FixReport, Limits};
use crate::mapping::RoomMapping;
use crate::room::{Room, RoomSet, build_rooms};
use itertools::Itertools;
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;

/// Generates `generate_count` allocations and returns the distinct ones.
///
/// Exhausted attempts are counted and skipped. Malformed input aborts the
/// whole request.
pub fn solve(input: &AllocationInput) -> Result<AllocationOutput, AllocationError> {
    let start_time = Instant::now();
    let config = &input.config;
    if config.generate_count == 0 {
        return Err(AllocationError::InvalidConfig(
            "generate count must be positive".to_string(),
        ));
    }

    let mut rooms = build_rooms(&input.rooms, &input.genders, config.assume_gender)?;
    attach_room_constraints(&mut rooms, &input.constraints)?;
    let global_constraints = global_constraints(&input.constraints);
    let existing_room_mapping: Option<RoomMapping> = input
        .existing_room_mapping
        .as_ref()
        .map(|mapping| mapping.iter().map(|(&room, &capsule)| (room, capsule)).collect());

    let limits = Limits {
        max_tries_count: config.max_tries_count,
        max_fixes_count: config.max_fixes_count,
    };
    // one generator for every attempt, so a seed pins the whole output
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "Allocating {} rooms into {} capsules, {} attempts...",
        rooms.len(),
        config.capsules_count,
        config.generate_count
    );
    let mut found: Vec<(Solution, Vec<FixReport>)> = Vec::new();
    let mut failed_attempts = 0;
    for attempt in 0..config.generate_count {
        let manager = CapsulesManager::new(
            &rooms,
            config.capsules_count,
            &global_constraints,
            limits,
            &mut rng,
        )?;
        let mut manager = match &existing_room_mapping {
            Some(existing) => manager.with_existing_mapping(existing.clone())?,
            None => manager,
        };
        match manager.run() {
            Ok(allocation) => found.push((allocation.capsules, manager.trail().to_vec())),
            Err(AllocationError::Exhausted { tries }) => {
                debug!("Attempt {} gave up after {} tries", attempt + 1, tries);
                failed_attempts += 1;
            }
            Err(e) => return Err(e),
        }
    }

    let (solutions, trails): (Vec<Solution>, Vec<Vec<FixReport>>) = found
        .into_iter()
        .unique_by(|(solution, _)| solution.clone())
        .unzip();
    if solutions.is_empty() {
        return Err(AllocationError::NoSolution {
            attempts: config.generate_count,
        });
    }
    info!(
        "Found {} distinct solutions ({} failed attempts) in {:.2?}",
        solutions.len(),
        failed_attempts,
        start_time.elapsed()
    );

    Ok(AllocationOutput {
        solutions,
        attempts: config.generate_count,
        failed_attempts,
        trails: config.include_trail.then_some(trails),
    })
}

// Connecting pairs are attached to both rooms so the pair is checked from
// whichever capsule holds either of them.
fn attach_room_constraints(
    rooms: &mut RoomSet,
    constraints: &ConstraintsInput,
) -> Result<(), AllocationError> {
    for &(a, b) in &constraints.connecting {
        for id in [a, b] {
            room_mut(rooms, id)?
                .constraints
                .push(Constraint::Connecting { a, b });
        }
    }
    for &id in &constraints.gender {
        room_mut(rooms, id)?.constraints.push(Constraint::Gender);
    }
    for (&id, &max) in &constraints.max_room_count {
        room_mut(rooms, id)?
            .constraints
            .push(Constraint::RoomCount { max });
    }
    Ok(())
}

fn room_mut(rooms: &mut RoomSet, id: RoomId) -> Result<&mut Room, AllocationError> {
    rooms.get_mut(&id).ok_or(AllocationError::UnknownRoom(id))
}

fn global_constraints(constraints: &ConstraintsInput) -> Vec<Constraint> {
    let mut global = Vec::new();
    if constraints.global_gender {
        global.push(Constraint::Gender);
    }
    if let Some(max) = constraints.global_max_room_count {
        global.push(Constraint::RoomCount { max });
    }
    global
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(json: &str) -> AllocationInput {
        serde_json::from_str(json).unwrap()
    }

    fn household() -> AllocationInput {
        input(
            r#"{
                "rooms": [["Johnny", "Papi"], ["Danny"], ["Rina"], ["Maya", "Tal"], ["Omer"]],
                "genders": {"Johnny": 1, "Danny": 1, "Rina": 0, "Maya": 0, "Omer": 1},
                "constraints": {
                    "connecting": [[1, 5]],
                    "gender": [3, 4],
                    "globalMaxRoomCount": 3
                },
                "config": {
                    "capsulesCount": 2,
                    "maxTriesCount": 20,
                    "maxFixesCount": 50,
                    "generateCount": 10,
                    "seed": 42
                }
            }"#,
        )
    }

    #[test]
    fn solutions_honour_room_constraints() {
        let output = solve(&household()).unwrap();

        assert_eq!(output.attempts, 10);
        assert!(!output.solutions.is_empty());
        assert!(output.solutions.iter().all_unique());
        for solution in &output.solutions {
            assert_eq!(solution.len(), 2);
            assert_eq!(solution.iter().map(Vec::len).sum::<usize>(), 5);
            assert!(solution.iter().all(|capsule| capsule.len() <= 3));
            assert!(
                solution
                    .iter()
                    .any(|capsule| capsule.contains(&1) && capsule.contains(&5))
            );
        }
    }

    #[test]
    fn seeded_requests_are_reproducible() {
        assert_eq!(solve(&household()).unwrap(), solve(&household()).unwrap());
    }

    #[test]
    fn trail_is_returned_on_request() {
        let plain = solve(&household()).unwrap();
        assert_eq!(plain.trails, None);
        let encoded = serde_json::to_value(&plain).unwrap();
        assert!(encoded.get("trails").is_none());

        let mut request = household();
        request.config.include_trail = true;
        let output = solve(&request).unwrap();

        // Same seed, same solutions; the trail only rides along.
        assert_eq!(output.solutions, plain.solutions);
        let trails = output.trails.unwrap();
        assert_eq!(trails.len(), output.solutions.len());
        for trail in &trails {
            assert!(!trail.last().unwrap().needed_fixing());
            assert!(trail[..trail.len() - 1].iter().all(FixReport::needed_fixing));
        }
        let encoded = serde_json::to_value(&trails).unwrap();
        assert!(encoded[0][0].get("reallocated").is_some());
    }

    #[test]
    fn unknown_room_in_constraints_is_rejected() {
        let mut request = household();
        request.constraints.gender.push(9);

        let err = solve(&request).unwrap_err();

        assert!(matches!(err, AllocationError::UnknownRoom(9)));
        assert!(err.is_input_error());
    }

    #[test]
    fn impossible_request_reports_no_solution() {
        let request = input(
            r#"{
                "rooms": [["Johnny"], ["Rina"]],
                "genders": {"Johnny": "Male", "Rina": "Female"},
                "constraints": {"globalMaxRoomCount": 1, "globalGender": true},
                "config": {
                    "capsulesCount": 1,
                    "maxTriesCount": 2,
                    "maxFixesCount": 3,
                    "generateCount": 3,
                    "seed": 7
                }
            }"#,
        );

        let err = solve(&request).unwrap_err();

        assert!(matches!(err, AllocationError::NoSolution { attempts: 3 }));
        assert!(!err.is_input_error());
    }

    #[test]
    fn zero_generations_is_invalid() {
        let mut request = household();
        request.config.generate_count = 0;

        assert!(matches!(
            solve(&request),
            Err(AllocationError::InvalidConfig(_))
        ));
    }
}
