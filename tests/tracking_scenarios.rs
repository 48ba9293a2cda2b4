//! End-to-end tracking scenarios: sensor disambiguation, reservation
//! promotion, conflicting claims and tail release.

use rs_interlock::{
    BlockId, BlockSide, BlockState, BlockTrainDirection, PathEnds, PathId, SensorState, TrainId,
    World,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Block with every sensor reporting free.
fn free_block(world: &mut World, name: &str, inputs: usize) -> BlockId {
    let block = world.create_block(name, inputs);
    for input in 0..inputs {
        world.input_changed(block, input, SensorState::Free);
    }
    block
}

/// Ready path from side B of `from` to side A of `to`.
fn link(world: &mut World, from: BlockId, to: BlockId) -> PathId {
    let mut ends: Vec<PathEnds> = world
        .block(from)
        .unwrap()
        .paths
        .iter()
        .map(|p| world.path(*p).unwrap().ends)
        .collect();
    ends.push(PathEnds::new(from, BlockSide::B, to, BlockSide::A));
    let path = *world.update_paths(from, ends).unwrap().last().unwrap();
    world.set_path_ready(path, true).unwrap();
    path
}

/// Train standing in `block` facing side B, with the block's sensor occupied.
fn place_facing_b(world: &mut World, block: BlockId, name: &str) -> TrainId {
    let train = world.create_train(name);
    world.assign_train(block, train).unwrap();
    world.flip_train(block).unwrap();
    world.input_changed(block, 0, SensorState::Occupied);
    train
}

fn drive(world: &mut World, train: TrainId) {
    world.set_train_powered(train, true).unwrap();
    world.set_train_stopped(train, false).unwrap();
}

fn direction_in(world: &World, block: BlockId, train: TrainId) -> Option<BlockTrainDirection> {
    world
        .block(block)
        .unwrap()
        .trains
        .iter()
        .filter_map(|id| world.block_status(*id))
        .find(|s| s.train == Some(train))
        .map(|s| s.direction)
}

// ============================================================================
// Sensor-driven entry into a free block
// ============================================================================

#[test]
fn single_candidate_enters_free_block() {
    let mut world = World::default();
    let source = free_block(&mut world, "source", 1);
    let target = free_block(&mut world, "target", 1);
    let path = link(&mut world, source, target);
    let train = place_facing_b(&mut world, source, "V 60");
    drive(&mut world, train);
    world.lock_path(path, true).unwrap();
    assert_eq!(world.block(target).unwrap().state, BlockState::Free);

    world.input_changed(target, 0, SensorState::Occupied);

    assert_eq!(world.block(target).unwrap().state, BlockState::Occupied);
    assert_eq!(world.block_trains(target).unwrap(), vec![train]);
    assert_eq!(direction_in(&world, target, train), Some(BlockTrainDirection::TowardsB));
    assert_eq!(world.train_blocks(train).unwrap(), vec![target, source]);
    assert_eq!(world.check_consistency(), Ok(()));
}

#[test]
fn two_candidates_leave_block_untracked() {
    let mut world = World::default();
    let left = free_block(&mut world, "left", 1);
    let right = free_block(&mut world, "right", 1);
    let target = free_block(&mut world, "target", 1);
    let from_left = link(&mut world, left, target);
    let from_right = link(&mut world, right, target);
    for (block, path, name) in [(left, from_left, "a"), (right, from_right, "b")] {
        let train = place_facing_b(&mut world, block, name);
        drive(&mut world, train);
        world.lock_path(path, true).unwrap();
    }

    world.input_changed(target, 0, SensorState::Occupied);

    let b = world.block(target).unwrap();
    assert_eq!(b.state, BlockState::Occupied);
    assert!(b.trains.is_empty());
    assert_eq!(world.check_consistency(), Ok(()));
}

#[test]
fn stopped_or_unpowered_train_is_not_a_candidate() {
    let mut world = World::default();
    let source = free_block(&mut world, "source", 1);
    let target = free_block(&mut world, "target", 1);
    let path = link(&mut world, source, target);
    let train = place_facing_b(&mut world, source, "Köf");
    world.set_train_powered(train, true).unwrap();
    world.lock_path(path, true).unwrap();

    world.input_changed(target, 0, SensorState::Occupied);
    assert!(world.block(target).unwrap().trains.is_empty());

    world.input_changed(target, 0, SensorState::Free);
    world.set_train_stopped(train, false).unwrap();
    world.set_train_powered(train, false).unwrap();
    world.input_changed(target, 0, SensorState::Occupied);
    assert!(world.block(target).unwrap().trains.is_empty());
}

#[test]
fn path_not_ready_is_ignored() {
    let mut world = World::default();
    let source = free_block(&mut world, "source", 1);
    let target = free_block(&mut world, "target", 1);
    let path = link(&mut world, source, target);
    let train = place_facing_b(&mut world, source, "V 60");
    drive(&mut world, train);
    world.lock_path(path, true).unwrap();
    world.set_path_ready(path, false).unwrap();

    world.input_changed(target, 0, SensorState::Occupied);
    assert!(world.block(target).unwrap().trains.is_empty());
}

#[test]
fn inner_sensor_never_starts_tracking() {
    let mut world = World::default();
    let source = free_block(&mut world, "source", 1);
    let target = free_block(&mut world, "target", 3);
    let path = link(&mut world, source, target);
    let train = place_facing_b(&mut world, source, "V 60");
    drive(&mut world, train);
    world.lock_path(path, true).unwrap();

    world.input_changed(target, 1, SensorState::Occupied);
    assert!(world.block(target).unwrap().trains.is_empty());
    world.input_changed(target, 1, SensorState::Free);
    assert_eq!(world.block(target).unwrap().state, BlockState::Free);

    // Far edge sensor does not match the path's entry side either
    world.input_changed(target, 2, SensorState::Occupied);
    assert!(world.block(target).unwrap().trains.is_empty());
}

// ============================================================================
// Promotion of a reservation
// ============================================================================

#[test]
fn reserved_block_promotes_on_entry_side_sensor() {
    let mut world = World::default();
    let source = free_block(&mut world, "source", 1);
    let target = free_block(&mut world, "target", 2);
    let path = link(&mut world, source, target);
    let train = place_facing_b(&mut world, source, "E 44");

    assert_eq!(world.reserve_path(path, train, false), Ok(true));
    assert_eq!(world.block(target).unwrap().state, BlockState::Reserved);
    assert_eq!(world.train(train).unwrap().reserved.len(), 1);

    world.input_changed(target, 0, SensorState::Occupied);

    let t = world.train(train).unwrap();
    assert!(t.reserved.is_empty());
    assert_eq!(world.train_blocks(train).unwrap(), vec![target, source]);
    assert_eq!(world.block(target).unwrap().state, BlockState::Occupied);

    // Sensor drops out while the train is still recorded there
    world.input_changed(target, 0, SensorState::Free);
    assert_eq!(world.block(target).unwrap().state, BlockState::Reserved);
    assert_eq!(world.train_blocks(train).unwrap(), vec![target, source]);
    assert_eq!(world.check_consistency(), Ok(()));
}

#[test]
fn far_side_sensor_does_not_promote() {
    let mut world = World::default();
    let source = free_block(&mut world, "source", 1);
    let target = free_block(&mut world, "target", 2);
    let path = link(&mut world, source, target);
    let train = place_facing_b(&mut world, source, "E 44");
    world.reserve_path(path, train, false).unwrap();

    world.input_changed(target, 1, SensorState::Occupied);

    assert_eq!(world.block(target).unwrap().state, BlockState::Occupied);
    assert_eq!(world.train(train).unwrap().reserved.len(), 1);
    assert_eq!(world.train_blocks(train).unwrap(), vec![source]);
}

// ============================================================================
// Conflicting reservations
// ============================================================================

#[test]
fn occupied_block_refuses_other_train() {
    let mut world = World::default();
    let approach = free_block(&mut world, "approach", 1);
    let platform = free_block(&mut world, "platform", 1);
    let path = link(&mut world, approach, platform);

    let resident = world.create_train("resident");
    world.assign_train(platform, resident).unwrap();
    world.input_changed(platform, 0, SensorState::Occupied);
    let visitor = world.create_train("visitor");

    assert_eq!(
        world.reserve_block(platform, path, visitor, BlockSide::A, false),
        Ok(false)
    );
    assert_eq!(world.reserve_path(path, visitor, false), Ok(false));
    assert_eq!(world.block(approach).unwrap().state, BlockState::Free);
    assert!(world.train(visitor).unwrap().reserved.is_empty());
}

#[test]
fn side_cannot_be_reserved_twice() {
    let mut world = World::default();
    let a = free_block(&mut world, "a", 1);
    let b = free_block(&mut world, "b", 1);
    let path = link(&mut world, a, b);
    let first = world.create_train("first");
    let second = world.create_train("second");

    assert_eq!(world.reserve_block(b, path, first, BlockSide::A, false), Ok(true));
    assert_eq!(world.reserve_block(b, path, first, BlockSide::A, false), Ok(false));
    assert_eq!(world.reserve_block(b, path, second, BlockSide::A, false), Ok(false));
    assert_eq!(world.reserve_block(b, path, second, BlockSide::A, true), Ok(false));
}

#[test]
fn dry_run_matches_real_attempt() {
    let mut world = World::default();
    let a = free_block(&mut world, "a", 1);
    let b = free_block(&mut world, "b", 1);
    let path = link(&mut world, a, b);
    let train = place_facing_b(&mut world, a, "V 36");

    let probe = world.reserve_path(path, train, true).unwrap();
    let again = world.reserve_path(path, train, true).unwrap();
    assert_eq!(probe, again);
    assert_eq!(world.block(b).unwrap().state, BlockState::Free);
    assert_eq!(world.reserve_path(path, train, false), Ok(probe));

    // Held now: both probe and attempt refuse
    assert_eq!(world.reserve_path(path, train, true), Ok(false));
    assert_eq!(world.reserve_path(path, train, false), Ok(false));
}

#[test]
fn train_facing_away_cannot_reserve_its_back() {
    let mut world = World::default();
    let a = free_block(&mut world, "a", 1);
    let b = free_block(&mut world, "b", 1);
    let path = link(&mut world, a, b);
    let train = world.create_train("V 36");
    world.assign_train(a, train).unwrap();
    world.input_changed(a, 0, SensorState::Occupied);

    // Assigned trains face side A; the path leaves through side B
    assert_eq!(world.reserve_path(path, train, false), Ok(false));
    world.flip_train(a).unwrap();
    assert_eq!(world.reserve_path(path, train, false), Ok(true));
}

// ============================================================================
// Tail release
// ============================================================================

/// Train stretched over `[head, mid, tail]`, every sensor occupied.
fn three_block_train() -> (World, [BlockId; 3], TrainId) {
    let mut world = World::default();
    let tail = free_block(&mut world, "tail", 1);
    let mid = free_block(&mut world, "mid", 1);
    let head = free_block(&mut world, "head", 1);
    let first = link(&mut world, tail, mid);
    let second = link(&mut world, mid, head);
    let train = place_facing_b(&mut world, tail, "ICE");

    assert_eq!(world.reserve_path(first, train, false), Ok(true));
    world.input_changed(mid, 0, SensorState::Occupied);
    assert_eq!(world.reserve_path(second, train, false), Ok(true));
    world.input_changed(head, 0, SensorState::Occupied);
    (world, [head, mid, tail], train)
}

#[test]
fn train_footprint_grows_head_first() {
    let (world, [head, mid, tail], train) = three_block_train();
    assert_eq!(world.train_blocks(train).unwrap(), vec![head, mid, tail]);
    assert!(world.train(train).unwrap().active);
    assert_eq!(world.check_consistency(), Ok(()));
}

#[test]
fn clearing_tail_releases_it() {
    let (mut world, [head, mid, tail], train) = three_block_train();

    world.input_changed(tail, 0, SensorState::Free);

    assert_eq!(world.train_blocks(train).unwrap(), vec![head, mid]);
    assert!(world.block(tail).unwrap().trains.is_empty());
    assert_eq!(world.block(head).unwrap().state, BlockState::Occupied);
    // The path out of the tail is released later, not now
    assert_eq!(world.pending_releases().len(), 1);
    assert_eq!(world.check_consistency(), Ok(()));
}

#[test]
fn clearing_middle_block_keeps_it() {
    let (mut world, [head, mid, tail], train) = three_block_train();

    world.input_changed(mid, 0, SensorState::Free);

    assert_eq!(world.train_blocks(train).unwrap(), vec![head, mid, tail]);
    assert_eq!(world.block(mid).unwrap().state, BlockState::Reserved);
}

#[test]
fn sole_block_is_never_released_by_sensor() {
    let mut world = World::default();
    let block = free_block(&mut world, "b", 1);
    let train = place_facing_b(&mut world, block, "BR 01");

    world.input_changed(block, 0, SensorState::Free);

    assert_eq!(world.train_blocks(train).unwrap(), vec![block]);
    assert_eq!(world.block(block).unwrap().state, BlockState::Reserved);
}

#[test]
fn entering_sweeps_clear_tail_blocks() {
    let mut world = World::default();
    let tail = free_block(&mut world, "tail", 1);
    let head = free_block(&mut world, "head", 1);
    let path = link(&mut world, tail, head);
    let train = place_facing_b(&mut world, tail, "ICE");
    world.reserve_path(path, train, false).unwrap();

    // Tail detection dropped out before the head was reached
    world.input_changed(tail, 0, SensorState::Free);
    world.input_changed(head, 0, SensorState::Occupied);

    assert_eq!(world.train_blocks(train).unwrap(), vec![head]);
    assert!(world.block(tail).unwrap().trains.is_empty());
}

#[test]
fn delayed_release_frees_the_path_behind() {
    let (mut world, [_, mid, tail], _train) = three_block_train();
    let first = world.block(tail).unwrap().paths[0];
    world.input_changed(tail, 0, SensorState::Free);
    assert_eq!(world.block(tail).unwrap().state, BlockState::Reserved);

    let delay = world.config().path_release_delay_ms;
    world.tick(delay - 1);
    assert!(world.path(first).unwrap().reserved_by.is_some());

    world.tick(delay);
    assert_eq!(world.path(first).unwrap().reserved_by, None);
    assert_eq!(world.block(tail).unwrap().state, BlockState::Free);
    assert!(!world.block(mid).unwrap().is_reserved(BlockSide::A));
    assert_eq!(world.check_consistency(), Ok(()));
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn leaving_only_block_deactivates_train() {
    let mut world = World::default();
    let block = free_block(&mut world, "b", 1);
    let train = world.create_train("t");
    world.assign_train(block, train).unwrap();

    let status = world.train(train).unwrap().head().unwrap();
    rs_interlock::TrainTracking::left(&mut world, status).unwrap();

    let t = world.train(train).unwrap();
    assert!(t.blocks.is_empty());
    assert!(!t.active);
    assert_eq!(world.block(block).unwrap().state, BlockState::Free);
}

#[test]
fn state_tracks_sensors_under_noise() {
    let mut world = World::default();
    let blocks: Vec<BlockId> = (0..4).map(|i| world.create_block(&format!("b{i}"), 2)).collect();
    let train = world.create_train("t");
    world.assign_train(blocks[1], train).unwrap();

    let values = [SensorState::Free, SensorState::Occupied, SensorState::Unknown];
    let mut seed: u32 = 7;
    for _ in 0..500 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let block = blocks[(seed >> 16) as usize % blocks.len()];
        let input = (seed >> 8) as usize % 2;
        let value = values[(seed >> 4) as usize % values.len()];
        world.input_changed(block, input, value);

        for b in world.blocks() {
            let occupied = b.inputs.contains(&SensorState::Occupied);
            assert_eq!(occupied, b.state == BlockState::Occupied, "{}", b.name);
            if b.state == BlockState::Free {
                assert!(b.trains.is_empty() && !b.reservations.any());
            }
        }
        assert_eq!(world.check_consistency(), Ok(()));
    }
}
