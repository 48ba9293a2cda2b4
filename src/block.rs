//! Blocks: track segments with occupancy sensors, per-side reservations and
//! the logic that turns anonymous sensor reports into train movements.
//!
//! # State
//!
//! [`BlockState`] is always derived, never assigned by callers:
//!
//! | Sensors | Trains or reserved side | State |
//! |---------|-------------------------|-------|
//! | any occupied | - | `Occupied` |
//! | all free | yes | `Reserved` |
//! | all free | no | `Free` |
//! | otherwise | - | `Unknown` |
//!
//! A block without sensors is `Reserved` while claimed and otherwise keeps
//! `Free` once an operator declared it free (see [`World::set_block_free`]).
//!
//! # Sensor disambiguation
//!
//! When a free block reports occupied on an edge sensor, the incoming paths
//! on that side are scanned for exactly one plausible source train. Zero or
//! several candidates leave the block untracked until a later report makes
//! the picture clear. A physical report cannot be refused, so there is no
//! error path here, only logging.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::commands::Message;
use crate::error::{InvalidOperation, TrackingError};
use crate::events::{BlockEvent, Event};
use crate::tracking::TrainTracking;
use crate::types::{
    BlockId, BlockSide, BlockState, BlockTrainDirection, IdentificationEventType, PathId,
    SensorState, StatusId, TrainId, TrainMode, ZoneId,
};
use crate::world::World;

/// Maximum number of trains sharing a block (one per side).
pub const MAX_BLOCK_TRAINS: usize = 2;

/// Path reservation slots, one per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SideReservations {
    /// Path holding side A.
    pub a: Option<PathId>,
    /// Path holding side B.
    pub b: Option<PathId>,
}

impl SideReservations {
    /// Path holding `side`.
    pub fn get(&self, side: BlockSide) -> Option<PathId> {
        match side {
            BlockSide::A => self.a,
            BlockSide::B => self.b,
        }
    }

    fn set(&mut self, side: BlockSide, path: Option<PathId>) {
        match side {
            BlockSide::A => self.a = path,
            BlockSide::B => self.b = path,
        }
    }

    /// True if either side is held.
    pub fn any(&self) -> bool {
        self.a.is_some() || self.b.is_some()
    }
}

/// Which edge of the block a sensor input watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SensorEdge {
    /// Single-sensor block: the sensor covers both ends.
    Either,
    /// First or last input.
    Side(BlockSide),
}

/// A track segment.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    /// Handle.
    pub id: BlockId,
    /// Display name.
    pub name: String,
    /// Last reported value of each sensor input, side A first.
    pub inputs: Vec<SensorState>,
    /// Derived occupancy state.
    pub state: BlockState,
    /// Path reservations per side.
    pub reservations: SideReservations,
    /// Occupant records; front is nearest side A, back nearest side B.
    pub trains: heapless::Vec<StatusId, MAX_BLOCK_TRAINS>,
    /// Zones this block belongs to.
    pub zones: BTreeSet<ZoneId>,
    /// Paths leaving this block.
    pub paths: Vec<PathId>,
    /// Paths arriving at this block.
    pub incoming_paths: Vec<PathId>,
    /// Operator may assign a train.
    pub assign_enabled: bool,
    /// Operator may remove a train.
    pub remove_enabled: bool,
    /// Operator may flip the occupant.
    pub flip_enabled: bool,
}

impl Block {
    pub(crate) fn new(id: BlockId, name: &str, input_count: usize) -> Self {
        let mut block = Self {
            id,
            name: String::from(name),
            inputs: alloc::vec![SensorState::Unknown; input_count],
            state: BlockState::Unknown,
            reservations: SideReservations::default(),
            trains: heapless::Vec::new(),
            zones: BTreeSet::new(),
            paths: Vec::new(),
            incoming_paths: Vec::new(),
            assign_enabled: false,
            remove_enabled: false,
            flip_enabled: false,
        };
        block.update_train_method_enabled();
        block
    }

    /// Occupant record nearest side A.
    pub fn front(&self) -> Option<StatusId> {
        self.trains.first().copied()
    }

    /// Occupant record nearest side B.
    pub fn back(&self) -> Option<StatusId> {
        self.trains.last().copied()
    }

    /// Occupant record nearest `side`.
    pub fn occupant_on(&self, side: BlockSide) -> Option<StatusId> {
        match side {
            BlockSide::A => self.front(),
            BlockSide::B => self.back(),
        }
    }

    /// Path holding `side`, if reserved.
    pub fn reserved_path(&self, side: BlockSide) -> Option<PathId> {
        self.reservations.get(side)
    }

    /// True if a path holds `side`.
    pub fn is_reserved(&self, side: BlockSide) -> bool {
        self.reservations.get(side).is_some()
    }

    /// State implied by sensors, occupants and reservations.
    pub fn derive_state(&self) -> BlockState {
        if self.inputs.iter().any(|s| *s == SensorState::Occupied) {
            return BlockState::Occupied;
        }
        let claimed = !self.trains.is_empty() || self.reservations.any();

        if self.inputs.is_empty() {
            return match (claimed, self.state) {
                (true, _) => BlockState::Reserved,
                (false, BlockState::Unknown) => BlockState::Unknown,
                (false, _) => BlockState::Free,
            };
        }

        if self.inputs.iter().all(|s| *s == SensorState::Free) {
            if claimed {
                BlockState::Reserved
            } else {
                BlockState::Free
            }
        } else {
            BlockState::Unknown
        }
    }

    /// Refresh the operator permissions derived from the occupant list.
    pub fn update_train_method_enabled(&mut self) {
        self.assign_enabled = self.trains.is_empty();
        self.remove_enabled = !self.trains.is_empty();
        self.flip_enabled = self.trains.len() == 1;
    }

    fn sensor_edge(&self, input: usize) -> Option<SensorEdge> {
        let count = self.inputs.len();
        if count == 1 {
            Some(SensorEdge::Either)
        } else if input == 0 {
            Some(SensorEdge::Side(BlockSide::A))
        } else if input + 1 == count {
            Some(SensorEdge::Side(BlockSide::B))
        } else {
            None
        }
    }
}

// ============================================================================
// Block lifecycle
// ============================================================================

impl World {
    /// Add a block with `input_count` sensor inputs (side A first).
    pub fn create_block(&mut self, name: &str, input_count: usize) -> BlockId {
        let id = BlockId(self.allocate_id());
        self.blocks.insert(id, Block::new(id, name, input_count));
        id
    }

    /// Delete an empty block together with every path touching it.
    pub fn delete_block(&mut self, block: BlockId) -> Result<(), TrackingError> {
        let b = self.block(block)?;
        if !b.trains.is_empty() {
            return Err(InvalidOperation::BlockNotEmpty(block).into());
        }
        let paths: Vec<PathId> = b.paths.iter().chain(b.incoming_paths.iter()).copied().collect();
        for path in paths {
            self.remove_path(path);
        }
        let zones: Vec<ZoneId> = self.block(block)?.zones.iter().copied().collect();
        for zone in zones {
            if let Some(z) = self.zones.get_mut(&zone) {
                z.blocks.remove(&block);
            }
        }
        self.blocks.remove(&block);
        Ok(())
    }

    /// Re-derive permissions and state, firing a state event on change.
    pub(crate) fn refresh_block(&mut self, block: BlockId) {
        let Some(b) = self.blocks.get_mut(&block) else {
            return;
        };
        b.update_train_method_enabled();
        let state = b.derive_state();
        self.set_block_state(block, state);
    }

    /// Guarded assignment: no event if the value is unchanged.
    fn set_block_state(&mut self, block: BlockId, state: BlockState) {
        let Some(b) = self.blocks.get_mut(&block) else {
            return;
        };
        if b.state == state {
            return;
        }
        tracing::debug!(%block, from = b.state.as_str(), to = state.as_str(), "block state");
        b.state = state;
        self.push_event(Event::Block(BlockEvent::StateChanged { block, state }));
    }

    /// In simulation mode, drive every input of `block` to `value`.
    pub(crate) fn simulate_inputs(&mut self, block: BlockId, value: SensorState) {
        if !self.config.simulation {
            return;
        }
        let Some(b) = self.blocks.get(&block) else {
            return;
        };
        if value == SensorState::Free && !b.trains.is_empty() {
            return;
        }
        for input in 0..b.inputs.len() {
            self.post(Message::SensorChanged { block, input, value });
        }
    }

    // ------------------------------------------------------------------------
    // Reservation
    // ------------------------------------------------------------------------

    /// Claim `side` of `block` for `path` on behalf of `train`.
    ///
    /// Refused (`Ok(false)`) when the block state is unknown, the side is
    /// already held, or the block is not free and the occupant on that side
    /// is not `train` heading out through `side`. A free block gets a new
    /// join record for `train`. With `dry_run` nothing changes, and the
    /// answer matches what a real attempt would return right now.
    pub fn reserve_block(
        &mut self,
        block: BlockId,
        path: PathId,
        train: TrainId,
        side: BlockSide,
        dry_run: bool,
    ) -> Result<bool, TrackingError> {
        self.train(train)?;
        let b = self.block(block)?;

        if b.state == BlockState::Unknown {
            tracing::debug!(%block, %train, "reserve refused: state unknown");
            return Ok(false);
        }
        if b.is_reserved(side) {
            tracing::debug!(%block, %train, side = side.as_str(), "reserve refused: side held");
            return Ok(false);
        }

        let was_free = b.state == BlockState::Free;
        if !was_free {
            let outbound = b
                .occupant_on(side)
                .and_then(|id| self.block_statuses.get(&id))
                .map(|s| s.train == Some(train) && s.direction.exits_through(side))
                .unwrap_or(false);
            if !outbound {
                tracing::debug!(%block, %train, side = side.as_str(), "reserve refused: conflicting occupant");
                return Ok(false);
            }
        }

        if dry_run {
            return Ok(true);
        }

        self.block_mut(block)?.reservations.set(side, Some(path));
        if was_free {
            TrainTracking::reserve(self, train, block, BlockTrainDirection::entering_through(side))?;
        }
        self.refresh_block(block);
        Ok(true)
    }

    /// Clear the reservation on `side`. Idempotent.
    pub fn release_block(
        &mut self,
        block: BlockId,
        side: BlockSide,
        dry_run: bool,
    ) -> Result<bool, TrackingError> {
        let b = self.block(block)?;
        if dry_run || !b.is_reserved(side) {
            return Ok(true);
        }
        self.block_mut(block)?.reservations.set(side, None);
        self.refresh_block(block);
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Sensor reports
    // ------------------------------------------------------------------------

    /// A sensor input of `block` changed value.
    pub fn input_changed(&mut self, block: BlockId, input: usize, value: SensorState) {
        let Some(b) = self.blocks.get_mut(&block) else {
            tracing::warn!(%block, "sensor report for unknown block");
            return;
        };
        let Some(slot) = b.inputs.get_mut(input) else {
            tracing::warn!(%block, input, "sensor report for unknown input");
            return;
        };
        if *slot == value {
            return;
        }
        *slot = value;
        let state = b.state;

        if value == SensorState::Occupied {
            match state {
                BlockState::Free | BlockState::Unknown => self.detect_entry(block, input),
                BlockState::Reserved => self.promote_reservation(block, input),
                BlockState::Occupied => {}
            }
        }

        self.refresh_block(block);

        let reserved = self.blocks.get(&block).map(|b| b.state) == Some(BlockState::Reserved);
        if value == SensorState::Free && reserved {
            self.release_vacated_tail(block);
        }
    }

    /// Work out which train just rolled into a free block.
    fn detect_entry(&mut self, block: BlockId, input: usize) {
        let Some(b) = self.blocks.get(&block) else {
            return;
        };
        if !b.trains.is_empty() {
            tracing::debug!(%block, "occupied report on block with known occupant");
            return;
        }
        let Some(edge) = b.sensor_edge(input) else {
            tracing::debug!(%block, input, "inner sensor cannot start tracking");
            return;
        };

        let mut candidates: Vec<(TrainId, BlockSide)> = Vec::new();
        for path_id in &b.incoming_paths {
            let Some(path) = self.paths.get(path_id) else {
                continue;
            };
            if !path.is_reserved() || !path.is_ready() {
                continue;
            }
            if let SensorEdge::Side(side) = edge {
                if path.ends.to_side != side {
                    continue;
                }
            }
            let source = self
                .blocks
                .get(&path.ends.from_block)
                .and_then(|from| from.occupant_on(path.ends.from_side))
                .and_then(|id| self.block_statuses.get(&id))
                .and_then(|status| status.train)
                .and_then(|train| self.trains.get(&train));
            let Some(train) = source else {
                continue;
            };
            if train.is_running()
                && train.mode == TrainMode::ManualUnsupervised
                && !candidates.iter().any(|(id, _)| *id == train.id)
            {
                candidates.push((train.id, path.ends.to_side));
            }
        }

        match candidates.as_slice() {
            [(train, side)] => {
                let (train, side) = (*train, *side);
                tracing::info!(%block, %train, "train detected entering block");
                let direction = BlockTrainDirection::entering_through(side);
                if let Err(err) = TrainTracking::enter(self, train, block, direction) {
                    tracing::error!(%block, %train, %err, "enter failed");
                }
            }
            [] => tracing::debug!(%block, "occupied report with no candidate train"),
            _ => tracing::debug!(%block, count = candidates.len(), "occupied report is ambiguous"),
        }
    }

    /// A reserved block reported occupied: the reserving train arrived.
    fn promote_reservation(&mut self, block: BlockId, input: usize) {
        let Some(b) = self.blocks.get(&block) else {
            return;
        };
        let sides: &[BlockSide] = match b.sensor_edge(input) {
            Some(SensorEdge::Either) => &[BlockSide::A, BlockSide::B],
            Some(SensorEdge::Side(BlockSide::A)) => &[BlockSide::A],
            Some(SensorEdge::Side(BlockSide::B)) => &[BlockSide::B],
            None => &[],
        };

        let arrival = sides.iter().find_map(|side| {
            let path = self.paths.get(&b.reserved_path(*side)?)?;
            if path.ends.to_block != block || path.ends.to_side != *side {
                return None;
            }
            let status = self.block_statuses.get(&b.occupant_on(*side)?)?;
            let train = self.trains.get(&status.train?)?;
            (path.reserved_by == Some(train.id) && train.reserved.contains(&status.id))
                .then_some(status.id)
        });

        match arrival {
            Some(status) => {
                if let Err(err) = TrainTracking::enter_reserved(self, status) {
                    tracing::error!(%block, %err, "enter failed");
                }
            }
            None => tracing::debug!(%block, input, "occupied report on reserved block not matched"),
        }
    }

    /// A block went clear behind a train that has moved on: let it go, but
    /// only if it is the train's tail and not its sole block.
    fn release_vacated_tail(&mut self, block: BlockId) {
        let Some(b) = self.blocks.get(&block) else {
            return;
        };
        let [status_id] = b.trains.as_slice() else {
            return;
        };
        let status_id = *status_id;
        let tail_of_longer_train = self
            .block_statuses
            .get(&status_id)
            .and_then(|s| s.train)
            .and_then(|train| self.trains.get(&train))
            .map(|t| t.blocks.len() >= 2 && t.tail() == Some(status_id))
            .unwrap_or(false);

        if tail_of_longer_train {
            if let Err(err) = TrainTracking::left(self, status_id) {
                tracing::error!(%block, %err, "tail release failed");
            }
        }
    }

    /// Report from an identification reader (RFID, transponder).
    ///
    /// `Present` on an empty block places an `"#<identifier>"` placeholder
    /// with no backing train; `Absent` removes it; `Seen` is ignored.
    pub fn identification_event(
        &mut self,
        block: BlockId,
        event_type: IdentificationEventType,
        identifier: u32,
        direction: BlockTrainDirection,
    ) {
        let Some(b) = self.blocks.get(&block) else {
            tracing::warn!(%block, "identification for unknown block");
            return;
        };
        let identification = format!("#{identifier}");

        match event_type {
            IdentificationEventType::Present => {
                if !b.trains.is_empty() {
                    tracing::debug!(%block, %identification, "identification ignored: block occupied");
                    return;
                }
                if let Err(err) = TrainTracking::identified(self, block, identification, direction) {
                    tracing::error!(%block, %err, "identification failed");
                }
            }
            IdentificationEventType::Absent => {
                let found = b.trains.iter().copied().find(|id| {
                    self.block_statuses
                        .get(id)
                        .map(|s| s.is_placeholder() && s.identification == identification)
                        .unwrap_or(false)
                });
                if let Some(status) = found {
                    TrainTracking::unidentified(self, status);
                }
            }
            IdentificationEventType::Seen => {}
        }
    }

    // ------------------------------------------------------------------------
    // Operator commands
    // ------------------------------------------------------------------------

    /// Place a train into an empty block by hand.
    ///
    /// The train starts with direction `TowardsA`; use [`flip_train`](Self::flip_train)
    /// to turn it.
    pub fn assign_train(&mut self, block: BlockId, train: TrainId) -> Result<(), TrackingError> {
        let b = self.block(block)?;
        let t = self.train(train)?;
        if !b.trains.is_empty() {
            return Err(InvalidOperation::BlockNotEmpty(block).into());
        }
        if t.active || !t.reserved.is_empty() {
            return Err(InvalidOperation::TrainAlreadyActive(train).into());
        }

        TrainTracking::assigned(self, train, block)?;
        tracing::info!(%block, %train, "train assigned");
        self.simulate_inputs(block, SensorState::Occupied);
        self.settle();
        Ok(())
    }

    /// Take a stopped train out of a block. Only its head or tail block (or
    /// a block merely reserved ahead of it) qualifies.
    pub fn remove_train(&mut self, block: BlockId, train: TrainId) -> Result<(), TrackingError> {
        let b = self.block(block)?;
        let t = self.train(train)?;
        let status = b
            .trains
            .iter()
            .copied()
            .find(|id| self.block_statuses.get(id).and_then(|s| s.train) == Some(train))
            .ok_or(InvalidOperation::TrainNotInBlock { train, block })?;

        if !t.is_stopped {
            return Err(InvalidOperation::TrainNotStopped(train).into());
        }
        if t.blocks.contains(&status) && t.head() != Some(status) && t.tail() != Some(status) {
            return Err(InvalidOperation::NotHeadOrTail { train, block }.into());
        }

        TrainTracking::removed(self, status)?;
        tracing::info!(%block, %train, "train removed");
        self.simulate_inputs(block, SensorState::Free);
        self.settle();
        Ok(())
    }

    /// Reverse the sole, stopped occupant (e.g. at a dead end).
    pub fn flip_train(&mut self, block: BlockId) -> Result<(), TrackingError> {
        let b = self.block(block)?;
        let status = match b.trains.as_slice() {
            [] => return Err(InvalidOperation::BlockEmpty(block).into()),
            [status] => *status,
            _ => return Err(InvalidOperation::FlipRequiresSingleOccupant(block).into()),
        };
        if let Some(train) = self.block_statuses.get(&status).and_then(|s| s.train) {
            if !self.train(train)?.is_stopped {
                return Err(InvalidOperation::TrainNotStopped(train).into());
            }
        }
        if let Some(s) = self.block_statuses.get_mut(&status) {
            s.direction = s.direction.flipped();
            tracing::debug!(%block, direction = s.direction.as_str(), "occupant flipped");
        }
        Ok(())
    }

    /// Declare an unclaimed block free.
    ///
    /// Blocks without sensors have no other way to leave `Unknown`. For
    /// blocks with sensors the state is simply re-derived. Returns whether
    /// the block ended up `Free`.
    pub fn set_block_free(&mut self, block: BlockId) -> Result<bool, TrackingError> {
        let b = self.block(block)?;
        if !b.trains.is_empty() {
            return Err(InvalidOperation::BlockNotEmpty(block).into());
        }
        if b.inputs.iter().any(|s| *s == SensorState::Occupied) {
            return Err(InvalidOperation::BlockOccupied(block).into());
        }
        if b.inputs.is_empty() && !b.reservations.any() {
            self.set_block_state(block, BlockState::Free);
        } else {
            self.refresh_block(block);
        }
        Ok(self.block(block)?.state == BlockState::Free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with(inputs: &[SensorState]) -> Block {
        let mut b = Block::new(BlockId(1), "b", inputs.len());
        b.inputs = inputs.to_vec();
        b
    }

    #[test]
    fn derive_occupied_wins() {
        let b = block_with(&[SensorState::Unknown, SensorState::Occupied]);
        assert_eq!(b.derive_state(), BlockState::Occupied);
    }

    #[test]
    fn derive_free_and_reserved() {
        let mut b = block_with(&[SensorState::Free, SensorState::Free]);
        assert_eq!(b.derive_state(), BlockState::Free);

        b.reservations.a = Some(PathId(7));
        assert_eq!(b.derive_state(), BlockState::Reserved);

        b.reservations.a = None;
        b.trains.push(StatusId(3)).unwrap();
        assert_eq!(b.derive_state(), BlockState::Reserved);
    }

    #[test]
    fn derive_unknown_when_inconsistent() {
        let b = block_with(&[SensorState::Free, SensorState::Unknown]);
        assert_eq!(b.derive_state(), BlockState::Unknown);
    }

    #[test]
    fn sensorless_block_keeps_unknown_until_declared() {
        let mut b = block_with(&[]);
        assert_eq!(b.derive_state(), BlockState::Unknown);
        b.state = BlockState::Free;
        assert_eq!(b.derive_state(), BlockState::Free);
        b.trains.push(StatusId(1)).unwrap();
        assert_eq!(b.derive_state(), BlockState::Reserved);
    }

    #[test]
    fn front_back_and_sides() {
        let mut b = block_with(&[SensorState::Free]);
        assert_eq!(b.front(), None);
        b.trains.push(StatusId(1)).unwrap();
        assert_eq!(b.front(), b.back());
        b.trains.push(StatusId(2)).unwrap();
        assert_eq!(b.occupant_on(BlockSide::A), Some(StatusId(1)));
        assert_eq!(b.occupant_on(BlockSide::B), Some(StatusId(2)));
        assert!(b.trains.push(StatusId(3)).is_err());
    }

    #[test]
    fn method_permissions() {
        let mut b = block_with(&[SensorState::Free]);
        assert!(b.assign_enabled && !b.remove_enabled && !b.flip_enabled);

        b.trains.push(StatusId(1)).unwrap();
        b.update_train_method_enabled();
        assert!(!b.assign_enabled && b.remove_enabled && b.flip_enabled);

        b.trains.push(StatusId(2)).unwrap();
        b.update_train_method_enabled();
        assert!(b.remove_enabled && !b.flip_enabled);
    }

    #[test]
    fn sensor_edges() {
        let single = block_with(&[SensorState::Free]);
        assert_eq!(single.sensor_edge(0), Some(SensorEdge::Either));

        let triple = block_with(&[SensorState::Free; 3]);
        assert_eq!(triple.sensor_edge(0), Some(SensorEdge::Side(BlockSide::A)));
        assert_eq!(triple.sensor_edge(1), None);
        assert_eq!(triple.sensor_edge(2), Some(SensorEdge::Side(BlockSide::B)));
    }

    #[test]
    fn set_free_on_sensorless_block() {
        let mut world = World::default();
        let block = world.create_block("siding", 0);
        assert_eq!(world.block(block).unwrap().state, BlockState::Unknown);
        assert_eq!(world.set_block_free(block), Ok(true));
        assert_eq!(world.block(block).unwrap().state, BlockState::Free);
    }

    #[test]
    fn set_free_refused_while_sensor_occupied() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        world.input_changed(block, 0, SensorState::Occupied);
        assert_eq!(
            world.set_block_free(block),
            Err(InvalidOperation::BlockOccupied(block).into())
        );
    }

    #[test]
    fn unknown_block_refuses_reservation() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        let train = world.create_train("t");
        assert_eq!(
            world.reserve_block(block, PathId(100), train, BlockSide::A, false),
            Ok(false)
        );
        assert!(!world.block(block).unwrap().is_reserved(BlockSide::A));
    }

    #[test]
    fn release_is_idempotent() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        assert_eq!(world.release_block(block, BlockSide::B, false), Ok(true));
        assert_eq!(world.release_block(block, BlockSide::B, false), Ok(true));
    }

    #[test]
    fn sensor_report_for_missing_input_is_ignored() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        world.input_changed(block, 5, SensorState::Occupied);
        assert_eq!(world.block(block).unwrap().state, BlockState::Unknown);
    }

    #[test]
    fn identification_placeholder_lifecycle() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        world.input_changed(block, 0, SensorState::Free);

        world.identification_event(
            block,
            IdentificationEventType::Present,
            1234,
            BlockTrainDirection::TowardsB,
        );
        let b = world.block(block).unwrap();
        assert_eq!(b.trains.len(), 1);
        assert_eq!(b.state, BlockState::Reserved);
        let status = world.block_status(b.trains[0]).unwrap();
        assert_eq!(status.identification, "#1234");
        assert!(status.is_placeholder());

        world.identification_event(
            block,
            IdentificationEventType::Seen,
            1234,
            BlockTrainDirection::Unknown,
        );
        assert_eq!(world.block(block).unwrap().trains.len(), 1);

        world.identification_event(
            block,
            IdentificationEventType::Absent,
            1234,
            BlockTrainDirection::Unknown,
        );
        let b = world.block(block).unwrap();
        assert!(b.trains.is_empty());
        assert_eq!(b.state, BlockState::Free);
        assert_eq!(world.check_consistency(), Ok(()));
    }

    #[test]
    fn identification_absent_for_other_identifier_is_ignored() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        world.identification_event(
            block,
            IdentificationEventType::Present,
            1,
            BlockTrainDirection::Unknown,
        );
        world.identification_event(
            block,
            IdentificationEventType::Absent,
            2,
            BlockTrainDirection::Unknown,
        );
        assert_eq!(world.block(block).unwrap().trains.len(), 1);
    }

    #[test]
    fn delete_block_drops_paths_and_zone_membership() {
        use crate::path::PathEnds;
        use crate::types::BlockSide;

        let mut world = World::default();
        let a = world.create_block("a", 1);
        let b = world.create_block("b", 1);
        let path = world
            .update_paths(a, vec![PathEnds::new(a, BlockSide::B, b, BlockSide::A)])
            .unwrap()[0];
        let zone = world.create_zone("z");
        world.add_block_to_zone(zone, b).unwrap();

        world.delete_block(b).unwrap();

        assert!(world.block(b).is_err());
        assert!(world.path(path).is_err());
        assert!(world.block(a).unwrap().paths.is_empty());
        assert!(world.zone(zone).unwrap().blocks.is_empty());
        assert_eq!(world.check_consistency(), Ok(()));
    }

    #[test]
    fn delete_block_refused_while_occupied() {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        let train = world.create_train("t");
        world.assign_train(block, train).unwrap();
        assert_eq!(
            world.delete_block(block),
            Err(InvalidOperation::BlockNotEmpty(block).into())
        );
    }
}
