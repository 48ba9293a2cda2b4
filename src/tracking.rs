//! Train tracking: the one place that creates, moves and destroys join records.
//!
//! Every function here keeps both sides of a relationship in lock-step: a
//! [`TrainBlockStatus`] is always listed on its block and (unless it is an
//! identification placeholder) on exactly one of its train's `blocks` or
//! `reserved` lists. Zone memberships follow from the blocks a train holds:
//!
//! ```text
//! reserve:  (none) -> Entering          Entered -> Leaving (zones behind)
//! enter:    (none) -> Entering -> Entered, Leaving -> Entered
//! left:     record deleted once no held block touches the zone,
//!           Leaving -> Entered when the head is still inside
//! ```
//!
//! The effective train policy is recomputed once per cascade, after all
//! memberships have settled.

use alloc::collections::BTreeSet;
use alloc::string::String;

use crate::error::{InvalidOperation, TrackingError};
use crate::events::{BlockEvent, Event, TrainEvent, ZoneEvent};
use crate::status::{TrainBlockStatus, TrainZoneStatus};
use crate::types::{
    BlockId, BlockSide, BlockState, BlockTrainDirection, StatusId, TrainId, ZoneId, ZoneMembership,
    ZoneStatusId,
};
use crate::world::World;

/// Stateless orchestrator for train/block/zone relationships.
pub struct TrainTracking;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ZoneTransition {
    Assigned,
    Entering,
    Entered,
    Leaving,
    Left,
    Removed,
}

impl ZoneTransition {
    fn events(self, train: TrainId, zone: ZoneId) -> (TrainEvent, ZoneEvent) {
        match self {
            ZoneTransition::Assigned => (
                TrainEvent::ZoneAssigned { train, zone },
                ZoneEvent::TrainAssigned { zone, train },
            ),
            ZoneTransition::Entering => (
                TrainEvent::ZoneEntering { train, zone },
                ZoneEvent::TrainEntering { zone, train },
            ),
            ZoneTransition::Entered => (
                TrainEvent::ZoneEntered { train, zone },
                ZoneEvent::TrainEntered { zone, train },
            ),
            ZoneTransition::Leaving => (
                TrainEvent::ZoneLeaving { train, zone },
                ZoneEvent::TrainLeaving { zone, train },
            ),
            ZoneTransition::Left => (
                TrainEvent::ZoneLeft { train, zone },
                ZoneEvent::TrainLeft { zone, train },
            ),
            ZoneTransition::Removed => (
                TrainEvent::ZoneRemoved { train, zone },
                ZoneEvent::TrainRemoved { zone, train },
            ),
        }
    }
}

impl TrainTracking {
    /// Operator placed `train` into `block`.
    pub fn assigned(world: &mut World, train: TrainId, block: BlockId) -> Result<StatusId, TrackingError> {
        world.train(train)?;
        let direction = BlockTrainDirection::TowardsA;
        let id = Self::attach(world, block, Some(train), direction, String::new())?;

        let t = world.train_mut(train)?;
        t.blocks.insert(0, id);
        t.active = true;
        world.refresh_block(block);

        world.push_event(Event::Train(TrainEvent::BlockAssigned { train, block }));
        world.push_event(Event::Block(BlockEvent::TrainAssigned { block, train }));

        for zone in Self::zones_of_block(world, block) {
            match Self::membership(world, train, zone) {
                None => {
                    Self::create_membership(world, train, zone, ZoneMembership::Entered);
                    Self::fire(world, train, zone, ZoneTransition::Assigned);
                }
                Some((_, ZoneMembership::Entered)) => {}
                Some((status, _)) => {
                    Self::set_membership(world, status, ZoneMembership::Entered);
                    Self::fire(world, train, zone, ZoneTransition::Entered);
                }
            }
        }
        world.update_train_policy(train);
        Ok(id)
    }

    /// `block` was claimed ahead of `train`.
    pub fn reserve(
        world: &mut World,
        train: TrainId,
        block: BlockId,
        direction: BlockTrainDirection,
    ) -> Result<StatusId, TrackingError> {
        world.train(train)?;
        let occupied = Self::occupied_zones(world, train);
        let id = Self::attach(world, block, Some(train), direction, String::new())?;

        world.train_mut(train)?.reserved.push(id);
        world.refresh_block(block);

        world.push_event(Event::Train(TrainEvent::BlockReserved {
            train,
            block,
            direction,
        }));
        world.push_event(Event::Block(BlockEvent::TrainReserved {
            block,
            train,
            direction,
        }));

        let target = Self::zones_of_block(world, block);
        Self::leaving_cascade(world, train, &occupied, &target);
        Self::entering_cascade(world, train, &target);
        world.update_train_policy(train);
        Ok(id)
    }

    /// `train` was detected entering `block` without a prior reservation.
    pub fn enter(
        world: &mut World,
        train: TrainId,
        block: BlockId,
        direction: BlockTrainDirection,
    ) -> Result<StatusId, TrackingError> {
        world.train(train)?;
        let id = Self::attach(world, block, Some(train), direction, String::new())?;
        world.train_mut(train)?.reserved.push(id);
        Self::enter_reserved(world, id)?;
        Ok(id)
    }

    /// The train holding reservation `status` physically arrived.
    ///
    /// Afterwards any tail blocks that already read `Reserved` (sensors
    /// clear) are released, so a fast train does not leave a trail behind.
    pub fn enter_reserved(world: &mut World, status: StatusId) -> Result<(), TrackingError> {
        let s = Self::status(world, status)?;
        let Some(train) = s.train else {
            return Ok(());
        };
        let occupied = Self::occupied_zones(world, train);

        let t = world.train_mut(train)?;
        t.reserved.retain(|id| *id != status);
        if !t.blocks.contains(&status) {
            t.blocks.insert(0, status);
        }
        t.active = true;
        world.refresh_block(s.block);

        world.push_event(Event::Train(TrainEvent::BlockEntered {
            train,
            block: s.block,
            direction: s.direction,
        }));
        world.push_event(Event::Block(BlockEvent::TrainEntered {
            block: s.block,
            train,
            direction: s.direction,
        }));

        let target = Self::zones_of_block(world, s.block);
        Self::leaving_cascade(world, train, &occupied, &target);
        Self::entering_cascade(world, train, &target);
        for zone in &target {
            if let Some((id, membership)) = Self::membership(world, train, *zone) {
                if membership != ZoneMembership::Entered {
                    Self::set_membership(world, id, ZoneMembership::Entered);
                    Self::fire(world, train, *zone, ZoneTransition::Entered);
                }
            }
        }
        world.update_train_policy(train);

        loop {
            let t = world.train(train)?;
            if t.blocks.len() <= 1 {
                break;
            }
            let Some(tail) = t.tail() else {
                break;
            };
            let vacated = world
                .block_statuses
                .get(&tail)
                .and_then(|s| world.blocks.get(&s.block))
                .map(|b| b.state == BlockState::Reserved)
                .unwrap_or(false);
            if !vacated {
                break;
            }
            Self::left(world, tail)?;
        }
        Ok(())
    }

    /// The train behind `status` is gone from that block.
    ///
    /// Also used to cancel a reservation the train never reached. The path
    /// the train left through is scheduled for delayed release.
    pub fn left(world: &mut World, status: StatusId) -> Result<(), TrackingError> {
        let s = Self::status(world, status)?;
        let Some(train) = s.train else {
            Self::unidentified(world, status);
            return Ok(());
        };

        Self::detach(world, &s);
        let t = world.train_mut(train)?;
        t.active = !t.blocks.is_empty();
        world.refresh_block(s.block);

        world.push_event(Event::Train(TrainEvent::BlockLeft {
            train,
            block: s.block,
            direction: s.direction,
        }));
        world.push_event(Event::Block(BlockEvent::TrainLeft {
            block: s.block,
            train,
            direction: s.direction,
        }));

        Self::drop_zones(world, train, s.block, ZoneTransition::Left);
        Self::resume_leaving(world, train);
        world.update_train_policy(train);

        let exit = match s.direction {
            BlockTrainDirection::TowardsA => Some(BlockSide::A),
            BlockTrainDirection::TowardsB => Some(BlockSide::B),
            BlockTrainDirection::Unknown => None,
        };
        let exit_path = exit
            .and_then(|side| world.blocks.get(&s.block)?.reserved_path(side))
            .filter(|path| {
                world
                    .paths
                    .get(path)
                    .map(|p| p.ends.from_block == s.block)
                    .unwrap_or(false)
            });
        if let Some(path) = exit_path {
            world.schedule_release(path);
        }
        Ok(())
    }

    /// The operator took the train behind `status` off that block.
    pub fn removed(world: &mut World, status: StatusId) -> Result<(), TrackingError> {
        let s = Self::status(world, status)?;
        let Some(train) = s.train else {
            Self::unidentified(world, status);
            return Ok(());
        };

        Self::detach(world, &s);
        let t = world.train_mut(train)?;
        t.active = !t.blocks.is_empty();
        world.refresh_block(s.block);

        world.push_event(Event::Train(TrainEvent::BlockRemoved {
            train,
            block: s.block,
        }));
        world.push_event(Event::Block(BlockEvent::TrainRemoved {
            block: s.block,
            train,
        }));

        Self::drop_zones(world, train, s.block, ZoneTransition::Removed);
        Self::resume_leaving(world, train);
        world.update_train_policy(train);
        Ok(())
    }

    /// An identification reader placed a placeholder into `block`.
    pub fn identified(
        world: &mut World,
        block: BlockId,
        identification: String,
        direction: BlockTrainDirection,
    ) -> Result<StatusId, TrackingError> {
        let id = Self::attach(world, block, None, direction, identification.clone())?;
        world.refresh_block(block);
        world.push_event(Event::Block(BlockEvent::IdentificationPresent {
            block,
            identification,
            direction,
        }));
        Ok(id)
    }

    /// An identification placeholder went away.
    pub fn unidentified(world: &mut World, status: StatusId) {
        let Some(s) = world.block_statuses.get(&status).cloned() else {
            return;
        };
        Self::detach(world, &s);
        world.refresh_block(s.block);
        world.push_event(Event::Block(BlockEvent::IdentificationAbsent {
            block: s.block,
            identification: s.identification,
        }));
    }

    // ------------------------------------------------------------------------
    // Join records
    // ------------------------------------------------------------------------

    fn status(world: &World, status: StatusId) -> Result<TrainBlockStatus, TrackingError> {
        world
            .block_statuses
            .get(&status)
            .cloned()
            .ok_or(TrackingError::UnknownStatus(status))
    }

    /// Create a record and list it on the block. A train entering through
    /// side A goes to the front, anything else to the back.
    fn attach(
        world: &mut World,
        block: BlockId,
        train: Option<TrainId>,
        direction: BlockTrainDirection,
        identification: String,
    ) -> Result<StatusId, TrackingError> {
        if world.block(block)?.trains.is_full() {
            return Err(InvalidOperation::BlockNotEmpty(block).into());
        }
        let id = StatusId(world.allocate_id());
        let b = world.block_mut(block)?;
        let listed = if direction == BlockTrainDirection::TowardsB {
            b.trains.insert(0, id)
        } else {
            b.trains.push(id)
        };
        listed.map_err(|_| InvalidOperation::BlockNotEmpty(block))?;

        let status = match train {
            Some(train) => TrainBlockStatus::new(id, block, train, direction),
            None => TrainBlockStatus::placeholder(id, block, identification, direction),
        };
        world.block_statuses.insert(id, status);
        Ok(id)
    }

    /// Unlist a record from both owners and destroy it.
    fn detach(world: &mut World, status: &TrainBlockStatus) {
        if let Some(b) = world.blocks.get_mut(&status.block) {
            b.trains.retain(|id| *id != status.id);
        }
        if let Some(t) = status.train.and_then(|train| world.trains.get_mut(&train)) {
            t.blocks.retain(|id| *id != status.id);
            t.reserved.retain(|id| *id != status.id);
        }
        world.block_statuses.remove(&status.id);
    }

    // ------------------------------------------------------------------------
    // Zone cascades
    // ------------------------------------------------------------------------

    fn zones_of_block(world: &World, block: BlockId) -> BTreeSet<ZoneId> {
        world
            .blocks
            .get(&block)
            .map(|b| b.zones.clone())
            .unwrap_or_default()
    }

    fn zones_of<'a>(world: &World, records: impl Iterator<Item = &'a StatusId>) -> BTreeSet<ZoneId> {
        records
            .filter_map(|id| world.block_statuses.get(id))
            .filter_map(|s| world.blocks.get(&s.block))
            .flat_map(|b| b.zones.iter().copied())
            .collect()
    }

    /// Zones of the blocks the train physically holds.
    fn occupied_zones(world: &World, train: TrainId) -> BTreeSet<ZoneId> {
        match world.trains.get(&train) {
            Some(t) => Self::zones_of(world, t.blocks.iter()),
            None => BTreeSet::new(),
        }
    }

    /// Zones of every block the train holds or has reserved.
    fn associated_zones(world: &World, train: TrainId) -> BTreeSet<ZoneId> {
        match world.trains.get(&train) {
            Some(t) => Self::zones_of(world, t.blocks.iter().chain(t.reserved.iter())),
            None => BTreeSet::new(),
        }
    }

    /// `Entered` zones the train is moving away from become `Leaving`.
    fn leaving_cascade(world: &mut World, train: TrainId, occupied: &BTreeSet<ZoneId>, target: &BTreeSet<ZoneId>) {
        for zone in occupied.difference(target) {
            if let Some((id, ZoneMembership::Entered)) = Self::membership(world, train, *zone) {
                Self::set_membership(world, id, ZoneMembership::Leaving);
                Self::fire(world, train, *zone, ZoneTransition::Leaving);
            }
        }
    }

    /// Zones of the target block: new ones become `Entering`, a zone being
    /// left is entered again.
    fn entering_cascade(world: &mut World, train: TrainId, target: &BTreeSet<ZoneId>) {
        for zone in target {
            match Self::membership(world, train, *zone) {
                None => {
                    Self::create_membership(world, train, *zone, ZoneMembership::Entering);
                    Self::fire(world, train, *zone, ZoneTransition::Entering);
                }
                Some((id, ZoneMembership::Leaving)) => {
                    Self::set_membership(world, id, ZoneMembership::Entered);
                    Self::fire(world, train, *zone, ZoneTransition::Entered);
                }
                Some(_) => {}
            }
        }
    }

    /// Delete memberships in zones of `block` no held block touches any more.
    fn drop_zones(world: &mut World, train: TrainId, block: BlockId, transition: ZoneTransition) {
        let associated = Self::associated_zones(world, train);
        for zone in Self::zones_of_block(world, block) {
            if associated.contains(&zone) {
                continue;
            }
            if let Some((id, _)) = Self::membership(world, train, zone) {
                Self::delete_membership(world, id);
                Self::fire(world, train, zone, transition);
            }
        }
    }

    /// A `Leaving` zone is entered again once the train's head is still in
    /// it and nothing reserved ahead lies outside it, e.g. after the
    /// reservation that started the leave was cancelled.
    fn resume_leaving(world: &mut World, train: TrainId) {
        let Some(t) = world.trains.get(&train) else {
            return;
        };
        let Some(head) = t.head() else {
            return;
        };
        let head_zones = Self::zones_of(world, core::iter::once(&head));
        let ahead: alloc::vec::Vec<BTreeSet<ZoneId>> = t
            .reserved
            .iter()
            .map(|id| Self::zones_of(world, core::iter::once(id)))
            .collect();
        for zone in head_zones {
            if ahead.iter().any(|zones| !zones.contains(&zone)) {
                continue;
            }
            if let Some((id, ZoneMembership::Leaving)) = Self::membership(world, train, zone) {
                Self::set_membership(world, id, ZoneMembership::Entered);
                Self::fire(world, train, zone, ZoneTransition::Entered);
            }
        }
    }

    fn membership(world: &World, train: TrainId, zone: ZoneId) -> Option<(ZoneStatusId, ZoneMembership)> {
        world
            .train_zone_status(train, zone)
            .map(|s| (s.id, s.membership))
    }

    fn create_membership(world: &mut World, train: TrainId, zone: ZoneId, membership: ZoneMembership) {
        let id = ZoneStatusId(world.allocate_id());
        world.zone_statuses.insert(
            id,
            TrainZoneStatus {
                id,
                zone,
                train,
                membership,
            },
        );
        if let Some(t) = world.trains.get_mut(&train) {
            t.zones.push(id);
        }
        if let Some(z) = world.zones.get_mut(&zone) {
            z.trains.push(id);
        }
    }

    fn set_membership(world: &mut World, id: ZoneStatusId, membership: ZoneMembership) {
        if let Some(s) = world.zone_statuses.get_mut(&id) {
            s.membership = membership;
        }
    }

    fn delete_membership(world: &mut World, id: ZoneStatusId) {
        let Some(s) = world.zone_statuses.remove(&id) else {
            return;
        };
        if let Some(t) = world.trains.get_mut(&s.train) {
            t.zones.retain(|z| *z != id);
        }
        if let Some(z) = world.zones.get_mut(&s.zone) {
            z.trains.retain(|z| *z != id);
        }
    }

    fn fire(world: &mut World, train: TrainId, zone: ZoneId, transition: ZoneTransition) {
        tracing::debug!(%train, %zone, ?transition, "zone membership");
        let (train_event, zone_event) = transition.events(train, zone);
        world.push_event(Event::Train(train_event));
        world.push_event(Event::Zone(zone_event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorState;

    fn world_with_block() -> (World, BlockId, TrainId) {
        let mut world = World::default();
        let block = world.create_block("b", 1);
        world.input_changed(block, 0, SensorState::Free);
        let train = world.create_train("t");
        world.drain_events();
        (world, block, train)
    }

    #[test]
    fn assigned_links_both_sides() {
        let (mut world, block, train) = world_with_block();
        let status = TrainTracking::assigned(&mut world, train, block).unwrap();

        assert_eq!(world.block(block).unwrap().trains.as_slice(), &[status]);
        assert_eq!(world.train(train).unwrap().blocks, alloc::vec![status]);
        assert!(world.train(train).unwrap().active);
        assert_eq!(world.block(block).unwrap().state, BlockState::Reserved);
        assert_eq!(world.check_consistency(), Ok(()));
    }

    #[test]
    fn assigned_fires_train_event_first() {
        let (mut world, block, train) = world_with_block();
        TrainTracking::assigned(&mut world, train, block).unwrap();
        let names: alloc::vec::Vec<&str> = world.drain_events().iter().map(|e| e.name()).collect();
        let train_pos = names.iter().position(|n| *n == "train.block_assigned").unwrap();
        let block_pos = names.iter().position(|n| *n == "block.train_assigned").unwrap();
        assert_eq!(block_pos, train_pos + 1);
    }

    #[test]
    fn reserve_does_not_activate() {
        let (mut world, block, train) = world_with_block();
        let status =
            TrainTracking::reserve(&mut world, train, block, BlockTrainDirection::TowardsB).unwrap();
        let t = world.train(train).unwrap();
        assert!(!t.active);
        assert_eq!(t.reserved, alloc::vec![status]);
        assert!(t.blocks.is_empty());
        assert_eq!(world.check_consistency(), Ok(()));
    }

    #[test]
    fn enter_reserved_moves_record() {
        let (mut world, block, train) = world_with_block();
        let status =
            TrainTracking::reserve(&mut world, train, block, BlockTrainDirection::TowardsB).unwrap();
        TrainTracking::enter_reserved(&mut world, status).unwrap();
        let t = world.train(train).unwrap();
        assert!(t.active);
        assert!(t.reserved.is_empty());
        assert_eq!(t.head(), Some(status));
    }

    #[test]
    fn left_destroys_record() {
        let (mut world, block, train) = world_with_block();
        let status = TrainTracking::assigned(&mut world, train, block).unwrap();
        TrainTracking::left(&mut world, status).unwrap();
        assert!(world.block_status(status).is_none());
        assert!(!world.train(train).unwrap().active);
        assert_eq!(world.block(block).unwrap().state, BlockState::Free);
        assert_eq!(
            TrainTracking::left(&mut world, status),
            Err(TrackingError::UnknownStatus(status))
        );
    }

    #[test]
    fn full_block_refuses_third_record() {
        let (mut world, block, train) = world_with_block();
        let other = world.create_train("u");
        let third = world.create_train("v");
        TrainTracking::reserve(&mut world, train, block, BlockTrainDirection::TowardsB).unwrap();
        TrainTracking::reserve(&mut world, other, block, BlockTrainDirection::TowardsA).unwrap();
        assert_eq!(
            TrainTracking::reserve(&mut world, third, block, BlockTrainDirection::TowardsA),
            Err(InvalidOperation::BlockNotEmpty(block).into())
        );
        assert!(world.train(third).unwrap().reserved.is_empty());
    }

    #[test]
    fn entering_through_side_a_takes_the_front() {
        let (mut world, block, train) = world_with_block();
        let other = world.create_train("u");
        let from_b =
            TrainTracking::reserve(&mut world, other, block, BlockTrainDirection::TowardsA).unwrap();
        let from_a =
            TrainTracking::reserve(&mut world, train, block, BlockTrainDirection::TowardsB).unwrap();
        let b = world.block(block).unwrap();
        assert_eq!(b.front(), Some(from_a));
        assert_eq!(b.back(), Some(from_b));
    }

    #[test]
    fn zone_memberships_follow_blocks() {
        let (mut world, block, train) = world_with_block();
        let zone = world.create_zone("z");
        world.add_block_to_zone(zone, block).unwrap();

        let status =
            TrainTracking::reserve(&mut world, train, block, BlockTrainDirection::TowardsB).unwrap();
        assert_eq!(
            world.train_zone_status(train, zone).map(|s| s.membership),
            Some(ZoneMembership::Entering)
        );

        TrainTracking::enter_reserved(&mut world, status).unwrap();
        assert_eq!(
            world.train_zone_status(train, zone).map(|s| s.membership),
            Some(ZoneMembership::Entered)
        );

        TrainTracking::left(&mut world, status).unwrap();
        assert!(world.train_zone_status(train, zone).is_none());
        assert!(world.zone(zone).unwrap().trains.is_empty());
        assert_eq!(world.check_consistency(), Ok(()));
    }
}
