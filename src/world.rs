//! The registry that owns every block, train, zone, path and join record.
//!
//! All mutation happens through `&mut World` on a single logic context, one
//! [`Message`] at a time. Nothing in here locks; concurrency is the job of
//! whoever drives [`World::dispatch`] (see `services::runtime`).
//!
//! # Example
//!
//! ```rust
//! use rs_interlock::{World, Message, SensorState, BlockState};
//!
//! let mut world = World::default();
//! let block = world.create_block("platform 1", 1);
//! assert_eq!(world.block(block).unwrap().state, BlockState::Unknown);
//!
//! world
//!     .dispatch(Message::SensorChanged { block, input: 0, value: SensorState::Free })
//!     .unwrap();
//! assert_eq!(world.block(block).unwrap().state, BlockState::Free);
//! ```

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::block::Block;
use crate::commands::{CommandOutcome, Message, WorldCommand};
use crate::config::WorldConfig;
use crate::error::TrackingError;
use crate::events::Event;
use crate::path::{BlockPath, PendingRelease};
use crate::status::{TrainBlockStatus, TrainZoneStatus};
use crate::traits::EventSink;
use crate::train::Train;
use crate::types::{BlockId, PathId, StatusId, TrainId, ZoneId, ZoneStatusId};
use crate::zone::Zone;

/// The layout currently loaded.
#[derive(Debug, Default)]
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) blocks: BTreeMap<BlockId, Block>,
    pub(crate) trains: BTreeMap<TrainId, Train>,
    pub(crate) zones: BTreeMap<ZoneId, Zone>,
    pub(crate) paths: BTreeMap<PathId, BlockPath>,
    pub(crate) block_statuses: BTreeMap<StatusId, TrainBlockStatus>,
    pub(crate) zone_statuses: BTreeMap<ZoneStatusId, TrainZoneStatus>,
    pub(crate) pending_releases: Vec<PendingRelease>,
    pub(crate) next_id: u32,
    pub(crate) now_ms: u64,
    inbox: VecDeque<Message>,
    outbox: VecDeque<Event>,
}

impl World {
    /// Create an empty world.
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Time of the last [`Message::Tick`] seen, in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub(crate) fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Look up a block.
    pub fn block(&self, id: BlockId) -> Result<&Block, TrackingError> {
        self.blocks.get(&id).ok_or(TrackingError::UnknownBlock(id))
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, TrackingError> {
        self.blocks.get_mut(&id).ok_or(TrackingError::UnknownBlock(id))
    }

    /// Look up a train.
    pub fn train(&self, id: TrainId) -> Result<&Train, TrackingError> {
        self.trains.get(&id).ok_or(TrackingError::UnknownTrain(id))
    }

    pub(crate) fn train_mut(&mut self, id: TrainId) -> Result<&mut Train, TrackingError> {
        self.trains.get_mut(&id).ok_or(TrackingError::UnknownTrain(id))
    }

    /// Look up a zone.
    pub fn zone(&self, id: ZoneId) -> Result<&Zone, TrackingError> {
        self.zones.get(&id).ok_or(TrackingError::UnknownZone(id))
    }

    pub(crate) fn zone_mut(&mut self, id: ZoneId) -> Result<&mut Zone, TrackingError> {
        self.zones.get_mut(&id).ok_or(TrackingError::UnknownZone(id))
    }

    /// Look up a path.
    pub fn path(&self, id: PathId) -> Result<&BlockPath, TrackingError> {
        self.paths.get(&id).ok_or(TrackingError::UnknownPath(id))
    }

    pub(crate) fn path_mut(&mut self, id: PathId) -> Result<&mut BlockPath, TrackingError> {
        self.paths.get_mut(&id).ok_or(TrackingError::UnknownPath(id))
    }

    /// Look up a train/block join record.
    pub fn block_status(&self, id: StatusId) -> Option<&TrainBlockStatus> {
        self.block_statuses.get(&id)
    }

    /// Look up a train/zone join record.
    pub fn zone_status(&self, id: ZoneStatusId) -> Option<&TrainZoneStatus> {
        self.zone_statuses.get(&id)
    }

    /// All blocks, ordered by id.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// All trains, ordered by id.
    pub fn trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    /// All zones, ordered by id.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Blocks the train has entered, head first.
    pub fn train_blocks(&self, train: TrainId) -> Result<Vec<BlockId>, TrackingError> {
        Ok(self
            .train(train)?
            .blocks
            .iter()
            .filter_map(|id| self.block_statuses.get(id))
            .map(|s| s.block)
            .collect())
    }

    /// Trains recorded in the block, side A first. Placeholders are skipped.
    pub fn block_trains(&self, block: BlockId) -> Result<Vec<TrainId>, TrackingError> {
        Ok(self
            .block(block)?
            .trains
            .iter()
            .filter_map(|id| self.block_statuses.get(id))
            .filter_map(|s| s.train)
            .collect())
    }

    /// Membership record of `train` in `zone`, if any.
    pub fn train_zone_status(&self, train: TrainId, zone: ZoneId) -> Option<&TrainZoneStatus> {
        let t = self.trains.get(&train)?;
        t.zones
            .iter()
            .filter_map(|id| self.zone_statuses.get(id))
            .find(|s| s.zone == zone)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub(crate) fn push_event(&mut self, event: Event) {
        tracing::trace!(event = event.name(), "event");
        self.outbox.push_back(event);
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.outbox.drain(..).collect()
    }

    /// Hand every queued event to `sink`, oldest first.
    pub fn flush_events<S: EventSink>(&mut self, sink: &mut S) {
        while let Some(event) = self.outbox.pop_front() {
            sink.emit(event);
        }
    }

    /// Number of events waiting to be drained.
    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Queue a follow-up message, processed after the current one completes.
    pub(crate) fn post(&mut self, msg: Message) {
        self.inbox.push_back(msg);
    }

    /// Process one message, then every follow-up message it queued.
    ///
    /// Sensor, identification and tick messages never fail. The result of a
    /// [`Message::Command`] is the result of that command; follow-ups are
    /// physical events and cannot change it.
    pub fn dispatch(&mut self, msg: Message) -> Result<CommandOutcome, TrackingError> {
        let result = self.handle(msg);
        self.settle();
        result
    }

    /// Run every queued follow-up message, then verify the cross links
    /// (debug builds).
    pub(crate) fn settle(&mut self) {
        while let Some(next) = self.inbox.pop_front() {
            if let Err(err) = self.handle(next) {
                tracing::warn!(%err, "follow-up message failed");
            }
        }
        #[cfg(debug_assertions)]
        if let Err(violation) = self.check_consistency() {
            tracing::error!(%violation, "tracking state inconsistent");
            debug_assert!(false, "tracking state inconsistent: {violation}");
        }
    }

    fn handle(&mut self, msg: Message) -> Result<CommandOutcome, TrackingError> {
        match msg {
            Message::SensorChanged { block, input, value } => {
                self.input_changed(block, input, value);
                Ok(CommandOutcome::Applied)
            }
            Message::Identification {
                block,
                event_type,
                identifier,
                direction,
            } => {
                self.identification_event(block, event_type, identifier, direction);
                Ok(CommandOutcome::Applied)
            }
            Message::Tick { now_ms } => {
                self.tick(now_ms);
                Ok(CommandOutcome::Applied)
            }
            Message::Command(cmd) => self.execute(cmd),
        }
    }

    /// Run one operator command.
    pub fn execute(&mut self, cmd: WorldCommand) -> Result<CommandOutcome, TrackingError> {
        tracing::debug!(command = cmd.name(), "command");
        match cmd {
            WorldCommand::AssignTrain { block, train } => {
                self.assign_train(block, train).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::RemoveTrain { block, train } => {
                self.remove_train(block, train).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::FlipTrain { block } => {
                self.flip_train(block).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::SetBlockFree { block } => {
                self.set_block_free(block).map(CommandOutcome::Accepted)
            }
            WorldCommand::ReservePath {
                path,
                train,
                dry_run,
            } => self
                .reserve_path(path, train, dry_run)
                .map(CommandOutcome::Accepted),
            WorldCommand::ReleasePath { path, dry_run } => {
                self.release_path(path, dry_run).map(CommandOutcome::Accepted)
            }
            WorldCommand::SetPathReady { path, ready } => {
                self.set_path_ready(path, ready).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::LockPath { path, locked } => {
                self.lock_path(path, locked).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::SetTrainStopped { train, stopped } => self
                .set_train_stopped(train, stopped)
                .map(|_| CommandOutcome::Applied),
            WorldCommand::SetTrainPowered { train, powered } => self
                .set_train_powered(train, powered)
                .map(|_| CommandOutcome::Applied),
            WorldCommand::SetTrainMode { train, mode } => {
                self.set_train_mode(train, mode).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::RemoveTrainFromLayout { train } => self
                .remove_train_from_layout(train)
                .map(|_| CommandOutcome::Applied),
            WorldCommand::SetZoneMute { zone, mute } => {
                self.set_zone_mute(zone, mute).map(|_| CommandOutcome::Applied)
            }
            WorldCommand::SetZoneNoSmoke { zone, no_smoke } => self
                .set_zone_no_smoke(zone, no_smoke)
                .map(|_| CommandOutcome::Applied),
            WorldCommand::SetZoneSpeedLimit { zone, limit } => self
                .set_zone_speed_limit(zone, limit)
                .map(|_| CommandOutcome::Applied),
        }
    }

    // ------------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------------

    /// Verify that every join record is listed on both of its owners and
    /// that derived block state matches the sensors.
    ///
    /// A failure here is a programming error, never a runtime condition.
    pub fn check_consistency(&self) -> Result<(), alloc::string::String> {
        use alloc::format;

        for (id, status) in &self.block_statuses {
            let block = self
                .blocks
                .get(&status.block)
                .ok_or_else(|| format!("{id} refers to missing {}", status.block))?;
            if !block.trains.contains(id) {
                return Err(format!("{id} missing from {}.trains", status.block));
            }
            if let Some(train) = status.train {
                let t = self
                    .trains
                    .get(&train)
                    .ok_or_else(|| format!("{id} refers to missing {train}"))?;
                let listed = t.blocks.iter().chain(t.reserved.iter()).filter(|s| *s == id).count();
                if listed != 1 {
                    return Err(format!("{id} listed {listed} times on {train}"));
                }
            }
        }

        for block in self.blocks.values() {
            for id in &block.trains {
                if self.block_statuses.get(id).map(|s| s.block) != Some(block.id) {
                    return Err(format!("{} lists foreign or dead {id}", block.id));
                }
            }
            let occupied = block.inputs.iter().any(|s| *s == crate::SensorState::Occupied);
            if occupied != (block.state == crate::BlockState::Occupied) {
                return Err(format!("{} state {:?} disagrees with sensors", block.id, block.state));
            }
            if block.state == crate::BlockState::Free
                && (!block.trains.is_empty() || block.reservations.any())
            {
                return Err(format!("{} is free but claimed", block.id));
            }
        }

        for train in self.trains.values() {
            for id in train.blocks.iter().chain(train.reserved.iter()) {
                if self.block_statuses.get(id).and_then(|s| s.train) != Some(train.id) {
                    return Err(format!("{} lists foreign or dead {id}", train.id));
                }
            }
            if train.active == train.blocks.is_empty() {
                return Err(format!("{} active flag disagrees with its blocks", train.id));
            }
            for id in &train.zones {
                let status = self
                    .zone_statuses
                    .get(id)
                    .ok_or_else(|| format!("{} lists dead {id}", train.id))?;
                let zone_lists = self
                    .zones
                    .get(&status.zone)
                    .map(|z| z.trains.contains(id))
                    .unwrap_or(false);
                if status.train != train.id || !zone_lists {
                    return Err(format!("{id} not mirrored on {}", status.zone));
                }
            }
        }

        for (id, status) in &self.zone_statuses {
            let train_lists = self
                .trains
                .get(&status.train)
                .map(|t| t.zones.contains(id))
                .unwrap_or(false);
            if !train_lists {
                return Err(format!("{id} missing from {}.zones", status.train));
            }
        }

        Ok(())
    }
}
