//! Trains: the moving entities tracked across blocks and zones.
//!
//! A [`Train`] only stores handles. The ordered `blocks` list is the train's
//! physical footprint, head first; `reserved` holds blocks claimed ahead of
//! it that it has not reached yet. Both lists are edited exclusively by
//! [`TrainTracking`](crate::TrainTracking).

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{InvalidOperation, TrackingError};
use crate::events::{Event, TrainEvent};
use crate::tracking::TrainTracking;
use crate::types::{
    BlockId, SensorState, StatusId, TrainId, TrainMode, ZoneId, ZoneMembership, ZoneStatusId,
};
use crate::world::World;

/// Travel direction of the train itself (not relative to a block).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TrainDirection {
    /// Locomotive leading.
    #[default]
    Forward,
    /// Locomotive pushing.
    Reverse,
}

/// Policy a train inherits from the zones it has entered.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainPolicy {
    /// Sound muted.
    pub mute: bool,
    /// Smoke generators off.
    pub no_smoke: bool,
    /// Lowest speed limit of all entered zones, if any zone sets one.
    pub speed_limit: Option<f32>,
}

impl TrainPolicy {
    /// Combine with another zone's policy: flags are OR-ed, limits take the minimum.
    pub fn union(self, other: TrainPolicy) -> Self {
        let speed_limit = match (self.speed_limit, other.speed_limit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            mute: self.mute || other.mute,
            no_smoke: self.no_smoke || other.no_smoke,
            speed_limit,
        }
    }
}

/// A train on (or off) the layout.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Train {
    /// Handle.
    pub id: TrainId,
    /// Display name.
    pub name: String,
    /// Entered block records, head (most recent) first, tail last.
    pub blocks: Vec<StatusId>,
    /// Block records reserved ahead of the train, oldest first.
    pub reserved: Vec<StatusId>,
    /// Zone membership records.
    pub zones: Vec<ZoneStatusId>,
    /// True while the train occupies at least one block.
    pub active: bool,
    /// Speed is zero.
    pub is_stopped: bool,
    /// Track power is on for this train.
    pub powered: bool,
    /// Travel direction.
    pub direction: TrainDirection,
    /// Driving mode.
    pub mode: TrainMode,
    /// Effective zone policy, re-derived on every zone membership change.
    pub policy: TrainPolicy,
}

impl Train {
    pub(crate) fn new(id: TrainId, name: &str) -> Self {
        Self {
            id,
            name: String::from(name),
            blocks: Vec::new(),
            reserved: Vec::new(),
            zones: Vec::new(),
            active: false,
            is_stopped: true,
            powered: false,
            direction: TrainDirection::default(),
            mode: TrainMode::default(),
            policy: TrainPolicy::default(),
        }
    }

    /// Record of the leading block.
    pub fn head(&self) -> Option<StatusId> {
        self.blocks.first().copied()
    }

    /// Record of the trailing block.
    pub fn tail(&self) -> Option<StatusId> {
        self.blocks.last().copied()
    }

    /// True if the train is moving under its own power and could trip a
    /// sensor ahead of it.
    pub fn is_running(&self) -> bool {
        self.powered && !self.is_stopped
    }
}

// ============================================================================
// Train operations
// ============================================================================

impl World {
    /// Add a train to the roster. It starts stopped, unpowered and inactive.
    pub fn create_train(&mut self, name: &str) -> TrainId {
        let id = TrainId(self.allocate_id());
        self.trains.insert(id, Train::new(id, name));
        id
    }

    /// Delete a train that is not on the layout.
    pub fn delete_train(&mut self, train: TrainId) -> Result<(), TrackingError> {
        let t = self.train(train)?;
        if t.active || !t.reserved.is_empty() {
            return Err(InvalidOperation::TrainActive(train).into());
        }
        self.trains.remove(&train);
        Ok(())
    }

    /// Mark the train stopped or moving.
    pub fn set_train_stopped(&mut self, train: TrainId, stopped: bool) -> Result<(), TrackingError> {
        self.train_mut(train)?.is_stopped = stopped;
        Ok(())
    }

    /// Switch track power for the train.
    pub fn set_train_powered(&mut self, train: TrainId, powered: bool) -> Result<(), TrackingError> {
        self.train_mut(train)?.powered = powered;
        Ok(())
    }

    /// Change how the train is driven.
    pub fn set_train_mode(&mut self, train: TrainId, mode: TrainMode) -> Result<(), TrackingError> {
        self.train_mut(train)?.mode = mode;
        Ok(())
    }

    /// Set the train's own travel direction.
    pub fn set_train_direction(
        &mut self,
        train: TrainId,
        direction: TrainDirection,
    ) -> Result<(), TrackingError> {
        self.train_mut(train)?.direction = direction;
        Ok(())
    }

    /// Detach a stopped train from every block it holds, reserved ones included.
    pub fn remove_train_from_layout(&mut self, train: TrainId) -> Result<(), TrackingError> {
        let t = self.train(train)?;
        if !t.is_stopped {
            return Err(InvalidOperation::TrainNotStopped(train).into());
        }
        let records: Vec<(StatusId, BlockId)> = t
            .reserved
            .iter()
            .chain(t.blocks.iter())
            .filter_map(|id| self.block_statuses.get(id).map(|s| (*id, s.block)))
            .collect();

        for (status, block) in records {
            TrainTracking::removed(self, status)?;
            self.simulate_inputs(block, SensorState::Free);
        }
        tracing::info!(%train, "train removed from layout");
        self.settle();
        Ok(())
    }

    /// Re-derive the train's policy from its `Entered` zones.
    ///
    /// Fires [`TrainEvent::PolicyChanged`] only if the value actually changed.
    pub(crate) fn update_train_policy(&mut self, train: TrainId) {
        let entered: Vec<ZoneId> = match self.trains.get(&train) {
            Some(t) => t
                .zones
                .iter()
                .filter_map(|id| self.zone_statuses.get(id))
                .filter(|s| s.membership == ZoneMembership::Entered)
                .map(|s| s.zone)
                .collect(),
            None => return,
        };

        let policy = entered
            .iter()
            .filter_map(|zone| self.zones.get(zone))
            .fold(TrainPolicy::default(), |acc, zone| acc.union(zone.policy()));

        let Some(t) = self.trains.get_mut(&train) else {
            return;
        };
        if t.policy != policy {
            t.policy = policy;
            tracing::debug!(%train, ?policy, "train policy changed");
            self.push_event(Event::Train(TrainEvent::PolicyChanged { train, policy }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_union_ors_flags() {
        let a = TrainPolicy {
            mute: true,
            ..Default::default()
        };
        let b = TrainPolicy {
            no_smoke: true,
            ..Default::default()
        };
        let u = a.union(b);
        assert!(u.mute);
        assert!(u.no_smoke);
        assert_eq!(u.speed_limit, None);
    }

    #[test]
    fn policy_union_takes_lowest_limit() {
        let a = TrainPolicy {
            speed_limit: Some(40.0),
            ..Default::default()
        };
        let b = TrainPolicy {
            speed_limit: Some(25.0),
            ..Default::default()
        };
        assert_eq!(a.union(b).speed_limit, Some(25.0));
        assert_eq!(a.union(TrainPolicy::default()).speed_limit, Some(40.0));
    }

    #[test]
    fn new_train_is_idle() {
        let t = Train::new(TrainId(1), "ICE");
        assert!(!t.active);
        assert!(t.is_stopped);
        assert!(!t.is_running());
        assert_eq!(t.head(), None);
        assert_eq!(t.mode, TrainMode::ManualUnsupervised);
    }

    #[test]
    fn create_and_delete_train() {
        let mut world = World::default();
        let train = world.create_train("BR 218");
        assert_eq!(world.train(train).map(|t| t.name.as_str()), Ok("BR 218"));
        world.delete_train(train).unwrap();
        assert_eq!(world.train(train).err(), Some(TrackingError::UnknownTrain(train)));
    }

    #[test]
    fn setters_reject_unknown_train() {
        let mut world = World::default();
        assert_eq!(
            world.set_train_stopped(TrainId(99), false),
            Err(TrackingError::UnknownTrain(TrainId(99)))
        );
    }
}
