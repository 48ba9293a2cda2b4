//! Zones: named groups of blocks sharing mute, no-smoke and speed-limit policy.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{InvalidOperation, TrackingError};
use crate::train::TrainPolicy;
use crate::types::{BlockId, TrainId, ZoneId, ZoneStatusId};
use crate::world::World;

/// A group of blocks with shared policy.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Zone {
    /// Handle.
    pub id: ZoneId,
    /// Display name.
    pub name: String,
    /// Trains in this zone have their sound muted.
    pub mute: bool,
    /// Trains in this zone have their smoke generators off.
    pub no_smoke: bool,
    /// Speed limit in km/h, `None` for no limit.
    pub speed_limit: Option<f32>,
    /// Member blocks.
    pub blocks: BTreeSet<BlockId>,
    /// Membership records of trains touching this zone.
    pub trains: Vec<ZoneStatusId>,
}

impl Zone {
    pub(crate) fn new(id: ZoneId, name: &str) -> Self {
        Self {
            id,
            name: String::from(name),
            mute: false,
            no_smoke: false,
            speed_limit: None,
            blocks: BTreeSet::new(),
            trains: Vec::new(),
        }
    }

    /// This zone's contribution to a train's effective policy.
    pub fn policy(&self) -> TrainPolicy {
        TrainPolicy {
            mute: self.mute,
            no_smoke: self.no_smoke,
            speed_limit: self.speed_limit,
        }
    }
}

impl World {
    /// Create an empty zone with no policy.
    pub fn create_zone(&mut self, name: &str) -> ZoneId {
        let id = ZoneId(self.allocate_id());
        self.zones.insert(id, Zone::new(id, name));
        id
    }

    /// Delete a zone no train is currently associated with.
    pub fn delete_zone(&mut self, zone: ZoneId) -> Result<(), TrackingError> {
        let z = self.zone(zone)?;
        if let Some(train) = z
            .trains
            .first()
            .and_then(|id| self.zone_statuses.get(id))
            .map(|s| s.train)
        {
            return Err(InvalidOperation::TrainActive(train).into());
        }
        let blocks: Vec<BlockId> = z.blocks.iter().copied().collect();
        for block in blocks {
            if let Some(b) = self.blocks.get_mut(&block) {
                b.zones.remove(&zone);
            }
        }
        self.zones.remove(&zone);
        Ok(())
    }

    /// Add a block to a zone. Fails while the block has occupants, because
    /// their memberships would be skipped.
    pub fn add_block_to_zone(&mut self, zone: ZoneId, block: BlockId) -> Result<(), TrackingError> {
        self.zone(zone)?;
        let b = self.block(block)?;
        if !b.trains.is_empty() {
            return Err(InvalidOperation::BlockNotEmpty(block).into());
        }
        self.block_mut(block)?.zones.insert(zone);
        self.zone_mut(zone)?.blocks.insert(block);
        Ok(())
    }

    /// Remove a block from a zone. Fails while the block has occupants.
    pub fn remove_block_from_zone(
        &mut self,
        zone: ZoneId,
        block: BlockId,
    ) -> Result<(), TrackingError> {
        self.zone(zone)?;
        let b = self.block(block)?;
        if !b.trains.is_empty() {
            return Err(InvalidOperation::BlockNotEmpty(block).into());
        }
        self.block_mut(block)?.zones.remove(&zone);
        self.zone_mut(zone)?.blocks.remove(&block);
        Ok(())
    }

    /// Toggle sound muting for trains in the zone.
    pub fn set_zone_mute(&mut self, zone: ZoneId, mute: bool) -> Result<(), TrackingError> {
        self.zone_mut(zone)?.mute = mute;
        self.refresh_zone_trains(zone);
        Ok(())
    }

    /// Toggle smoke suppression for trains in the zone.
    pub fn set_zone_no_smoke(&mut self, zone: ZoneId, no_smoke: bool) -> Result<(), TrackingError> {
        self.zone_mut(zone)?.no_smoke = no_smoke;
        self.refresh_zone_trains(zone);
        Ok(())
    }

    /// Set or clear the zone speed limit (km/h).
    pub fn set_zone_speed_limit(
        &mut self,
        zone: ZoneId,
        limit: Option<f32>,
    ) -> Result<(), TrackingError> {
        self.zone_mut(zone)?.speed_limit = limit.map(|l| l.max(0.0));
        self.refresh_zone_trains(zone);
        Ok(())
    }

    fn refresh_zone_trains(&mut self, zone: ZoneId) {
        let trains: Vec<TrainId> = self
            .zones
            .get(&zone)
            .map(|z| {
                z.trains
                    .iter()
                    .filter_map(|id| self.zone_statuses.get(id))
                    .map(|s| s.train)
                    .collect()
            })
            .unwrap_or_default();
        for train in trains {
            self.update_train_policy(train);
        }
    }
}
