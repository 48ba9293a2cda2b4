//! Save and restore of the tracking state.
//!
//! A [`WorldSnapshot`] is a plain, serde-friendly copy of everything a
//! [`World`] owns: entities, join records, pending path releases, the id
//! counter and the clock. Queued events are not part of it; drain them
//! before saving.
//!
//! # Example
//!
//! ```rust
//! use rs_interlock::World;
//! use rs_interlock::config::WorldConfig;
//! use rs_interlock::persistence::WorldSnapshot;
//!
//! let mut world = World::default();
//! world.create_block("platform", 2);
//!
//! let json = world.snapshot().to_json().unwrap();
//! let restored = World::restore(WorldSnapshot::from_json(&json).unwrap(), WorldConfig::default()).unwrap();
//! assert_eq!(restored.blocks().count(), 1);
//! ```

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::block::Block;
use crate::config::WorldConfig;
use crate::error::TrackingError;
use crate::path::{BlockPath, PendingRelease};
use crate::status::{TrainBlockStatus, TrainZoneStatus};
use crate::train::Train;
use crate::world::World;
use crate::zone::Zone;

/// Format version written by [`World::snapshot`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable copy of a [`World`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WorldSnapshot {
    /// Format version.
    pub version: u32,
    /// Blocks with their sensor vectors and reservations.
    pub blocks: Vec<Block>,
    /// Trains.
    pub trains: Vec<Train>,
    /// Zones.
    pub zones: Vec<Zone>,
    /// Paths.
    pub paths: Vec<BlockPath>,
    /// Train/block join records.
    pub block_statuses: Vec<TrainBlockStatus>,
    /// Train/zone join records.
    pub zone_statuses: Vec<TrainZoneStatus>,
    /// Delayed path releases not yet due.
    pub pending_releases: Vec<PendingRelease>,
    /// Last id handed out.
    pub next_id: u32,
    /// Clock at save time.
    pub now_ms: u64,
}

impl WorldSnapshot {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Insert every item keyed by its id, refusing duplicates and ids the
/// counter has not reached yet.
fn index<K: Ord + Copy + core::fmt::Display, V>(
    items: Vec<V>,
    next_id: u32,
    key: impl Fn(&V) -> (K, u32),
) -> Result<BTreeMap<K, V>, TrackingError> {
    let mut map = BTreeMap::new();
    for item in items {
        let (id, raw) = key(&item);
        if raw > next_id {
            return Err(TrackingError::Snapshot(format!("{id} is beyond next id {next_id}")));
        }
        if map.insert(id, item).is_some() {
            return Err(TrackingError::Snapshot(format!("duplicate {id}")));
        }
    }
    Ok(map)
}

impl World {
    /// Copy the current state.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            blocks: self.blocks.values().cloned().collect(),
            trains: self.trains.values().cloned().collect(),
            zones: self.zones.values().cloned().collect(),
            paths: self.paths.values().cloned().collect(),
            block_statuses: self.block_statuses.values().cloned().collect(),
            zone_statuses: self.zone_statuses.values().cloned().collect(),
            pending_releases: self.pending_releases.clone(),
            next_id: self.next_id,
            now_ms: self.now_ms,
        }
    }

    /// Rebuild a world from a snapshot.
    ///
    /// Fails with [`TrackingError::Snapshot`] if the version is unknown, an
    /// id repeats, or the cross references do not line up.
    pub fn restore(snapshot: WorldSnapshot, config: WorldConfig) -> Result<Self, TrackingError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TrackingError::Snapshot(format!(
                "unsupported version {}",
                snapshot.version
            )));
        }
        let next_id = snapshot.next_id;

        let mut world = World::new(config);
        world.blocks = index(snapshot.blocks, next_id, |b| (b.id, b.id.0))?;
        world.trains = index(snapshot.trains, next_id, |t| (t.id, t.id.0))?;
        world.zones = index(snapshot.zones, next_id, |z| (z.id, z.id.0))?;
        world.paths = index(snapshot.paths, next_id, |p| (p.id, p.id.0))?;
        world.block_statuses = index(snapshot.block_statuses, next_id, |s| (s.id, s.id.0))?;
        world.zone_statuses = index(snapshot.zone_statuses, next_id, |s| (s.id, s.id.0))?;
        world.pending_releases = snapshot.pending_releases;
        world.next_id = next_id;
        world.now_ms = snapshot.now_ms;

        for path in world.paths.values() {
            let ends = path.ends;
            if !world.blocks.contains_key(&ends.from_block) || !world.blocks.contains_key(&ends.to_block) {
                return Err(TrackingError::Snapshot(format!("{} has a missing endpoint", path.id)));
            }
        }
        for block in world.blocks.values() {
            for path in block.reservations.a.iter().chain(block.reservations.b.iter()) {
                if !world.paths.contains_key(path) {
                    return Err(TrackingError::Snapshot(format!("{} reserved by missing {path}", block.id)));
                }
            }
        }

        world.check_consistency().map_err(TrackingError::Snapshot)?;
        tracing::info!(
            blocks = world.blocks.len(),
            trains = world.trains.len(),
            zones = world.zones.len(),
            "world restored"
        );
        Ok(world)
    }
}
