//! Paths between blocks and their reservation lifecycle.
//!
//! Route finding and turnout control live outside this crate. A path here
//! is just "from this side of block X to that side of block Y", with two
//! flags the route layer maintains: `ready` (turnouts are set) and `locked`
//! (the route is set for manual running). Reserving a path claims both end
//! blocks for a train.
//!
//! When a train leaves a block, the path it left through is released after
//! [`WorldConfig::path_release_delay_ms`](crate::config::WorldConfig). A
//! pending release remembers the path's reservation generation: if the path
//! was released and reserved again in between, the stale release is dropped
//! instead of cancelling the new reservation.

use alloc::vec::Vec;

use crate::error::TrackingError;
use crate::tracking::TrainTracking;
use crate::types::{BlockId, BlockSide, PathId, StatusId, TrainId};
use crate::world::World;

/// The two ends of a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathEnds {
    /// Block the path starts in.
    pub from_block: BlockId,
    /// Side of `from_block` the path leaves through.
    pub from_side: BlockSide,
    /// Block the path ends in.
    pub to_block: BlockId,
    /// Side of `to_block` the path enters through.
    pub to_side: BlockSide,
}

impl PathEnds {
    /// Convenience constructor.
    pub fn new(from_block: BlockId, from_side: BlockSide, to_block: BlockId, to_side: BlockSide) -> Self {
        Self {
            from_block,
            from_side,
            to_block,
            to_side,
        }
    }
}

/// A route between two adjacent blocks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockPath {
    /// Handle.
    pub id: PathId,
    /// Endpoints.
    pub ends: PathEnds,
    /// Turnouts along the path are in position.
    pub ready: bool,
    /// Set for manual running without claiming the end blocks.
    pub locked: bool,
    /// Train holding the path, if reserved.
    pub reserved_by: Option<TrainId>,
    /// Bumped on every successful reservation.
    pub generation: u32,
}

impl BlockPath {
    fn new(id: PathId, ends: PathEnds) -> Self {
        Self {
            id,
            ends,
            ready: false,
            locked: false,
            reserved_by: None,
            generation: 0,
        }
    }

    /// Held for a train, or set for manual running.
    pub fn is_reserved(&self) -> bool {
        self.reserved_by.is_some() || self.locked
    }

    /// Turnouts are set.
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

/// A release scheduled by a train leaving a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingRelease {
    /// Path to release.
    pub path: PathId,
    /// Reservation generation at scheduling time.
    pub generation: u32,
    /// Release once the clock reaches this value.
    pub due_ms: u64,
}

impl World {
    /// Replace the set of paths leaving `block`.
    ///
    /// Paths whose endpoints are unchanged keep their id and reservation.
    /// Paths that disappeared are released and removed from both ends.
    /// Entries not starting at `block`, or ending at an unknown block, are
    /// skipped.
    pub fn update_paths(&mut self, block: BlockId, ends: Vec<PathEnds>) -> Result<Vec<PathId>, TrackingError> {
        let existing: Vec<PathId> = self.block(block)?.paths.clone();

        for id in &existing {
            let keep = self
                .paths
                .get(id)
                .map(|p| ends.contains(&p.ends))
                .unwrap_or(false);
            if !keep {
                self.remove_path(*id);
            }
        }

        let mut ids = Vec::with_capacity(ends.len());
        for end in ends {
            if end.from_block != block || !self.blocks.contains_key(&end.to_block) {
                tracing::warn!(%block, to = %end.to_block, "skipping path with foreign endpoints");
                continue;
            }
            let found = self
                .block(block)?
                .paths
                .iter()
                .copied()
                .find(|id| self.paths.get(id).map(|p| p.ends) == Some(end));
            let id = match found {
                Some(id) => id,
                None => self.add_path(end),
            };
            ids.push(id);
        }
        Ok(ids)
    }

    fn add_path(&mut self, ends: PathEnds) -> PathId {
        let id = PathId(self.allocate_id());
        self.paths.insert(id, BlockPath::new(id, ends));
        if let Some(from) = self.blocks.get_mut(&ends.from_block) {
            from.paths.push(id);
        }
        if let Some(to) = self.blocks.get_mut(&ends.to_block) {
            to.incoming_paths.push(id);
        }
        tracing::debug!(path = %id, from = %ends.from_block, to = %ends.to_block, "path added");
        id
    }

    pub(crate) fn remove_path(&mut self, path: PathId) {
        if let Err(err) = self.release_path(path, false) {
            tracing::warn!(%path, %err, "release before removal failed");
        }
        let Some(p) = self.paths.remove(&path) else {
            return;
        };
        if let Some(from) = self.blocks.get_mut(&p.ends.from_block) {
            from.paths.retain(|id| *id != path);
        }
        if let Some(to) = self.blocks.get_mut(&p.ends.to_block) {
            to.incoming_paths.retain(|id| *id != path);
        }
        self.pending_releases.retain(|r| r.path != path);
        tracing::debug!(%path, "path removed");
    }

    /// Record whether the turnouts along `path` are in position.
    pub fn set_path_ready(&mut self, path: PathId, ready: bool) -> Result<(), TrackingError> {
        self.path_mut(path)?.ready = ready;
        Ok(())
    }

    /// Mark `path` as set for manual running without claiming its blocks.
    pub fn lock_path(&mut self, path: PathId, locked: bool) -> Result<(), TrackingError> {
        self.path_mut(path)?.locked = locked;
        Ok(())
    }

    /// Reserve `path` for `train`, claiming both end blocks.
    ///
    /// Returns `Ok(false)` if the path is already held or either block
    /// refuses. With `dry_run` nothing changes.
    pub fn reserve_path(&mut self, path: PathId, train: TrainId, dry_run: bool) -> Result<bool, TrackingError> {
        let p = self.path(path)?.clone();
        self.train(train)?;
        if p.reserved_by.is_some() {
            return Ok(false);
        }
        let PathEnds {
            from_block,
            from_side,
            to_block,
            to_side,
        } = p.ends;

        let possible = self.reserve_block(from_block, path, train, from_side, true)?
            && self.reserve_block(to_block, path, train, to_side, true)?;
        if !possible || dry_run {
            return Ok(possible);
        }

        if !self.reserve_block(from_block, path, train, from_side, false)? {
            return Ok(false);
        }
        if !self.reserve_block(to_block, path, train, to_side, false)? {
            self.release_block(from_block, from_side, false)?;
            if let Some(status) = self.unreached_reservation(from_block, train) {
                TrainTracking::left(self, status)?;
            }
            return Ok(false);
        }

        let p = self.path_mut(path)?;
        p.reserved_by = Some(train);
        p.generation = p.generation.wrapping_add(1);
        tracing::info!(%path, %train, "path reserved");
        Ok(true)
    }

    /// Release `path` and whatever block sides it still holds.
    ///
    /// An end block the train never reached, and that no other path holds,
    /// loses the train's reservation record as well.
    pub fn release_path(&mut self, path: PathId, dry_run: bool) -> Result<bool, TrackingError> {
        let p = self.path(path)?.clone();
        if dry_run {
            return Ok(true);
        }

        for (block, side) in [
            (p.ends.from_block, p.ends.from_side),
            (p.ends.to_block, p.ends.to_side),
        ] {
            let holds = self
                .blocks
                .get(&block)
                .map(|b| b.reserved_path(side) == Some(path))
                .unwrap_or(false);
            if holds {
                self.release_block(block, side, false)?;
            }
        }

        if let Some(train) = p.reserved_by {
            for block in [p.ends.from_block, p.ends.to_block] {
                if let Some(status) = self.unreached_reservation(block, train) {
                    TrainTracking::left(self, status)?;
                }
            }
        }

        if p.reserved_by.is_some() {
            self.path_mut(path)?.reserved_by = None;
            tracing::info!(%path, "path released");
        }
        Ok(true)
    }

    /// Reserved-only record of `train` in a block no path holds any more.
    fn unreached_reservation(&self, block: BlockId, train: TrainId) -> Option<StatusId> {
        let b = self.blocks.get(&block)?;
        if b.reservations.any() {
            return None;
        }
        let t = self.trains.get(&train)?;
        b.trains.iter().copied().find(|id| {
            t.reserved.contains(id) && self.block_statuses.get(id).and_then(|s| s.train) == Some(train)
        })
    }

    /// Schedule `path` for release after the configured delay.
    pub(crate) fn schedule_release(&mut self, path: PathId) {
        let Some(p) = self.paths.get(&path) else {
            return;
        };
        let due_ms = self.now_ms.saturating_add(self.config.path_release_delay_ms);
        tracing::debug!(%path, due_ms, "path release scheduled");
        self.pending_releases.push(PendingRelease {
            path,
            generation: p.generation,
            due_ms,
        });
    }

    /// Advance the clock and perform every release that has come due.
    ///
    /// Time never runs backwards; an older `now_ms` is ignored.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
        let now = self.now_ms;

        let (due, waiting): (Vec<PendingRelease>, Vec<PendingRelease>) = self
            .pending_releases
            .drain(..)
            .partition(|r| r.due_ms <= now);
        self.pending_releases = waiting;

        for release in due {
            let current = self
                .paths
                .get(&release.path)
                .map(|p| p.generation == release.generation && p.reserved_by.is_some())
                .unwrap_or(false);
            if !current {
                tracing::debug!(path = %release.path, "stale path release dropped");
                continue;
            }
            if let Err(err) = self.release_path(release.path, false) {
                tracing::warn!(path = %release.path, %err, "delayed release failed");
            }
        }
    }

    /// Releases waiting for their due time.
    pub fn pending_releases(&self) -> &[PendingRelease] {
        &self.pending_releases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockState, SensorState};

    fn two_blocks() -> (World, BlockId, BlockId, PathId) {
        let mut world = World::default();
        let a = world.create_block("a", 1);
        let b = world.create_block("b", 1);
        world.input_changed(a, 0, SensorState::Free);
        world.input_changed(b, 0, SensorState::Free);
        let ids = world
            .update_paths(a, alloc::vec![PathEnds::new(a, BlockSide::B, b, BlockSide::A)])
            .unwrap();
        (world, a, b, ids[0])
    }

    #[test]
    fn update_paths_registers_both_ends() {
        let (world, a, b, path) = two_blocks();
        assert_eq!(world.block(a).unwrap().paths, alloc::vec![path]);
        assert_eq!(world.block(b).unwrap().incoming_paths, alloc::vec![path]);
    }

    #[test]
    fn update_paths_keeps_unchanged_ids() {
        let (mut world, a, b, path) = two_blocks();
        let again = world
            .update_paths(a, alloc::vec![PathEnds::new(a, BlockSide::B, b, BlockSide::A)])
            .unwrap();
        assert_eq!(again, alloc::vec![path]);
    }

    #[test]
    fn update_paths_drops_stale_paths() {
        let (mut world, a, b, path) = two_blocks();
        world.update_paths(a, Vec::new()).unwrap();
        assert!(world.path(path).is_err());
        assert!(world.block(a).unwrap().paths.is_empty());
        assert!(world.block(b).unwrap().incoming_paths.is_empty());
    }

    #[test]
    fn free_blocks_are_claimed_on_reserve() {
        let (mut world, _a, b, path) = two_blocks();
        let train = world.create_train("t");
        assert_eq!(world.reserve_path(path, train, true), Ok(true));
        assert_eq!(world.reserve_path(path, train, false), Ok(true));
        assert_eq!(world.block(b).unwrap().state, BlockState::Reserved);
        assert_eq!(world.reserve_path(path, train, false), Ok(false));
    }

    #[test]
    fn dry_run_changes_nothing() {
        let (mut world, a, b, path) = two_blocks();
        let train = world.create_train("t");
        assert_eq!(world.reserve_path(path, train, true), Ok(true));
        assert_eq!(world.block(a).unwrap().state, BlockState::Free);
        assert_eq!(world.block(b).unwrap().state, BlockState::Free);
        assert_eq!(world.path(path).unwrap().reserved_by, None);
        assert_eq!(world.pending_events(), 0);
    }

    #[test]
    fn release_frees_unreached_blocks() {
        let (mut world, a, b, path) = two_blocks();
        let train = world.create_train("t");
        world.assign_train(a, train).unwrap();
        world.flip_train(a).unwrap();
        assert_eq!(world.reserve_path(path, train, false), Ok(true));
        assert_eq!(world.block(b).unwrap().state, BlockState::Reserved);

        assert_eq!(world.release_path(path, false), Ok(true));
        assert_eq!(world.block(b).unwrap().state, BlockState::Free);
        assert!(world.block(b).unwrap().trains.is_empty());
        assert!(world.train(train).unwrap().reserved.is_empty());
        assert_eq!(world.check_consistency(), Ok(()));
    }

    #[test]
    fn stale_release_is_dropped() {
        let (mut world, _a, _b, path) = two_blocks();
        let train = world.create_train("t");
        world.reserve_path(path, train, false).unwrap();
        world.schedule_release(path);

        world.release_path(path, false).unwrap();
        world.reserve_path(path, train, false).unwrap();

        world.tick(60_000);
        assert_eq!(world.path(path).unwrap().reserved_by, Some(train));
        assert!(world.pending_releases().is_empty());
    }

    #[test]
    fn due_release_fires_on_tick() {
        let (mut world, _a, _b, path) = two_blocks();
        let train = world.create_train("t");
        world.reserve_path(path, train, false).unwrap();
        world.schedule_release(path);

        world.tick(world.config().path_release_delay_ms - 1);
        assert_eq!(world.path(path).unwrap().reserved_by, Some(train));

        world.tick(world.config().path_release_delay_ms);
        assert_eq!(world.path(path).unwrap().reserved_by, None);
    }
}
