//! # rs-interlock
//!
//! Block occupancy, route reservation and zone policy tracking for model
//! railway layouts.
//!
//! ## Features
//!
//! - **Block state**: derived from occupancy sensors, reservations and known occupants
//! - **Sensor disambiguation**: an anonymous "something entered" report is matched to
//!   exactly one plausible train, or left alone
//! - **Reservations**: per-side block claims through paths, with delayed release behind
//!   a departing train
//! - **Zones**: mute, no-smoke and speed-limit policy applied as trains enter and leave
//! - **Exactly-once bookkeeping**: every train/block and train/zone relationship is a
//!   join record created and destroyed in one place
//!
//! ## Architecture
//!
//! - `types` - Id handles and shared enums
//! - `world` - Registry owning every entity, message dispatch, event queue
//! - `block`, `path`, `train`, `zone` - Entity data and their operations
//! - `tracking` - The orchestrator that keeps join records and zone memberships consistent
//! - `commands`, `events` - Inbound messages and outbound events
//! - `hal` - Test doubles (mock clock, recording sink)
//! - `services` - Tokio logic task (feature `runtime`)
//!
//! ## Example
//!
//! ```rust
//! use rs_interlock::{
//!     BlockSide, BlockState, Message, PathEnds, SensorState, World, WorldCommand,
//! };
//!
//! let mut world = World::default();
//! let yard = world.create_block("yard", 1);
//! let main = world.create_block("main", 1);
//! for block in [yard, main] {
//!     world.input_changed(block, 0, SensorState::Free);
//! }
//! let path = world
//!     .update_paths(yard, vec![PathEnds::new(yard, BlockSide::B, main, BlockSide::A)])
//!     .unwrap()[0];
//!
//! // Place a locomotive in the yard, facing the main line
//! let loco = world.create_train("V 100");
//! world.dispatch(WorldCommand::AssignTrain { block: yard, train: loco }.into()).unwrap();
//! world.dispatch(WorldCommand::FlipTrain { block: yard }.into()).unwrap();
//! world.input_changed(yard, 0, SensorState::Occupied);
//!
//! // Reserve the way out; the main line is now claimed for it
//! world.reserve_path(path, loco, false).unwrap();
//! assert_eq!(world.block(main).unwrap().state, BlockState::Reserved);
//!
//! // The train arrives
//! world.dispatch(Message::SensorChanged { block: main, input: 0, value: SensorState::Occupied }).unwrap();
//! assert_eq!(world.train_blocks(loco).unwrap(), vec![main, yard]);
//!
//! // The yard clears behind it
//! world.input_changed(yard, 0, SensorState::Free);
//! assert_eq!(world.train_blocks(loco).unwrap(), vec![main]);
//! ```

#![warn(missing_docs)]

extern crate alloc;

/// Block data, derived state and block-level operations.
pub mod block;
/// Inbound messages and operator commands.
pub mod commands;
/// Configuration with builder-style setters.
pub mod config;
/// Error types for operator-driven operations.
pub mod error;
/// Events for the automation layer.
pub mod events;
/// Test doubles for clock and event delivery.
pub mod hal;
/// Paths between blocks and delayed release.
pub mod path;
/// Join records between trains and blocks or zones.
pub mod status;
/// The orchestrator for every cross-entity transition.
pub mod tracking;
/// Train data, policy and operator setters.
pub mod train;
/// Clock and event sink abstractions.
pub mod traits;
/// Id handles and shared enums.
pub mod types;
/// The registry owning every entity.
pub mod world;
/// Zone data and policy setters.
pub mod zone;

/// Snapshot save and restore (serde-based).
#[cfg(feature = "serde")]
pub mod persistence;

/// Async logic task (feature-gated).
pub mod services;

// Re-exports for convenience
pub use block::{Block, SideReservations, MAX_BLOCK_TRAINS};
pub use commands::{CommandOutcome, Message, WorldCommand};
pub use error::{InvalidOperation, TrackingError};
pub use events::{BlockEvent, Event, TrainEvent, ZoneEvent};
pub use path::{BlockPath, PathEnds, PendingRelease};
pub use status::{TrainBlockStatus, TrainZoneStatus};
pub use tracking::TrainTracking;
pub use train::{Train, TrainDirection, TrainPolicy};
pub use traits::{Clock, EventSink};
pub use types::{
    BlockId, BlockSide, BlockState, BlockTrainDirection, IdentificationEventType, PathId,
    SensorState, StatusId, TrainId, TrainMode, ZoneId, ZoneMembership, ZoneStatusId,
};
pub use world::World;
pub use zone::Zone;

// Config re-exports
pub use config::{Config, LogConfig, RuntimeConfig, WorldConfig};

#[cfg(feature = "serde")]
pub use persistence::WorldSnapshot;
