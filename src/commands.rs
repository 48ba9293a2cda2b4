//! Inbound messages and operator commands.
//!
//! Everything that changes a [`World`](crate::World) arrives as a
//! [`Message`]. Physical reports (sensors, identification readers, the
//! clock) cannot fail; operator commands are wrapped in
//! [`Message::Command`] and may be refused with a
//! [`TrackingError`](crate::TrackingError).
//!
//! # Message Flow
//!
//! 1. A hardware bridge or session layer builds a [`Message`]
//! 2. [`World::dispatch`](crate::World::dispatch) handles it, then any
//!    follow-up messages it queued (simulated sensors)
//! 3. The resulting events are drained from the world
//!
//! With the `serde` feature both enums are tagged JSON objects:
//!
//! ```rust
//! # #[cfg(feature = "serde")]
//! # {
//! use rs_interlock::{BlockId, Message, SensorState};
//!
//! let msg: Message =
//!     serde_json::from_str(r#"{"type":"sensor_changed","block":3,"input":0,"value":"occupied"}"#)
//!         .unwrap();
//! assert_eq!(
//!     msg,
//!     Message::SensorChanged { block: BlockId(3), input: 0, value: SensorState::Occupied }
//! );
//! # }
//! ```

use crate::types::{
    BlockId, BlockTrainDirection, IdentificationEventType, PathId, SensorState, TrainId, TrainMode,
    ZoneId,
};

// ============================================================================
// Messages
// ============================================================================

/// One unit of work for the logic context.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Message {
    /// A sensor input of a block changed value.
    SensorChanged {
        /// Block the sensor belongs to.
        block: BlockId,
        /// Input index, side A first.
        input: usize,
        /// New value.
        value: SensorState,
    },
    /// An identification reader reported.
    Identification {
        /// Block the reader belongs to.
        block: BlockId,
        /// Kind of report.
        event_type: IdentificationEventType,
        /// Raw identifier (RFID tag, transponder address).
        identifier: u32,
        /// Orientation, if the reader can tell.
        #[cfg_attr(feature = "serde", serde(default))]
        direction: BlockTrainDirection,
    },
    /// Clock advanced; due path releases are performed.
    Tick {
        /// Monotonic time in milliseconds.
        now_ms: u64,
    },
    /// Operator command.
    Command(WorldCommand),
}

impl Message {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Message::SensorChanged { .. } => "sensor_changed",
            Message::Identification { .. } => "identification",
            Message::Tick { .. } => "tick",
            Message::Command(cmd) => cmd.name(),
        }
    }
}

impl From<WorldCommand> for Message {
    fn from(cmd: WorldCommand) -> Self {
        Message::Command(cmd)
    }
}

// ============================================================================
// Operator commands
// ============================================================================

/// Operator-level command.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "command", rename_all = "snake_case"))]
pub enum WorldCommand {
    /// Place a train into an empty block.
    AssignTrain {
        /// Target block.
        block: BlockId,
        /// Train to place.
        train: TrainId,
    },
    /// Take a stopped train out of its head or tail block.
    RemoveTrain {
        /// Block to clear.
        block: BlockId,
        /// Train to remove.
        train: TrainId,
    },
    /// Reverse the sole, stopped occupant.
    FlipTrain {
        /// Block holding the train.
        block: BlockId,
    },
    /// Declare an unclaimed block free.
    SetBlockFree {
        /// Block to clear.
        block: BlockId,
    },
    /// Reserve a path for a train.
    ReservePath {
        /// Path.
        path: PathId,
        /// Train.
        train: TrainId,
        /// Only check.
        #[cfg_attr(feature = "serde", serde(default))]
        dry_run: bool,
    },
    /// Release a path.
    ReleasePath {
        /// Path.
        path: PathId,
        /// Only check.
        #[cfg_attr(feature = "serde", serde(default))]
        dry_run: bool,
    },
    /// Turnouts along a path are (not) in position.
    SetPathReady {
        /// Path.
        path: PathId,
        /// Ready flag.
        ready: bool,
    },
    /// Set a path for manual running without claiming its blocks.
    LockPath {
        /// Path.
        path: PathId,
        /// Lock flag.
        locked: bool,
    },
    /// Train stopped or moving.
    SetTrainStopped {
        /// Train.
        train: TrainId,
        /// Stopped flag.
        stopped: bool,
    },
    /// Track power for a train.
    SetTrainPowered {
        /// Train.
        train: TrainId,
        /// Powered flag.
        powered: bool,
    },
    /// Driving mode of a train.
    SetTrainMode {
        /// Train.
        train: TrainId,
        /// New mode.
        mode: TrainMode,
    },
    /// Detach a stopped train from every block it holds.
    RemoveTrainFromLayout {
        /// Train.
        train: TrainId,
    },
    /// Zone mute flag.
    SetZoneMute {
        /// Zone.
        zone: ZoneId,
        /// Mute flag.
        mute: bool,
    },
    /// Zone no-smoke flag.
    SetZoneNoSmoke {
        /// Zone.
        zone: ZoneId,
        /// No-smoke flag.
        no_smoke: bool,
    },
    /// Zone speed limit in km/h.
    SetZoneSpeedLimit {
        /// Zone.
        zone: ZoneId,
        /// Limit, `None` to clear.
        limit: Option<f32>,
    },
}

impl WorldCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            WorldCommand::AssignTrain { .. } => "assign_train",
            WorldCommand::RemoveTrain { .. } => "remove_train",
            WorldCommand::FlipTrain { .. } => "flip_train",
            WorldCommand::SetBlockFree { .. } => "set_block_free",
            WorldCommand::ReservePath { .. } => "reserve_path",
            WorldCommand::ReleasePath { .. } => "release_path",
            WorldCommand::SetPathReady { .. } => "set_path_ready",
            WorldCommand::LockPath { .. } => "lock_path",
            WorldCommand::SetTrainStopped { .. } => "set_train_stopped",
            WorldCommand::SetTrainPowered { .. } => "set_train_powered",
            WorldCommand::SetTrainMode { .. } => "set_train_mode",
            WorldCommand::RemoveTrainFromLayout { .. } => "remove_train_from_layout",
            WorldCommand::SetZoneMute { .. } => "set_zone_mute",
            WorldCommand::SetZoneNoSmoke { .. } => "set_zone_no_smoke",
            WorldCommand::SetZoneSpeedLimit { .. } => "set_zone_speed_limit",
        }
    }
}

/// What a successful message did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CommandOutcome {
    /// Applied.
    Applied,
    /// Checked or attempted; `false` means refused without error.
    Accepted(bool),
}

impl CommandOutcome {
    /// False only for a refused reservation or an uncleared block.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, CommandOutcome::Accepted(false))
    }
}
