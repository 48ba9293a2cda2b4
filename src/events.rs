//! Events emitted for the automation layer.
//!
//! Every transition produces one event per affected entity. For a single
//! transition the train-side event always comes first, followed by the
//! block-side or zone-side event. Events are queued on the
//! [`World`](crate::World) and drained by the caller; this crate never
//! interprets them.
//!
//! # Example
//!
//! ```rust
//! use rs_interlock::{BlockEvent, BlockId, BlockTrainDirection, Event, TrainId};
//!
//! let event = Event::Block(BlockEvent::TrainEntered {
//!     block: BlockId(1),
//!     train: TrainId(2),
//!     direction: BlockTrainDirection::TowardsB,
//! });
//! assert_eq!(event.name(), "block.train_entered");
//! ```

use alloc::string::String;

use crate::train::TrainPolicy;
use crate::types::{BlockId, BlockState, BlockTrainDirection, TrainId, ZoneId};

/// Any event produced by the tracking core.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Event {
    /// Fired on a train.
    Train(TrainEvent),
    /// Fired on a block.
    Block(BlockEvent),
    /// Fired on a zone.
    Zone(ZoneEvent),
}

impl Event {
    /// Scripting name of the event, `<entity>.<event>`.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Train(e) => e.name(),
            Event::Block(e) => e.name(),
            Event::Zone(e) => e.name(),
        }
    }
}

/// Events fired on a train.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum TrainEvent {
    /// Placed into a block by the operator.
    BlockAssigned {
        /// Train.
        train: TrainId,
        /// Block.
        block: BlockId,
    },
    /// A block was reserved ahead of the train.
    BlockReserved {
        /// Train.
        train: TrainId,
        /// Block.
        block: BlockId,
        /// Orientation in the block.
        direction: BlockTrainDirection,
    },
    /// The train physically entered a block.
    BlockEntered {
        /// Train.
        train: TrainId,
        /// Block.
        block: BlockId,
        /// Orientation in the block.
        direction: BlockTrainDirection,
    },
    /// The train left a block.
    BlockLeft {
        /// Train.
        train: TrainId,
        /// Block.
        block: BlockId,
        /// Orientation in the block.
        direction: BlockTrainDirection,
    },
    /// The operator removed the train from a block.
    BlockRemoved {
        /// Train.
        train: TrainId,
        /// Block.
        block: BlockId,
    },
    /// Placed into a zone by assignment.
    ZoneAssigned {
        /// Train.
        train: TrainId,
        /// Zone.
        zone: ZoneId,
    },
    /// A block of the zone was claimed ahead of the train.
    ZoneEntering {
        /// Train.
        train: TrainId,
        /// Zone.
        zone: ZoneId,
    },
    /// The train is physically inside the zone.
    ZoneEntered {
        /// Train.
        train: TrainId,
        /// Zone.
        zone: ZoneId,
    },
    /// The train is heading out of the zone.
    ZoneLeaving {
        /// Train.
        train: TrainId,
        /// Zone.
        zone: ZoneId,
    },
    /// The train no longer touches the zone.
    ZoneLeft {
        /// Train.
        train: TrainId,
        /// Zone.
        zone: ZoneId,
    },
    /// The operator removed the train and with it the zone membership.
    ZoneRemoved {
        /// Train.
        train: TrainId,
        /// Zone.
        zone: ZoneId,
    },
    /// Effective mute/no-smoke/speed-limit changed.
    PolicyChanged {
        /// Train.
        train: TrainId,
        /// New effective policy.
        policy: TrainPolicy,
    },
}

impl TrainEvent {
    /// Scripting name.
    pub fn name(&self) -> &'static str {
        match self {
            TrainEvent::BlockAssigned { .. } => "train.block_assigned",
            TrainEvent::BlockReserved { .. } => "train.block_reserved",
            TrainEvent::BlockEntered { .. } => "train.block_entered",
            TrainEvent::BlockLeft { .. } => "train.block_left",
            TrainEvent::BlockRemoved { .. } => "train.block_removed",
            TrainEvent::ZoneAssigned { .. } => "train.zone_assigned",
            TrainEvent::ZoneEntering { .. } => "train.zone_entering",
            TrainEvent::ZoneEntered { .. } => "train.zone_entered",
            TrainEvent::ZoneLeaving { .. } => "train.zone_leaving",
            TrainEvent::ZoneLeft { .. } => "train.zone_left",
            TrainEvent::ZoneRemoved { .. } => "train.zone_removed",
            TrainEvent::PolicyChanged { .. } => "train.policy_changed",
        }
    }
}

/// Events fired on a block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum BlockEvent {
    /// A train was placed here by the operator.
    TrainAssigned {
        /// Block.
        block: BlockId,
        /// Train.
        train: TrainId,
    },
    /// The block was reserved for a train.
    TrainReserved {
        /// Block.
        block: BlockId,
        /// Train.
        train: TrainId,
        /// Orientation in the block.
        direction: BlockTrainDirection,
    },
    /// A train physically entered.
    TrainEntered {
        /// Block.
        block: BlockId,
        /// Train.
        train: TrainId,
        /// Orientation in the block.
        direction: BlockTrainDirection,
    },
    /// A train left.
    TrainLeft {
        /// Block.
        block: BlockId,
        /// Train.
        train: TrainId,
        /// Orientation in the block.
        direction: BlockTrainDirection,
    },
    /// The operator removed a train.
    TrainRemoved {
        /// Block.
        block: BlockId,
        /// Train.
        train: TrainId,
    },
    /// An identification reader reported an identifier present.
    IdentificationPresent {
        /// Block.
        block: BlockId,
        /// `"#<identifier>"`.
        identification: String,
        /// Orientation reported by the reader.
        direction: BlockTrainDirection,
    },
    /// An identification reader reported an identifier gone.
    IdentificationAbsent {
        /// Block.
        block: BlockId,
        /// `"#<identifier>"`.
        identification: String,
    },
    /// The derived state changed.
    StateChanged {
        /// Block.
        block: BlockId,
        /// New state.
        state: BlockState,
    },
}

impl BlockEvent {
    /// Scripting name.
    pub fn name(&self) -> &'static str {
        match self {
            BlockEvent::TrainAssigned { .. } => "block.train_assigned",
            BlockEvent::TrainReserved { .. } => "block.train_reserved",
            BlockEvent::TrainEntered { .. } => "block.train_entered",
            BlockEvent::TrainLeft { .. } => "block.train_left",
            BlockEvent::TrainRemoved { .. } => "block.train_removed",
            BlockEvent::IdentificationPresent { .. } => "block.identification_present",
            BlockEvent::IdentificationAbsent { .. } => "block.identification_absent",
            BlockEvent::StateChanged { .. } => "block.state_changed",
        }
    }
}

/// Events fired on a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum ZoneEvent {
    /// A train was assigned into a block of the zone.
    TrainAssigned {
        /// Zone.
        zone: ZoneId,
        /// Train.
        train: TrainId,
    },
    /// A train has a block of the zone reserved.
    TrainEntering {
        /// Zone.
        zone: ZoneId,
        /// Train.
        train: TrainId,
    },
    /// A train is inside the zone.
    TrainEntered {
        /// Zone.
        zone: ZoneId,
        /// Train.
        train: TrainId,
    },
    /// A train is heading out.
    TrainLeaving {
        /// Zone.
        zone: ZoneId,
        /// Train.
        train: TrainId,
    },
    /// A train is gone.
    TrainLeft {
        /// Zone.
        zone: ZoneId,
        /// Train.
        train: TrainId,
    },
    /// A train was removed by the operator.
    TrainRemoved {
        /// Zone.
        zone: ZoneId,
        /// Train.
        train: TrainId,
    },
}

impl ZoneEvent {
    /// Scripting name.
    pub fn name(&self) -> &'static str {
        match self {
            ZoneEvent::TrainAssigned { .. } => "zone.train_assigned",
            ZoneEvent::TrainEntering { .. } => "zone.train_entering",
            ZoneEvent::TrainEntered { .. } => "zone.train_entered",
            ZoneEvent::TrainLeaving { .. } => "zone.train_leaving",
            ZoneEvent::TrainLeft { .. } => "zone.train_left",
            ZoneEvent::TrainRemoved { .. } => "zone.train_removed",
        }
    }
}
