//! Error types for operator-driven operations.
//!
//! Only commands issued by an operator (or the session layer on their
//! behalf) can fail. Physical events never do: an ambiguous sensor report is
//! logged and left for a later event to resolve, and a refused reservation
//! is a plain `false`.

use crate::types::{BlockId, PathId, StatusId, TrainId, ZoneId};

/// Failure returned by [`World`](crate::World) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackingError {
    /// No block with this id.
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    /// No train with this id.
    #[error("unknown train {0}")]
    UnknownTrain(TrainId),

    /// No zone with this id.
    #[error("unknown zone {0}")]
    UnknownZone(ZoneId),

    /// No path with this id.
    #[error("unknown path {0}")]
    UnknownPath(PathId),

    /// No train/block join record with this id.
    #[error("unknown {0}")]
    UnknownStatus(StatusId),

    /// The command would break a layout invariant.
    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),

    /// A persisted snapshot could not be restored.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

impl TrackingError {
    /// True for the user-visible "you can't do that" class of failures.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, TrackingError::InvalidOperation(_))
    }
}

/// Operator command refused because it violates an invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidOperation {
    /// Trains can only be removed or flipped while stopped.
    #[error("{0} is not stopped")]
    TrainNotStopped(TrainId),

    /// Only the head or tail block of a train can be cleared.
    #[error("{block} is neither head nor tail of {train}")]
    NotHeadOrTail {
        /// Train being removed.
        train: TrainId,
        /// Block it was asked to be removed from.
        block: BlockId,
    },

    /// Assigning needs an empty block.
    #[error("{0} already has a train")]
    BlockNotEmpty(BlockId),

    /// Nothing to remove or flip.
    #[error("{0} has no train")]
    BlockEmpty(BlockId),

    /// A train can only be placed once; remove it first.
    #[error("{0} is already on the layout")]
    TrainAlreadyActive(TrainId),

    /// Trains on the layout cannot be deleted.
    #[error("{0} is still on the layout")]
    TrainActive(TrainId),

    /// The train has no relationship with this block.
    #[error("{train} is not in {block}")]
    TrainNotInBlock {
        /// Train named by the command.
        train: TrainId,
        /// Block named by the command.
        block: BlockId,
    },

    /// Flipping needs exactly one occupant.
    #[error("{0} must have exactly one train to flip")]
    FlipRequiresSingleOccupant(BlockId),

    /// A sensor still reports the block occupied.
    #[error("{0} is occupied")]
    BlockOccupied(BlockId),
}
