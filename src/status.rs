//! Join records linking trains to blocks and zones.
//!
//! Their existence *is* the relationship. They are created and destroyed
//! only by [`TrainTracking`](crate::TrainTracking), always together with the
//! id lists on both owning entities.

use alloc::string::String;

use crate::types::{BlockId, BlockTrainDirection, StatusId, TrainId, ZoneId, ZoneMembership, ZoneStatusId};

/// A train (or identification placeholder) in a block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainBlockStatus {
    /// Handle of this record.
    pub id: StatusId,
    /// Block side of the relationship.
    pub block: BlockId,
    /// Train side of the relationship; `None` for an identification placeholder.
    pub train: Option<TrainId>,
    /// Orientation of the train within the block.
    pub direction: BlockTrainDirection,
    /// `"#<identifier>"` for placeholders created by an identification reader.
    pub identification: String,
}

impl TrainBlockStatus {
    pub(crate) fn new(
        id: StatusId,
        block: BlockId,
        train: TrainId,
        direction: BlockTrainDirection,
    ) -> Self {
        Self {
            id,
            block,
            train: Some(train),
            direction,
            identification: String::new(),
        }
    }

    pub(crate) fn placeholder(
        id: StatusId,
        block: BlockId,
        identification: String,
        direction: BlockTrainDirection,
    ) -> Self {
        Self {
            id,
            block,
            train: None,
            direction,
            identification,
        }
    }

    /// True if this record has no backing train.
    pub fn is_placeholder(&self) -> bool {
        self.train.is_none()
    }
}

/// A train's membership in a zone.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainZoneStatus {
    /// Handle of this record.
    pub id: ZoneStatusId,
    /// Zone side of the relationship.
    pub zone: ZoneId,
    /// Train side of the relationship.
    pub train: TrainId,
    /// Where the train is in the entering/entered/leaving cycle.
    pub membership: ZoneMembership,
}
