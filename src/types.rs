//! Identifier newtypes and the small enums shared by every module.
//!
//! Entities never hold references to each other. A block knows its trains
//! through [`StatusId`] handles, a train knows its zones through
//! [`ZoneStatusId`] handles, and the [`World`](crate::World) registry resolves
//! them. This keeps ownership in one place and makes teardown order irrelevant.
//!
//! # Example
//!
//! ```rust
//! use rs_interlock::{BlockSide, BlockTrainDirection};
//!
//! // A train that entered through side A travels towards side B
//! assert_eq!(BlockTrainDirection::entering_through(BlockSide::A), BlockTrainDirection::TowardsB);
//! assert!(BlockTrainDirection::TowardsA.exits_through(BlockSide::A));
//! ```

use core::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Handle of a [`Block`](crate::Block).
    BlockId,
    "block"
);
id_type!(
    /// Handle of a [`Train`](crate::Train).
    TrainId,
    "train"
);
id_type!(
    /// Handle of a [`Zone`](crate::Zone).
    ZoneId,
    "zone"
);
id_type!(
    /// Handle of a [`BlockPath`](crate::BlockPath).
    PathId,
    "path"
);
id_type!(
    /// Handle of a [`TrainBlockStatus`](crate::TrainBlockStatus) join record.
    StatusId,
    "block_status"
);
id_type!(
    /// Handle of a [`TrainZoneStatus`](crate::TrainZoneStatus) join record.
    ZoneStatusId,
    "zone_status"
);

// ============================================================================
// Block sides and directions
// ============================================================================

/// One of the two ends of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockSide {
    /// The end nearest the first sensor input.
    A,
    /// The end nearest the last sensor input.
    B,
}

impl BlockSide {
    /// The other end of the block.
    pub const fn opposite(self) -> Self {
        match self {
            BlockSide::A => BlockSide::B,
            BlockSide::B => BlockSide::A,
        }
    }

    /// Returns the side as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BlockSide::A => "a",
            BlockSide::B => "b",
        }
    }
}

/// Orientation of a train relative to a block's own coordinate frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BlockTrainDirection {
    /// Heading out through side A.
    TowardsA,
    /// Heading out through side B.
    TowardsB,
    /// Orientation not known (e.g. a freshly assigned train).
    #[default]
    Unknown,
}

impl BlockTrainDirection {
    /// Direction of a train that came in through `side`.
    pub const fn entering_through(side: BlockSide) -> Self {
        match side {
            BlockSide::A => BlockTrainDirection::TowardsB,
            BlockSide::B => BlockTrainDirection::TowardsA,
        }
    }

    /// True if a train with this direction leaves the block through `side`.
    pub const fn exits_through(self, side: BlockSide) -> bool {
        matches!(
            (self, side),
            (BlockTrainDirection::TowardsA, BlockSide::A)
                | (BlockTrainDirection::TowardsB, BlockSide::B)
        )
    }

    /// Reverses the direction. `Unknown` stays `Unknown`.
    pub const fn flipped(self) -> Self {
        match self {
            BlockTrainDirection::TowardsA => BlockTrainDirection::TowardsB,
            BlockTrainDirection::TowardsB => BlockTrainDirection::TowardsA,
            BlockTrainDirection::Unknown => BlockTrainDirection::Unknown,
        }
    }

    /// Returns the direction as a snake_case string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BlockTrainDirection::TowardsA => "towards_a",
            BlockTrainDirection::TowardsB => "towards_b",
            BlockTrainDirection::Unknown => "unknown",
        }
    }

    /// Parse a direction from text (`"towards_a"`, `"a"`, `"towards_b"`, `"b"`).
    ///
    /// ```
    /// use rs_interlock::BlockTrainDirection;
    ///
    /// assert_eq!(BlockTrainDirection::from_text(" A "), Some(BlockTrainDirection::TowardsA));
    /// assert_eq!(BlockTrainDirection::from_text("towards_b"), Some(BlockTrainDirection::TowardsB));
    /// assert_eq!(BlockTrainDirection::from_text("sideways"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "towards_a" | "a" => Some(BlockTrainDirection::TowardsA),
            "towards_b" | "b" => Some(BlockTrainDirection::TowardsB),
            "unknown" | "?" => Some(BlockTrainDirection::Unknown),
            _ => None,
        }
    }
}

// ============================================================================
// States
// ============================================================================

/// Derived occupancy state of a block.
///
/// Never set by callers; see [`Block::derive_state`](crate::Block::derive_state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BlockState {
    /// Sensors inconsistent or not yet reported.
    #[default]
    Unknown,
    /// No occupant, no reservation, all sensors free.
    Free,
    /// Claimed by a train (reserved ahead, or sitting undetected).
    Reserved,
    /// At least one sensor reports occupied.
    Occupied,
}

impl BlockState {
    /// Returns the state as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BlockState::Unknown => "unknown",
            BlockState::Free => "free",
            BlockState::Reserved => "reserved",
            BlockState::Occupied => "occupied",
        }
    }
}

/// Value reported by a single occupancy sensor input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorState {
    /// No report yet, or the hardware link is down.
    #[default]
    Unknown,
    /// Nothing detected.
    Free,
    /// Something detected.
    Occupied,
}

impl SensorState {
    /// Parse a sensor value from text (`"free"`, `"0"`, `"occupied"`, `"1"`).
    ///
    /// ```
    /// use rs_interlock::SensorState;
    ///
    /// assert_eq!(SensorState::from_text("1"), Some(SensorState::Occupied));
    /// assert_eq!(SensorState::from_text("FREE"), Some(SensorState::Free));
    /// assert_eq!(SensorState::from_text("maybe"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "occupied" | "1" | "on" => Some(SensorState::Occupied),
            "free" | "0" | "off" => Some(SensorState::Free),
            "unknown" => Some(SensorState::Unknown),
            _ => None,
        }
    }
}

/// How a train is driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TrainMode {
    /// Driven by hand with no route protection; the only mode sensor-driven
    /// entry will attribute an anonymous detection to.
    #[default]
    ManualUnsupervised,
    /// Driven by hand inside reserved routes.
    ManualProtected,
    /// Driven by the automation layer.
    Automatic,
}

/// Membership of a train in a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ZoneMembership {
    /// A block of the zone is reserved ahead of the train.
    Entering,
    /// The train physically occupies (or was assigned to) a block of the zone.
    Entered,
    /// The train is moving out of the zone.
    Leaving,
}

/// Kind of identification (RFID, transponder, ...) report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IdentificationEventType {
    /// Identifier is now present in the block.
    Present,
    /// Identifier is gone from the block.
    Absent,
    /// Identifier passed a reader; carries no occupancy meaning.
    Seen,
}
