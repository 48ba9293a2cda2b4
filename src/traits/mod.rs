//! Trait definitions at the edges of the tracking core.
//!
//! The core itself never reads a clock or pushes events anywhere. Whoever
//! drives the [`World`](crate::World) supplies time through [`Clock`] and
//! collects events through an [`EventSink`].
//!
//! # Submodules
//!
//! - `clock`: Monotonic time source
//! - `events`: Event delivery

pub mod clock;
pub mod events;

pub use clock::*;
pub use events::*;
