//! Concrete implementations of the traits defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Controllable clock and recording event sink for tests and demos

pub mod mock;

pub use mock::*;
