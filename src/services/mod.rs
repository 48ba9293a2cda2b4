//! Async services around the tracking core.
//!
//! - `runtime` feature: a tokio task that owns the [`World`](crate::World)
//!   and serializes every message into it, with a clock tick for delayed
//!   path releases and a broadcast channel for events.
//!
//! Hardware bridges and session layers run on their own tasks and only ever
//! talk to the world through a [`RuntimeHandle`].

#[cfg(feature = "runtime")]
pub mod runtime;

#[cfg(feature = "runtime")]
pub use runtime::*;
