//! Mock implementations for testing without hardware or a real clock.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockClock`] | [`Clock`] | Controllable, shareable time source |
//! | [`RecordingSink`] | [`EventSink`] | Captures emitted events |
//!
//! # Example
//!
//! ```rust
//! use rs_interlock::World;
//! use rs_interlock::hal::RecordingSink;
//! use rs_interlock::SensorState;
//!
//! let mut world = World::default();
//! let block = world.create_block("b1", 1);
//! world.input_changed(block, 0, SensorState::Free);
//!
//! let mut sink = RecordingSink::new();
//! world.flush_events(&mut sink);
//! assert_eq!(sink.names(), vec!["block.state_changed"]);
//! ```
//!
//! [`Clock`]: crate::traits::Clock
//! [`EventSink`]: crate::traits::EventSink

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::events::Event;
use crate::traits::{Clock, EventSink};

/// Mock clock for testing.
///
/// Clones share the same time, so a test can keep one handle while a
/// runtime task reads another.
///
/// # Example
///
/// ```rust
/// use rs_interlock::hal::MockClock;
/// use rs_interlock::traits::Clock;
///
/// let clock = MockClock::new();
/// let handle = clock.clone();
/// assert_eq!(clock.now_ms(), 0);
///
/// handle.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// handle.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    current_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

/// Event sink that keeps everything it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    /// Events received, oldest first.
    pub events: Vec<Event>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the received events, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.iter().map(Event::name).collect()
    }

    /// Number of received events with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name() == name).count()
    }

    /// Forget everything received so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ZoneEvent;
    use crate::types::{TrainId, ZoneId};

    #[test]
    fn clock_clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();
        other.advance(20);
        other.advance(20);
        assert_eq!(clock.now_ms(), 40);
    }

    #[test]
    fn sink_counts_by_name() {
        let mut sink = RecordingSink::new();
        let event = Event::Zone(ZoneEvent::TrainEntered {
            zone: ZoneId(1),
            train: TrainId(2),
        });
        sink.emit(event.clone());
        sink.emit(event);
        assert_eq!(sink.count("zone.train_entered"), 2);
        assert_eq!(sink.count("zone.train_left"), 0);

        sink.clear();
        assert!(sink.names().is_empty());
    }
}
