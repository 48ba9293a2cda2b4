//! Event delivery.

use alloc::vec::Vec;

use crate::events::Event;

/// Receiver for events drained from a [`World`](crate::World).
///
/// Events arrive in the order they were produced.
pub trait EventSink {
    /// Deliver one event.
    fn emit(&mut self, event: Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BlockEvent;
    use crate::types::{BlockId, BlockState};

    #[test]
    fn vec_collects_in_order() {
        let mut sink: Vec<Event> = Vec::new();
        for state in [BlockState::Free, BlockState::Occupied] {
            sink.emit(Event::Block(BlockEvent::StateChanged {
                block: BlockId(1),
                state,
            }));
        }
        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink[1],
            Event::Block(BlockEvent::StateChanged {
                block: BlockId(1),
                state: BlockState::Occupied
            })
        );
    }
}
