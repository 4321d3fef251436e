// Clipboard - holding pen for copied events
//
// Events are stored rebased to tick 0 so a paste is a plain offset add.
// Each editing context owns its own clipboard and passes it explicitly;
// there is no shared global buffer.

use crate::events::event::Event;

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    events: Vec<Event>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
