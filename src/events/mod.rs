// Event model: single events, the ordered store, and the copy buffer.

pub mod clipboard;
pub mod event;
pub mod store;

pub use clipboard::Clipboard;
pub use event::{Event, Pulse, Status, DEFAULT_PPQN};
pub use store::{EventStore, SelectAction};
