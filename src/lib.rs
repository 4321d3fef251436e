// Seqline - Event-timeline engine for a pattern-based MIDI sequencer

pub mod error;
pub mod events;
pub mod expand;
pub mod smf;
pub mod track;
pub mod trigger;

// Re-export commonly used types for convenience
pub use error::SerializeError;
pub use events::{Clipboard, Event, EventStore, Pulse, SelectAction, Status, DEFAULT_PPQN};
pub use expand::{expand_song, Expansion};
pub use smf::{frame_chunk, write_song_track, write_track, TrackWriter};
pub use track::TrackMeta;
pub use trigger::TriggerSegment;
