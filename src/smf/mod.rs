// Standard MIDI File track encoding: variable-length quantities,
// proprietary chunk tags and the track writer.

pub mod seqspec;
pub mod vlq;
pub mod writer;

pub use writer::{frame_chunk, write_song_track, write_track, TrackWriter};
