// Trigger segments - spans of the song timeline during which a pattern
// sounds, each with a playback offset and an optional per-segment
// transposition.

use serde::{Deserialize, Serialize};

use crate::events::Pulse;

/// One occurrence of a pattern on the song timeline. The span is
/// inclusive on both ends; `offset` shifts where inside the pattern the
/// segment starts playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSegment {
    pub tick_start: Pulse,
    pub tick_end: Pulse,
    pub offset: Pulse,
    pub transpose: i8,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl TriggerSegment {
    pub fn new(tick_start: Pulse, tick_end: Pulse, offset: Pulse) -> Self {
        Self {
            tick_start,
            tick_end,
            offset,
            transpose: 0,
            selected: false,
        }
    }

    pub fn with_transpose(mut self, transpose: i8) -> Self {
        self.transpose = transpose;
        self
    }

    /// Inclusive span length in pulses.
    pub fn length(&self) -> Pulse {
        self.tick_end - self.tick_start + 1
    }

    pub fn transposed(&self) -> bool {
        self.transpose != 0
    }

    /// Wire encoding of the transposition: 0x40 biased when set, a plain
    /// zero byte when the segment is untransposed.
    pub fn transpose_byte(&self) -> u8 {
        if self.transpose != 0 {
            (0x40 + i16::from(self.transpose)) as u8
        } else {
            0
        }
    }

    /// Decode a wire transposition byte. Bytes outside 0x01..=0x7F mean
    /// no transposition.
    pub fn transpose_from_byte(byte: u8) -> i8 {
        if (0x01..=0x7F).contains(&byte) {
            (i16::from(byte) - 0x40) as i8
        } else {
            0
        }
    }

    /// Whether a song-timeline tick falls inside this segment.
    pub fn covers(&self, tick: Pulse) -> bool {
        tick >= self.tick_start && tick <= self.tick_end
    }
}
