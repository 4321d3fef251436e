// Per-pattern metadata carried alongside the event store and written
// out as proprietary chunks.

use serde::{Deserialize, Serialize};

use crate::events::Pulse;

/// Pattern settings that ride along with the events. `channel` of
/// `None` means a free-channel pattern: events keep their own channels
/// instead of being forced onto one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub track_number: u16,
    pub name: String,
    pub buss: u8,
    pub channel: Option<u8>,
    pub beats_per_bar: u8,
    pub beat_width: u8,
    pub musical_key: Option<u8>,
    pub musical_scale: Option<u8>,
    pub background_sequence: Option<u32>,
    pub transposable: bool,
    pub color: Option<u8>,
    pub loop_count_max: u16,
}

impl Default for TrackMeta {
    fn default() -> Self {
        Self {
            track_number: 0,
            name: String::from("Untitled"),
            buss: 0,
            channel: Some(0),
            beats_per_bar: 4,
            beat_width: 4,
            musical_key: None,
            musical_scale: None,
            background_sequence: None,
            transposable: true,
            color: None,
            loop_count_max: 0,
        }
    }
}

impl TrackMeta {
    /// Pulses in one measure at the given resolution.
    pub fn measure_ticks(&self, ppqn: Pulse) -> Pulse {
        if self.beat_width == 0 {
            return 0;
        }
        Pulse::from(self.beats_per_bar) * 4 * ppqn / Pulse::from(self.beat_width)
    }

    /// Wire byte for the channel chunk: the channel number, or 0x80 for
    /// a free-channel pattern.
    pub fn channel_byte(&self) -> u8 {
        self.channel.map_or(0x80, |c| c & 0x0F)
    }

    pub fn is_free_channel(&self) -> bool {
        self.channel.is_none()
    }
}
