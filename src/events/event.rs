// Event - one timestamped MIDI message
// Channel messages carry up to two data bytes; meta and sysex messages
// carry a byte payload instead.

use rand::Rng;

/// Timestamp unit: pulses of the pattern's PPQN clock. Signed so that
/// delta-time and clamping arithmetic cannot wrap.
pub type Pulse = i64;

/// Standard MIDI resolution used when the caller does not supply one.
pub const DEFAULT_PPQN: Pulse = 480;

/// Meta event type bytes (the byte following the 0xFF marker).
pub mod meta {
    pub const TEXT: u8 = 0x01;
    pub const TRACK_NAME: u8 = 0x03;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const SET_TEMPO: u8 = 0x51;
    pub const TIME_SIGNATURE: u8 = 0x58;
    pub const KEY_SIGNATURE: u8 = 0x59;
    pub const SEQ_SPEC: u8 = 0x7F;
}

/// Message-class tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NoteOff,
    NoteOn,
    Aftertouch,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchWheel,
    Meta,
    Sysex,
}

impl Status {
    /// Status byte with a zero channel nibble (0xFF for meta, 0xF0 for sysex).
    pub fn code(self) -> u8 {
        match self {
            Status::NoteOff => 0x80,
            Status::NoteOn => 0x90,
            Status::Aftertouch => 0xA0,
            Status::ControlChange => 0xB0,
            Status::ProgramChange => 0xC0,
            Status::ChannelPressure => 0xD0,
            Status::PitchWheel => 0xE0,
            Status::Sysex => 0xF0,
            Status::Meta => 0xFF,
        }
    }

    /// Classify a raw status byte; the channel nibble is ignored for
    /// channel messages. Returns `None` for system-common/realtime bytes
    /// this engine does not store.
    pub fn from_code(byte: u8) -> Option<Status> {
        match byte & 0xF0 {
            0x80 => Some(Status::NoteOff),
            0x90 => Some(Status::NoteOn),
            0xA0 => Some(Status::Aftertouch),
            0xB0 => Some(Status::ControlChange),
            0xC0 => Some(Status::ProgramChange),
            0xD0 => Some(Status::ChannelPressure),
            0xE0 => Some(Status::PitchWheel),
            0xF0 => match byte {
                0xF0 => Some(Status::Sysex),
                0xFF => Some(Status::Meta),
                _ => None,
            },
            _ => None,
        }
    }

    /// True for voice messages (0x80..=0xEF), which carry a channel.
    pub fn is_channel(self) -> bool {
        !matches!(self, Status::Meta | Status::Sysex)
    }

    /// Program change and channel pressure carry a single data byte.
    pub fn is_one_byte(self) -> bool {
        matches!(self, Status::ProgramChange | Status::ChannelPressure)
    }

    pub fn is_two_bytes(self) -> bool {
        self.is_channel() && !self.is_one_byte()
    }
}

fn mask_data(b: u8) -> u8 {
    b & 0x7F
}

/// One MIDI event on a pattern's timeline.
///
/// Two events may be related by a link: a note-on to its terminating
/// note-off (and back), or a tempo event to the next tempo event. Links
/// are indices into the owning store's backing vector; they are a
/// relation, not ownership, and every structural mutation of the store
/// invalidates them until the next relink pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    timestamp: Pulse,
    status: Status,
    d0: u8,
    d1: u8,
    channel: Option<u8>,
    meta_type: u8,
    payload: Vec<u8>,
    selected: bool,
    marked: bool,
    link: Option<usize>,
}

impl Event {
    /// Generic channel-message constructor. Data bytes are masked to
    /// 0..=127 and the channel to 0..=15.
    pub fn channel_message(
        timestamp: Pulse,
        status: Status,
        channel: u8,
        d0: u8,
        d1: u8,
    ) -> Self {
        debug_assert!(status.is_channel(), "expected a voice message status");
        Self {
            timestamp,
            status,
            d0: mask_data(d0),
            d1: mask_data(d1),
            channel: Some(channel & 0x0F),
            meta_type: 0,
            payload: Vec::new(),
            selected: false,
            marked: false,
            link: None,
        }
    }

    pub fn note_on(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_message(timestamp, Status::NoteOn, channel, note, velocity)
    }

    pub fn note_off(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_message(timestamp, Status::NoteOff, channel, note, velocity)
    }

    /// A meta event with an arbitrary type byte and payload.
    pub fn meta(timestamp: Pulse, meta_type: u8, payload: Vec<u8>) -> Self {
        Self {
            timestamp,
            status: Status::Meta,
            d0: 0,
            d1: 0,
            channel: None,
            meta_type,
            payload,
            selected: false,
            marked: false,
            link: None,
        }
    }

    /// Set Tempo meta event from microseconds per quarter note.
    pub fn tempo(timestamp: Pulse, us_per_quarter: u32) -> Self {
        let bytes = vec![
            ((us_per_quarter >> 16) & 0xFF) as u8,
            ((us_per_quarter >> 8) & 0xFF) as u8,
            (us_per_quarter & 0xFF) as u8,
        ];
        Self::meta(timestamp, meta::SET_TEMPO, bytes)
    }

    /// Time Signature meta event. `beat_width` is the actual note value
    /// (4, 8, ...); it is stored as its base-2 logarithm per the SMF spec.
    pub fn time_signature(timestamp: Pulse, beats_per_bar: u8, beat_width: u8) -> Self {
        let bw_log2 = if beat_width == 0 {
            2
        } else {
            beat_width.trailing_zeros() as u8
        };
        // 24 MIDI clocks per metronome click, 8 thirty-seconds per quarter
        Self::meta(
            timestamp,
            meta::TIME_SIGNATURE,
            vec![beats_per_bar, bw_log2, 24, 8],
        )
    }

    /// Key Signature meta event: sharps (+) / flats (-) count and mode.
    pub fn key_signature(timestamp: Pulse, sharps_flats: i8, minor: bool) -> Self {
        Self::meta(
            timestamp,
            meta::KEY_SIGNATURE,
            vec![sharps_flats as u8, u8::from(minor)],
        )
    }

    /// Text meta event.
    pub fn text(timestamp: Pulse, text: &str) -> Self {
        Self::meta(timestamp, meta::TEXT, text.as_bytes().to_vec())
    }

    /// System-exclusive event; the payload excludes the 0xF0/0xF7 framing.
    pub fn sysex(timestamp: Pulse, payload: Vec<u8>) -> Self {
        Self {
            timestamp,
            status: Status::Sysex,
            d0: 0,
            d1: 0,
            channel: None,
            meta_type: 0,
            payload,
            selected: false,
            marked: false,
            link: None,
        }
    }

    pub fn timestamp(&self) -> Pulse {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: Pulse) {
        self.timestamp = timestamp;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn set_channel(&mut self, channel: Option<u8>) {
        self.channel = channel.map(|c| c & 0x0F);
    }

    pub fn d0(&self) -> u8 {
        self.d0
    }

    pub fn d1(&self) -> u8 {
        self.d1
    }

    pub fn set_data(&mut self, d0: u8, d1: u8) {
        self.d0 = mask_data(d0);
        self.d1 = mask_data(d1);
    }

    pub fn meta_type(&self) -> u8 {
        self.meta_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Note number of a note/aftertouch event (the first data byte).
    pub fn note(&self) -> u8 {
        self.d0
    }

    pub fn set_note(&mut self, note: u8) {
        self.d0 = mask_data(note);
    }

    pub fn velocity(&self) -> u8 {
        self.d1
    }

    pub fn has_channel(&self) -> bool {
        self.status.is_channel()
    }

    /// Note-on, note-off or aftertouch: everything keyed by a note number.
    pub fn is_note(&self) -> bool {
        matches!(
            self.status,
            Status::NoteOn | Status::NoteOff | Status::Aftertouch
        )
    }

    /// Note-on or note-off only (linkable events).
    pub fn is_strict_note(&self) -> bool {
        matches!(self.status, Status::NoteOn | Status::NoteOff)
    }

    pub fn is_note_on(&self) -> bool {
        self.status == Status::NoteOn
    }

    pub fn is_note_off(&self) -> bool {
        self.status == Status::NoteOff
    }

    pub fn is_meta(&self) -> bool {
        self.status == Status::Meta
    }

    pub fn is_sysex(&self) -> bool {
        self.status == Status::Sysex
    }

    /// Meta or sysex: events whose data lives in the payload.
    pub fn is_ex_data(&self) -> bool {
        self.is_meta() || self.is_sysex()
    }

    pub fn is_tempo(&self) -> bool {
        self.is_meta() && self.meta_type == meta::SET_TEMPO
    }

    pub fn is_time_signature(&self) -> bool {
        self.is_meta() && self.meta_type == meta::TIME_SIGNATURE
    }

    pub fn is_key_signature(&self) -> bool {
        self.is_meta() && self.meta_type == meta::KEY_SIGNATURE
    }

    pub fn is_seq_spec(&self) -> bool {
        self.is_meta() && self.meta_type == meta::SEQ_SPEC
    }

    /// Tempo in microseconds per quarter note, decoded from the payload.
    pub fn tempo_us(&self) -> Option<u32> {
        if self.is_tempo() && self.payload.len() == 3 {
            Some(
                (u32::from(self.payload[0]) << 16)
                    | (u32::from(self.payload[1]) << 8)
                    | u32::from(self.payload[2]),
            )
        } else {
            None
        }
    }

    /// Tie-break order for events sharing a timestamp: note-off sorts
    /// first, then everything that is not a note-on, then note-on. Keeps a
    /// note-off and a same-pitch note-on at the same tick from overlapping
    /// during playback.
    pub fn rank(&self) -> u8 {
        match self.status {
            Status::NoteOff => 0,
            Status::NoteOn => 2,
            _ => 1,
        }
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    pub fn unselect(&mut self) {
        self.selected = false;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn mark(&mut self) {
        self.marked = true;
    }

    pub fn unmark(&mut self) {
        self.marked = false;
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn link(&self) -> Option<usize> {
        self.link
    }

    pub fn set_link(&mut self, index: usize) {
        self.link = Some(index);
    }

    pub fn unlink(&mut self) {
        self.link = None;
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// A note-on that still needs a terminating note-off.
    pub fn on_linkable(&self) -> bool {
        self.is_note_on() && !self.is_linked()
    }

    /// A note-off that can terminate the given note on the given channel.
    pub fn off_linkable(&self, note: u8, channel: Option<u8>) -> bool {
        self.is_note_off() && !self.is_linked() && self.note() == note && self.channel == channel
    }

    /// Whether the event matches a status/controller selection filter.
    /// For control-change events the controller number must also match
    /// when one is given.
    pub fn is_desired(&self, status: Status, cc: Option<u8>) -> bool {
        if self.status != status {
            return false;
        }
        match (status, cc) {
            (Status::ControlChange, Some(controller)) => self.d0 == controller,
            _ => true,
        }
    }

    /// Shift the note number of a note/aftertouch event, clamping to the
    /// MIDI range.
    pub fn transpose_note(&mut self, semitones: i8) {
        if self.is_note() {
            let shifted = i16::from(self.d0) + i16::from(semitones);
            self.d0 = shifted.clamp(0, 127) as u8;
        }
    }

    /// Snap the timestamp to the nearest multiple of `snap`, rounding the
    /// halfway point up, then clamp into `[0, length - 1]`. Returns true
    /// if the timestamp moved.
    pub(crate) fn quantize(&mut self, snap: Pulse, length: Pulse) -> bool {
        if snap <= 0 {
            return false;
        }
        let t = self.timestamp;
        let remainder = t.rem_euclid(snap);
        let delta = if remainder < snap / 2 {
            -remainder
        } else {
            snap - remainder
        };
        if delta == 0 {
            return false;
        }
        self.timestamp = clamp_to_length(t + delta, length);
        true
    }

    /// Move the timestamp half the distance toward the nearest snap point.
    pub(crate) fn tighten(&mut self, snap: Pulse, length: Pulse) -> bool {
        if snap <= 0 {
            return false;
        }
        let t = self.timestamp;
        let remainder = t.rem_euclid(snap);
        let delta = if remainder < snap / 2 {
            -(remainder / 2)
        } else {
            (snap - remainder) / 2
        };
        if delta == 0 {
            return false;
        }
        self.timestamp = clamp_to_length(t + delta, length);
        true
    }

    /// Offset the timestamp by a random amount bounded by one snap unit.
    pub(crate) fn jitter(
        &mut self,
        snap: Pulse,
        range: Pulse,
        length: Pulse,
        rng: &mut impl Rng,
    ) -> bool {
        if range <= 0 {
            return false;
        }
        let mut delta: Pulse = rng.gen_range(-range..=range);
        if delta == 0 {
            return false;
        }
        if delta <= -snap {
            delta = -snap + 1;
        } else if delta >= snap {
            delta = snap - 1;
        }
        self.timestamp = clamp_to_length(self.timestamp + delta, length);
        true
    }

    /// Randomize the event's amplitude byte (velocity for notes, value for
    /// controllers) within `range`, clamping to 0..=127.
    pub(crate) fn randomize(&mut self, range: i16, rng: &mut impl Rng) -> bool {
        if range <= 0 {
            return false;
        }
        let delta: i16 = rng.gen_range(-range..=range);
        if delta == 0 {
            return false;
        }
        if self.status.is_two_bytes() {
            self.d1 = (i16::from(self.d1) + delta).clamp(0, 127) as u8;
        } else {
            self.d0 = (i16::from(self.d0) + delta).clamp(0, 127) as u8;
        }
        true
    }
}

fn clamp_to_length(t: Pulse, length: Pulse) -> Pulse {
    if length > 0 && t >= length {
        length - 1
    } else if t < 0 {
        0
    } else {
        t
    }
}
