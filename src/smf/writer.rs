// Track serialization - renders a pattern (or a flattened song
// performance) into SMF track-chunk bytes, proprietary chunks included.

use crate::error::SerializeError;
use crate::events::event::meta;
use crate::events::{Event, EventStore, Pulse};
use crate::expand::expand_song;
use crate::smf::seqspec;
use crate::smf::vlq;
use crate::track::TrackMeta;
use crate::trigger::TriggerSegment;

/// Accumulates one track's bytes, tracking running time so events are
/// written as delta-times. Timestamps must be fed in non-decreasing
/// order; a regression aborts the write.
#[derive(Debug)]
pub struct TrackWriter {
    data: Vec<u8>,
    prev_timestamp: Pulse,
}

impl Default for TrackWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            prev_timestamp: 0,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Finish the track body. Callers wanting a full chunk wrap it with
    /// `frame_chunk`.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn put(&mut self, byte: u8) {
        self.data.push(byte);
    }

    fn put_short(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    fn put_long(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    fn put_varinum(&mut self, value: u64) -> Result<(), SerializeError> {
        vlq::encode(value, &mut self.data)
    }

    fn put_delta(&mut self, timestamp: Pulse) -> Result<(), SerializeError> {
        if timestamp < self.prev_timestamp {
            return Err(SerializeError::NegativeDelta {
                timestamp,
                previous: self.prev_timestamp,
            });
        }
        self.put_varinum((timestamp - self.prev_timestamp) as u64)?;
        self.prev_timestamp = timestamp;
        Ok(())
    }

    /// Delta-time, 0xFF, type and declared length.
    fn put_meta_header(
        &mut self,
        timestamp: Pulse,
        meta_type: u8,
        len: usize,
    ) -> Result<(), SerializeError> {
        self.put_delta(timestamp)?;
        self.put(0xFF);
        self.put(meta_type);
        self.put_varinum(len as u64)
    }

    /// A voice message. The pattern's channel overrides the event's own
    /// unless the pattern is free-channel.
    pub fn put_channel_event(
        &mut self,
        event: &Event,
        channel_override: Option<u8>,
    ) -> Result<(), SerializeError> {
        let channel = channel_override
            .or(event.channel())
            .unwrap_or(0);
        self.put_delta(event.timestamp())?;
        self.put(event.status().code() | (channel & 0x0F));
        self.put(event.d0());
        if event.status().is_two_bytes() {
            self.put(event.d1());
        }
        Ok(())
    }

    /// A meta or sysex event, payload and framing included.
    pub fn put_ex_event(&mut self, event: &Event) -> Result<(), SerializeError> {
        if event.is_meta() {
            self.put_meta_header(event.timestamp(), event.meta_type(), event.payload().len())?;
        } else {
            self.put_delta(event.timestamp())?;
            self.put(0xF0);
            self.put_varinum(event.payload().len() as u64)?;
        }
        self.data.extend_from_slice(event.payload());
        Ok(())
    }

    pub fn put_seq_number(&mut self, number: u16) -> Result<(), SerializeError> {
        self.put_meta_header(self.prev_timestamp, 0x00, 2)?;
        self.put_short(number);
        Ok(())
    }

    pub fn put_track_name(&mut self, name: &str) -> Result<(), SerializeError> {
        self.put_meta_header(self.prev_timestamp, meta::TRACK_NAME, name.len())?;
        self.data.extend_from_slice(name.as_bytes());
        Ok(())
    }

    /// Set Tempo meta at the current running time.
    pub fn put_tempo(&mut self, us_per_quarter: u32) -> Result<(), SerializeError> {
        self.put_ex_event(&Event::tempo(self.prev_timestamp, us_per_quarter))
    }

    /// Time Signature meta at the current running time. `beat_width` is
    /// the actual note value; the log2 conversion happens on the wire.
    pub fn put_time_signature(
        &mut self,
        beats_per_bar: u8,
        beat_width: u8,
    ) -> Result<(), SerializeError> {
        self.put_ex_event(&Event::time_signature(
            self.prev_timestamp,
            beats_per_bar,
            beat_width,
        ))
    }

    /// Key Signature meta at the current running time.
    pub fn put_key_signature(
        &mut self,
        sharps_flats: i8,
        minor: bool,
    ) -> Result<(), SerializeError> {
        self.put_ex_event(&Event::key_signature(
            self.prev_timestamp,
            sharps_flats,
            minor,
        ))
    }

    /// Proprietary chunk: meta 0x7F framing, then the four-byte tag and
    /// the payload.
    fn put_seqspec(&mut self, tag: u32, payload: &[u8]) -> Result<(), SerializeError> {
        self.put_meta_header(self.prev_timestamp, meta::SEQ_SPEC, payload.len() + 4)?;
        self.put_long(tag);
        self.data.extend_from_slice(payload);
        Ok(())
    }

    /// The trigger list. Transposed segments force the extended format
    /// with a trailing transposition byte per segment; otherwise the
    /// plain three-word format is used.
    pub fn put_triggers(&mut self, triggers: &[TriggerSegment]) -> Result<(), SerializeError> {
        let transposed = triggers.iter().any(TriggerSegment::transposed);
        let per = if transposed { 13 } else { 12 };
        let tag = if transposed {
            seqspec::tag::TRIG_TRANSPOSE
        } else {
            seqspec::tag::TRIGGERS_EX
        };
        self.put_meta_header(
            self.prev_timestamp,
            meta::SEQ_SPEC,
            triggers.len() * per + 4,
        )?;
        self.put_long(tag);
        for t in triggers {
            self.put_long(t.tick_start as u32);
            self.put_long(t.tick_end as u32);
            self.put_long(t.offset as u32);
            if transposed {
                self.put(t.transpose_byte());
            }
        }
        Ok(())
    }

    fn put_track_settings(&mut self, meta: &TrackMeta) -> Result<(), SerializeError> {
        self.put_seqspec(seqspec::tag::MIDI_BUS, &[meta.buss])?;
        self.put_seqspec(
            seqspec::tag::TIME_SIG,
            &[meta.beats_per_bar, meta.beat_width],
        )?;
        self.put_seqspec(seqspec::tag::MIDI_CHANNEL, &[meta.channel_byte()])?;
        self.put_seqspec(seqspec::tag::TRANSPOSE, &[u8::from(meta.transposable)])?;
        if let Some(key) = meta.musical_key {
            self.put_seqspec(seqspec::tag::MUSIC_KEY, &[key])?;
        }
        if let Some(scale) = meta.musical_scale {
            self.put_seqspec(seqspec::tag::MUSIC_SCALE, &[scale])?;
        }
        if let Some(seq) = meta.background_sequence {
            self.put_seqspec(seqspec::tag::BACKGROUND_SEQUENCE, &seq.to_be_bytes())?;
        }
        if let Some(color) = meta.color {
            self.put_seqspec(seqspec::tag::SEQ_COLOR, &[color])?;
        }
        if meta.loop_count_max > 0 {
            self.put_seqspec(
                seqspec::tag::SEQ_LOOP_COUNT,
                &meta.loop_count_max.to_be_bytes(),
            )?;
        }
        Ok(())
    }

    /// End of Track, padded out to the pattern's nominal length when the
    /// last event falls short of it.
    fn put_end_of_track(&mut self, length: Pulse) -> Result<(), SerializeError> {
        let end = length.max(self.prev_timestamp);
        self.put_meta_header(end, meta::END_OF_TRACK, 0)
    }
}

/// Serialize one looping pattern: its events in timeline order followed
/// by the trigger list and the settings chunks.
///
/// The store must be sorted. Stored proprietary metas are skipped; the
/// settings chunks are the single source of that data on the wire.
pub fn write_track(
    store: &EventStore,
    meta: &TrackMeta,
    triggers: &[TriggerSegment],
) -> Result<Vec<u8>, SerializeError> {
    let mut w = TrackWriter::new();
    w.put_seq_number(meta.track_number)?;
    w.put_track_name(&meta.name)?;
    let channel_override = meta.channel;
    for ev in store.iter() {
        if ev.is_seq_spec() {
            continue;
        }
        if ev.has_channel() {
            w.put_channel_event(ev, channel_override)?;
        } else {
            w.put_ex_event(ev)?;
        }
    }
    w.put_triggers(triggers)?;
    w.put_track_settings(meta)?;
    w.put_end_of_track(store.length())?;
    Ok(w.into_data())
}

/// Serialize the flattened song performance of one pattern: the
/// expansion of its events through its triggers, with a single covering
/// trigger chunk so a re-import sees one segment spanning the whole
/// performance.
pub fn write_song_track(
    store: &EventStore,
    meta: &TrackMeta,
    triggers: &[TriggerSegment],
    ppqn: Pulse,
) -> Result<Vec<u8>, SerializeError> {
    let expansion = expand_song(store, triggers, meta.measure_ticks(ppqn))?;
    let mut w = TrackWriter::new();
    w.put_seq_number(meta.track_number)?;
    w.put_track_name(&meta.name)?;
    let channel_override = meta.channel;
    for ev in &expansion.events {
        if ev.has_channel() {
            w.put_channel_event(ev, channel_override)?;
        } else {
            w.put_ex_event(ev)?;
        }
    }
    w.put_triggers(&[expansion.covering])?;
    w.put_track_settings(meta)?;
    w.put_end_of_track(expansion.covering.tick_end)?;
    Ok(w.into_data())
}

/// Wrap a track body in its MTrk header and big-endian length.
pub fn frame_chunk(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Status;

    #[test]
    fn test_delta_regression_is_fatal() {
        let mut w = TrackWriter::new();
        let first = Event::note_on(100, 0, 60, 100);
        let second = Event::note_on(50, 0, 60, 100);
        w.put_channel_event(&first, None).unwrap();
        let err = w.put_channel_event(&second, None).unwrap_err();
        assert_eq!(
            err,
            SerializeError::NegativeDelta {
                timestamp: 50,
                previous: 100
            }
        );
    }

    #[test]
    fn test_channel_override() {
        let ev = Event::note_on(0, 3, 60, 100);
        let mut w = TrackWriter::new();
        w.put_channel_event(&ev, Some(9)).unwrap();
        assert_eq!(w.data(), &[0x00, 0x99, 60, 100]);

        // Free-channel: the event keeps its own channel
        let mut w = TrackWriter::new();
        w.put_channel_event(&ev, None).unwrap();
        assert_eq!(w.data(), &[0x00, 0x93, 60, 100]);
    }

    #[test]
    fn test_one_byte_message() {
        let ev = Event::channel_message(0, Status::ProgramChange, 2, 40, 0);
        let mut w = TrackWriter::new();
        w.put_channel_event(&ev, None).unwrap();
        assert_eq!(w.data(), &[0x00, 0xC2, 40]);
    }

    #[test]
    fn test_tempo_meta_bytes() {
        let ev = Event::tempo(0, 500_000);
        let mut w = TrackWriter::new();
        w.put_ex_event(&ev).unwrap();
        assert_eq!(w.data(), &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    }

    #[test]
    fn test_sysex_framing() {
        let ev = Event::sysex(0, vec![0x7E, 0x7F, 0x09, 0x01, 0xF7]);
        let mut w = TrackWriter::new();
        w.put_ex_event(&ev).unwrap();
        assert_eq!(w.data(), &[0x00, 0xF0, 0x05, 0x7E, 0x7F, 0x09, 0x01, 0xF7]);
    }

    #[test]
    fn test_trigger_chunk_plain_format() {
        let triggers = [TriggerSegment::new(0, 959, 0)];
        let mut w = TrackWriter::new();
        w.put_triggers(&triggers).unwrap();
        // delta, FF 7F, len = 16, tag, then 3 words
        assert_eq!(&w.data()[..4], &[0x00, 0xFF, 0x7F, 16]);
        assert_eq!(&w.data()[4..8], &0x2424_0008u32.to_be_bytes());
        assert_eq!(&w.data()[8..12], &0u32.to_be_bytes());
        assert_eq!(&w.data()[12..16], &959u32.to_be_bytes());
        assert_eq!(&w.data()[16..20], &0u32.to_be_bytes());
    }

    #[test]
    fn test_trigger_chunk_transposed_format() {
        let triggers = [
            TriggerSegment::new(0, 100, 0),
            TriggerSegment::new(200, 300, 0).with_transpose(-5),
        ];
        let mut w = TrackWriter::new();
        w.put_triggers(&triggers).unwrap();
        // One transposed segment switches every segment to 13 bytes
        assert_eq!(&w.data()[..4], &[0x00, 0xFF, 0x7F, 30]);
        assert_eq!(&w.data()[4..8], &0x2424_0020u32.to_be_bytes());
        // First segment untransposed: zero byte
        assert_eq!(w.data()[20], 0x00);
        // Second segment: 0x40 - 5
        assert_eq!(w.data()[33], 0x3B);
    }

    #[test]
    fn test_signature_and_tempo_helpers() {
        let mut w = TrackWriter::new();
        w.put_time_signature(6, 8).unwrap();
        w.put_tempo(600_000).unwrap();
        w.put_key_signature(-3, true).unwrap();
        assert_eq!(
            w.data(),
            &[
                0x00, 0xFF, 0x58, 0x04, 6, 3, 24, 8, // 6/8
                0x00, 0xFF, 0x51, 0x03, 0x09, 0x27, 0xC0, // 100 bpm
                0x00, 0xFF, 0x59, 0x02, 0xFD, 0x01, // three flats, minor
            ]
        );
    }

    #[test]
    fn test_end_of_track_padding() {
        let mut store = EventStore::new();
        store.set_length(1920);
        store.add(Event::note_on(0, 0, 60, 100));
        store.add(Event::note_off(479, 0, 60, 0));
        store.sort();

        let body = write_track(&store, &TrackMeta::default(), &[]).unwrap();
        // Track ends with FF 2F 00 preceded by the pad delta to 1920
        let tail = &body[body.len() - 3..];
        assert_eq!(tail, &[0xFF, 0x2F, 0x00]);
        // 1920 - 479 = 1441 = VLQ 0x8B 0x21
        let delta = &body[body.len() - 5..body.len() - 3];
        assert_eq!(delta, &[0x8B, 0x21]);
    }

    #[test]
    fn test_frame_chunk_header() {
        let framed = frame_chunk(&[1, 2, 3]);
        assert_eq!(&framed[..4], b"MTrk");
        assert_eq!(&framed[4..8], &3u32.to_be_bytes());
        assert_eq!(&framed[8..], &[1, 2, 3]);
    }
}
