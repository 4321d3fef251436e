// Song flattening - expand a looping pattern through its trigger
// segments into one linear stream of events on the song timeline.
//
// Each trigger replays the pattern as many times as its span covers,
// phase-shifted by the trigger offset. Notes sounding when a segment
// ends are closed at the segment boundary instead of spilling past it.

use crate::error::SerializeError;
use crate::events::{Event, EventStore, Pulse};
use crate::trigger::TriggerSegment;

/// Result of flattening one pattern: the expanded events in song order
/// plus a single segment covering the whole performance, with its end
/// rounded up to the last measure boundary.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub events: Vec<Event>,
    pub covering: TriggerSegment,
}

/// Flatten `store` through `triggers` onto the song timeline.
///
/// Triggers must be in ascending `tick_start` order. Stored proprietary
/// meta events are skipped; they describe the pattern, not the
/// performance. An empty trigger list yields an empty expansion.
pub fn expand_song(
    store: &EventStore,
    triggers: &[TriggerSegment],
    measure_ticks: Pulse,
) -> Result<Expansion, SerializeError> {
    let mut events = Vec::new();
    let mut last_end: Pulse = 0;
    for trigger in triggers {
        if trigger.tick_end < trigger.tick_start {
            return Err(SerializeError::MalformedTrigger {
                tick_start: trigger.tick_start,
                tick_end: trigger.tick_end,
            });
        }
        expand_trigger(store, trigger, &mut events);
        last_end = last_end.max(trigger.tick_end);
    }
    let covering = if triggers.is_empty() {
        TriggerSegment::new(0, 0, 0)
    } else {
        TriggerSegment::new(0, round_to_measure_end(last_end, measure_ticks), 0)
    };
    Ok(Expansion { events, covering })
}

/// Extend `seq_end` to the last tick of its measure. Already-aligned
/// ends are left alone, as is everything when no measure length is
/// known.
fn round_to_measure_end(seq_end: Pulse, measure_ticks: Pulse) -> Pulse {
    if measure_ticks > 0 {
        let remainder = seq_end % measure_ticks;
        if remainder != measure_ticks - 1 {
            return seq_end + measure_ticks - remainder - 1;
        }
    }
    seq_end
}

fn expand_trigger(store: &EventStore, trigger: &TriggerSegment, out: &mut Vec<Event>) {
    let len = store.length();
    if len <= 0 || store.is_empty() {
        return;
    }
    let trig_offset = trigger.offset.rem_euclid(len);
    let start_offset = trigger.tick_start.rem_euclid(len);
    let mut time_offset = trigger.tick_start + trig_offset - start_offset;
    if trig_offset > start_offset {
        time_offset -= len;
    }
    let times_played = 1 + (trigger.length() - 1) / len;

    // Sounding-note depth per (post-transposition) note number, so an
    // off is only emitted for a note this expansion actually started.
    let mut note_depth = [0u32; 128];

    for _ in 0..=times_played {
        for ev in store.iter() {
            if ev.is_seq_spec() {
                continue;
            }
            let absolute = ev.timestamp() + time_offset;
            if absolute < trigger.tick_start {
                continue;
            }
            let mut copy = ev.clone();
            if trigger.transpose != 0 && copy.is_note() {
                copy.transpose_note(trigger.transpose);
            }
            if copy.is_note_on() {
                if absolute > trigger.tick_end {
                    continue;
                }
                note_depth[usize::from(copy.note())] += 1;
                copy.set_timestamp(absolute);
            } else if copy.is_note_off() {
                let depth = &mut note_depth[usize::from(copy.note())];
                if *depth == 0 {
                    continue;
                }
                *depth -= 1;
                copy.set_timestamp(absolute.min(trigger.tick_end));
            } else {
                if absolute >= trigger.tick_end {
                    continue;
                }
                copy.set_timestamp(absolute);
            }
            copy.unlink();
            copy.unselect();
            out.push(copy);
        }
        time_offset += len;
    }
}
