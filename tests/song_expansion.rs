//! Integration tests for song flattening and the editing operations
//! that feed it: expansion through triggers, note pairing and the
//! duration-preserving quantize path.

use rand::rngs::StdRng;
use rand::SeedableRng;

use seqline::{expand_song, Event, EventStore, Pulse, Status, TriggerSegment};

fn pattern(length: Pulse, notes: &[(Pulse, Pulse, u8)]) -> EventStore {
    let mut store = EventStore::new();
    store.set_length(length);
    for &(on, off, note) in notes {
        store.add(Event::note_on(on, 0, note, 100));
        store.add(Event::note_off(off, 0, note, 64));
    }
    store.sort();
    store.verify_and_link();
    store
}

fn assert_balanced(events: &[Event]) {
    let mut depth = [0i32; 128];
    for e in events {
        if e.is_note_on() {
            depth[usize::from(e.note())] += 1;
        } else if e.is_note_off() {
            depth[usize::from(e.note())] -= 1;
            assert!(depth[usize::from(e.note())] >= 0, "off before its on");
        }
    }
    assert!(depth.iter().all(|&d| d == 0), "unterminated note");
}

#[test]
fn test_one_note_two_repeats() {
    let store = pattern(480, &[(0, 479, 60)]);
    let triggers = [TriggerSegment::new(0, 959, 0)];
    let exp = expand_song(&store, &triggers, 1920).unwrap();

    let pairs: Vec<(Pulse, bool)> = exp
        .events
        .iter()
        .map(|e| (e.timestamp(), e.is_note_on()))
        .collect();
    assert_eq!(
        pairs,
        vec![(0, true), (479, false), (480, true), (959, false)]
    );
    assert_eq!(exp.covering.tick_start, 0);
    assert_eq!(exp.covering.tick_end, 1919);
}

#[test]
fn test_partial_repeat_truncates_cleanly() {
    let store = pattern(480, &[(0, 400, 60), (240, 460, 64)]);
    // One and a half repeats
    let triggers = [TriggerSegment::new(0, 719, 0)];
    let exp = expand_song(&store, &triggers, 0).unwrap();

    assert_balanced(&exp.events);
    assert!(exp.events.iter().all(|e| e.timestamp() <= 719));
}

#[test]
fn test_offset_trigger_drops_preroll_offs() {
    // Note crosses the pattern start when phase-shifted; the orphaned
    // off from the skipped first repeat must not leak out
    let store = pattern(480, &[(100, 460, 60)]);
    let triggers = [TriggerSegment::new(0, 959, 200)];
    let exp = expand_song(&store, &triggers, 0).unwrap();
    assert_balanced(&exp.events);
    assert!(!exp.events.is_empty());
}

#[test]
fn test_multiple_triggers_stay_ordered_and_balanced() {
    let store = pattern(960, &[(0, 100, 60), (480, 700, 64), (800, 950, 67)]);
    let triggers = [
        TriggerSegment::new(0, 1919, 0),
        TriggerSegment::new(3840, 4500, 0),
        TriggerSegment::new(5760, 8000, 480),
    ];
    let exp = expand_song(&store, &triggers, 1920).unwrap();

    assert_balanced(&exp.events);
    let stamps: Vec<Pulse> = exp.events.iter().map(Event::timestamp).collect();
    let mut sorted = stamps.clone();
    sorted.sort_unstable();
    assert_eq!(stamps, sorted);
}

#[test]
fn test_transposed_trigger() {
    let store = pattern(480, &[(0, 200, 60)]);
    let triggers = [
        TriggerSegment::new(0, 479, 0),
        TriggerSegment::new(480, 959, 0).with_transpose(-12),
    ];
    let exp = expand_song(&store, &triggers, 0).unwrap();

    assert_balanced(&exp.events);
    let first_half: Vec<u8> = exp
        .events
        .iter()
        .filter(|e| e.timestamp() < 480)
        .map(Event::note)
        .collect();
    let second_half: Vec<u8> = exp
        .events
        .iter()
        .filter(|e| e.timestamp() >= 480)
        .map(Event::note)
        .collect();
    assert!(first_half.iter().all(|&n| n == 60));
    assert!(second_half.iter().all(|&n| n == 48));
}

#[test]
fn test_quantize_moves_linked_off_by_same_delta() {
    let mut store = pattern(1920, &[(37, 517, 60)]);
    store.select_all();
    assert!(store.quantize_events(Status::NoteOn, None, 24, 1, true));

    let on = store.iter().find(|e| e.is_note_on()).unwrap();
    let off = store.iter().find(|e| e.is_note_off()).unwrap();
    assert_eq!(on.timestamp(), 48);
    assert_eq!(off.timestamp(), 528);
    assert_eq!(off.timestamp() - on.timestamp(), 480);
}

#[test]
fn test_quantized_pattern_still_expands_balanced() {
    let mut store = pattern(1920, &[(37, 517, 60), (490, 955, 64), (965, 1430, 67)]);
    store.select_all();
    store.quantize_events(Status::NoteOn, None, 120, 1, true);

    let triggers = [TriggerSegment::new(0, 3839, 0)];
    let exp = expand_song(&store, &triggers, 1920).unwrap();
    assert_balanced(&exp.events);
}

#[test]
fn test_jittered_pattern_still_expands_balanced() {
    let mut store = pattern(1920, &[(0, 200, 60), (480, 700, 62), (960, 1200, 64)]);
    store.select_all();
    let mut rng = StdRng::seed_from_u64(42);
    store.jitter_events(Status::NoteOn, None, 48, 2, &mut rng);
    store.jitter_events(Status::NoteOff, None, 48, 2, &mut rng);

    let triggers = [TriggerSegment::new(0, 1919, 0)];
    let exp = expand_song(&store, &triggers, 1920).unwrap();
    assert_balanced(&exp.events);
}

#[test]
fn test_expansion_skips_stored_proprietary_metas() {
    let mut store = pattern(480, &[(0, 100, 60)]);
    store.add(Event::meta(0, 0x7F, vec![0x24, 0x24, 0x00, 0x02, 0x05]));
    store.sort();
    store.verify_and_link();

    let triggers = [TriggerSegment::new(0, 479, 0)];
    let exp = expand_song(&store, &triggers, 0).unwrap();
    assert!(exp.events.iter().all(|e| !e.is_seq_spec()));
}
