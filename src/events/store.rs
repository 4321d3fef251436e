// EventStore - ordered, mutable collection of a pattern's MIDI events
//
// Owns sorting, note linking, selection and the timestamp alterations
// (quantize, tighten, jitter, move). Links are indices into the backing
// vector; every structural mutation clears them and the caller-facing
// operations rebuild them before returning.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;

use crate::events::clipboard::Clipboard;
use crate::events::event::{Event, Pulse, Status};

/// What a selection pass should do with the events it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAction {
    /// Selection in progress: select every match.
    Selecting,
    /// Select the first match only.
    SelectOne,
    /// Count matches that are already selected.
    Selected,
    /// Count matches without changing anything.
    WouldSelect,
    /// Deselect every match.
    Deselect,
    /// Toggle the selection of every match.
    Toggle,
    /// Remove the first match.
    Remove,
    /// Select matching note-on events only.
    Onset,
    /// Count selected note-on matches without changing anything.
    IsOnset,
}

/// Ordered container for one pattern's events.
///
/// Iteration order is undefined between a structural mutation and the
/// next `sort()`. While `sort()` or `clear()` runs, `action_in_progress()`
/// reads true; a concurrent reader must poll it and discard any pass
/// during which it was observed raised.
#[derive(Debug)]
pub struct EventStore {
    events: Vec<Event>,
    length: Pulse,
    note_off_margin: Pulse,
    modified: bool,
    has_tempo: bool,
    has_time_signature: bool,
    has_key_signature: bool,
    meta_flags_stale: bool,
    link_wraparound: bool,
    action_in_progress: AtomicBool,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventStore {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            length: self.length,
            note_off_margin: self.note_off_margin,
            modified: self.modified,
            has_tempo: self.has_tempo,
            has_time_signature: self.has_time_signature,
            has_key_signature: self.has_key_signature,
            meta_flags_stale: self.meta_flags_stale,
            link_wraparound: self.link_wraparound,
            action_in_progress: AtomicBool::new(false),
        }
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            length: 4 * crate::events::event::DEFAULT_PPQN,
            note_off_margin: 2,
            modified: false,
            has_tempo: false,
            has_time_signature: false,
            has_key_signature: false,
            meta_flags_stale: false,
            link_wraparound: false,
            action_in_progress: AtomicBool::new(false),
        }
    }

    /// Append one event. No ordering is maintained until `sort()`.
    pub fn add(&mut self, event: Event) {
        self.events.push(event);
        self.structural_change();
    }

    /// Identical to `add()`; documents bulk-load intent where the caller
    /// guarantees a following `sort()` (e.g. file parsing).
    pub fn append(&mut self, event: Event) {
        self.add(event);
    }

    /// Paint a note of the given duration. The note-off margin is shaved
    /// off the end so back-to-back notes on the same pitch do not
    /// overlap; an off landing past the pattern end wraps around to the
    /// start.
    pub fn add_note(&mut self, tick: Pulse, duration: Pulse, channel: u8, note: u8, velocity: u8) {
        let mut off_tick = tick + duration - self.note_off_margin;
        if off_tick >= self.length {
            off_tick -= self.length;
        }
        self.add(Event::note_on(tick, channel, note, velocity));
        self.add(Event::note_off(off_tick.max(0), channel, note, 0));
    }

    /// Remove the event at `index`. Membership is the caller's
    /// responsibility; the modified flag is set unconditionally.
    pub fn remove(&mut self, index: usize) -> Event {
        let removed = self.events.remove(index);
        self.structural_change();
        removed
    }

    /// Raised while `sort()` or `clear()` may be invalidating a concurrent
    /// reader's view.
    pub fn action_in_progress(&self) -> bool {
        self.action_in_progress.load(Ordering::Acquire)
    }

    pub fn clear(&mut self) {
        self.action_in_progress.store(true, Ordering::Release);
        self.events.clear();
        self.structural_change();
        self.action_in_progress.store(false, Ordering::Release);
    }

    /// Stable sort by `(timestamp, rank)`: at equal timestamps note-off
    /// comes first, then non-note events, then note-on; insertion order is
    /// preserved within each rank group. Links are cleared because the
    /// sort relocates elements.
    pub fn sort(&mut self) {
        self.action_in_progress.store(true, Ordering::Release);
        self.clear_links();
        self.events.sort_by_key(|e| (e.timestamp(), e.rank()));
        self.action_in_progress.store(false, Ordering::Release);
    }

    /// Append a copy of every event in `other`, then re-sort and relink.
    pub fn merge(&mut self, other: &EventStore) {
        self.events.extend(other.events.iter().cloned());
        self.structural_change();
        self.sort();
        self.verify_and_link();
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Event> {
        self.modified = true;
        self.meta_flags_stale = true;
        self.events.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_note_on()).count()
    }

    pub fn min_timestamp(&self) -> Option<Pulse> {
        self.events.iter().map(Event::timestamp).min()
    }

    pub fn max_timestamp(&self) -> Option<Pulse> {
        self.events.iter().map(Event::timestamp).max()
    }

    /// Nominal pattern length in pulses; never the last event's timestamp.
    pub fn length(&self) -> Pulse {
        self.length
    }

    /// Assign the nominal length. Non-positive values are rejected as a
    /// no-op so a pattern can never collapse to zero length; callers that
    /// care confirm via `length()`.
    pub fn set_length(&mut self, pulses: Pulse) {
        if pulses > 0 {
            self.length = pulses;
        }
    }

    /// Pulses shaved off the end of painted note durations.
    pub fn note_off_margin(&self) -> Pulse {
        self.note_off_margin
    }

    pub fn set_note_off_margin(&mut self, margin: Pulse) {
        if margin >= 0 {
            self.note_off_margin = margin;
        }
    }

    pub fn link_wraparound(&self) -> bool {
        self.link_wraparound
    }

    pub fn set_link_wraparound(&mut self, wrap: bool) {
        self.link_wraparound = wrap;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clears the modified flag. Use with care: the usual caller is a
    /// save path that has just flushed the pattern.
    pub fn unmodify(&mut self) {
        self.modified = false;
    }

    pub fn has_tempo(&mut self) -> bool {
        self.refresh_meta_flags();
        self.has_tempo
    }

    pub fn has_time_signature(&mut self) -> bool {
        self.refresh_meta_flags();
        self.has_time_signature
    }

    pub fn has_key_signature(&mut self) -> bool {
        self.refresh_meta_flags();
        self.has_key_signature
    }

    /// One scan refreshing the cached has-tempo / has-time-signature /
    /// has-key-signature flags.
    pub fn scan_meta_events(&mut self) {
        self.has_tempo = false;
        self.has_time_signature = false;
        self.has_key_signature = false;
        for e in &self.events {
            if e.is_tempo() {
                self.has_tempo = true;
            } else if e.is_time_signature() {
                self.has_time_signature = true;
            } else if e.is_key_signature() {
                self.has_key_signature = true;
            }
        }
        self.meta_flags_stale = false;
    }

    fn refresh_meta_flags(&mut self) {
        if self.meta_flags_stale {
            self.scan_meta_events();
        }
    }

    fn structural_change(&mut self) {
        self.modified = true;
        self.meta_flags_stale = true;
        self.clear_links();
    }

    pub fn clear_links(&mut self) {
        for e in &mut self.events {
            e.unlink();
            e.unmark();
        }
    }

    /// Pair every unlinked note-on with the nearest unlinked note-off at
    /// the same note number and channel, scanning forward only. When
    /// wraparound linking is enabled an unmatched note-on also scans from
    /// the store head up to its own position, pairing across the pattern
    /// boundary. Note-ons with no match stay unlinked; dropping them is
    /// `remove_unlinked_notes()`, a policy left to the caller.
    pub fn verify_and_link(&mut self) {
        self.clear_links();
        let n = self.events.len();
        for i in 0..n {
            if !self.events[i].on_linkable() {
                continue;
            }
            let note = self.events[i].note();
            let channel = self.events[i].channel();
            let mut found = None;
            for j in (i + 1)..n {
                if self.events[j].off_linkable(note, channel) {
                    found = Some(j);
                    break;
                }
            }
            if found.is_none() && self.link_wraparound {
                for j in 0..i {
                    if self.events[j].off_linkable(note, channel) {
                        found = Some(j);
                        break;
                    }
                }
            }
            if let Some(j) = found {
                self.events[i].set_link(j);
                self.events[j].set_link(i);
            }
        }
    }

    /// Drop every note-on/note-off that `verify_and_link()` left
    /// unpaired. Returns true if anything was removed.
    pub fn remove_unlinked_notes(&mut self) -> bool {
        let before = self.events.len();
        self.events.retain(|e| !(e.is_strict_note() && !e.is_linked()));
        let removed = self.events.len() != before;
        if removed {
            self.structural_change();
            self.verify_and_link();
        }
        removed
    }

    /// Chain tempo events to each other in chronological order, supporting
    /// variable-tempo ramps. Broken by `clear_tempo_links()` or any
    /// structural mutation.
    pub fn link_tempos(&mut self) {
        self.clear_tempo_links();
        let mut indexed: Vec<usize> = (0..self.events.len())
            .filter(|&i| self.events[i].is_tempo())
            .collect();
        indexed.sort_by_key(|&i| self.events[i].timestamp());
        for pair in indexed.windows(2) {
            self.events[pair[0]].set_link(pair[1]);
        }
    }

    pub fn clear_tempo_links(&mut self) {
        for e in &mut self.events {
            if e.is_tempo() {
                e.unlink();
            }
        }
    }

    pub fn select_all(&mut self) {
        for e in &mut self.events {
            e.select();
        }
    }

    pub fn unselect_all(&mut self) {
        for e in &mut self.events {
            e.unselect();
        }
    }

    pub fn count_selected(&self) -> usize {
        self.events.iter().filter(|e| e.is_selected()).count()
    }

    pub fn any_selected(&self) -> bool {
        self.events.iter().any(|e| e.is_selected())
    }

    pub fn count_selected_notes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.is_selected() && e.is_note_on())
            .count()
    }

    /// Mark every selected event, for multi-step transforms that mutate
    /// the container while working through a selection.
    pub fn mark_selected(&mut self) -> bool {
        let mut any = false;
        for e in &mut self.events {
            if e.is_selected() {
                e.mark();
                any = true;
            }
        }
        any
    }

    pub fn unmark_all(&mut self) {
        for e in &mut self.events {
            e.unmark();
        }
    }

    /// Remove every marked event. Returns true if anything was removed.
    pub fn remove_marked(&mut self) -> bool {
        let before = self.events.len();
        self.events.retain(|e| !e.is_marked());
        let removed = self.events.len() != before;
        if removed {
            self.structural_change();
            self.verify_and_link();
        }
        removed
    }

    pub fn remove_selected(&mut self) -> bool {
        let before = self.events.len();
        self.events.retain(|e| !e.is_selected());
        let removed = self.events.len() != before;
        if removed {
            self.structural_change();
            self.verify_and_link();
        }
        removed
    }

    /// First and last timestamp among selected events.
    pub fn selected_interval(&self) -> Option<(Pulse, Pulse)> {
        let mut interval: Option<(Pulse, Pulse)> = None;
        for e in &self.events {
            if e.is_selected() {
                let t = e.timestamp();
                interval = Some(match interval {
                    None => (t, t),
                    Some((lo, hi)) => (lo.min(t), hi.max(t)),
                });
            }
        }
        interval
    }

    /// Apply `action` to every event inside `[tick_start, tick_end]` that
    /// matches the status filter (and controller number, for
    /// control-change). Returns the number of events affected, or for the
    /// non-mutating actions the number that matched.
    pub fn select_events(
        &mut self,
        tick_start: Pulse,
        tick_end: Pulse,
        status: Status,
        cc: Option<u8>,
        action: SelectAction,
    ) -> usize {
        let mut result = 0;
        let mut remove_at = None;
        for (i, e) in self.events.iter_mut().enumerate() {
            let ts = e.timestamp();
            if ts < tick_start || ts > tick_end || !e.is_desired(status, cc) {
                continue;
            }
            match action {
                SelectAction::Selecting => {
                    e.select();
                    result += 1;
                }
                SelectAction::SelectOne => {
                    e.select();
                    result += 1;
                    break;
                }
                SelectAction::Selected => {
                    if e.is_selected() {
                        result += 1;
                    }
                }
                SelectAction::WouldSelect => {
                    result += 1;
                }
                SelectAction::Deselect => {
                    e.unselect();
                    result += 1;
                }
                SelectAction::Toggle => {
                    if e.is_selected() {
                        e.unselect();
                    } else {
                        e.select();
                    }
                    result += 1;
                }
                SelectAction::Remove => {
                    remove_at = Some(i);
                    result += 1;
                    break;
                }
                SelectAction::Onset => {
                    if e.is_note_on() {
                        e.select();
                        result += 1;
                    }
                }
                SelectAction::IsOnset => {
                    if e.is_note_on() && e.is_selected() {
                        result += 1;
                    }
                }
            }
        }
        if let Some(i) = remove_at {
            self.remove(i);
            self.verify_and_link();
        }
        result
    }

    /// Quantize every selected event matching the filter to the nearest
    /// multiple of `snap / divide`, rounding the halfway point up. With
    /// `fixlink`, a moved event's link partner is shifted by the identical
    /// delta so the note keeps its original duration instead of being
    /// quantized independently. Re-sorts and relinks afterwards. Returns
    /// true if any timestamp moved.
    pub fn quantize_events(
        &mut self,
        status: Status,
        cc: Option<u8>,
        snap: Pulse,
        divide: Pulse,
        fixlink: bool,
    ) -> bool {
        if snap <= 0 || divide <= 0 {
            return false;
        }
        let snap = snap / divide;
        if snap <= 0 {
            return false;
        }
        let length = self.length;
        let mut changed = false;
        for i in 0..self.events.len() {
            let e = &self.events[i];
            if !e.is_selected() || !e.is_desired(status, cc) {
                continue;
            }
            // A linked note-off is handled through its note-on partner.
            if fixlink && e.is_note_off() && e.is_linked() {
                continue;
            }
            let old = self.events[i].timestamp();
            if self.events[i].quantize(snap, length) {
                changed = true;
                if fixlink {
                    let delta = self.events[i].timestamp() - old;
                    if let Some(partner) = self.events[i].link() {
                        let shifted = self.events[partner].timestamp() + delta;
                        self.events[partner].set_timestamp(shifted.max(0));
                    }
                }
            }
        }
        if changed {
            self.modified = true;
            self.sort();
            self.verify_and_link();
        }
        changed
    }

    /// Quantize every selected note-on and note-off, preserving durations.
    pub fn quantize_notes(&mut self, snap: Pulse, divide: Pulse) -> bool {
        self.quantize_events(Status::NoteOn, None, snap, divide, true)
    }

    /// Like quantization, but each event moves only half the distance to
    /// its snap point.
    pub fn tighten_events(
        &mut self,
        status: Status,
        cc: Option<u8>,
        snap: Pulse,
        divide: Pulse,
    ) -> bool {
        if snap <= 0 || divide <= 0 {
            return false;
        }
        let snap = snap / divide;
        if snap <= 0 {
            return false;
        }
        let length = self.length;
        let mut changed = false;
        for e in &mut self.events {
            if e.is_selected() && e.is_desired(status, cc) && e.tighten(snap, length) {
                changed = true;
            }
        }
        if changed {
            self.modified = true;
            self.sort();
            self.verify_and_link();
        }
        changed
    }

    /// Offset every selected matching event by a bounded pseudo-random
    /// amount in `[-snap / jitter_divisor, +snap / jitter_divisor]`.
    pub fn jitter_events(
        &mut self,
        status: Status,
        cc: Option<u8>,
        snap: Pulse,
        jitter_divisor: Pulse,
        rng: &mut impl Rng,
    ) -> bool {
        if snap <= 0 || jitter_divisor <= 0 {
            return false;
        }
        let range = snap / jitter_divisor;
        let length = self.length;
        let mut changed = false;
        for e in &mut self.events {
            if e.is_selected() && e.is_desired(status, cc) && e.jitter(snap, range, length, rng) {
                changed = true;
            }
        }
        if changed {
            self.modified = true;
            self.sort();
            self.verify_and_link();
        }
        changed
    }

    /// Randomize the amplitude byte of every selected matching event.
    pub fn randomize_selected(
        &mut self,
        status: Status,
        cc: Option<u8>,
        range: i16,
        rng: &mut impl Rng,
    ) -> bool {
        let mut changed = false;
        for e in &mut self.events {
            if e.is_selected() && e.is_desired(status, cc) && e.randomize(range, rng) {
                changed = true;
            }
        }
        if changed {
            self.modified = true;
        }
        changed
    }

    /// Shift every selected event in time by `delta_tick`, clamping into
    /// the pattern. A selected note-on drags its linked note-off by the
    /// identical delta even when the off is not itself selected.
    pub fn move_selected_events(&mut self, delta_tick: Pulse) -> bool {
        self.shift_selected(delta_tick, 0)
    }

    /// Shift selected notes in time and pitch.
    pub fn move_selected_notes(&mut self, delta_tick: Pulse, delta_note: i8) -> bool {
        self.shift_selected(delta_tick, delta_note)
    }

    fn shift_selected(&mut self, delta_tick: Pulse, delta_note: i8) -> bool {
        let length = self.length;
        let mut moved = vec![false; self.events.len()];
        let mut changed = false;
        for i in 0..self.events.len() {
            if moved[i] || !self.events[i].is_selected() {
                continue;
            }
            let partner = if self.events[i].is_note_on() {
                self.events[i].link()
            } else {
                None
            };
            for &idx in std::iter::once(&i).chain(partner.iter()) {
                let t = trim(self.events[idx].timestamp() + delta_tick, length);
                self.events[idx].set_timestamp(t);
                if delta_note != 0 {
                    self.events[idx].transpose_note(delta_note);
                }
                moved[idx] = true;
                changed = true;
            }
        }
        if changed {
            self.modified = true;
            self.sort();
            self.verify_and_link();
        }
        changed
    }

    /// Transpose every selected note by `semitones`.
    pub fn transpose_notes(&mut self, semitones: i8) -> bool {
        let mut changed = false;
        for e in &mut self.events {
            if e.is_selected() && e.is_note() {
                e.transpose_note(semitones);
                changed = true;
            }
        }
        if changed {
            self.modified = true;
        }
        changed
    }

    /// Copy the selected events into the clipboard, rebased so the
    /// earliest copied event lands at tick 0.
    pub fn copy_selected(&self, clipboard: &mut Clipboard) -> bool {
        let base = match self
            .events
            .iter()
            .filter(|e| e.is_selected())
            .map(Event::timestamp)
            .min()
        {
            Some(t) => t,
            None => return false,
        };
        clipboard.clear();
        for e in &self.events {
            if e.is_selected() {
                let mut copy = e.clone();
                copy.set_timestamp(e.timestamp() - base);
                copy.unlink();
                copy.unselect();
                clipboard.push(copy);
            }
        }
        true
    }

    /// Paste the clipboard contents at `tick`. When the clipboard holds
    /// notes, `note` repositions them so the highest copied note lands on
    /// it; non-note events are only shifted in time.
    pub fn paste(&mut self, clipboard: &Clipboard, tick: Pulse, note: u8) -> bool {
        if clipboard.is_empty() {
            return false;
        }
        let highest = clipboard
            .events()
            .iter()
            .filter(|e| e.is_note())
            .map(Event::note)
            .max();
        let note_delta = highest.map_or(0, |h| i16::from(note) - i16::from(h));
        for e in clipboard.events() {
            let mut pasted = e.clone();
            pasted.set_timestamp(e.timestamp() + tick);
            if pasted.is_note() && note_delta != 0 {
                let shifted = (i16::from(pasted.note()) + note_delta).clamp(0, 127);
                pasted.set_note(shifted as u8);
            }
            self.events.push(pasted);
        }
        self.structural_change();
        self.sort();
        self.verify_and_link();
        true
    }
}

fn trim(t: Pulse, length: Pulse) -> Pulse {
    if length > 0 && t >= length {
        length - 1
    } else if t < 0 {
        0
    } else {
        t
    }
}
