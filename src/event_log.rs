use crate::midi::{Message, MidiEvent};

/// The downbeat click every loop starts with.
#[derive(Copy, Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Click {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub release_velocity: u8,
    /// Seconds between the click's note-on and note-off.
    pub length: f64,
}

impl Default for Click {
    fn default() -> Self {
        Click {
            channel: 0,
            note: 60,
            velocity: 64,
            release_velocity: 127,
            length: 0.1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScheduledEvent {
    pub event: MidiEvent,
    /// Seconds from the start of a cycle.
    pub offset: f64,
    /// Cycle this event was recorded in. It was echoed live then, so it
    /// doesn't replay until the following cycle.
    recorded_in: Option<u64>,
}

/// One cycle's worth of events, kept sorted by offset. Events sharing an
/// offset stay in insertion order. Playback walks a cursor forward through
/// the log and rewinds it on every rollover.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<ScheduledEvent>,
    cursor: usize,
    click: Option<Click>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log holding only the click pair. Clearing it puts the click back.
    pub fn with_click(click: Click) -> Self {
        let mut log = EventLog {
            click: Some(click),
            ..Self::default()
        };
        log.seed();
        log
    }

    fn seed(&mut self) {
        if let Some(click) = self.click {
            let Click {
                channel,
                note,
                velocity,
                release_velocity,
                length,
            } = click;
            self.insert(
                MidiEvent::new(
                    Message::NoteOn {
                        channel,
                        note,
                        velocity,
                    },
                    0.0,
                ),
                0.0,
            );
            self.insert(
                MidiEvent::new(
                    Message::NoteOff {
                        channel,
                        note,
                        velocity: release_velocity,
                    },
                    length,
                ),
                length,
            );
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter()
    }

    /// Add an event that plays from the current cycle on, if its offset
    /// hasn't been passed yet.
    pub fn insert(&mut self, event: MidiEvent, offset: f64) {
        self.insert_scheduled(ScheduledEvent {
            event,
            offset,
            recorded_in: None,
        });
    }

    /// Add an event captured live during `cycle`.
    pub fn record(&mut self, event: MidiEvent, offset: f64, cycle: u64) {
        self.insert_scheduled(ScheduledEvent {
            event,
            offset,
            recorded_in: Some(cycle),
        });
    }

    fn insert_scheduled(&mut self, scheduled: ScheduledEvent) {
        let index = self
            .events
            .partition_point(|existing| existing.offset <= scheduled.offset);
        self.events.insert(index, scheduled);
        // Landing behind the cursor means the offset has already passed.
        if index < self.cursor {
            self.cursor += 1;
        }
    }

    /// Events up to and including `elapsed` that haven't fired this cycle.
    pub fn due(&mut self, elapsed: f64, cycle: u64) -> Due<'_> {
        Due {
            events: &self.events,
            cursor: &mut self.cursor,
            limit: elapsed,
            cycle,
        }
    }

    /// Everything still pending this cycle.
    pub fn remaining(&mut self, cycle: u64) -> Due<'_> {
        self.due(f64::INFINITY, cycle)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Drop every event, then re-seed the click if this log has one.
    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = 0;
        self.seed();
    }
}

pub struct Due<'a> {
    events: &'a [ScheduledEvent],
    cursor: &'a mut usize,
    limit: f64,
    cycle: u64,
}

impl<'a> Iterator for Due<'a> {
    type Item = &'a ScheduledEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let scheduled = self.events.get(*self.cursor)?;
            if scheduled.offset > self.limit {
                return None;
            }
            *self.cursor += 1;
            // Recorded this cycle, or stamped into one that hasn't begun.
            if matches!(scheduled.recorded_in, Some(cycle) if cycle >= self.cycle) {
                continue;
            }
            return Some(scheduled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_on(note: u8) -> MidiEvent {
        MidiEvent::new(
            Message::NoteOn {
                channel: 0,
                note,
                velocity: 100,
            },
            0.0,
        )
    }

    fn notes(due: Due<'_>) -> Vec<Message> {
        due.map(|scheduled| scheduled.event.message).collect()
    }

    #[test]
    fn click_is_seeded_at_the_downbeat() {
        let log = EventLog::with_click(Click::default());
        let offsets: Vec<f64> = log.iter().map(|scheduled| scheduled.offset).collect();
        assert_eq!(offsets, vec![0.0, 0.1]);
        assert!(matches!(
            log.iter().next().unwrap().event.message,
            Message::NoteOn { note: 60, .. }
        ));
    }

    #[test]
    fn plays_in_offset_order_with_ties_in_insertion_order() {
        let mut log = EventLog::new();
        log.insert(note_on(3), 0.5);
        log.insert(note_on(1), 0.2);
        log.insert(note_on(4), 0.5);
        log.insert(note_on(2), 0.2);
        let played: Vec<u8> = log
            .remaining(0)
            .map(|scheduled| match scheduled.event.message {
                Message::NoteOn { note, .. } => note,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(played, vec![1, 2, 3, 4]);
    }

    #[test]
    fn each_event_fires_once_per_cycle() {
        let mut log = EventLog::new();
        log.insert(note_on(1), 0.25);
        assert!(notes(log.due(0.2, 0)).is_empty());
        assert_eq!(notes(log.due(0.25, 0)).len(), 1);
        assert!(notes(log.due(0.5, 0)).is_empty());
        log.rewind();
        assert_eq!(notes(log.due(0.3, 1)).len(), 1);
    }

    #[test]
    fn recorded_events_wait_for_the_next_cycle() {
        let mut log = EventLog::new();
        log.record(note_on(7), 0.4, 0);
        assert!(notes(log.due(0.5, 0)).is_empty());
        log.rewind();
        assert_eq!(notes(log.due(0.5, 1)).len(), 1);
    }

    #[test]
    fn events_stamped_into_the_coming_cycle_skip_the_flush() {
        let mut log = EventLog::new();
        log.record(note_on(7), 0.2, 1);
        // Old cycle flushing what it still owes.
        assert!(notes(log.remaining(0)).is_empty());
        log.rewind();
        assert!(notes(log.due(0.5, 1)).is_empty());
        log.rewind();
        assert_eq!(notes(log.due(0.5, 2)).len(), 1);
    }

    #[test]
    fn inserting_behind_the_cursor_counts_as_fired() {
        let mut log = EventLog::new();
        log.insert(note_on(1), 0.1);
        log.insert(note_on(2), 0.6);
        assert_eq!(notes(log.due(0.3, 0)).len(), 1);
        log.insert(note_on(3), 0.05);
        assert_eq!(notes(log.due(0.7, 0)), vec![note_on(2).message]);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut log = EventLog::with_click(Click::default());
        log.insert(note_on(1), 0.5);
        log.clear();
        let once: Vec<ScheduledEvent> = log.iter().copied().collect();
        log.clear();
        let twice: Vec<ScheduledEvent> = log.iter().copied().collect();
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);

        let mut bare = EventLog::new();
        bare.insert(note_on(1), 0.5);
        bare.clear();
        bare.clear();
        assert!(bare.is_empty());
    }
}
