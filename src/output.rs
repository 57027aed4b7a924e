use crate::backend::backend::OutputPort;
use crate::midi::{Message, MidiEvent, CHANNELS, NOTES};
use std::ops::RangeInclusive;

/// Owns the output port for the lifetime of the loop. However the owner
/// goes away (return, error, unwinding) the drop sends all-notes-off, a
/// panic, and a note-off sweep across the keyboard range.
pub struct OutputGuard<O: OutputPort> {
    port: O,
    keyboard: RangeInclusive<u8>,
    held_loop_notes: [[u16; NOTES as usize]; CHANNELS as usize],
    failures: u64,
    last_time: f64,
}

impl<O: OutputPort> OutputGuard<O> {
    pub fn new(port: O, keyboard: RangeInclusive<u8>) -> Self {
        OutputGuard {
            port,
            keyboard,
            held_loop_notes: [[0; NOTES as usize]; CHANNELS as usize],
            failures: 0,
            last_time: 0.0,
        }
    }

    /// Number of sends that failed and were skipped.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Session time used to stamp the messages sent on drop.
    pub fn touch(&mut self, now: f64) {
        self.last_time = self.last_time.max(now);
    }

    fn send(&mut self, event: &MidiEvent) -> bool {
        self.last_time = self.last_time.max(event.time);
        match self.port.send(event) {
            Ok(()) => true,
            Err(err) => {
                self.failures += 1;
                log::warn!("dropped {:?}: {}", event.message, err);
                false
            }
        }
    }

    /// Forward a live event.
    pub fn send_live(&mut self, event: &MidiEvent) {
        self.send(event);
    }

    /// Send an event replayed from the loop, tracking which notes it leaves on.
    pub fn send_loop(&mut self, event: &MidiEvent) {
        if !self.send(event) {
            return;
        }
        match event.message {
            Message::NoteOn { channel, note, .. } => {
                let held = &mut self.held_loop_notes[channel as usize][note as usize];
                *held = held.saturating_add(1);
            }
            Message::NoteOff { channel, note, .. } => {
                let held = &mut self.held_loop_notes[channel as usize][note as usize];
                *held = held.saturating_sub(1);
            }
            _ => (),
        }
    }

    pub fn held_loop_notes(&self) -> usize {
        self.held_loop_notes
            .iter()
            .flat_map(|notes| notes.iter())
            .filter(|&&count| count > 0)
            .count()
    }

    /// Note-off every note the loop has left sounding.
    pub fn release_loop_notes(&mut self, now: f64) {
        for channel in 0..CHANNELS {
            for note in 0..NOTES {
                if self.held_loop_notes[channel as usize][note as usize] == 0 {
                    continue;
                }
                self.held_loop_notes[channel as usize][note as usize] = 0;
                self.send(&MidiEvent::new(
                    Message::NoteOff {
                        channel,
                        note,
                        velocity: 0,
                    },
                    now,
                ));
            }
        }
    }

    /// All-notes-off, panic, then an explicit note-off for every key.
    pub fn silence(&mut self, now: f64) {
        if let Err(err) = self.port.all_notes_off(now) {
            log::warn!("all notes off failed: {}", err);
        }
        if let Err(err) = self.port.panic(now) {
            log::warn!("panic failed: {}", err);
        }
        for channel in 0..CHANNELS {
            for note in self.keyboard.clone() {
                self.send(&MidiEvent::new(
                    Message::NoteOff {
                        channel,
                        note,
                        velocity: 0,
                    },
                    now,
                ));
            }
        }
        self.held_loop_notes = [[0; NOTES as usize]; CHANNELS as usize];
    }
}

impl<O: OutputPort> Drop for OutputGuard<O> {
    fn drop(&mut self) {
        log::info!("silencing output");
        self.silence(self.last_time);
    }
}
