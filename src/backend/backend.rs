use crate::error::Error;
use crate::midi::{Message, MidiEvent, CHANNELS};

/// Non-blocking source of incoming MIDI.
pub trait InputPort {
    /// The next pending event, or `None` when nothing is waiting.
    fn try_receive(&mut self) -> Result<Option<MidiEvent>, Error>;
}

pub trait OutputPort {
    fn send(&mut self, event: &MidiEvent) -> Result<(), Error>;

    fn all_notes_off(&mut self, time: f64) -> Result<(), Error> {
        for channel in 0..CHANNELS {
            self.send(&MidiEvent::new(Message::all_notes_off(channel), time))?;
        }
        Ok(())
    }

    /// Cut every sounding note immediately and reset controllers.
    fn panic(&mut self, time: f64) -> Result<(), Error> {
        for channel in 0..CHANNELS {
            self.send(&MidiEvent::new(Message::all_sound_off(channel), time))?;
            self.send(&MidiEvent::new(Message::reset_all_controllers(channel), time))?;
        }
        Ok(())
    }
}

/// Enumerates and opens MIDI endpoints by name.
pub trait Backend {
    type Input: InputPort;
    type Output: OutputPort;

    fn list_inputs(&self) -> Vec<String>;
    fn list_outputs(&self) -> Vec<String>;
    fn open_input(&self, search: &str) -> Result<Option<Self::Input>, Error>;
    fn open_output(&self, search: &str) -> Result<Option<Self::Output>, Error>;
}

/// Case-insensitive substring match. When several devices match, the last
/// one listed wins.
pub fn choose_device<'a>(devices: &'a [String], search: &str) -> Option<&'a str> {
    let search = search.to_lowercase();
    devices
        .iter()
        .filter(|device| device.to_lowercase().contains(&search))
        .last()
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn matches_ignoring_case() {
        let devices = names(&["system:capture_1", "CH345:midi_out", "OP-1:midi_in"]);
        assert_eq!(choose_device(&devices, "ch345"), Some("CH345:midi_out"));
        assert_eq!(choose_device(&devices, "op-1"), Some("OP-1:midi_in"));
    }

    #[test]
    fn last_match_wins() {
        let devices = names(&["Keystep:port 1", "Keystep:port 2", "Other"]);
        assert_eq!(choose_device(&devices, "KEYSTEP"), Some("Keystep:port 2"));
    }

    #[test]
    fn no_match() {
        let devices = names(&["a2j:Midi Through"]);
        assert_eq!(choose_device(&devices, "OP-1"), None);
        assert_eq!(choose_device(&[], ""), None);
    }

    struct Collect(Vec<Message>);

    impl OutputPort for Collect {
        fn send(&mut self, event: &MidiEvent) -> Result<(), Error> {
            self.0.push(event.message);
            Ok(())
        }
    }

    #[test]
    fn panic_covers_every_channel() {
        let mut out = Collect(Vec::new());
        out.panic(0.0).unwrap();
        assert_eq!(out.0.len(), 2 * CHANNELS as usize);
        assert!(out.0.contains(&Message::all_sound_off(15)));
        assert!(out.0.contains(&Message::reset_all_controllers(0)));
    }
}
