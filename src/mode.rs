use crate::error::Error;
use std::fmt;

/// Playback/recording state. Recording without playback is unrepresentable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    Idle,
    #[default]
    Playing,
    PlayingAndRecording,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::Playing => write!(f, "playing"),
            Mode::PlayingAndRecording => write!(f, "recording"),
        }
    }
}

impl Mode {
    pub fn playback_enabled(self) -> bool {
        !matches!(self, Mode::Idle)
    }

    pub fn recording_enabled(self) -> bool {
        matches!(self, Mode::PlayingAndRecording)
    }

    /// Stopping playback also stops recording.
    pub fn toggle_playback(self) -> Mode {
        match self {
            Mode::Idle => Mode::Playing,
            Mode::Playing | Mode::PlayingAndRecording => Mode::Idle,
        }
    }

    pub fn toggle_recording(self) -> Result<Mode, Error> {
        match self {
            Mode::Playing => Ok(Mode::PlayingAndRecording),
            Mode::PlayingAndRecording => Ok(Mode::Playing),
            Mode::Idle => Err(Error::InvalidModeTransition {
                from: self,
                command: Command::ToggleRecording,
            }),
        }
    }
}

/// Runtime commands, one per key binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePlayback,
    ToggleRecording,
    ClearSequence,
    ResetOutput,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Quit => "quit",
            Command::TogglePlayback => "toggle playback",
            Command::ToggleRecording => "toggle recording",
            Command::ClearSequence => "clear the sequence",
            Command::ResetOutput => "reset the output",
        };
        write!(f, "{}", name)
    }
}

/// Anything the scheduler can poll for user commands without blocking.
pub trait CommandSource {
    fn poll(&mut self) -> Option<Command>;
}

impl CommandSource for crossbeam::channel::Receiver<Command> {
    fn poll(&mut self) -> Option<Command> {
        self.try_recv().ok()
    }
}
