use crate::mode::{Command, Mode};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Input => write!(f, "input"),
            PortKind::Output => write!(f, "output"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no MIDI {kind} matches {search:?}")]
    DeviceNotFound { kind: PortKind, search: String },
    #[error("cannot {command} while {from}")]
    InvalidModeTransition { from: Mode, command: Command },
    #[error("midi i/o: {0}")]
    TransientIo(String),
    #[error("jack: {0}")]
    Jack(#[from] jack::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
