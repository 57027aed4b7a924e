use tinyvec::ArrayVec;

pub const CHANNELS: u8 = 16;
pub const NOTES: u8 = 128;

const ALL_SOUND_OFF: u8 = 120;
const RESET_ALL_CONTROLLERS: u8 = 121;
const ALL_NOTES_OFF: u8 = 123;

/// A channel voice message as it travels over the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Message {
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    PolyPressure {
        channel: u8,
        note: u8,
        pressure: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    ChannelPressure {
        channel: u8,
        pressure: u8,
    },
    PitchBend {
        channel: u8,
        value: u16,
    },
}

impl Message {
    /// Decode one packet. Anything that isn't a channel voice message
    /// (sysex, clock, active sensing) yields `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let kind = status & 0xf0;
        let channel = status & 0x0f;
        if bytes[1..].iter().any(|byte| byte & 0x80 != 0) {
            return None;
        }
        match (kind, bytes) {
            (0x80, &[_, note, velocity]) => Some(Self::NoteOff {
                channel,
                note,
                velocity,
            }),
            (0x90, &[_, note, 0]) => Some(Self::NoteOff {
                channel,
                note,
                velocity: 0,
            }),
            (0x90, &[_, note, velocity]) => Some(Self::NoteOn {
                channel,
                note,
                velocity,
            }),
            (0xa0, &[_, note, pressure]) => Some(Self::PolyPressure {
                channel,
                note,
                pressure,
            }),
            (0xb0, &[_, controller, value]) => Some(Self::ControlChange {
                channel,
                controller,
                value,
            }),
            (0xc0, &[_, program]) => Some(Self::ProgramChange { channel, program }),
            (0xd0, &[_, pressure]) => Some(Self::ChannelPressure { channel, pressure }),
            (0xe0, &[_, lsb, msb]) => Some(Self::PitchBend {
                channel,
                value: (lsb as u16 & 0x7f) | ((msb as u16 & 0x7f) << 7),
            }),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> ArrayVec<[u8; 3]> {
        let mut out = ArrayVec::new();
        match self {
            Self::NoteOff {
                channel,
                note,
                velocity,
            } => {
                out.push(0x80 | channel);
                out.push(note);
                out.push(velocity);
            }
            Self::NoteOn {
                channel,
                note,
                velocity,
            } => {
                out.push(0x90 | channel);
                out.push(note);
                out.push(velocity);
            }
            Self::PolyPressure {
                channel,
                note,
                pressure,
            } => {
                out.push(0xa0 | channel);
                out.push(note);
                out.push(pressure);
            }
            Self::ControlChange {
                channel,
                controller,
                value,
            } => {
                out.push(0xb0 | channel);
                out.push(controller);
                out.push(value);
            }
            Self::ProgramChange { channel, program } => {
                out.push(0xc0 | channel);
                out.push(program);
            }
            Self::ChannelPressure { channel, pressure } => {
                out.push(0xd0 | channel);
                out.push(pressure);
            }
            Self::PitchBend { channel, value } => {
                out.push(0xe0 | channel);
                out.push((value & 0x7f) as u8);
                out.push(((value >> 7) & 0x7f) as u8);
            }
        };
        out
    }

    pub fn all_notes_off(channel: u8) -> Self {
        Self::ControlChange {
            channel,
            controller: ALL_NOTES_OFF,
            value: 0,
        }
    }

    pub fn all_sound_off(channel: u8) -> Self {
        Self::ControlChange {
            channel,
            controller: ALL_SOUND_OFF,
            value: 0,
        }
    }

    pub fn reset_all_controllers(channel: u8) -> Self {
        Self::ControlChange {
            channel,
            controller: RESET_ALL_CONTROLLERS,
            value: 0,
        }
    }
}

/// A message plus the session time (seconds) it was received or replayed at.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MidiEvent {
    pub message: Message,
    pub time: f64,
}

impl MidiEvent {
    pub fn new(message: Message, time: f64) -> Self {
        Self { message, time }
    }
}
