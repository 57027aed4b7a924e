//! Live MIDI looper: echoes a controller to a synth, records what's played
//! into a fixed-length loop, and replays the loop in time with the wall
//! clock.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_log;
pub mod midi;
pub mod mode;
pub mod output;
pub mod scheduler;
pub mod signal;
pub mod timer;
pub mod ui;

pub use error::Error;
