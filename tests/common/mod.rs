#![allow(dead_code)]

use looper::backend::{InputPort, OutputPort};
use looper::config::Config;
use looper::error::Error;
use looper::midi::{Message, MidiEvent};
use looper::mode::{Command, CommandSource};
use looper::scheduler::Scheduler;
use looper::timer::Timer;
use looper::ui::StatusSink;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub type Now = Rc<Cell<f64>>;

/// Simulated time. Sleeping jumps ahead; every read of `now` also nudges
/// time forward by `step` so a loop that never sleeps still makes progress.
pub struct SimTimer {
    now: Now,
    step: f64,
}

impl Timer for SimTimer {
    fn now(&self) -> f64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }

    fn sleep(&mut self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

/// Hands out each event once simulated time reaches its timestamp.
pub struct ScriptedInput {
    now: Now,
    pending: VecDeque<MidiEvent>,
}

impl InputPort for ScriptedInput {
    fn try_receive(&mut self) -> Result<Option<MidiEvent>, Error> {
        match self.pending.front() {
            Some(event) if event.time <= self.now.get() => Ok(self.pending.pop_front()),
            _ => Ok(None),
        }
    }
}

pub struct ScriptedCommands {
    now: Now,
    pending: VecDeque<(f64, Command)>,
}

impl CommandSource for ScriptedCommands {
    fn poll(&mut self) -> Option<Command> {
        match self.pending.front() {
            Some(&(time, _)) if time <= self.now.get() => self.pending.pop_front().map(|(_, c)| c),
            _ => None,
        }
    }
}

pub type Sent = Rc<RefCell<Vec<MidiEvent>>>;

/// Keeps everything sent, even after the scheduler is gone.
pub struct RecordingOutput {
    sent: Sent,
    fail_every: Option<usize>,
    attempts: usize,
}

impl OutputPort for RecordingOutput {
    fn send(&mut self, event: &MidiEvent) -> Result<(), Error> {
        self.attempts += 1;
        if let Some(every) = self.fail_every {
            if self.attempts % every == 0 {
                return Err(Error::TransientIo("simulated glitch".into()));
            }
        }
        self.sent.borrow_mut().push(*event);
        Ok(())
    }
}

pub struct CollectStatus(pub Rc<RefCell<Vec<String>>>);

impl StatusSink for CollectStatus {
    fn show_status(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
}

pub type Sim = Scheduler<ScriptedInput, RecordingOutput, SimTimer>;

pub struct Harness {
    pub scheduler: Sim,
    pub now: Now,
    pub sent: Sent,
    pub status: Rc<RefCell<Vec<String>>>,
}

pub struct Setup {
    pub config: Config,
    pub input: Vec<MidiEvent>,
    pub commands: Vec<(f64, Command)>,
    pub step: f64,
    pub fail_every: Option<usize>,
}

impl Setup {
    /// Exact timing: no safety margin, no time passing outside sleeps.
    pub fn new(loop_length: f64, tick_rate: f64) -> Setup {
        let mut config = Config::default();
        config.loop_length = loop_length;
        config.tick_rate = tick_rate;
        config.safety_margin = 0.0;
        Setup {
            config,
            input: Vec::new(),
            commands: Vec::new(),
            step: 0.0,
            fail_every: None,
        }
    }

    pub fn input(mut self, time: f64, message: Message) -> Setup {
        self.input.push(MidiEvent::new(message, time));
        self
    }

    pub fn command(mut self, time: f64, command: Command) -> Setup {
        self.commands.push((time, command));
        self
    }

    pub fn start(self) -> Harness {
        let now: Now = Rc::new(Cell::new(0.0));
        let sent: Sent = Rc::new(RefCell::new(Vec::new()));
        let status = Rc::new(RefCell::new(Vec::new()));
        let scheduler = Scheduler::new(
            &self.config,
            ScriptedInput {
                now: now.clone(),
                pending: self.input.into(),
            },
            RecordingOutput {
                sent: sent.clone(),
                fail_every: self.fail_every,
                attempts: 0,
            },
            SimTimer {
                now: now.clone(),
                step: self.step,
            },
            Box::new(ScriptedCommands {
                now: now.clone(),
                pending: self.commands.into(),
            }),
            Box::new(CollectStatus(status.clone())),
        );
        Harness {
            scheduler,
            now,
            sent,
            status,
        }
    }
}

impl Harness {
    /// Tick until simulated time reaches `end`.
    pub fn run_until(&mut self, end: f64) {
        let mut ticks = 0;
        while self.now.get() < end {
            self.scheduler.tick();
            ticks += 1;
            assert!(ticks < 1_000_000, "scheduler stopped advancing time");
        }
    }

    /// Times at which `message` was sent.
    pub fn times_sent(&self, message: Message) -> Vec<f64> {
        self.sent
            .borrow()
            .iter()
            .filter(|event| event.message == message)
            .map(|event| event.time)
            .collect()
    }
}

pub fn note_on(note: u8) -> Message {
    Message::NoteOn {
        channel: 0,
        note,
        velocity: 100,
    }
}

pub fn note_off(note: u8, velocity: u8) -> Message {
    Message::NoteOff {
        channel: 0,
        note,
        velocity,
    }
}

pub fn click_on() -> Message {
    Message::NoteOn {
        channel: 0,
        note: 60,
        velocity: 64,
    }
}

pub fn click_off() -> Message {
    note_off(60, 127)
}

pub fn assert_near(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "got {:?}, expected {:?}",
        actual,
        expected
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            *a >= *e - 1e-9 && *a <= *e + tolerance,
            "got {:?}, expected {:?} (+{})",
            actual,
            expected,
            tolerance
        );
    }
}
