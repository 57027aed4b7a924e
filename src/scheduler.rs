//! The real-time loop: poll input, apply commands, replay the loop, sleep.

use crate::backend::{InputPort, OutputPort};
use crate::clock::{DriftReport, LoopClock};
use crate::config::Config;
use crate::event_log::{Due, EventLog};
use crate::midi::{Message, MidiEvent, CHANNELS, NOTES};
use crate::mode::{Command, CommandSource, Mode};
use crate::output::OutputGuard;
use crate::timer::Timer;
use crate::ui::StatusSink;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Scheduler<I: InputPort, O: OutputPort, T: Timer> {
    input: I,
    output: OutputGuard<O>,
    timer: T,
    commands: Box<dyn CommandSource>,
    status: Box<dyn StatusSink>,

    clock: LoopClock,
    log: EventLog,
    mode: Mode,
    // Recorded note-ons whose note-off hasn't been recorded yet.
    open_notes: [[bool; NOTES as usize]; CHANNELS as usize],

    tick_period: f64,
    max_catchup: f64,
    safety_margin: f64,
    last_tick: f64,
    time_budget: f64,
    status_dirty: bool,
    // Shown with the status line until the next command.
    notice: Option<String>,
    last_drift: Option<DriftReport>,
    quit: bool,
}

impl<I: InputPort, O: OutputPort, T: Timer> Scheduler<I, O, T> {
    pub fn new(
        config: &Config,
        input: I,
        output: O,
        timer: T,
        commands: Box<dyn CommandSource>,
        status: Box<dyn StatusSink>,
    ) -> Self {
        let now = timer.now();
        let tick_period = config.tick_period();
        Scheduler {
            input,
            output: OutputGuard::new(output, config.keyboard.notes()),
            timer,
            commands,
            status,
            clock: LoopClock::new(
                now,
                config.loop_length,
                config.rollover_epsilon(),
                config.drift_every,
            ),
            log: EventLog::with_click(config.click),
            mode: Mode::default(),
            open_notes: [[false; NOTES as usize]; CHANNELS as usize],
            tick_period,
            max_catchup: config.max_catchup,
            safety_margin: config.safety_margin,
            last_tick: now,
            // The first update runs straight away so the downbeat lands at start.
            time_budget: tick_period,
            status_dirty: true,
            notice: None,
            last_drift: None,
            quit: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn clock(&self) -> &LoopClock {
        &self.clock
    }

    pub fn output(&self) -> &OutputGuard<O> {
        &self.output
    }

    /// The most recent drift report, if one was made while playing.
    pub fn last_drift(&self) -> Option<DriftReport> {
        self.last_drift
    }

    /// Tick until a quit command arrives or `stop` says so. `stop` is
    /// checked at the top of every tick.
    pub fn run(&mut self, mut stop: impl FnMut() -> bool) {
        log::info!(
            "looping {}s at {} ticks/s, {}",
            self.clock.length(),
            1.0 / self.tick_period,
            self.mode
        );
        while !stop() {
            if self.tick() == Flow::Quit {
                break;
            }
        }
        log::info!("stopped after {} cycles", self.clock.cycles_completed());
    }

    pub fn tick(&mut self) -> Flow {
        if self.quit {
            return Flow::Quit;
        }
        let now = self.timer.now();
        // A long stall (the host sleeping) isn't replayed as a burst.
        let frame_delta = (now - self.last_tick).max(0.0).min(self.max_catchup);
        self.last_tick = now;
        self.time_budget += frame_delta;
        log::trace!("frame delta {:.6}", frame_delta);

        while self.time_budget >= self.tick_period {
            self.update(now);
            self.time_budget = (self.time_budget - self.tick_period).max(0.0);
            if self.quit {
                return Flow::Quit;
            }
        }

        let sleep = self.tick_period - self.time_budget - self.safety_margin;
        if sleep > 0.0 {
            log::trace!("sleep {:.6}", sleep);
            self.timer.sleep(sleep);
        }
        Flow::Continue
    }

    fn update(&mut self, now: f64) {
        self.output.touch(now);

        // Live input goes out before any playback, and is recorded according
        // to the mode as it stood before this step's command.
        let recording = self.mode.recording_enabled();
        loop {
            match self.input.try_receive() {
                Ok(Some(event)) => self.handle_input(event, recording),
                Ok(None) => break,
                Err(err) => {
                    log::warn!("input skipped: {}", err);
                    break;
                }
            }
        }

        if let Some(command) = self.commands.poll() {
            self.apply(command, now);
        }

        self.play(now);

        if self.status_dirty {
            self.status_dirty = false;
            let line = self.status_line(now);
            self.status.show_status(&line);
        }
    }

    fn handle_input(&mut self, event: MidiEvent, recording: bool) {
        self.output.send_live(&event);
        if !recording {
            return;
        }
        match event.message {
            Message::NoteOn { channel, note, .. } => {
                self.open_notes[channel as usize][note as usize] = true
            }
            Message::NoteOff { channel, note, .. } => {
                self.open_notes[channel as usize][note as usize] = false
            }
            _ => (),
        }
        // An event stamped on the rollover tick starts the next cycle, so it
        // must not replay until the one after.
        let (offset, cycle) = self.clock.position_of(event.time);
        log::debug!("recorded {:?} at {:.3}s", event.message, offset);
        self.log.record(event, offset, cycle);
        self.status_dirty = true;
    }

    fn apply(&mut self, command: Command, now: f64) {
        log::debug!("command: {}", command);
        self.notice = None;
        match command {
            Command::Quit => self.quit = true,
            Command::TogglePlayback => self.set_mode(self.mode.toggle_playback(), now),
            Command::ToggleRecording => match self.mode.toggle_recording() {
                Ok(mode) => self.set_mode(mode, now),
                Err(err) => {
                    log::warn!("{}", err);
                    self.notice = Some(err.to_string());
                }
            },
            Command::ClearSequence => {
                self.log.clear();
                self.open_notes = [[false; NOTES as usize]; CHANNELS as usize];
                self.output.release_loop_notes(now);
                self.clock.restart(now);
                log::info!("sequence cleared");
            }
            Command::ResetOutput => {
                self.output.silence(now);
                log::info!("output reset");
            }
        }
        self.status_dirty = true;
    }

    fn set_mode(&mut self, mode: Mode, now: f64) {
        let old = self.mode;
        if old == mode {
            return;
        }
        if old.recording_enabled() && !mode.recording_enabled() {
            self.close_open_notes(now);
        }
        if old.playback_enabled() && !mode.playback_enabled() {
            self.output.release_loop_notes(now);
        }
        self.mode = mode;
        log::info!("{} -> {}", old, mode);
    }

    /// Record a note-off for every note still held when recording stops.
    fn close_open_notes(&mut self, now: f64) {
        let (offset, cycle) = self.clock.position_of(now);
        for channel in 0..CHANNELS {
            for note in 0..NOTES {
                if !self.open_notes[channel as usize][note as usize] {
                    continue;
                }
                self.open_notes[channel as usize][note as usize] = false;
                let note_off = Message::NoteOff {
                    channel,
                    note,
                    velocity: 0,
                };
                self.log.record(MidiEvent::new(note_off, now), offset, cycle);
            }
        }
    }

    fn play(&mut self, now: f64) {
        let playing = self.mode.playback_enabled();

        if self.clock.rolls_over_at(now) {
            // Whatever the old cycle still owes goes out before the new one.
            let cycle = self.clock.cycles_completed();
            fire(
                self.log.remaining(cycle),
                &mut self.output,
                &mut self.clock,
                playing,
                now,
            );
            self.log.rewind();
        }

        let advance = self.clock.advance(now);
        if advance.rolled_over {
            self.status_dirty = true;
            if let (true, Some(report)) = (playing, advance.drift) {
                log_drift(&report);
                self.last_drift = Some(report);
            }
        }

        let cycle = self.clock.cycles_completed();
        fire(
            self.log.due(advance.elapsed, cycle),
            &mut self.output,
            &mut self.clock,
            playing,
            now,
        );
    }

    fn status_line(&self, now: f64) -> String {
        let mut line = format!(
            "{:<9} cycle {:>4}  {:>6.2}/{:.2}s  {} events",
            self.mode.to_string(),
            self.clock.cycles_completed(),
            self.clock.elapsed(now).max(0.0),
            self.clock.length(),
            self.log.len(),
        );
        if let Some(notice) = &self.notice {
            line.push_str("  ");
            line.push_str(notice);
        }
        line
    }
}

/// Send due events (when playing) and move the watermark past them. With
/// playback off they're skipped, so re-enabling doesn't burst.
fn fire<O: OutputPort>(
    due: Due<'_>,
    output: &mut OutputGuard<O>,
    clock: &mut LoopClock,
    playing: bool,
    now: f64,
) {
    for scheduled in due {
        clock.mark_fired(scheduled.offset);
        if playing {
            output.send_loop(&MidiEvent::new(scheduled.event.message, now));
        }
    }
}

fn log_drift(report: &DriftReport) {
    log::info!(
        "loop played {} times; drifted {:+.6}s overall, {:+.6}s over the last {}",
        report.cycles,
        report.cumulative,
        report.windowed,
        report.window
    );
}
