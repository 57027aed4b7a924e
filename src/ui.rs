use crate::mode::Command;
use crossbeam::channel::Receiver;
use std::io::{stdin, stdout, Write};
use std::thread::spawn;
use termion::cursor::{Goto, HideCursor};
use termion::event::Key;
use termion::input::TermRead;
use termion::raw::IntoRawMode;
use termion::screen::AlternateScreen;

const HELP: &str = "space/p play  r record  c clear  x reset  q quit";

/// Where the scheduler reports what it's doing. Must never hold up a tick.
pub trait StatusSink {
    fn show_status(&mut self, text: &str);
}

/// No screen; status goes to the debug log.
pub struct Headless;

impl StatusSink for Headless {
    fn show_status(&mut self, text: &str) {
        log::debug!("{}", text);
    }
}

/// A status line on an alternate screen in raw mode. Restores the terminal
/// on drop.
pub struct TerminalStatus {
    stdout: Box<dyn Write>,
}

impl TerminalStatus {
    pub fn new() -> std::io::Result<TerminalStatus> {
        let stdout = stdout().into_raw_mode()?;
        let stdout = AlternateScreen::from(stdout);
        let stdout = HideCursor::from(stdout);
        let mut status = TerminalStatus {
            stdout: Box::new(stdout),
        };
        write!(
            status.stdout,
            "{}{}{}{}",
            termion::clear::All,
            Goto(1, 3),
            HELP,
            Goto(1, 1)
        )?;
        status.stdout.flush()?;
        Ok(status)
    }
}

impl StatusSink for TerminalStatus {
    fn show_status(&mut self, text: &str) {
        let stdout = &mut self.stdout;
        let clear = termion::clear::CurrentLine;
        write!(stdout, "{}{}{}", Goto(1, 1), clear, text)
            .and_then(|()| stdout.flush())
            .ok();
    }
}

pub fn command_for_key(key: Key) -> Option<Command> {
    match key {
        Key::Char('q') | Key::Ctrl('c') => Some(Command::Quit),
        Key::Char(' ') | Key::Char('p') => Some(Command::TogglePlayback),
        Key::Char('r') => Some(Command::ToggleRecording),
        Key::Char('c') | Key::Delete => Some(Command::ClearSequence),
        Key::Char('x') | Key::Esc => Some(Command::ResetOutput),
        _ => None,
    }
}

/// Read keys on a helper thread and hand commands over a channel the
/// scheduler can poll without blocking.
pub fn spawn_key_reader() -> Receiver<Command> {
    let (command_tx, command_rx) = crossbeam::channel::bounded(16);
    spawn(move || {
        for key in stdin().keys() {
            let key = match key {
                Ok(key) => key,
                Err(err) => {
                    log::warn!("keyboard: {}", err);
                    return;
                }
            };
            if let Some(command) = command_for_key(key) {
                if command_tx.send(command).is_err() {
                    return;
                }
            }
        }
    });
    command_rx
}
