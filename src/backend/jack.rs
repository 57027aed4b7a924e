use crate::backend::backend::{choose_device, Backend, InputPort, OutputPort};
use crate::error::Error;
use crate::midi::{Message, MidiEvent};
use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CLIENT_NAME: &str = "looper";
const MIDI_PORT_TYPE: &str = "midi";
const QUEUE_DEPTH: usize = 4096;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

struct NotificationHandler {
    shutdown_tx: Sender<()>,
}

impl jack::NotificationHandler for NotificationHandler {
    fn shutdown(&mut self, _status: jack::ClientStatus, _reason: &str) {
        self.shutdown_tx.try_send(()).ok();
    }
}

struct ProcessHandler {
    midi_in_port: jack::Port<jack::MidiIn>,
    midi_out_port: jack::Port<jack::MidiOut>,
    epoch: Instant,
    received_tx: Sender<MidiEvent>,
    outgoing_rx: Receiver<Message>,
    // Messages that didn't fit in a period's buffer wait here for the next.
    pending: VecDeque<Message>,
    backlog: Arc<AtomicUsize>,
}

impl jack::ProcessHandler for ProcessHandler {
    fn process(&mut self, _client: &jack::Client, ps: &jack::ProcessScope) -> jack::Control {
        let time = self.epoch.elapsed().as_secs_f64();
        for jack::RawMidi { bytes, .. } in self.midi_in_port.iter(ps) {
            if let Some(message) = Message::from_bytes(bytes) {
                // The scheduler has stalled if this is full. Drop, never block.
                self.received_tx.try_send(MidiEvent::new(message, time)).ok();
            }
        }

        while self.pending.len() < self.pending.capacity() {
            match self.outgoing_rx.try_recv() {
                Ok(message) => self.pending.push_back(message),
                Err(_) => break,
            }
        }
        let mut writer = self.midi_out_port.writer(ps);
        while let Some(message) = self.pending.pop_front() {
            let bytes = message.to_bytes();
            match writer.write(&jack::RawMidi {
                time: 0,
                bytes: bytes.as_slice(),
            }) {
                Ok(()) => (),
                Err(jack::Error::NotEnoughSpace) => {
                    self.pending.push_front(message);
                    break;
                }
                Err(_) => (),
            }
        }
        let backlog = self.pending.len() + self.outgoing_rx.len();
        self.backlog.store(backlog, Ordering::Relaxed);

        jack::Control::Continue
    }
}

/// MIDI endpoints reached through a JACK client with one `in` and one `out`
/// port. Opening a device connects it to the matching port of ours.
pub struct JackBackend {
    async_client: jack::AsyncClient<NotificationHandler, ProcessHandler>,
    received_rx: Receiver<MidiEvent>,
    outgoing_tx: Sender<Message>,
    backlog: Arc<AtomicUsize>,
    shutdown_rx: Receiver<()>,
}

impl JackBackend {
    /// Received events are stamped in seconds since `epoch`.
    pub fn new(epoch: Instant) -> Result<JackBackend, Error> {
        let (client, _) = jack::Client::new(CLIENT_NAME, jack::ClientOptions::NO_START_SERVER)?;
        let midi_in_port = client.register_port("in", jack::MidiIn::default())?;
        let midi_out_port = client.register_port("out", jack::MidiOut::default())?;

        let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
        let (received_tx, received_rx) = crossbeam::channel::bounded(QUEUE_DEPTH);
        let (outgoing_tx, outgoing_rx) = crossbeam::channel::bounded(QUEUE_DEPTH);
        let backlog = Arc::new(AtomicUsize::new(0));

        let async_client = client.activate_async(
            NotificationHandler { shutdown_tx },
            ProcessHandler {
                midi_in_port,
                midi_out_port,
                epoch,
                received_tx,
                outgoing_rx,
                pending: VecDeque::with_capacity(QUEUE_DEPTH),
                backlog: backlog.clone(),
            },
        )?;
        log::info!("jack client {:?} active", async_client.as_client().name());
        Ok(JackBackend {
            async_client,
            received_rx,
            outgoing_tx,
            backlog,
            shutdown_rx,
        })
    }

    /// Fires once if the JACK server goes away.
    pub fn shutdown_rx(&self) -> &Receiver<()> {
        &self.shutdown_rx
    }

    fn own_port(&self, port: &str) -> String {
        format!("{}:{}", self.async_client.as_client().name(), port)
    }

    fn external_ports(&self, flags: jack::PortFlags) -> Vec<String> {
        let client = self.async_client.as_client();
        let own_prefix = format!("{}:", client.name());
        client
            .ports(None, Some(MIDI_PORT_TYPE), flags)
            .into_iter()
            .filter(|name| !name.starts_with(&own_prefix))
            .collect()
    }

    /// Block until everything sent so far has been handed to JACK.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.outgoing_tx.is_empty() || self.backlog.load(Ordering::Relaxed) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl Drop for JackBackend {
    fn drop(&mut self) {
        if !self.drain(DRAIN_TIMEOUT) {
            log::warn!("gave up waiting for queued midi output");
        }
    }
}

impl Backend for JackBackend {
    type Input = JackInput;
    type Output = JackOutput;

    fn list_inputs(&self) -> Vec<String> {
        self.external_ports(jack::PortFlags::IS_OUTPUT)
    }

    fn list_outputs(&self) -> Vec<String> {
        self.external_ports(jack::PortFlags::IS_INPUT)
    }

    fn open_input(&self, search: &str) -> Result<Option<JackInput>, Error> {
        let inputs = self.list_inputs();
        let source = match choose_device(&inputs, search) {
            Some(source) => source,
            None => return Ok(None),
        };
        self.async_client
            .as_client()
            .connect_ports_by_name(source, &self.own_port("in"))?;
        log::info!("input {:?} connected", source);
        Ok(Some(JackInput {
            received_rx: self.received_rx.clone(),
        }))
    }

    fn open_output(&self, search: &str) -> Result<Option<JackOutput>, Error> {
        let outputs = self.list_outputs();
        let destination = match choose_device(&outputs, search) {
            Some(destination) => destination,
            None => return Ok(None),
        };
        self.async_client
            .as_client()
            .connect_ports_by_name(&self.own_port("out"), destination)?;
        log::info!("output {:?} connected", destination);
        Ok(Some(JackOutput {
            outgoing_tx: self.outgoing_tx.clone(),
        }))
    }
}

pub struct JackInput {
    received_rx: Receiver<MidiEvent>,
}

impl InputPort for JackInput {
    fn try_receive(&mut self) -> Result<Option<MidiEvent>, Error> {
        match self.received_rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::TransientIo("input disconnected".into())),
        }
    }
}

pub struct JackOutput {
    outgoing_tx: Sender<Message>,
}

impl OutputPort for JackOutput {
    fn send(&mut self, event: &MidiEvent) -> Result<(), Error> {
        match self.outgoing_tx.try_send(event.message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::TransientIo("output queue full".into())),
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::TransientIo("output disconnected".into()))
            }
        }
    }
}
