//! MIDI input routing.
//!
//! Raw byte triples arrive on driver threads and are queued through an
//! [`MidiInbox`]. The render loop drains the queue once per tick; every
//! message is applied individually so that Note-On/Note-Off pairs landing
//! between two ticks still leave the active-note set correct.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

mod synth;

pub use synth::{midi_to_frequency, note_name, ToneBank, ToneRequest};

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// A decoded channel message. Only note messages are of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

impl MidiMessage {
    /// Classifies a raw message by its full status byte. A Note-On with zero
    /// velocity is a Note-Off. Anything else, including short messages,
    /// yields `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let [status, note, velocity] = match bytes {
            [s, n, v, ..] => [*s, *n & 0x7F, *v & 0x7F],
            _ => return None,
        };
        match status {
            NOTE_ON if velocity > 0 => Some(Self::NoteOn { note, velocity }),
            NOTE_ON | NOTE_OFF => Some(Self::NoteOff { note }),
            _ => None,
        }
    }
}

/// A note currently held down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiNoteEvent {
    pub note: u8,
    pub velocity: u8,
    pub timestamp_ms: u64,
}

/// A raw message as delivered by a driver callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMidi {
    pub bytes: [u8; 3],
    pub timestamp_ms: u64,
}

/// Cloneable sender handed to MIDI driver callbacks.
#[derive(Debug, Clone)]
pub struct MidiInbox {
    tx: Sender<RawMidi>,
}

impl MidiInbox {
    pub fn send(&self, bytes: [u8; 3], timestamp_ms: u64) {
        // A closed router means the render loop is gone; dropping is fine.
        let _ = self.tx.send(RawMidi {
            bytes,
            timestamp_ms,
        });
    }
}

/// Keeps the set of active notes, in arrival order.
#[derive(Debug)]
pub struct MidiRouter {
    active: Vec<MidiNoteEvent>,
    inbox: Sender<RawMidi>,
    queue: Receiver<RawMidi>,
}

impl Default for MidiRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiRouter {
    pub fn new() -> Self {
        let (inbox, queue) = mpsc::channel();
        Self {
            active: Vec::new(),
            inbox,
            queue,
        }
    }

    pub fn inbox(&self) -> MidiInbox {
        MidiInbox {
            tx: self.inbox.clone(),
        }
    }

    /// Applies one raw message. Returns a tone request for Note-Ons.
    pub fn handle(&mut self, bytes: &[u8], timestamp_ms: u64) -> Option<ToneRequest> {
        match MidiMessage::parse(bytes)? {
            MidiMessage::NoteOn { note, velocity } => {
                self.release(note);
                self.active.push(MidiNoteEvent {
                    note,
                    velocity,
                    timestamp_ms,
                });
                tracing::debug!(note, velocity, "note on");
                Some(ToneRequest::for_note(note))
            }
            MidiMessage::NoteOff { note } => {
                self.release(note);
                tracing::debug!(note, "note off");
                None
            }
        }
    }

    /// Applies every message queued since the previous drain, in order.
    pub fn drain(&mut self) -> Vec<ToneRequest> {
        let mut tones = Vec::new();
        while let Ok(raw) = self.queue.try_recv() {
            if let Some(tone) = self.handle(&raw.bytes, raw.timestamp_ms) {
                tones.push(tone);
            }
        }
        tones
    }

    pub fn active_notes(&self) -> &[MidiNoteEvent] {
        &self.active
    }

    pub fn is_active(&self, note: u8) -> bool {
        self.active.iter().any(|event| event.note == note)
    }

    fn release(&mut self, note: u8) {
        self.active.retain(|event| event.note != note);
    }
}

/// A MIDI input port as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiDevice {
    pub id: String,
    pub name: String,
}

/// Lists connected MIDI inputs, or nothing if no MIDI subsystem exists.
pub fn list_midi_devices() -> Vec<MidiDevice> {
    #[cfg(feature = "live-input")]
    {
        let input = match midir::MidiInput::new("av-mixer-enumerate") {
            Ok(input) => input,
            Err(err) => {
                tracing::warn!(%err, "midi subsystem unavailable");
                return Vec::new();
            }
        };
        input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| MidiDevice {
                id: index.to_string(),
                name: input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("MIDI {index}")),
            })
            .collect()
    }

    #[cfg(not(feature = "live-input"))]
    {
        tracing::debug!("built without live-input; no midi devices");
        Vec::new()
    }
}

/// Open MIDI connections feeding a router's inbox. Dropping closes them.
pub struct MidiCapability {
    #[cfg(feature = "live-input")]
    connections: Vec<midir::MidiInputConnection<()>>,
    devices: Vec<MidiDevice>,
}

impl std::fmt::Debug for MidiCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiCapability")
            .field("devices", &self.devices)
            .finish()
    }
}

impl MidiCapability {
    /// Connects every available input to `inbox`. Ports that fail to open are
    /// skipped; with no MIDI subsystem the capability is simply empty.
    pub fn connect_all(inbox: &MidiInbox) -> Self {
        #[cfg(feature = "live-input")]
        {
            let mut connections = Vec::new();
            let mut devices = Vec::new();
            let port_count = match midir::MidiInput::new("av-mixer-scan") {
                Ok(scanner) => scanner.port_count(),
                Err(err) => {
                    tracing::warn!(%err, "midi subsystem unavailable");
                    0
                }
            };
            for index in 0..port_count {
                // Each connection consumes its own client.
                let Ok(input) = midir::MidiInput::new("av-mixer") else {
                    continue;
                };
                let Some(port) = input.ports().get(index).cloned() else {
                    continue;
                };
                let name = input
                    .port_name(&port)
                    .unwrap_or_else(|_| format!("MIDI {index}"));
                let sender = inbox.clone();
                match input.connect(
                    &port,
                    "av-mixer-in",
                    move |stamp_us, bytes, _| {
                        if let [a, b, c, ..] = bytes {
                            sender.send([*a, *b, *c], stamp_us / 1_000);
                        }
                    },
                    (),
                ) {
                    Ok(connection) => {
                        tracing::info!(port = name.as_str(), "midi input connected");
                        connections.push(connection);
                        devices.push(MidiDevice {
                            id: index.to_string(),
                            name,
                        });
                    }
                    Err(err) => tracing::warn!(%err, "failed to open midi port"),
                }
            }
            Self {
                connections,
                devices,
            }
        }

        #[cfg(not(feature = "live-input"))]
        {
            let _ = inbox;
            Self {
                devices: Vec::new(),
            }
        }
    }

    pub fn devices(&self) -> &[MidiDevice] {
        &self.devices
    }

    pub fn is_connected(&self) -> bool {
        #[cfg(feature = "live-input")]
        {
            !self.connections.is_empty()
        }
        #[cfg(not(feature = "live-input"))]
        {
            false
        }
    }
}
