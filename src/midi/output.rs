// MIDI output - sinks receiving raw messages from instruments

use super::{MidiError, MidiEvent};
use midir::{MidiOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex};

const CLIENT_NAME: &str = "MyMusic Roll";

/// Destination for raw MIDI messages
pub trait MidiSink {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError>;
}

impl<S: MidiSink + ?Sized> MidiSink for Box<S> {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        (**self).send(message)
    }
}

/// Connected hardware or virtual MIDI output port
pub struct MidiOutputDevice {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidiOutputDevice {
    /// Names of every output port currently visible
    pub fn available_ports() -> Vec<String> {
        let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) else {
            return Vec::new();
        };
        midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect()
    }

    /// Connect to the port named `name`, or to the first port when `None`
    pub fn connect(name: Option<&str>) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::Init(e.to_string()))?;

        let port = midi_out
            .ports()
            .into_iter()
            .find(|port| match name {
                Some(wanted) => midi_out.port_name(port).is_ok_and(|n| n == wanted),
                None => true,
            })
            .ok_or_else(|| MidiError::NoPort(name.unwrap_or("<default>").to_string()))?;

        let port_name = midi_out
            .port_name(&port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_out
            .connect(&port, "roll-output")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("connected to MIDI output '{}'", port_name);
        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiSink for MidiOutputDevice {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        self.connection
            .send(message)
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}

/// In-memory sink recording every message
///
/// Clones share the same buffer, so a caller can keep one handle while an
/// instrument owns another.
#[derive(Debug, Clone, Default)]
pub struct MidiCapture {
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MidiCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every message sent so far
    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Captured messages decoded as channel events; others are skipped
    pub fn events(&self) -> Vec<MidiEvent> {
        self.messages()
            .iter()
            .filter_map(|message| MidiEvent::from_bytes(message))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

impl MidiSink for MidiCapture {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        if let Some(event) = MidiEvent::from_bytes(message) {
            log::trace!("captured {:?}", event);
        }
        self.messages
            .lock()
            .map_err(|_| MidiError::Poisoned)?
            .push(message.to_vec());
        Ok(())
    }
}
