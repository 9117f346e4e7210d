pub mod nrpn;
pub mod sysex;

use crossbeam_channel::{Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use synthctl_types::Channel;

use crate::transport::{MidiTransport, TransportError, TransportResult};

/// Inbound MIDI as delivered to the dispatch thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    ControlChange {
        channel: Channel,
        controller: u8,
        value: u8,
    },
    /// A sysex chunk. May be a whole message or a fragment of one.
    Sysex(Vec<u8>),
}

/// Information about an available MIDI port
#[derive(Debug, Clone)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// Find a port whose name contains `wanted`, ignoring case.
pub fn find_port(ports: &[MidiPortInfo], wanted: &str) -> Option<usize> {
    let wanted = wanted.to_lowercase();
    ports
        .iter()
        .find(|p| p.name.to_lowercase().contains(&wanted))
        .map(|p| p.index)
}

/// List MIDI input ports visible to a client named `client_name`.
pub fn input_ports(client_name: &str) -> Vec<MidiPortInfo> {
    let Ok(midi_in) = MidiInput::new(client_name) else {
        return Vec::new();
    };
    midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// List MIDI output ports visible to a client named `client_name`.
pub fn output_ports(client_name: &str) -> Vec<MidiPortInfo> {
    let Ok(midi_out) = MidiOutput::new(client_name) else {
        return Vec::new();
    };
    midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// MIDI input manager.
///
/// The midir callback runs on its own thread; it only parses and forwards
/// messages over a channel. Drain `receiver()` from the dispatch thread.
pub struct MidiInputManager {
    client_name: String,
    connection: Option<MidiInputConnection<()>>,
    sender: Sender<InboundMessage>,
    receiver: Receiver<InboundMessage>,
    connected_port_name: Option<String>,
}

impl MidiInputManager {
    pub fn new(client_name: impl Into<String>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            client_name: client_name.into(),
            connection: None,
            sender,
            receiver,
            connected_port_name: None,
        }
    }

    pub fn list_ports(&self) -> Vec<MidiPortInfo> {
        input_ports(&self.client_name)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected_port_name.as_deref()
    }

    pub fn receiver(&self) -> &Receiver<InboundMessage> {
        &self.receiver
    }

    /// Connect to a MIDI input port by index
    pub fn connect(&mut self, port_index: usize) -> TransportResult {
        self.disconnect();

        let mut midi_in = MidiInput::new(&self.client_name).map_err(|e| e.to_string())?;
        // sysex is filtered by default
        midi_in.ignore(Ignore::None);
        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| TransportError(format!("Invalid input port index: {}", port_index)))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let tx = self.sender.clone();
        let connection = midi_in
            .connect(
                port,
                &format!("{}-input", self.client_name),
                move |_timestamp, message, _| {
                    if let Some(msg) = parse_midi_message(message) {
                        let _ = tx.send(msg);
                    }
                },
                (),
            )
            .map_err(|e| e.to_string())?;

        log::info!(target: "midi", "input connected: {}", port_name);
        self.connection = Some(connection);
        self.connected_port_name = Some(port_name);
        Ok(())
    }

    /// Connect to the first input port whose name contains `name`.
    pub fn connect_by_name(&mut self, name: &str) -> TransportResult {
        let index = find_port(&self.list_ports(), name)
            .ok_or_else(|| TransportError(format!("No input port matching '{}'", name)))?;
        self.connect(index)
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            log::info!(target: "midi", "input disconnected");
        }
        self.connected_port_name = None;
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// MIDI output manager; the live `MidiTransport`.
pub struct MidiOutputManager {
    client_name: String,
    connection: Option<MidiOutputConnection>,
    connected_port_name: Option<String>,
}

impl MidiOutputManager {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            connection: None,
            connected_port_name: None,
        }
    }

    pub fn list_ports(&self) -> Vec<MidiPortInfo> {
        output_ports(&self.client_name)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected_port_name.as_deref()
    }

    pub fn connect(&mut self, port_index: usize) -> TransportResult {
        self.disconnect();

        let midi_out = MidiOutput::new(&self.client_name).map_err(|e| e.to_string())?;
        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| TransportError(format!("Invalid output port index: {}", port_index)))?;
        let port_name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_out
            .connect(port, &format!("{}-output", self.client_name))
            .map_err(|e| e.to_string())?;

        log::info!(target: "midi", "output connected: {}", port_name);
        self.connection = Some(connection);
        self.connected_port_name = Some(port_name);
        Ok(())
    }

    pub fn connect_by_name(&mut self, name: &str) -> TransportResult {
        let index = find_port(&self.list_ports(), name)
            .ok_or_else(|| TransportError(format!("No output port matching '{}'", name)))?;
        self.connect(index)
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            log::info!(target: "midi", "output disconnected");
        }
        self.connected_port_name = None;
    }

    fn send(&mut self, message: &[u8]) -> TransportResult {
        let conn = self
            .connection
            .as_mut()
            .ok_or_else(|| TransportError("no output port connected".to_string()))?;
        conn.send(message).map_err(|e| TransportError(e.to_string()))
    }
}

impl MidiTransport for MidiOutputManager {
    fn send_cc(&mut self, channel: Channel, controller: u8, value: u8) -> TransportResult {
        log::trace!(target: "midi", "out cc ch{} {} = {}", channel, controller, value);
        self.send(&[0xB0 | channel.wire(), controller & 0x7F, value & 0x7F])
    }

    fn send_sysex(&mut self, message: &[u8]) -> TransportResult {
        log::debug!(target: "midi", "out sysex {} bytes", message.len());
        self.send(message)
    }
}

impl Drop for MidiOutputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Parse raw bytes from the input callback. Control changes and sysex
/// (including continuation chunks, which start with a data byte) are kept;
/// everything else is ignored.
pub fn parse_midi_message(data: &[u8]) -> Option<InboundMessage> {
    let status = *data.first()?;

    if status == sysex::SYSEX_START || status < 0x80 {
        return Some(InboundMessage::Sysex(data.to_vec()));
    }

    match status & 0xF0 {
        0xB0 if data.len() >= 3 => Some(InboundMessage::ControlChange {
            channel: Channel::from_wire(status),
            controller: data[1] & 0x7F,
            value: data[2] & 0x7F,
        }),
        _ => None,
    }
}
