//! MIDI transport trait: the outbound side of the wire.
//!
//! `MidiTransport` captures what the core *means* to send (a control change,
//! a sysex message) independently of the port it goes out on. The core never
//! opens ports itself; `midi::MidiOutputManager` implements this over midir,
//! and `TestTransport` records everything for assertions.

use std::fmt;
use std::sync::{Arc, Mutex};

use synthctl_types::Channel;

use crate::midi::nrpn;

pub type TransportResult<T = ()> = Result<T, TransportError>;

#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportError {}

impl From<String> for TransportError {
    fn from(s: String) -> Self {
        TransportError(s)
    }
}

pub trait MidiTransport {
    /// Send one control change message.
    fn send_cc(&mut self, channel: Channel, controller: u8, value: u8) -> TransportResult;

    /// Send a complete sysex message, framing bytes included.
    fn send_sysex(&mut self, message: &[u8]) -> TransportResult;

    /// Send a 14-bit parameter as the four-message NRPN sequence.
    fn send_nrpn(&mut self, channel: Channel, nrpn: u16, value: u16) -> TransportResult {
        for (controller, data) in nrpn::encode(nrpn, value) {
            self.send_cc(channel, controller, data)?;
        }
        Ok(())
    }
}

/// Transport that drops everything. Used when no output port is open.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl MidiTransport for NullTransport {
    fn send_cc(&mut self, _channel: Channel, _controller: u8, _value: u8) -> TransportResult {
        Ok(())
    }

    fn send_sysex(&mut self, _message: &[u8]) -> TransportResult {
        Ok(())
    }
}

// ─── Test Transport ─────────────────────────────────────────────────

/// An operation recorded by `TestTransport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    Cc {
        channel: Channel,
        controller: u8,
        value: u8,
    },
    Sysex(Vec<u8>),
}

/// Records every outbound message. Clones share the same record, so a test
/// can keep one handle and give the other to the engine.
#[derive(Debug, Default, Clone)]
pub struct TestTransport {
    ops: Arc<Mutex<Vec<TransportOp>>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<TransportOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.clear();
        }
    }

    /// Recorded sysex messages, in order.
    pub fn sysex_sent(&self) -> Vec<Vec<u8>> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::Sysex(bytes) => Some(bytes),
                TransportOp::Cc { .. } => None,
            })
            .collect()
    }

    /// Recorded control changes regrouped into `(channel, nrpn, value)`
    /// writes. Every four consecutive CCs on a channel that form a complete
    /// NRPN sequence count as one write.
    pub fn nrpn_writes(&self) -> Vec<(Channel, u16, u16)> {
        let ccs: Vec<(Channel, u8, u8)> = self
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::Cc {
                    channel,
                    controller,
                    value,
                } => Some((channel, controller, value)),
                TransportOp::Sysex(_) => None,
            })
            .collect();

        let mut writes = Vec::new();
        let mut i = 0;
        while i + 4 <= ccs.len() {
            let window = &ccs[i..i + 4];
            let channel = window[0].0;
            let controllers = [window[0].1, window[1].1, window[2].1, window[3].1];
            if controllers == nrpn::SEQUENCE && window.iter().all(|(c, _, _)| *c == channel) {
                let (nrpn, value) =
                    nrpn::decode([window[0].2, window[1].2, window[2].2, window[3].2]);
                writes.push((channel, nrpn, value));
                i += 4;
            } else {
                i += 1;
            }
        }
        writes
    }

    /// Recorded control changes that are not part of an NRPN sequence.
    pub fn plain_ccs(&self) -> Vec<(Channel, u8, u8)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::Cc {
                    channel,
                    controller,
                    value,
                } if !nrpn::SEQUENCE.contains(&controller) => Some((channel, controller, value)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, op: TransportOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }
}

impl MidiTransport for TestTransport {
    fn send_cc(&mut self, channel: Channel, controller: u8, value: u8) -> TransportResult {
        self.push(TransportOp::Cc {
            channel,
            controller,
            value,
        });
        Ok(())
    }

    fn send_sysex(&mut self, message: &[u8]) -> TransportResult {
        self.push(TransportOp::Sysex(message.to_vec()));
        Ok(())
    }
}
