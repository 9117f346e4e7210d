//! NRPN wire codec.
//!
//! A 14-bit parameter change travels as four control changes: parameter
//! number MSB/LSB (CC 99/98) followed by data entry MSB/LSB (CC 6/38).
//! Receivers buffer per channel until all four have arrived; hardware may
//! reorder the MSB/LSB pairs, so arrival order is not assumed.

use std::time::{Duration, Instant};

use synthctl_types::Channel;

pub const PARAM_MSB: u8 = 0x63;
pub const PARAM_LSB: u8 = 0x62;
pub const VALUE_MSB: u8 = 0x06;
pub const VALUE_LSB: u8 = 0x26;

/// Controller numbers of one NRPN write, in transmit order.
pub const SEQUENCE: [u8; 4] = [PARAM_MSB, PARAM_LSB, VALUE_MSB, VALUE_LSB];

/// Encode a parameter write as `(controller, data)` pairs in transmit order.
pub fn encode(nrpn: u16, value: u16) -> [(u8, u8); 4] {
    [
        (PARAM_MSB, (nrpn >> 7 & 0x7F) as u8),
        (PARAM_LSB, (nrpn & 0x7F) as u8),
        (VALUE_MSB, (value >> 7 & 0x7F) as u8),
        (VALUE_LSB, (value & 0x7F) as u8),
    ]
}

/// Decode the four data bytes of an NRPN write, given in `SEQUENCE` order.
pub fn decode(data: [u8; 4]) -> (u16, u16) {
    let nrpn = (data[0] as u16) << 7 | data[1] as u16;
    let value = (data[2] as u16) << 7 | data[3] as u16;
    (nrpn, value)
}

fn slot(controller: u8) -> Option<usize> {
    SEQUENCE.iter().position(|&c| c == controller)
}

/// A decoded inbound control change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcEvent {
    Nrpn {
        channel: Channel,
        nrpn: u16,
        value: u16,
    },
    Plain {
        channel: Channel,
        controller: u8,
        value: u8,
    },
}

#[derive(Debug, Clone, Copy)]
struct Partial {
    data: [Option<u8>; 4],
    started: Instant,
}

impl Partial {
    fn new(started: Instant) -> Self {
        Self {
            data: [None; 4],
            started,
        }
    }

    fn complete(&self) -> Option<[u8; 4]> {
        Some([self.data[0]?, self.data[1]?, self.data[2]?, self.data[3]?])
    }
}

/// Per-channel NRPN reassembly.
#[derive(Debug)]
pub struct NrpnAssembler {
    partial: [Option<Partial>; 16],
    timeout: Duration,
}

impl NrpnAssembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            partial: [None; 16],
            timeout,
        }
    }

    /// Feed one inbound control change. Returns an event once an NRPN
    /// completes, or immediately for controllers outside the NRPN set.
    pub fn feed(
        &mut self,
        channel: Channel,
        controller: u8,
        value: u8,
        now: Instant,
    ) -> Option<CcEvent> {
        let Some(slot) = slot(controller) else {
            return Some(CcEvent::Plain {
                channel,
                controller,
                value,
            });
        };

        let entry = &mut self.partial[channel.wire() as usize];
        if let Some(partial) = entry {
            if now.saturating_duration_since(partial.started) > self.timeout {
                log::debug!(target: "nrpn", "ch{}: discarding stale partial nrpn", channel);
                *entry = None;
            }
        }

        let partial = entry.get_or_insert_with(|| Partial::new(now));
        if partial.data[slot].is_some() {
            log::debug!(
                target: "nrpn",
                "ch{}: cc {:#04x} repeated before nrpn completed, restarting",
                channel,
                controller
            );
            *partial = Partial::new(now);
        }
        partial.data[slot] = Some(value & 0x7F);

        let data = partial.complete()?;
        *entry = None;
        let (nrpn, value) = decode(data);
        Some(CcEvent::Nrpn {
            channel,
            nrpn,
            value,
        })
    }

    pub fn in_progress(&self, channel: Channel) -> bool {
        self.partial[channel.wire() as usize].is_some()
    }

    pub fn abandon(&mut self, channel: Channel) {
        self.partial[channel.wire() as usize] = None;
    }

    /// Drop every partial sequence, e.g. when a message of another type arrives.
    pub fn abandon_all(&mut self) {
        if self.partial.iter().any(Option::is_some) {
            log::debug!(target: "nrpn", "abandoning partial nrpn sequences");
        }
        self.partial = [None; 16];
    }
}

impl Default for NrpnAssembler {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
