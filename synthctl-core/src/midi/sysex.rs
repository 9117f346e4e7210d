//! Sysex framing and chunk reassembly.

use std::time::{Duration, Instant};

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Wrap a payload in sysex start/end markers.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(payload.len() + 2);
    message.push(SYSEX_START);
    message.extend_from_slice(payload);
    message.push(SYSEX_END);
    message
}

/// Remove the start/end markers where present. Unframed input is returned as is.
pub fn strip_framing(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_prefix(&[SYSEX_START]).unwrap_or(bytes);
    bytes.strip_suffix(&[SYSEX_END]).unwrap_or(bytes)
}

/// Joins sysex chunks delivered by the link layer into whole messages.
///
/// A chunk starting with 0xF0 opens a new message; a chunk ending with 0xF7
/// closes it. Chunks are appended in arrival order.
#[derive(Debug)]
pub struct SysexAssembler {
    buffer: Option<Vec<u8>>,
    started: Instant,
    timeout: Duration,
}

impl SysexAssembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            buffer: None,
            started: Instant::now(),
            timeout,
        }
    }

    /// Feed one chunk. Returns the complete framed message once the end
    /// marker arrives.
    pub fn feed(&mut self, chunk: &[u8], now: Instant) -> Option<Vec<u8>> {
        let first = *chunk.first()?;

        if first == SYSEX_START {
            if let Some(stale) = self.buffer.take() {
                log::debug!(
                    target: "sysex",
                    "new sysex started, dropping {} incomplete bytes",
                    stale.len()
                );
            }
            self.buffer = Some(Vec::with_capacity(chunk.len()));
            self.started = now;
        } else {
            match self.buffer {
                None => {
                    log::debug!(
                        target: "sysex",
                        "dropping {} byte continuation with no sysex in progress",
                        chunk.len()
                    );
                    return None;
                }
                Some(_) if now.saturating_duration_since(self.started) > self.timeout => {
                    log::debug!(target: "sysex", "sysex timed out, discarding partial message");
                    self.buffer = None;
                    return None;
                }
                Some(_) => {}
            }
        }

        let buffer = self.buffer.as_mut()?;
        buffer.extend_from_slice(chunk);
        if chunk.last() == Some(&SYSEX_END) {
            return self.buffer.take();
        }
        None
    }

    pub fn in_progress(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn abandon(&mut self) {
        if self.buffer.take().is_some() {
            log::debug!(target: "sysex", "abandoning partial sysex");
        }
    }
}

impl Default for SysexAssembler {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}
