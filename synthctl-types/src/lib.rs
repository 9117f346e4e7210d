//! # synthctl-types
//!
//! Shared type definitions for the synthctl workspace.
//! Plain data only: identifiers for MIDI parameters and controllers, and the
//! declarative UI layout records the parameter model is built from.

pub mod layout;

pub use layout::{ButtonSpec, ExtraOptionSpec, Layout, Screen, UtilityAction, Widget, WidgetKind};

/// Highest value representable in 14-bit NRPN space.
pub const MAX_14BIT: u16 = 0x3FFF;

/// A MIDI channel as the user sees it (1..=16).
///
/// On the wire channels are 0-based; use [`Channel::from_wire`] and
/// [`Channel::wire`] to cross that boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// Create a channel from its 1-based number. Returns `None` outside 1..=16.
    pub fn new(number: u8) -> Option<Self> {
        (1..=16).contains(&number).then_some(Self(number))
    }

    /// Create a channel from the low nibble of a status byte.
    pub fn from_wire(nibble: u8) -> Self {
        Self((nibble & 0x0F) + 1)
    }

    /// 1-based channel number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// 0-based channel nibble used in status bytes.
    pub fn wire(self) -> u8 {
        self.0 - 1
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for Channel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Channel::new(value).ok_or_else(|| format!("midi channel out of range 1..=16: {}", value))
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Non-Registered Parameter Number (0..=16383).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct Nrpn(u16);

impl Nrpn {
    pub fn new(number: u16) -> Option<Self> {
        (number <= MAX_14BIT).then_some(Self(number))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Nrpn {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Nrpn::new(value).ok_or_else(|| format!("nrpn out of range 0..=16383: {}", value))
    }
}

impl From<Nrpn> for u16 {
    fn from(nrpn: Nrpn) -> Self {
        nrpn.0
    }
}

impl std::fmt::Display for Nrpn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one physical synth parameter: the channel the synth listens on
/// plus the parameter number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ParamKey {
    pub channel: Channel,
    pub nrpn: Nrpn,
}

impl ParamKey {
    pub fn new(channel: Channel, nrpn: Nrpn) -> Self {
        Self { channel, nrpn }
    }
}

impl std::fmt::Display for ParamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}/nrpn{}", self.channel, self.nrpn)
    }
}

/// Index of a controller inside a parameter model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ControllerId(u32);

impl ControllerId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ControllerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which kind of sysex dump a patch arrived as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DumpKind {
    /// The synth's current edit buffer.
    EditBuffer,
    /// A program stored in the synth's memory.
    Program { bank: u8, program: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_bounds() {
        assert!(Channel::new(0).is_none());
        assert!(Channel::new(17).is_none());
        assert_eq!(Channel::new(16).map(Channel::wire), Some(15));
        assert_eq!(Channel::from_wire(0x9).get(), 10);
        // high nibble of a status byte is ignored
        assert_eq!(Channel::from_wire(0xB3).get(), 4);
    }

    #[test]
    fn nrpn_bounds() {
        assert!(Nrpn::new(MAX_14BIT).is_some());
        assert!(Nrpn::new(MAX_14BIT + 1).is_none());
    }

    #[test]
    fn param_key_display() {
        let key = ParamKey::new(Channel::new(3).unwrap(), Nrpn::new(114).unwrap());
        assert_eq!(key.to_string(), "ch3/nrpn114");
    }
}
