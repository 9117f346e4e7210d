//! Patch data bit-packing.
//!
//! Sysex data bytes carry 7 bits, so 8-bit parameter values are packed in
//! chunks of 8 bytes: a packing byte holding bit 7 of the next seven values
//! (bit 0 for the first), then the low 7 bits of each value.
//!
//! Synths pick their functions by name from a fixed registry, so adding a
//! synth with a new scheme means adding a pair here and naming it in the
//! synth's descriptor.

pub use crate::midi::sysex::{frame, strip_framing};

pub type PackFn = fn(&[u16]) -> Vec<u8>;
pub type UnpackFn = fn(&[u8]) -> Vec<u16>;

/// Largest value a 7-in-8 packed position can hold.
pub const PACKED_MAX: u16 = 0xFF;

/// Pack values seven at a time behind a packing byte. Values above 8 bits
/// saturate at [`PACKED_MAX`]; the last chunk may be short.
pub fn pack_7in8(values: &[u16]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(values.len() + values.len().div_ceil(7));
    for chunk in values.chunks(7) {
        let chunk: Vec<u16> = chunk.iter().map(|&v| v.min(PACKED_MAX)).collect();
        let packing_byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (k, &v)| acc | (((v & 0x80) >> 7) as u8) << k);
        packed.push(packing_byte);
        packed.extend(chunk.iter().map(|&v| (v & 0x7F) as u8));
    }
    packed
}

/// Inverse of [`pack_7in8`].
pub fn unpack_7in8(data: &[u8]) -> Vec<u16> {
    let mut values = Vec::with_capacity(data.len());
    for chunk in data.chunks(8) {
        let Some((&packing_byte, bytes)) = chunk.split_first() else {
            continue;
        };
        for (k, &byte) in bytes.iter().enumerate() {
            let high = ((packing_byte >> k) & 0x01) as u16;
            values.push(high << 7 | (byte & 0x7F) as u16);
        }
    }
    values
}

/// Resolve a pack function by its descriptor name.
pub fn pack_function(name: &str) -> Option<PackFn> {
    match name {
        "mopho_pack" | "pack_7in8" => Some(pack_7in8),
        _ => None,
    }
}

/// Resolve an unpack function by its descriptor name.
pub fn unpack_function(name: &str) -> Option<UnpackFn> {
    match name {
        "mopho_unpack" | "unpack_7in8" => Some(unpack_7in8),
        _ => None,
    }
}

/// A synth's pack/unpack pair.
#[derive(Clone, Copy)]
pub struct PatchCodec {
    pub pack: PackFn,
    pub unpack: UnpackFn,
}

impl PatchCodec {
    pub fn from_names(pack: &str, unpack: &str) -> Option<Self> {
        Some(Self {
            pack: pack_function(pack)?,
            unpack: unpack_function(unpack)?,
        })
    }

    pub fn pack(&self, values: &[u16]) -> Vec<u8> {
        (self.pack)(values)
    }

    pub fn unpack(&self, data: &[u8]) -> Vec<u16> {
        (self.unpack)(data)
    }
}

impl std::fmt::Debug for PatchCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchCodec").finish_non_exhaustive()
    }
}
