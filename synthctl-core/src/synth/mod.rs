//! Synth descriptors, the registry that holds them, and patch bit-packing.

pub mod codec;
pub mod descriptor;
pub mod registry;

pub use codec::PatchCodec;
pub use descriptor::{PatchDetails, SynthDescriptor};
pub use registry::SynthRegistry;
