//! # synthctl-core
//!
//! Keeps a hardware synth and a software control panel in sync: NRPN and
//! sysex codecs, per-model synth descriptors, the parameter model that fans
//! values out to every widget standing for a parameter, whole-patch transfer,
//! and MIDI port management.
//!
//! ```rust,ignore
//! use synthctl_core::{config::Config, engine::Engine, model::ParameterModel};
//! use synthctl_core::midi::{MidiInputManager, MidiOutputManager};
//! use synthctl_core::synth::SynthRegistry;
//!
//! let config = Config::load();
//! let mut registry = SynthRegistry::with_builtin()?;
//! registry.load_dir(&config.synths_dir())?;
//! let model = ParameterModel::build(&layout, &registry, &config.channels())?;
//!
//! let mut output = MidiOutputManager::new(config.client_name());
//! output.connect_by_name("Mopho")?;
//! let mut input = MidiInputManager::new(config.client_name());
//! input.connect_by_name("Mopho")?;
//!
//! let mut engine = Engine::new(registry, model)
//!     .with_transport(output)
//!     .with_timeouts(config.nrpn_timeout(), config.sysex_timeout());
//! loop {
//!     engine.poll(input.receiver());
//!     for change in engine.take_changes() { /* redraw */ }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`midi`]: NRPN and sysex assembly, midir port managers
//! - [`synth`]: descriptors, the 7-in-8 patch codec, the registry
//! - [`model`]: controllers and the value-change state machine
//! - [`patch`]: patch apply/build, files, sysex dumps
//! - [`engine`]: inbound dispatch and user edits
//! - [`config`]: TOML configuration (embedded defaults + user override)

pub mod config;
pub mod engine;
pub mod error;
pub mod midi;
pub mod model;
pub mod patch;
pub mod paths;
pub mod synth;
pub mod transport;

pub use error::{CoreError, CoreResult};
