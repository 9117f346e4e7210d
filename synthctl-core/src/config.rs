use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use synthctl_types::Channel;

use crate::paths;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    midi: MidiConfig,
    #[serde(default)]
    timeouts: TimeoutConfig,
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    channels: HashMap<String, u8>,
}

#[derive(Deserialize, Default)]
struct MidiConfig {
    client_name: Option<String>,
    input_port: Option<String>,
    output_port: Option<String>,
}

#[derive(Deserialize, Default)]
struct TimeoutConfig {
    nrpn_ms: Option<u64>,
    sysex_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct PathsConfig {
    synths_dir: Option<PathBuf>,
    patches_dir: Option<PathBuf>,
}

pub struct Config {
    midi: MidiConfig,
    timeouts: TimeoutConfig,
    paths: PathsConfig,
    channels: HashMap<String, u8>,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_from(&paths::user_config_path())
    }

    /// Embedded defaults merged with the file at `path`. A missing file is
    /// fine; an unreadable or malformed one is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {}", e);
            ConfigFile::default()
        });

        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                    Ok(user) => merge(&mut base, user),
                    Err(e) => {
                        log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                    }
                },
                Err(e) => {
                    log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                }
            }
        }

        Config {
            midi: base.midi,
            timeouts: base.timeouts,
            paths: base.paths,
            channels: base.channels,
        }
    }

    pub fn client_name(&self) -> &str {
        self.midi.client_name.as_deref().unwrap_or("synthctl")
    }

    /// Input port name filter. `None` means the first port.
    pub fn input_port(&self) -> Option<&str> {
        self.midi.input_port.as_deref().filter(|s| !s.is_empty())
    }

    pub fn output_port(&self) -> Option<&str> {
        self.midi.output_port.as_deref().filter(|s| !s.is_empty())
    }

    pub fn nrpn_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.nrpn_ms.unwrap_or(500))
    }

    pub fn sysex_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.sysex_ms.unwrap_or(2000))
    }

    pub fn synths_dir(&self) -> PathBuf {
        self.paths
            .synths_dir
            .clone()
            .unwrap_or_else(paths::default_synths_dir)
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.paths
            .patches_dir
            .clone()
            .unwrap_or_else(paths::default_patches_dir)
    }

    /// Configured MIDI channel per synth. Out-of-range numbers are skipped.
    pub fn channels(&self) -> HashMap<String, Channel> {
        self.channels
            .iter()
            .filter_map(|(synth, &n)| match Channel::new(n) {
                Some(channel) => Some((synth.clone(), channel)),
                None => {
                    log::warn!(target: "config", "channel {} for '{}' is not in 1..=16", n, synth);
                    None
                }
            })
            .collect()
    }
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.midi.client_name.is_some() {
        base.midi.client_name = user.midi.client_name;
    }
    if user.midi.input_port.is_some() {
        base.midi.input_port = user.midi.input_port;
    }
    if user.midi.output_port.is_some() {
        base.midi.output_port = user.midi.output_port;
    }
    if user.timeouts.nrpn_ms.is_some() {
        base.timeouts.nrpn_ms = user.timeouts.nrpn_ms;
    }
    if user.timeouts.sysex_ms.is_some() {
        base.timeouts.sysex_ms = user.timeouts.sysex_ms;
    }
    if user.paths.synths_dir.is_some() {
        base.paths.synths_dir = user.paths.synths_dir;
    }
    if user.paths.patches_dir.is_some() {
        base.paths.patches_dir = user.paths.patches_dir;
    }
    base.channels.extend(user.channels);
}
