use std::path::Path;

use super::descriptor::SynthDescriptor;
use crate::error::{CoreError, CoreResult};
use crate::midi::sysex::strip_framing;

const BUILTIN: &[(&str, &str)] = &[("mopho", include_str!("../../synths/mopho.json"))];

/// Registered synth descriptors, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SynthRegistry {
    synths: Vec<SynthDescriptor>,
}

impl SynthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the descriptors shipped with the crate.
    pub fn with_builtin() -> CoreResult<Self> {
        let mut registry = Self::new();
        for (name, src) in BUILTIN {
            let descriptor = SynthDescriptor::from_json(src)
                .map_err(|e| CoreError::invalid_descriptor(*name, e.to_string()))?;
            registry.register(descriptor);
        }
        Ok(registry)
    }

    /// Add a descriptor. One with the same name is replaced in place.
    pub fn register(&mut self, descriptor: SynthDescriptor) {
        if let Some(existing) = self
            .synths
            .iter_mut()
            .find(|d| d.name() == descriptor.name())
        {
            log::info!(target: "synth", "replacing descriptor '{}'", descriptor.name());
            *existing = descriptor;
        } else {
            self.synths.push(descriptor);
        }
    }

    /// Register every `*.json` descriptor in `dir`. A missing directory is
    /// not an error. Returns the number loaded.
    pub fn load_dir(&mut self, dir: &Path) -> CoreResult<usize> {
        if !dir.is_dir() {
            log::debug!(target: "synth", "no synth directory at {}", dir.display());
            return Ok(0);
        }
        let entries = std::fs::read_dir(dir).map_err(|e| CoreError::read_file(dir, e))?;
        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in &paths {
            self.register(SynthDescriptor::load(path)?);
        }
        Ok(paths.len())
    }

    pub fn get(&self, name: &str) -> Option<&SynthDescriptor> {
        self.synths.iter().find(|d| d.name() == name)
    }

    /// Look up a descriptor, failing with `NO_SYNTH_DATA`.
    pub fn require(&self, name: &str) -> CoreResult<&SynthDescriptor> {
        self.get(name)
            .ok_or_else(|| CoreError::UnknownSynth(name.to_string()))
    }

    /// Name of the first synth whose header prefixes `message`. Sysex
    /// framing is ignored.
    pub fn identify(&self, message: &[u8]) -> Option<&str> {
        let payload = strip_framing(message);
        self.synths
            .iter()
            .find(|d| d.matches(payload))
            .map(SynthDescriptor::name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.synths.iter().map(SynthDescriptor::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SynthDescriptor> {
        self.synths.iter()
    }

    pub fn len(&self) -> usize {
        self.synths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthctl_types::Nrpn;

    #[test]
    fn builtin_mopho() {
        let registry = SynthRegistry::with_builtin().unwrap();
        let mopho = registry.get("mopho").unwrap();
        assert!(mopho.is_patchable());
        assert_eq!(mopho.parameter_count(), Some(256));
        assert_eq!(mopho.positions().count(), 256);
        // position 5 carries nrpn 114, positions 109..120 are unassigned
        assert_eq!(mopho.nrpn_for(5), Nrpn::new(114));
        assert_eq!(mopho.position_for(Nrpn::new(114).unwrap()), Some(5));
        assert!((109..120).all(|p| mopho.nrpn_for(p).is_none()));
        assert_eq!(mopho.nrpn_for(150), Nrpn::new(150));
        assert_eq!(mopho.option_list("lfo_shapes").map(<[String]>::len), Some(5));
    }

    #[test]
    fn identify_by_header() {
        let registry = SynthRegistry::with_builtin().unwrap();
        assert_eq!(registry.identify(&[0xF0, 0x01, 0x25, 0x03, 0, 0xF7]), Some("mopho"));
        assert_eq!(registry.identify(&[0x01, 0x25, 0x02, 0, 0]), Some("mopho"));
        assert_eq!(registry.identify(&[0x01, 0x26, 0x03]), None);
        assert_eq!(registry.identify(&[]), None);
    }

    #[test]
    fn first_registered_match_wins() {
        let mut registry = SynthRegistry::new();
        registry.register(
            SynthDescriptor::from_json(r#"{"name": "a", "receive_header": "0102"}"#).unwrap(),
        );
        registry.register(
            SynthDescriptor::from_json(r#"{"name": "b", "receive_header": "01"}"#).unwrap(),
        );
        assert_eq!(registry.identify(&[0x01, 0x02, 0x03]), Some("a"));
        assert_eq!(registry.identify(&[0x01, 0x05]), Some("b"));
    }

    #[test]
    fn load_dir_adds_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pro2.json"),
            r#"{"name": "pro2", "parameters": 4}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = SynthRegistry::with_builtin().unwrap();
        assert_eq!(registry.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["mopho", "pro2"]);
        assert!(!registry.get("pro2").unwrap().is_patchable());

        assert_eq!(registry.load_dir(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn load_dir_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();
        let err = SynthRegistry::new().load_dir(dir.path()).unwrap_err();
        assert_eq!(err.name(), "BAD_SYNTH_DATA");
    }

    #[test]
    fn require_unknown() {
        let registry = SynthRegistry::new();
        assert_eq!(registry.require("tb303").unwrap_err().name(), "NO_SYNTH_DATA");
    }
}
