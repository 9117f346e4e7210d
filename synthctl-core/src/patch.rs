//! Whole-patch transfer between the model, sysex and files.
//!
//! A patch file is the sysex payload without framing: header followed by
//! packed parameter data. Values at dump positions no controller is bound to
//! are kept per synth, so a received patch saves back byte for byte.

use std::collections::HashMap;
use std::path::Path;

use synthctl_types::{DumpKind, ParamKey};

use crate::error::{CoreError, CoreResult};
use crate::midi::sysex::{frame, strip_framing};
use crate::model::{ModelEvent, ParameterModel};
use crate::synth::codec::PACKED_MAX;
use crate::synth::SynthRegistry;
use crate::transport::MidiTransport;

#[derive(Debug, Default)]
pub struct PatchManager {
    registry: SynthRegistry,
    /// Last value seen at every dump position, per synth.
    uncontrolled: HashMap<String, Vec<u16>>,
}

impl PatchManager {
    pub fn new(registry: SynthRegistry) -> Self {
        Self {
            registry,
            uncontrolled: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &SynthRegistry {
        &self.registry
    }

    /// Decode a patch for `synth` and load it into the model without echo.
    /// Nothing changes if the header belongs to another synth.
    pub fn apply_patch(
        &mut self,
        model: &mut ParameterModel,
        synth: &str,
        raw: &[u8],
    ) -> CoreResult<DumpKind> {
        let descriptor = self.registry.require(synth)?;
        let details = descriptor.patch_details()?;
        let (kind, data) = descriptor.strip_header(strip_framing(raw))?;

        let mut values = details.codec.unpack(data);
        if values.len() != details.parameter_count {
            log::warn!(
                target: "patch",
                "{}: patch holds {} values, expected {}",
                synth,
                values.len(),
                details.parameter_count
            );
            values.resize(details.parameter_count, 0);
        }

        let channel = model.channel_for(synth);
        let mut applied = 0;
        for (position, nrpn) in descriptor.positions() {
            let (Some(nrpn), Some(&value)) = (nrpn, values.get(position)) else {
                continue;
            };
            let ids = model.controllers_for(ParamKey::new(channel, nrpn)).to_vec();
            for id in ids {
                model.set_without_echo(id, value as i32);
                applied += 1;
            }
        }
        log::info!(
            target: "patch",
            "{}: applied {:?} patch to {} controllers",
            synth,
            kind,
            applied
        );
        self.uncontrolled.insert(synth.to_string(), values);
        Ok(kind)
    }

    /// Collect the model's values in dump order and encode them, header
    /// first. Positions without a controller, or whose controller has not
    /// moved since the last dump, use the last value seen there.
    pub fn build_patch(&self, model: &ParameterModel, synth: &str) -> CoreResult<Vec<u8>> {
        let descriptor = self.registry.require(synth)?;
        let details = descriptor.patch_details()?;
        let channel = model.channel_for(synth);
        let stored = self.uncontrolled.get(synth);

        let values: Vec<u16> = (0..details.parameter_count)
            .map(|position| {
                let raw = stored.and_then(|s| s.get(position).copied());
                let bound = descriptor
                    .nrpn_for(position)
                    .and_then(|nrpn| model.primary(ParamKey::new(channel, nrpn)))
                    .and_then(|id| model.controller(id))
                    .map(|c| match raw {
                        // unedited since the dump, even if the range clipped it
                        Some(raw) if c.clamp(raw as i32 - c.offset()) == c.value() => raw,
                        _ => c.midi_value().clamp(0, PACKED_MAX as i32) as u16,
                    });
                bound.or(raw).unwrap_or(0).min(PACKED_MAX)
            })
            .collect();

        let mut patch = details.header.to_vec();
        patch.extend(details.codec.pack(&values));
        Ok(patch)
    }

    /// Build the patch and transmit it as one sysex message.
    pub fn send(
        &self,
        model: &ParameterModel,
        synth: &str,
        transport: &mut dyn MidiTransport,
    ) -> CoreResult {
        let patch = self.build_patch(model, synth)?;
        transport.send_sysex(&frame(&patch))?;
        log::info!(target: "patch", "{}: sent patch ({} bytes)", synth, patch.len());
        Ok(())
    }

    /// Ask the synth for its edit buffer. The reply arrives through
    /// [`PatchManager::on_sysex`].
    pub fn receive_request(&self, synth: &str, transport: &mut dyn MidiTransport) -> CoreResult {
        let details = self.registry.require(synth)?.patch_details()?;
        transport.send_sysex(&frame(details.request))?;
        log::info!(target: "patch", "{}: requested patch", synth);
        Ok(())
    }

    /// Load a patch file into the model. Framed files are accepted.
    pub fn load_file(
        &mut self,
        model: &mut ParameterModel,
        synth: &str,
        path: &Path,
    ) -> CoreResult<DumpKind> {
        self.registry.require(synth)?.patch_details()?;
        let bytes = std::fs::read(path).map_err(|e| CoreError::read_file(path, e))?;
        self.apply_patch(model, synth, &bytes)
    }

    pub fn save_file(&self, model: &ParameterModel, synth: &str, path: &Path) -> CoreResult {
        let patch = self.build_patch(model, synth)?;
        std::fs::write(path, &patch).map_err(|e| CoreError::write_file(path, e))?;
        log::info!(target: "patch", "{}: saved patch to {}", synth, path.display());
        Ok(())
    }

    /// Transmit every bound parameter of a synth as live messages. Returns
    /// the number of writes.
    pub fn send_all(
        &self,
        model: &ParameterModel,
        synth: &str,
        transport: &mut dyn MidiTransport,
    ) -> CoreResult<usize> {
        let mut sent = 0;
        for id in model.primaries_for(synth) {
            let Some(c) = model.controller(id) else {
                continue;
            };
            let Some(key) = c.key() else {
                continue;
            };
            if c.is_cc() {
                let value = c.midi_value().clamp(0, 0x7F) as u8;
                transport.send_cc(key.channel, key.nrpn.get() as u8, value)?;
            } else {
                let value = c.midi_value().clamp(0, synthctl_types::MAX_14BIT as i32) as u16;
                transport.send_nrpn(key.channel, key.nrpn.get(), value)?;
            }
            sent += 1;
        }
        log::info!(target: "patch", "{}: sent {} parameters", synth, sent);
        Ok(sent)
    }

    /// A complete sysex message arrived: find the synth it belongs to and
    /// apply it.
    pub fn on_sysex(
        &mut self,
        model: &mut ParameterModel,
        message: &[u8],
    ) -> CoreResult<(String, DumpKind)> {
        let payload = strip_framing(message);
        let synth = self
            .registry
            .identify(payload)
            .map(str::to_string)
            .ok_or(CoreError::IncorrectSynth { synth: None })?;
        let kind = self.apply_patch(model, &synth, payload)?;
        Ok((synth, kind))
    }

    /// Values last seen at each dump position of `synth`.
    pub fn uncontrolled(&self, synth: &str) -> Option<&[u16]> {
        self.uncontrolled.get(synth).map(Vec::as_slice)
    }
}

/// Route queued model writes to a transport. Returns the events that are
/// not writes, in order.
pub fn transmit(
    events: Vec<ModelEvent>,
    transport: &mut dyn MidiTransport,
) -> (Vec<ModelEvent>, CoreResult) {
    let mut rest = Vec::new();
    let mut result = Ok(());
    for event in events {
        match event {
            ModelEvent::Sent { key, value, cc } => {
                let sent = if cc {
                    transport.send_cc(key.channel, key.nrpn.get() as u8, value as u8)
                } else {
                    transport.send_nrpn(key.channel, key.nrpn.get(), value)
                };
                if let Err(e) = sent {
                    result = Err(e.into());
                }
            }
            other => rest.push(other),
        }
    }
    (rest, result)
}
