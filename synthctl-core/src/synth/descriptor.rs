//! Per-model synth metadata loaded from JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use synthctl_types::{DumpKind, Nrpn};

use super::codec::{pack_function, unpack_function, PatchCodec};
use crate::error::{CoreError, CoreResult};

fn default_program_header_extra() -> usize {
    2
}

/// On-disk shape of a descriptor. Keys written with spaces are accepted too.
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    name: String,
    #[serde(default)]
    parameters: Option<usize>,
    #[serde(default, alias = "nrpn order")]
    nrpn_order: Option<Vec<Option<u16>>>,
    #[serde(default, alias = "receive header")]
    receive_header: Option<String>,
    #[serde(default, alias = "program header")]
    program_header: Option<String>,
    #[serde(default = "default_program_header_extra")]
    program_header_extra: usize,
    #[serde(default, alias = "patch request")]
    patch_request: Option<String>,
    #[serde(default, alias = "pack function")]
    pack_function: Option<String>,
    #[serde(default, alias = "unpack function")]
    unpack_function: Option<String>,
    #[serde(default)]
    options: HashMap<String, Vec<String>>,
}

/// Everything needed to build, send or request a patch.
#[derive(Debug, Clone, Copy)]
pub struct PatchDetails<'a> {
    pub header: &'a [u8],
    pub request: &'a [u8],
    pub codec: PatchCodec,
    pub parameter_count: usize,
}

#[derive(Debug, Clone)]
pub struct SynthDescriptor {
    name: String,
    parameter_count: Option<usize>,
    position_to_nrpn: Vec<Option<Nrpn>>,
    nrpn_to_position: HashMap<Nrpn, usize>,
    receive_header: Option<Vec<u8>>,
    program_header: Option<Vec<u8>>,
    program_header_extra: usize,
    patch_request: Option<Vec<u8>>,
    codec: Option<PatchCodec>,
    options: HashMap<String, Vec<String>>,
}

impl SynthDescriptor {
    /// A descriptor with live control only: no patch support.
    pub fn live_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_count: None,
            position_to_nrpn: Vec::new(),
            nrpn_to_position: HashMap::new(),
            receive_header: None,
            program_header: None,
            program_header_extra: default_program_header_extra(),
            patch_request: None,
            codec: None,
            options: HashMap::new(),
        }
    }

    pub fn from_json(src: &str) -> CoreResult<Self> {
        let file: DescriptorFile = serde_json::from_str(src)
            .map_err(|e| CoreError::invalid_descriptor("<unnamed>", e.to_string()))?;
        Self::from_file_data(file)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let src = std::fs::read_to_string(path).map_err(|e| CoreError::read_file(path, e))?;
        let file: DescriptorFile = serde_json::from_str(&src).map_err(|e| {
            CoreError::invalid_descriptor(path.display().to_string(), e.to_string())
        })?;
        Self::from_file_data(file)
    }

    fn from_file_data(file: DescriptorFile) -> CoreResult<Self> {
        let name = file.name;
        let bad = |reason: String| CoreError::invalid_descriptor(name.clone(), reason);

        let hex = |field: &str, value: Option<String>| -> CoreResult<Option<Vec<u8>>> {
            value
                .map(|s| parse_hex(&s).ok_or_else(|| bad(format!("{} is not valid hex: '{}'", field, s))))
                .transpose()
        };
        let receive_header = hex("receive_header", file.receive_header)?;
        let program_header = hex("program_header", file.program_header)?;
        let patch_request = hex("patch_request", file.patch_request)?;

        let pack = file
            .pack_function
            .map(|n| pack_function(&n).ok_or_else(|| bad(format!("unknown pack function '{}'", n))))
            .transpose()?;
        let unpack = file
            .unpack_function
            .map(|n| {
                unpack_function(&n).ok_or_else(|| bad(format!("unknown unpack function '{}'", n)))
            })
            .transpose()?;
        let codec = match (pack, unpack) {
            (Some(pack), Some(unpack)) => Some(PatchCodec { pack, unpack }),
            _ => None,
        };

        let order = expand_order(file.nrpn_order, file.parameters);
        let mut position_to_nrpn = Vec::with_capacity(order.len());
        let mut nrpn_to_position = HashMap::new();
        for (position, raw) in order.into_iter().enumerate() {
            let nrpn = raw
                .map(|n| Nrpn::new(n).ok_or_else(|| bad(format!("nrpn {} out of range", n))))
                .transpose()?;
            if let Some(nrpn) = nrpn {
                if nrpn_to_position.insert(nrpn, position).is_some() {
                    return Err(bad(format!("nrpn {} appears more than once", nrpn)));
                }
            }
            position_to_nrpn.push(nrpn);
        }

        log::debug!(
            target: "synth",
            "loaded descriptor '{}' ({} positions, patchable: {})",
            name,
            position_to_nrpn.len(),
            codec.is_some() && receive_header.is_some()
        );

        Ok(Self {
            name,
            parameter_count: file.parameters,
            position_to_nrpn,
            nrpn_to_position,
            receive_header,
            program_header,
            program_header_extra: file.program_header_extra,
            patch_request,
            codec,
            options: file.options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_count(&self) -> Option<usize> {
        self.parameter_count
    }

    pub fn position_for(&self, nrpn: Nrpn) -> Option<usize> {
        self.nrpn_to_position.get(&nrpn).copied()
    }

    pub fn nrpn_for(&self, position: usize) -> Option<Nrpn> {
        self.position_to_nrpn.get(position).copied().flatten()
    }

    /// Dump positions in order with the NRPN each one carries.
    pub fn positions(&self) -> impl Iterator<Item = (usize, Option<Nrpn>)> + '_ {
        self.position_to_nrpn.iter().copied().enumerate()
    }

    pub fn option_list(&self, name: &str) -> Option<&[String]> {
        self.options.get(name).map(Vec::as_slice)
    }

    pub fn receive_header(&self) -> Option<&[u8]> {
        self.receive_header.as_deref()
    }

    pub fn is_patchable(&self) -> bool {
        self.receive_header.is_some()
            && self.patch_request.is_some()
            && self.codec.is_some()
            && self.parameter_count.is_some()
    }

    pub fn patch_details(&self) -> CoreResult<PatchDetails<'_>> {
        match (
            &self.receive_header,
            &self.patch_request,
            self.codec,
            self.parameter_count,
        ) {
            (Some(header), Some(request), Some(codec), Some(parameter_count)) => {
                Ok(PatchDetails {
                    header,
                    request,
                    codec,
                    parameter_count,
                })
            }
            _ => Err(CoreError::NotPatchable {
                synth: self.name.clone(),
            }),
        }
    }

    /// Whether an unframed sysex payload starts with one of this synth's headers.
    pub fn matches(&self, payload: &[u8]) -> bool {
        let prefixed = |h: &Option<Vec<u8>>| h.as_deref().is_some_and(|h| payload.starts_with(h));
        prefixed(&self.receive_header) || prefixed(&self.program_header)
    }

    /// Split an unframed payload into its dump kind and packed data.
    pub fn strip_header<'a>(&self, payload: &'a [u8]) -> CoreResult<(DumpKind, &'a [u8])> {
        if let Some(data) = self
            .receive_header
            .as_deref()
            .and_then(|h| payload.strip_prefix(h))
        {
            return Ok((DumpKind::EditBuffer, data));
        }
        if let Some(rest) = self
            .program_header
            .as_deref()
            .and_then(|h| payload.strip_prefix(h))
        {
            if rest.len() >= self.program_header_extra {
                let (extra, data) = rest.split_at(self.program_header_extra);
                let kind = DumpKind::Program {
                    bank: extra.first().copied().unwrap_or(0),
                    program: extra.get(1).copied().unwrap_or(0),
                };
                return Ok((kind, data));
            }
        }
        Err(CoreError::IncorrectSynth {
            synth: Some(self.name.clone()),
        })
    }
}

/// Apply positional shorthand: a missing order maps every position to its own
/// index, a short one is extended the same way, a long one is truncated.
fn expand_order(order: Option<Vec<Option<u16>>>, count: Option<usize>) -> Vec<Option<u16>> {
    match (order, count) {
        (None, Some(count)) => (0..count).map(|p| u16::try_from(p).ok()).collect(),
        (None, None) => Vec::new(),
        (Some(order), None) => order,
        (Some(mut order), Some(count)) => {
            if order.len() < count {
                let start = order.len();
                order.extend((start..count).map(|p| u16::try_from(p).ok()));
            } else {
                order.truncate(count);
            }
            order
        }
    }
}

/// Parse a hex string, ignoring whitespace.
fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}
