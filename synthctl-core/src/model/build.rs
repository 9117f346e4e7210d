//! Building a model from a declarative layout.

use std::collections::HashMap;
use std::path::Path;

use synthctl_types::{Channel, ControllerId, Layout, Nrpn, ParamKey, Widget, WidgetKind};

use super::controller::{
    Controller, ControllerKind, Display, DropdownState, DualState, ExtraOption, RadioButton,
    RadioState, Regime,
};
use super::{Binding, ParameterModel};
use crate::error::{CoreError, CoreResult};
use crate::synth::SynthRegistry;

impl ParameterModel {
    /// Walk a layout once and create one controller per non-group widget.
    ///
    /// `synth` and `nrpn` flow from containers to children that leave them
    /// unset. Controllers sharing a channel and parameter are linked, and the
    /// first one created becomes the parameter's primary.
    pub fn build(
        layout: &Layout,
        registry: &SynthRegistry,
        channels: &HashMap<String, Channel>,
    ) -> CoreResult<Self> {
        let mut builder = Builder {
            model: ParameterModel {
                channels: channels.clone(),
                ..Default::default()
            },
            registry,
        };
        for screen in &layout.screens {
            for widget in &screen.widgets {
                builder.walk(widget, screen.synth.as_deref(), None)?;
            }
        }

        let mut model = builder.model;
        for synth in model.unconfigured_synths() {
            log::warn!(
                target: "model",
                "synth '{}' has no configured channel, using channel {}",
                synth,
                Channel::default().get()
            );
        }
        model.link();
        model.initialise();
        log::info!(
            target: "model",
            "built {} controllers for {} parameters",
            model.controllers.len(),
            model.bindings.len()
        );
        Ok(model)
    }

    fn link(&mut self) {
        for ids in self.bindings.values() {
            for &id in ids {
                if let Some(c) = self.controllers.get_mut(id.index()) {
                    c.linked = ids.iter().copied().filter(|&other| other != id).collect();
                }
            }
        }
    }

    /// Every controller starts at midi value 0, clamped into range.
    fn initialise(&mut self) {
        for c in &mut self.controllers {
            c.value = c.clamp(-c.offset);
            c.refresh_display();
        }
        let duals: Vec<ControllerId> = self
            .controllers
            .iter()
            .filter(|c| matches!(c.kind, ControllerKind::Dual(_)))
            .map(|c| c.id)
            .collect();
        for dual in duals {
            let saved = self
                .dual_state(dual)
                .and_then(|s| self.controller(s.numeric))
                .map(Controller::midi_value);
            if let (Some(saved), Some(ControllerKind::Dual(state))) = (
                saved,
                self.controllers.get_mut(dual.index()).map(|c| &mut c.kind),
            ) {
                state.saved_numeric_value = saved;
            }
            self.sync_dual_children(dual);
        }
        self.events.clear();
    }
}

/// Read a layout from a TOML file.
pub fn load_layout(path: &Path) -> CoreResult<Layout> {
    let src = std::fs::read_to_string(path).map_err(|e| CoreError::read_file(path, e))?;
    toml::from_str(&src)
        .map_err(|e| CoreError::InvalidLayout(format!("{}: {}", path.display(), e)))
}

struct Builder<'a> {
    model: ParameterModel,
    registry: &'a SynthRegistry,
}

impl Builder<'_> {
    fn walk(
        &mut self,
        widget: &Widget,
        synth: Option<&str>,
        nrpn: Option<Nrpn>,
    ) -> CoreResult<()> {
        let synth = widget.synth.as_deref().or(synth);
        let nrpn = widget.nrpn.or(nrpn);

        match widget.kind {
            WidgetKind::Group => {}
            WidgetKind::Dual => {
                self.dual(widget, synth, nrpn)?;
                return Ok(());
            }
            _ => {
                let id = self.create(widget, synth, nrpn, None, widget.offset)?;
                self.bind(id);
            }
        }

        for child in &widget.children {
            self.walk(child, synth, nrpn)?;
        }
        Ok(())
    }

    fn dual(&mut self, widget: &Widget, synth: Option<&str>, nrpn: Option<Nrpn>) -> CoreResult<()> {
        let [first, second] = widget.children.as_slice() else {
            return Err(CoreError::InvalidLayout(format!(
                "dual '{}' needs exactly two children, found {}",
                widget.name,
                widget.children.len()
            )));
        };
        let (list, numeric) = match (first.kind, second.kind) {
            (a, b) if a.is_list_type() && b.is_numeric_type() => (first, second),
            (a, b) if a.is_numeric_type() && b.is_list_type() => (second, first),
            _ => {
                return Err(CoreError::InvalidLayout(format!(
                    "dual '{}' needs one list-type and one numeric child",
                    widget.name
                )))
            }
        };
        let range = |child: &Widget| -> CoreResult<(i32, i32)> {
            match child.midirange {
                Some([lo, hi]) if lo <= hi => Ok((lo, hi)),
                _ => Err(CoreError::InvalidLayout(format!(
                    "dual half '{}' needs a midirange [start, end]",
                    child.name
                ))),
            }
        };
        let list_range = range(list)?;
        let numeric_range = range(numeric)?;
        if list_range.0 <= numeric_range.1 && numeric_range.0 <= list_range.1 {
            return Err(CoreError::InvalidLayout(format!(
                "dual '{}' has overlapping midiranges",
                widget.name
            )));
        }
        if !list.children.is_empty() || !numeric.children.is_empty() {
            return Err(CoreError::InvalidLayout(format!(
                "dual '{}': halves cannot contain widgets",
                widget.name
            )));
        }

        let dual = self.create(widget, synth, nrpn, None, widget.offset)?;
        let list_id = self.create(list, synth, nrpn, Some(dual), list_range.0)?;
        let numeric_id = self.create(numeric, synth, nrpn, Some(dual), numeric_range.0)?;
        if let Some(c) = self.model.controllers.get_mut(dual.index()) {
            c.kind = ControllerKind::Dual(DualState {
                list: list_id,
                numeric: numeric_id,
                list_range,
                numeric_range,
                saved_numeric_value: 0,
                regime: Regime::Numeric,
            });
        }
        self.bind(dual);
        Ok(())
    }

    fn create(
        &mut self,
        widget: &Widget,
        synth: Option<&str>,
        nrpn: Option<Nrpn>,
        parent: Option<ControllerId>,
        offset: i32,
    ) -> CoreResult<ControllerId> {
        if widget.minimum > widget.maximum {
            return Err(CoreError::InvalidLayout(format!(
                "'{}': minimum {} above maximum {}",
                widget.name, widget.minimum, widget.maximum
            )));
        }
        let registry = self.registry;
        let descriptor = synth.map(|s| registry.require(s)).transpose()?;

        let kind = match widget.kind {
            WidgetKind::Slider => ControllerKind::Slider {
                notes: widget.notes,
            },
            WidgetKind::Toggle => ControllerKind::Toggle,
            WidgetKind::Dropdown => {
                let options = match (&widget.option_list, descriptor) {
                    (Some(list), Some(descriptor)) => match descriptor.option_list(list) {
                        Some(options) => options.to_vec(),
                        None => {
                            log::warn!(
                                target: "model",
                                "'{}': synth '{}' has no option list '{}'",
                                widget.name,
                                descriptor.name(),
                                list
                            );
                            widget.options.clone()
                        }
                    },
                    _ => widget.options.clone(),
                };
                let extra_options = widget
                    .extra_options
                    .iter()
                    .map(|e| ExtraOption {
                        name: e.name.clone(),
                        value: e.value,
                        range: range_of(e.value, e.minimum, e.maximum),
                        saved_value: None,
                    })
                    .collect();
                ControllerKind::Dropdown(DropdownState {
                    options,
                    extra_options,
                    grey_on_zero: widget.grey_on_zero,
                })
            }
            WidgetKind::Radio => ControllerKind::Radio(RadioState {
                buttons: widget
                    .buttons
                    .iter()
                    .map(|b| RadioButton {
                        label: b.label.clone(),
                        value: b.value,
                        range: range_of(b.value, b.minimum, b.maximum),
                        saved_value: None,
                        down: false,
                    })
                    .collect(),
            }),
            WidgetKind::Utility => {
                let action = widget.action.ok_or_else(|| {
                    CoreError::InvalidLayout(format!("utility '{}' has no action", widget.name))
                })?;
                ControllerKind::Utility(action)
            }
            // placeholder until both halves exist
            WidgetKind::Dual => ControllerKind::Slider { notes: false },
            WidgetKind::Group => {
                return Err(CoreError::InvalidLayout(format!(
                    "group '{}' is not a controller",
                    widget.name
                )))
            }
        };
        let is_utility = matches!(kind, ControllerKind::Utility(_));

        let channel = match synth {
            Some(s) => self.model.channel_for(s),
            None => Channel::default(),
        };
        let id = ControllerId::new(self.model.controllers.len() as u32);
        self.model.controllers.push(Controller {
            id,
            name: widget.name.clone(),
            synth: synth.map(str::to_string),
            channel,
            nrpn: if is_utility { None } else { nrpn },
            cc: widget.cc && !is_utility,
            value: 0,
            minimum: widget.minimum,
            maximum: widget.maximum,
            offset,
            parent,
            linked: Vec::new(),
            suppress_echo: false,
            kind,
            display: Display::default(),
        });
        Ok(id)
    }

    /// Register a top-level controller under its wire binding.
    fn bind(&mut self, id: ControllerId) {
        let Some(c) = self.model.controllers.get(id.index()) else {
            return;
        };
        let Some(nrpn) = c.nrpn else {
            return;
        };
        let key = ParamKey::new(c.channel, nrpn);
        let binding = if c.cc {
            if nrpn.get() > 0x7F {
                log::warn!(target: "model", "'{}': cc number {} out of range", c.name, nrpn);
                return;
            }
            Binding::Cc(key)
        } else {
            Binding::Nrpn(key)
        };
        self.model.bindings.entry(binding).or_default().push(id);
    }
}

fn range_of(value: Option<i32>, minimum: Option<i32>, maximum: Option<i32>) -> Option<(i32, i32)> {
    match value {
        Some(_) => None,
        None => Some((minimum.unwrap_or(0), maximum.unwrap_or(127))),
    }
}
