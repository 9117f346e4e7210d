//! The live parameter graph.
//!
//! Controllers live in an arena indexed by `ControllerId`. Several may stand
//! for one synth parameter: they are linked, and the first registered is the
//! parameter's primary. Every value write goes through [`ParameterModel::
//! on_value_changed`], which decides synchronously whether a change is
//! mirrored, forwarded to a dual control, or transmitted. Outbound writes and
//! UI notifications are queued as [`ModelEvent`]s; nothing is called back.

mod build;
pub mod controller;
mod dual;

use std::collections::HashMap;

use synthctl_types::{Channel, ControllerId, Nrpn, ParamKey, UtilityAction, MAX_14BIT};

pub use build::load_layout;
pub use controller::{
    Controller, ControllerKind, Display, DropdownState, DualState, ExtraOption, RadioButton,
    RadioState, Regime,
};

/// A controller's value moved from `old` to `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueChanged {
    pub controller: ControllerId,
    pub old: i32,
    pub new: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// A controller changed value, for whatever reason. Redraw it.
    Changed(ValueChanged),
    /// Transmit this value. `cc` parameters go out as one plain control
    /// change numbered `key.nrpn`; all others as NRPN.
    Sent {
        key: ParamKey,
        value: u16,
        cc: bool,
    },
    /// A utility control was pressed.
    Utility {
        controller: ControllerId,
        action: UtilityAction,
        synth: Option<String>,
    },
}

/// What a controller is bound to on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Binding {
    Nrpn(ParamKey),
    Cc(ParamKey),
}

#[derive(Debug, Default)]
pub struct ParameterModel {
    controllers: Vec<Controller>,
    bindings: HashMap<Binding, Vec<ControllerId>>,
    channels: HashMap<String, Channel>,
    events: Vec<ModelEvent>,
}

impl ParameterModel {
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn controller(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(id.index())
    }

    /// First controller with this name.
    pub fn find(&self, name: &str) -> Option<ControllerId> {
        self.controllers
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    /// Controllers bound to an NRPN parameter, primary first. Halves of dual
    /// controls are never bound directly.
    pub fn controllers_for(&self, key: ParamKey) -> &[ControllerId] {
        self.bindings
            .get(&Binding::Nrpn(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The controller whose value a patch reads for this parameter.
    pub fn primary(&self, key: ParamKey) -> Option<ControllerId> {
        self.controllers_for(key).first().copied()
    }

    /// Channel a synth listens on. Unconfigured synths use channel 1.
    pub fn channel_for(&self, synth: &str) -> Channel {
        self.channels.get(synth).copied().unwrap_or_default()
    }

    /// Synths named by any controller, in first-seen order.
    pub fn synths(&self) -> Vec<&str> {
        let mut synths: Vec<&str> = Vec::new();
        for synth in self.controllers.iter().filter_map(Controller::synth) {
            if !synths.contains(&synth) {
                synths.push(synth);
            }
        }
        synths
    }

    /// Synths named by a controller that have no channel configured.
    pub fn unconfigured_synths(&self) -> Vec<&str> {
        self.synths()
            .into_iter()
            .filter(|synth| !self.channels.contains_key(*synth))
            .collect()
    }

    /// Primary controllers of a synth, one per bound parameter.
    pub fn primaries_for(&self, synth: &str) -> Vec<ControllerId> {
        self.controllers
            .iter()
            .filter(|c| c.synth() == Some(synth) && !c.is_subcontroller())
            .filter(|c| {
                let binding = c.key().map(|key| {
                    if c.cc {
                        Binding::Cc(key)
                    } else {
                        Binding::Nrpn(key)
                    }
                });
                binding
                    .and_then(|b| self.bindings.get(&b))
                    .and_then(|ids| ids.first())
                    == Some(&c.id)
            })
            .map(|c| c.id)
            .collect()
    }

    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    /// User edit: clamp, store, and run the change through the state machine.
    pub fn set_value(&mut self, id: ControllerId, value: i32) {
        if let Some(change) = self.assign(id, value) {
            self.on_value_changed(change);
        }
    }

    /// Set a controller from a midi value received or loaded from a patch.
    /// The change is mirrored and displayed but never transmitted.
    pub fn set_without_echo(&mut self, id: ControllerId, midi_value: i32) {
        let Some(c) = self.controllers.get_mut(id.index()) else {
            return;
        };
        c.suppress_echo = true;
        let offset = c.offset;
        match self.assign(id, midi_value - offset) {
            Some(change) => self.on_value_changed(change),
            None => {
                if let Some(c) = self.controllers.get_mut(id.index()) {
                    c.suppress_echo = false;
                }
            }
        }
    }

    /// Apply an inbound NRPN value to every controller bound to it.
    /// Returns how many controllers took the value; zero means unbound.
    pub fn receive(&mut self, key: ParamKey, value: u16) -> usize {
        self.receive_binding(Binding::Nrpn(key), value)
    }

    /// Apply an inbound plain control change.
    pub fn receive_cc(&mut self, channel: Channel, controller: u8, value: u8) -> usize {
        let Some(nrpn) = Nrpn::new(controller as u16) else {
            return 0;
        };
        self.receive_binding(Binding::Cc(ParamKey::new(channel, nrpn)), value as u16)
    }

    fn receive_binding(&mut self, binding: Binding, value: u16) -> usize {
        let ids = self.bindings.get(&binding).cloned().unwrap_or_default();
        if ids.is_empty() {
            log::trace!(target: "model", "no controller for {:?}", binding);
        }
        for &id in &ids {
            self.set_without_echo(id, value as i32);
        }
        ids.len()
    }

    /// The per-controller state machine. Subcontrollers forward to their
    /// dual; everything else refreshes, then either swallows the echo of a
    /// received value or mirrors linked controllers and emits one write.
    pub fn on_value_changed(&mut self, change: ValueChanged) {
        let id = change.controller;
        self.events.push(ModelEvent::Changed(change));

        let Some(c) = self.controllers.get_mut(id.index()) else {
            return;
        };
        c.refresh_display();

        if let Some(parent) = c.parent {
            self.on_subcontroller_value(parent, id);
            return;
        }

        if matches!(c.kind, ControllerKind::Dual(_)) {
            self.sync_dual_children(id);
        }

        let Some(c) = self.controllers.get_mut(id.index()) else {
            return;
        };
        if c.suppress_echo {
            c.suppress_echo = false;
            return;
        }
        let Some(key) = c.key() else {
            return;
        };
        let midi_value = c.midi_value();
        let cc = c.cc;
        let linked = c.linked.clone();

        for other in linked {
            self.set_without_echo(other, midi_value);
        }

        let max = if cc { 0x7F } else { MAX_14BIT as i32 };
        let value = midi_value.clamp(0, max) as u16;
        log::debug!(target: "model", "send {} = {}", key, value);
        self.events.push(ModelEvent::Sent { key, value, cc });
    }

    /// Pick a named dropdown entry. Returns false if the controller has no
    /// such entry.
    pub fn select_option(&mut self, id: ControllerId, option: &str) -> bool {
        let Some(value) = self.controller(id).and_then(|c| c.option_value(option)) else {
            log::debug!(target: "model", "controller {} has no option '{}'", id, option);
            return false;
        };
        self.set_value(id, value);
        true
    }

    /// Press a radio button by index.
    pub fn press_button(&mut self, id: ControllerId, index: usize) -> bool {
        let Some(value) = self.controller(id).and_then(|c| c.button_value(index)) else {
            return false;
        };
        self.set_value(id, value);
        true
    }

    /// Press a utility control. Its action is queued for the engine.
    pub fn press_utility(&mut self, id: ControllerId) -> bool {
        let Some(c) = self.controller(id) else {
            return false;
        };
        let ControllerKind::Utility(action) = c.kind else {
            return false;
        };
        let synth = c.synth.clone();
        self.events.push(ModelEvent::Utility {
            controller: id,
            action,
            synth,
        });
        true
    }

    /// Clamp and store without any propagation.
    fn assign(&mut self, id: ControllerId, value: i32) -> Option<ValueChanged> {
        let c = self.controllers.get_mut(id.index())?;
        let old = c.assign(value)?;
        Some(ValueChanged {
            controller: id,
            old,
            new: c.value,
        })
    }

    /// Store and redisplay a controller without running the state machine.
    fn assign_silently(&mut self, id: ControllerId, value: i32) {
        if let Some(change) = self.assign(id, value) {
            self.events.push(ModelEvent::Changed(change));
        }
        if let Some(c) = self.controllers.get_mut(id.index()) {
            c.refresh_display();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SynthRegistry;
    use synthctl_types::{Layout, Screen, Widget};

    fn key(ch: u8, nrpn: u16) -> ParamKey {
        ParamKey::new(Channel::new(ch).unwrap(), Nrpn::new(nrpn).unwrap())
    }

    fn sends(model: &mut ParameterModel) -> Vec<(ParamKey, u16)> {
        model
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                ModelEvent::Sent { key, value, .. } => Some((key, value)),
                _ => None,
            })
            .collect()
    }

    fn model(widgets: Vec<Widget>) -> ParameterModel {
        let mut screen = Screen::new("main").for_synth("mopho");
        screen.widgets = widgets;
        let layout = Layout::new().with_screen(screen);
        let registry = SynthRegistry::with_builtin().unwrap();
        let channels = HashMap::from([("mopho".to_string(), Channel::new(1).unwrap())]);
        ParameterModel::build(&layout, &registry, &channels).unwrap()
    }

    #[test]
    fn linked_controllers_converge_with_one_send() {
        let mut m = model(vec![
            Widget::slider("a").with_nrpn(10),
            Widget::slider("b").with_nrpn(10),
            Widget::slider("c").with_nrpn(10),
        ]);
        let (a, b, c) = (m.find("a").unwrap(), m.find("b").unwrap(), m.find("c").unwrap());
        m.take_events();

        m.set_value(b, 64);
        for id in [a, b, c] {
            assert_eq!(m.controller(id).unwrap().value(), 64);
        }
        assert_eq!(sends(&mut m), vec![(key(1, 10), 64)]);
        assert!(m.controllers().iter().all(|c| !c.suppress_echo));
    }

    #[test]
    fn received_value_is_not_echoed() {
        let mut m = model(vec![
            Widget::slider("a").with_nrpn(10),
            Widget::slider("b").with_nrpn(10),
        ]);
        m.take_events();
        assert_eq!(m.receive(key(1, 10), 99), 2);
        assert!(sends(&mut m).is_empty());
        let a = m.find("a").unwrap();
        assert_eq!(m.controller(a).unwrap().value(), 99);

        // next user edit still transmits
        m.set_value(a, 5);
        assert_eq!(sends(&mut m), vec![(key(1, 10), 5)]);
    }

    #[test]
    fn receive_same_value_leaves_no_stale_flag() {
        let mut m = model(vec![Widget::slider("a").with_nrpn(3)]);
        let a = m.find("a").unwrap();
        m.receive(key(1, 3), 0);
        assert!(!m.controller(a).unwrap().suppress_echo);
        m.set_value(a, 1);
        assert_eq!(sends(&mut m), vec![(key(1, 3), 1)]);
    }

    #[test]
    fn unbound_receive_is_ignored() {
        let mut m = model(vec![Widget::slider("a").with_nrpn(3)]);
        m.take_events();
        assert_eq!(m.receive(key(1, 4), 10), 0);
        assert_eq!(m.receive(key(2, 3), 10), 0);
        assert!(m.take_events().is_empty());
    }

    #[test]
    fn out_of_range_is_clamped_before_propagation() {
        let mut m = model(vec![
            Widget::slider("a").with_nrpn(7).with_range(0, 100),
            Widget::slider("b").with_nrpn(7),
        ]);
        let (a, b) = (m.find("a").unwrap(), m.find("b").unwrap());
        m.take_events();
        m.set_value(a, 300);
        assert_eq!(m.controller(a).unwrap().value(), 100);
        assert_eq!(m.controller(b).unwrap().value(), 100);
        assert_eq!(sends(&mut m), vec![(key(1, 7), 100)]);
    }

    #[test]
    fn offset_applies_to_transmitted_value() {
        let mut m = model(vec![Widget::slider("a")
            .with_nrpn(20)
            .with_range(-12, 12)
            .with_offset(12)]);
        let a = m.find("a").unwrap();
        m.take_events();
        m.set_value(a, -2);
        assert_eq!(sends(&mut m), vec![(key(1, 20), 10)]);
        m.receive(key(1, 20), 24);
        assert_eq!(m.controller(a).unwrap().value(), 12);
    }

    #[test]
    fn plain_cc_controllers_use_their_own_space() {
        let mut m = model(vec![
            Widget::slider("vol").with_nrpn(7).as_cc(),
            Widget::slider("p7").with_nrpn(7),
        ]);
        let (vol, p7) = (m.find("vol").unwrap(), m.find("p7").unwrap());
        m.take_events();

        m.set_value(vol, 90);
        let events = m.take_events();
        assert!(events.contains(&ModelEvent::Sent {
            key: key(1, 7),
            value: 90,
            cc: true
        }));
        assert_eq!(m.controller(p7).unwrap().value(), 0);

        assert_eq!(m.receive_cc(Channel::new(1).unwrap(), 7, 33), 1);
        assert_eq!(m.controller(vol).unwrap().value(), 33);
        assert_eq!(m.controller(p7).unwrap().value(), 0);
    }

    #[test]
    fn primary_is_first_registered() {
        let m = model(vec![
            Widget::slider("first").with_nrpn(10),
            Widget::slider("second").with_nrpn(10),
        ]);
        assert_eq!(m.primary(key(1, 10)), m.find("first"));
        assert_eq!(m.primaries_for("mopho"), vec![m.find("first").unwrap()]);
    }

    #[test]
    fn dropdown_and_radio_selection() {
        let mut m = model(vec![
            Widget::dropdown("shape")
                .with_nrpn(30)
                .with_option_list("lfo_shapes"),
            Widget::radio("mode")
                .with_nrpn(31)
                .with_button(synthctl_types::ButtonSpec {
                    label: "Off".into(),
                    value: Some(0),
                    ..Default::default()
                })
                .with_button(synthctl_types::ButtonSpec {
                    label: "On".into(),
                    value: Some(1),
                    ..Default::default()
                }),
        ]);
        let (shape, mode) = (m.find("shape").unwrap(), m.find("mode").unwrap());
        m.take_events();

        assert!(m.select_option(shape, "Square"));
        assert_eq!(m.controller(shape).unwrap().display().text, "Square");
        assert!(!m.select_option(shape, "Wobble"));
        assert!(m.press_button(mode, 1));
        assert_eq!(
            sends(&mut m),
            vec![(key(1, 30), 3), (key(1, 31), 1)]
        );
    }

    #[test]
    fn utility_press_queues_action() {
        let mut m = model(vec![Widget::utility(
            "save",
            UtilityAction::SavePatch,
        )
        .with_nrpn(99)]);
        let save = m.find("save").unwrap();
        assert!(m.controller(save).unwrap().is_utility());
        m.take_events();
        assert!(m.press_utility(save));
        assert_eq!(
            m.take_events(),
            vec![ModelEvent::Utility {
                controller: save,
                action: UtilityAction::SavePatch,
                synth: Some("mopho".into())
            }]
        );
        m.set_value(save, 5);
        assert!(sends(&mut m).is_empty());
    }
}
