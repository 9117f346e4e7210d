use synthctl_types::ControllerId;

use super::controller::{in_range, ControllerKind, DualState, Regime};
use super::ParameterModel;

impl ParameterModel {
    pub fn dual_state(&self, dual: ControllerId) -> Option<&DualState> {
        match &self.controller(dual)?.kind {
            ControllerKind::Dual(state) => Some(state),
            _ => None,
        }
    }

    /// A half of a dual control changed. If its value lies inside its own
    /// midirange it becomes the dual's value, as a user edit.
    pub fn on_subcontroller_value(&mut self, dual: ControllerId, child: ControllerId) {
        let (Some(state), Some(parent), Some(child_ctl)) = (
            self.dual_state(dual).cloned(),
            self.controller(dual),
            self.controller(child),
        ) else {
            return;
        };
        let midi_value = child_ctl.midi_value();
        let parent_value = midi_value - parent.offset;

        if child == state.numeric && in_range(state.numeric_range, midi_value) {
            self.with_dual_state(dual, |s| s.saved_numeric_value = midi_value);
            self.set_value(dual, parent_value);
        } else if child == state.list && in_range(state.list_range, midi_value) {
            self.set_value(dual, parent_value);
        } else {
            log::trace!(
                target: "model",
                "dual {}: child {} value {} outside its range",
                dual,
                child,
                midi_value
            );
        }
    }

    /// Switch a dual control back to its numeric half, restoring the last
    /// numeric value. Transmitted like any user edit.
    pub fn select_numeric_regime(&mut self, dual: ControllerId) {
        let (Some(state), Some(parent)) = (self.dual_state(dual), self.controller(dual)) else {
            return;
        };
        let value = state.saved_numeric_value - parent.offset;
        self.set_value(dual, value);
    }

    /// Push the dual's value into its halves. The numeric half only takes
    /// values inside its range; the list half always takes the value,
    /// clamped, so its selection stays correct.
    pub(crate) fn sync_dual_children(&mut self, dual: ControllerId) {
        let (Some(state), Some(parent)) = (self.dual_state(dual).cloned(), self.controller(dual))
        else {
            return;
        };
        let value = parent.midi_value();
        let regime = state.regime_for(value);

        if regime == Regime::Numeric {
            if let Some(offset) = self.controller(state.numeric).map(|c| c.offset) {
                self.assign_silently(state.numeric, value - offset);
            }
            self.with_dual_state(dual, |s| s.saved_numeric_value = value);
        }

        if let Some(list) = self.controllers.get_mut(state.list.index()) {
            list.display.other = regime == Regime::Other;
            let clamped = value.clamp(list.minimum + list.offset, list.maximum + list.offset);
            let offset = list.offset;
            self.assign_silently(state.list, clamped - offset);
        }

        if let Some(list) = self.controllers.get_mut(state.list.index()) {
            list.display.active &= regime == Regime::List;
        }
        if let Some(numeric) = self.controllers.get_mut(state.numeric.index()) {
            numeric.display.active = regime == Regime::Numeric;
        }
        self.with_dual_state(dual, |s| s.regime = regime);

        let text = match regime {
            Regime::Numeric => self.controller(state.numeric).map(|c| c.display.text.clone()),
            Regime::List => self.controller(state.list).map(|c| c.display.text.clone()),
            Regime::Other => Some("Other".to_string()),
        };
        if let (Some(parent), Some(text)) = (self.controllers.get_mut(dual.index()), text) {
            parent.display.text = text;
            parent.display.active = true;
        }
    }

    fn with_dual_state(&mut self, dual: ControllerId, f: impl FnOnce(&mut DualState)) {
        if let Some(ControllerKind::Dual(state)) =
            self.controllers.get_mut(dual.index()).map(|c| &mut c.kind)
        {
            f(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use synthctl_types::{
        Channel, ControllerId, ExtraOptionSpec, Layout, Nrpn, ParamKey, Screen, Widget,
    };

    use crate::model::{ModelEvent, ParameterModel, Regime};
    use crate::synth::SynthRegistry;

    /// Numeric half covers 0..=63, list half 64..=127.
    fn dual_model() -> ParameterModel {
        let dual = Widget::dual("lfo rate")
            .with_nrpn(37)
            .with_child(
                Widget::slider("rate")
                    .with_range(0, 63)
                    .with_midirange(0, 63),
            )
            .with_child(
                Widget::dropdown("sync")
                    .with_range(0, 63)
                    .with_midirange(64, 127)
                    .with_option_list("time_syncs")
                    .with_extra_option(ExtraOptionSpec {
                        name: "Slow".into(),
                        minimum: Some(16),
                        maximum: Some(63),
                        ..Default::default()
                    }),
            );
        let layout = Layout::new().with_screen(Screen::new("lfo").for_synth("mopho").with_widget(dual));
        let registry = SynthRegistry::with_builtin().unwrap();
        ParameterModel::build(&layout, &registry, &HashMap::new()).unwrap()
    }

    fn ids(m: &ParameterModel) -> (ControllerId, ControllerId, ControllerId) {
        (
            m.find("lfo rate").unwrap(),
            m.find("rate").unwrap(),
            m.find("sync").unwrap(),
        )
    }

    fn key() -> ParamKey {
        ParamKey::new(Channel::default(), Nrpn::new(37).unwrap())
    }

    fn sends(m: &mut ParameterModel) -> Vec<u16> {
        m.take_events()
            .into_iter()
            .filter_map(|e| match e {
                ModelEvent::Sent { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn construction_assigns_offsets() {
        let m = dual_model();
        let (dual, rate, sync) = ids(&m);
        let state = m.dual_state(dual).unwrap();
        assert_eq!(state.numeric, rate);
        assert_eq!(state.list, sync);
        assert_eq!(m.controller(sync).unwrap().offset(), 64);
        assert_eq!(m.controller(rate).unwrap().offset(), 0);
        assert!(m.controller(rate).unwrap().is_subcontroller());
        // halves are never bound to the parameter directly
        assert_eq!(m.controllers_for(key()), &[dual]);
    }

    #[test]
    fn regime_switch_keeps_numeric_value() {
        let mut m = dual_model();
        let (dual, rate, sync) = ids(&m);

        m.receive(key(), 30);
        assert_eq!(m.controller(rate).unwrap().value(), 30);
        assert_eq!(m.dual_state(dual).unwrap().regime, Regime::Numeric);

        m.receive(key(), 70);
        let state = m.dual_state(dual).unwrap();
        assert_eq!(state.regime, Regime::List);
        assert_eq!(state.saved_numeric_value, 30);
        assert_eq!(m.controller(rate).unwrap().value(), 30);
        assert_eq!(m.controller(sync).unwrap().value(), 6);
        assert!(m.controller(sync).unwrap().display().active);
        assert!(!m.controller(rate).unwrap().display().active);

        m.receive(key(), 30);
        assert_eq!(m.dual_state(dual).unwrap().regime, Regime::Numeric);
        assert!(m.controller(rate).unwrap().display().active);
        assert_eq!(m.controller(dual).unwrap().display().text, "30");
        assert!(sends(&mut m).is_empty());
    }

    #[test]
    fn child_edit_sends_once_through_parent() {
        let mut m = dual_model();
        let (dual, rate, sync) = ids(&m);
        m.take_events();

        m.set_value(rate, 12);
        assert_eq!(m.controller(dual).unwrap().value(), 12);
        assert_eq!(sends(&mut m), vec![12]);

        assert!(m.select_option(sync, "8 Step"));
        assert_eq!(m.controller(dual).unwrap().value(), 66);
        assert_eq!(m.dual_state(dual).unwrap().regime, Regime::List);
        assert_eq!(m.dual_state(dual).unwrap().saved_numeric_value, 12);
        assert_eq!(sends(&mut m), vec![66]);
    }

    #[test]
    fn select_numeric_regime_restores_saved_value() {
        let mut m = dual_model();
        let (dual, rate, _) = ids(&m);
        m.set_value(rate, 40);
        m.receive(key(), 100);
        m.take_events();

        m.select_numeric_regime(dual);
        assert_eq!(m.controller(dual).unwrap().value(), 40);
        assert_eq!(m.dual_state(dual).unwrap().regime, Regime::Numeric);
        assert_eq!(sends(&mut m), vec![40]);
    }

    #[test]
    fn value_outside_both_ranges_marks_other() {
        let dual = Widget::dual("d")
            .with_nrpn(5)
            .with_child(Widget::slider("n").with_range(0, 9).with_midirange(0, 9))
            .with_child(
                Widget::dropdown("l")
                    .with_options(["a", "b"])
                    .with_range(0, 1)
                    .with_midirange(10, 11),
            );
        let layout = Layout::new().with_screen(Screen::new("s").for_synth("mopho").with_widget(dual));
        let registry = SynthRegistry::with_builtin().unwrap();
        let mut m = ParameterModel::build(&layout, &registry, &HashMap::new()).unwrap();
        let (d, n, l) = (m.find("d").unwrap(), m.find("n").unwrap(), m.find("l").unwrap());

        m.receive(ParamKey::new(Channel::default(), Nrpn::new(5).unwrap()), 50);
        assert_eq!(m.dual_state(d).unwrap().regime, Regime::Other);
        let list = m.controller(l).unwrap();
        assert!(list.display().other);
        assert_eq!(list.value(), 1, "clamped into the list half");
        assert_eq!(m.controller(n).unwrap().value(), 0);
        assert_eq!(m.controller(d).unwrap().display().text, "Other");
    }
}
