//! Controllers: one per widget, owned by the parameter model.

use synthctl_types::{Channel, ControllerId, Nrpn, ParamKey, UtilityAction};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Value as a note name, octave numbered from 0 (`60` is `C5`).
pub fn note_name(value: i32) -> String {
    format!(
        "{}{}",
        NOTE_NAMES[value.rem_euclid(12) as usize],
        value.div_euclid(12)
    )
}

/// What a front end shows for a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Display {
    pub text: String,
    /// Selected/highlighted: a toggle that is down, a dropdown showing a
    /// real option, the active half of a dual.
    pub active: bool,
    /// Set on the list half of a dual when the value belongs to neither half.
    pub other: bool,
}

/// A dropdown entry outside the plain option list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraOption {
    pub name: String,
    pub value: Option<i32>,
    pub range: Option<(i32, i32)>,
    /// Last value seen inside `range`.
    pub saved_value: Option<i32>,
}

/// Whether a fixed value or an inclusive range covers `candidate`.
fn covers(value: Option<i32>, range: Option<(i32, i32)>, candidate: i32) -> bool {
    match (value, range) {
        (Some(v), _) => v == candidate,
        (None, Some((lo, hi))) => (lo..=hi).contains(&candidate),
        (None, None) => false,
    }
}

/// The fixed value, else the last value seen inside the range, else its low end.
fn selection_of(value: Option<i32>, saved: Option<i32>, range: Option<(i32, i32)>) -> Option<i32> {
    value.or(saved).or(range.map(|(lo, _)| lo))
}

impl ExtraOption {
    fn matches(&self, value: i32) -> bool {
        covers(self.value, self.range, value)
    }

    /// Value to select when this option is chosen.
    fn selection(&self) -> Option<i32> {
        selection_of(self.value, self.saved_value, self.range)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropdownState {
    pub options: Vec<String>,
    pub extra_options: Vec<ExtraOption>,
    pub grey_on_zero: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioButton {
    pub label: String,
    pub value: Option<i32>,
    pub range: Option<(i32, i32)>,
    pub saved_value: Option<i32>,
    pub down: bool,
}

impl RadioButton {
    fn matches(&self, value: i32) -> bool {
        covers(self.value, self.range, value)
    }

    fn selection(&self) -> Option<i32> {
        selection_of(self.value, self.saved_value, self.range)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioState {
    pub buttons: Vec<RadioButton>,
}

/// Which half of a dual control currently owns the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    List,
    Numeric,
    Other,
}

/// A composite of a list-type and a numeric-type controller, each covering a
/// disjoint slice (`midirange`) of the parent's value space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualState {
    pub list: ControllerId,
    pub numeric: ControllerId,
    pub list_range: (i32, i32),
    pub numeric_range: (i32, i32),
    /// Numeric child's midi value the last time it was in range.
    pub saved_numeric_value: i32,
    pub regime: Regime,
}

impl DualState {
    pub fn regime_for(&self, midi_value: i32) -> Regime {
        if in_range(self.numeric_range, midi_value) {
            Regime::Numeric
        } else if in_range(self.list_range, midi_value) {
            Regime::List
        } else {
            Regime::Other
        }
    }
}

pub(crate) fn in_range((lo, hi): (i32, i32), value: i32) -> bool {
    (lo..=hi).contains(&value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerKind {
    Slider { notes: bool },
    Toggle,
    Dropdown(DropdownState),
    Radio(RadioState),
    Dual(DualState),
    Utility(UtilityAction),
}

impl ControllerKind {
    pub fn is_list_type(&self) -> bool {
        matches!(
            self,
            ControllerKind::Dropdown(_) | ControllerKind::Radio(_) | ControllerKind::Toggle
        )
    }

    pub fn is_numeric_type(&self) -> bool {
        matches!(self, ControllerKind::Slider { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Controller {
    pub(crate) id: ControllerId,
    pub(crate) name: String,
    pub(crate) synth: Option<String>,
    pub(crate) channel: Channel,
    pub(crate) nrpn: Option<Nrpn>,
    pub(crate) cc: bool,
    pub(crate) value: i32,
    pub(crate) minimum: i32,
    pub(crate) maximum: i32,
    pub(crate) offset: i32,
    /// Owning dual control, if this is one of its halves.
    pub(crate) parent: Option<ControllerId>,
    pub(crate) linked: Vec<ControllerId>,
    pub(crate) suppress_echo: bool,
    pub(crate) kind: ControllerKind,
    pub(crate) display: Display,
}

impl Controller {
    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn synth(&self) -> Option<&str> {
        self.synth.as_deref()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn nrpn(&self) -> Option<Nrpn> {
        self.nrpn
    }

    pub fn key(&self) -> Option<ParamKey> {
        self.nrpn.map(|nrpn| ParamKey::new(self.channel, nrpn))
    }

    /// Sends and receives a single plain control change rather than NRPN.
    pub fn is_cc(&self) -> bool {
        self.cc
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    /// Value as transmitted: `value + offset`.
    pub fn midi_value(&self) -> i32 {
        self.value + self.offset
    }

    pub fn minimum(&self) -> i32 {
        self.minimum
    }

    pub fn maximum(&self) -> i32 {
        self.maximum
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn is_subcontroller(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent(&self) -> Option<ControllerId> {
        self.parent
    }

    pub fn linked(&self) -> &[ControllerId] {
        &self.linked
    }

    pub fn kind(&self) -> &ControllerKind {
        &self.kind
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn is_utility(&self) -> bool {
        self.nrpn.is_none()
    }

    pub(crate) fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.minimum, self.maximum)
    }

    /// Store a clamped value. Returns the previous value if it changed.
    pub(crate) fn assign(&mut self, value: i32) -> Option<i32> {
        let value = self.clamp(value);
        if value == self.value {
            return None;
        }
        let old = self.value;
        self.value = value;
        Some(old)
    }

    /// Recompute the display from the current value. Range entries of
    /// dropdowns and radio buttons remember the value they matched.
    pub(crate) fn refresh_display(&mut self) {
        let value = self.value;
        let other = self.display.other;
        self.display = match &mut self.kind {
            ControllerKind::Slider { notes } => Display {
                text: if *notes {
                    note_name(value)
                } else {
                    value.to_string()
                },
                active: true,
                other,
            },
            ControllerKind::Toggle => Display {
                text: if value == 1 { "On" } else { "Off" }.to_string(),
                active: value == 1,
                other,
            },
            ControllerKind::Dropdown(state) => {
                let mut display = Display {
                    text: "Off".to_string(),
                    active: false,
                    other,
                };
                let listed = usize::try_from(value)
                    .ok()
                    .and_then(|i| state.options.get(i));
                if let Some(option) = listed {
                    display.text = option.clone();
                    display.active = true;
                } else if let Some(extra) =
                    state.extra_options.iter_mut().find(|e| e.matches(value))
                {
                    if extra.value.is_none() {
                        extra.saved_value = Some(value);
                    }
                    display.text = extra.name.clone();
                    display.active = true;
                }
                if state.grey_on_zero && value == 0 {
                    display.active = false;
                }
                display
            }
            ControllerKind::Radio(state) => {
                let mut text = String::new();
                for button in &mut state.buttons {
                    button.down = false;
                }
                if let Some(button) = state.buttons.iter_mut().find(|b| b.matches(value)) {
                    button.down = true;
                    if button.value.is_none() {
                        button.saved_value = Some(value);
                    }
                    text = button.label.clone();
                }
                Display {
                    active: !text.is_empty(),
                    text,
                    other,
                }
            }
            // filled in by the model, which can see the children
            ControllerKind::Dual(_) => Display {
                text: value.to_string(),
                active: true,
                other,
            },
            ControllerKind::Utility(action) => Display {
                text: format!("{:?}", action),
                active: false,
                other,
            },
        };
        if self.display.other {
            self.display.text = "Other".to_string();
            self.display.active = false;
        }
    }

    /// Value to select for dropdown entry `name`, if it exists.
    pub(crate) fn option_value(&self, name: &str) -> Option<i32> {
        let ControllerKind::Dropdown(state) = &self.kind else {
            return None;
        };
        if let Some(index) = state.options.iter().position(|o| o == name) {
            return i32::try_from(index).ok();
        }
        state
            .extra_options
            .iter()
            .find(|e| e.name == name)
            .and_then(ExtraOption::selection)
    }

    /// Value to select for radio button `index`, if it exists.
    pub(crate) fn button_value(&self, index: usize) -> Option<i32> {
        match &self.kind {
            ControllerKind::Radio(state) => state.buttons.get(index)?.selection(),
            _ => None,
        }
    }
}
