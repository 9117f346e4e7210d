//! Declarative UI layout records.
//!
//! A layout is a tree of widgets grouped into screens. The parameter model is
//! built by walking it once; `synth` and `nrpn` set on a container widget
//! apply to every descendant that does not set its own.
//!
//! ```toml
//! [[screens]]
//! name = "oscillators"
//! synth = "mopho"
//!
//! [[screens.widgets]]
//! kind = "slider"
//! name = "Osc 1 Freq"
//! nrpn = 0
//! maximum = 120
//! notes = true
//! ```

use serde::{Deserialize, Serialize};

use crate::Nrpn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub screens: Vec<Screen>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screens.push(screen);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synth: Option<String>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Screen {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn for_synth(mut self, synth: impl Into<String>) -> Self {
        self.synth = Some(synth.into());
        self
    }

    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }
}

/// Widget shape. `Group` is a plain container and never becomes a controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    #[default]
    Group,
    Slider,
    Toggle,
    Dropdown,
    Radio,
    Dual,
    Utility,
}

impl WidgetKind {
    /// Discrete-choice widgets that can serve as the list half of a dual control.
    pub fn is_list_type(self) -> bool {
        matches!(self, WidgetKind::Dropdown | WidgetKind::Radio | WidgetKind::Toggle)
    }

    /// Continuous widgets that can serve as the numeric half of a dual control.
    pub fn is_numeric_type(self) -> bool {
        matches!(self, WidgetKind::Slider)
    }
}

/// One-shot actions carried by utility widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityAction {
    LoadPatch,
    SavePatch,
    SendPatch,
    ReceivePatch,
    SendAll,
}

/// A dropdown entry beyond the plain option list. Matches either one fixed
/// value or a whole range; a range entry remembers the last value seen in it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraOptionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i32>,
}

/// A radio button: selects a fixed value, or stands for a range of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i32>,
}

fn default_maximum() -> i32 {
    127
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrpn: Option<Nrpn>,
    #[serde(default)]
    pub minimum: i32,
    #[serde(default = "default_maximum")]
    pub maximum: i32,
    #[serde(default)]
    pub offset: i32,
    /// Send and receive as a single plain control change instead of NRPN.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cc: bool,
    /// Display the value as a note name.
    #[serde(default, skip_serializing_if = "is_false")]
    pub notes: bool,
    /// Name of an option list in the synth descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_list: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_options: Vec<ExtraOptionSpec>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub grey_on_zero: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ButtonSpec>,
    /// Slice of the parent's value space this widget covers inside a dual control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midirange: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<UtilityAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Widget>,
}

impl Default for Widget {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: WidgetKind::Group,
            synth: None,
            nrpn: None,
            minimum: 0,
            maximum: default_maximum(),
            offset: 0,
            cc: false,
            notes: false,
            option_list: None,
            options: Vec::new(),
            extra_options: Vec::new(),
            grey_on_zero: false,
            buttons: Vec::new(),
            midirange: None,
            action: None,
            children: Vec::new(),
        }
    }
}

impl Widget {
    pub fn new(kind: WidgetKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(WidgetKind::Group, name)
    }

    pub fn slider(name: impl Into<String>) -> Self {
        Self::new(WidgetKind::Slider, name)
    }

    pub fn toggle(name: impl Into<String>) -> Self {
        Self {
            maximum: 1,
            ..Self::new(WidgetKind::Toggle, name)
        }
    }

    pub fn dropdown(name: impl Into<String>) -> Self {
        Self::new(WidgetKind::Dropdown, name)
    }

    pub fn radio(name: impl Into<String>) -> Self {
        Self::new(WidgetKind::Radio, name)
    }

    pub fn dual(name: impl Into<String>) -> Self {
        Self::new(WidgetKind::Dual, name)
    }

    pub fn utility(name: impl Into<String>, action: UtilityAction) -> Self {
        Self {
            action: Some(action),
            ..Self::new(WidgetKind::Utility, name)
        }
    }

    pub fn for_synth(mut self, synth: impl Into<String>) -> Self {
        self.synth = Some(synth.into());
        self
    }

    /// Bind to a parameter number. Values above 16383 are ignored.
    pub fn with_nrpn(mut self, nrpn: u16) -> Self {
        self.nrpn = Nrpn::new(nrpn);
        self
    }

    pub fn with_range(mut self, minimum: i32, maximum: i32) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_midirange(mut self, start: i32, end: i32) -> Self {
        self.midirange = Some([start, end]);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_option_list(mut self, list: impl Into<String>) -> Self {
        self.option_list = Some(list.into());
        self
    }

    pub fn with_extra_option(mut self, extra: ExtraOptionSpec) -> Self {
        self.extra_options.push(extra);
        self
    }

    pub fn with_button(mut self, button: ButtonSpec) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn as_cc(mut self) -> Self {
        self.cc = true;
        self
    }

    pub fn with_child(mut self, child: Widget) -> Self {
        self.children.push(child);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_layout() {
        let src = r#"
            [[screens]]
            name = "main"
            synth = "mopho"

            [[screens.widgets]]
            kind = "group"
            nrpn = 12

            [[screens.widgets.children]]
            kind = "slider"
            name = "cutoff"
            maximum = 164

            [[screens.widgets]]
            kind = "utility"
            name = "load"
            action = "load_patch"
        "#;
        let layout: Layout = toml::from_str(src).unwrap();
        let screen = &layout.screens[0];
        assert_eq!(screen.synth.as_deref(), Some("mopho"));
        assert_eq!(screen.widgets.len(), 2);
        let group = &screen.widgets[0];
        assert_eq!(group.nrpn, Nrpn::new(12));
        assert_eq!(group.children[0].kind, WidgetKind::Slider);
        assert_eq!(group.children[0].maximum, 164);
        assert_eq!(group.children[0].minimum, 0);
        assert_eq!(screen.widgets[1].action, Some(UtilityAction::LoadPatch));
    }

    #[test]
    fn nrpn_out_of_range_rejected() {
        let src = r#"
            [[screens]]
            name = "main"
            [[screens.widgets]]
            kind = "slider"
            nrpn = 20000
        "#;
        assert!(toml::from_str::<Layout>(src).is_err());
    }

    #[test]
    fn kind_capabilities() {
        assert!(WidgetKind::Dropdown.is_list_type());
        assert!(WidgetKind::Toggle.is_list_type());
        assert!(!WidgetKind::Slider.is_list_type());
        assert!(WidgetKind::Slider.is_numeric_type());
        assert!(!WidgetKind::Dual.is_numeric_type());
    }
}
