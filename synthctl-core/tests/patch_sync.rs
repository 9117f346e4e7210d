//! End-to-end behaviour through the engine: live edits, inbound NRPN,
//! patch dumps and files, with a recording transport.

use std::collections::HashMap;
use std::time::Instant;

use synthctl_core::error::CollectingReporter;
use synthctl_core::midi::nrpn;
use synthctl_core::midi::sysex::frame;
use synthctl_core::midi::{parse_midi_message, InboundMessage};
use synthctl_core::model::{ParameterModel, Regime};
use synthctl_core::synth::codec::{pack_7in8, unpack_7in8};
use synthctl_core::synth::SynthRegistry;
use synthctl_core::transport::TestTransport;
use synthctl_core::engine::{Engine, Received};
use synthctl_types::{Channel, DumpKind, Layout, Screen, Widget};

const MOPHO_HEADER: [u8; 3] = [0x01, 0x25, 0x03];

fn layout() -> Layout {
    Layout::new()
        .with_screen(
            Screen::new("osc")
                .for_synth("mopho")
                .with_widget(
                    Widget::slider("Osc 1 Freq")
                        .with_nrpn(0)
                        .with_range(0, 120),
                )
                .with_widget(Widget::slider("Cutoff").with_nrpn(15).with_range(0, 164))
                .with_widget(
                    Widget::dual("LFO 1 Freq")
                        .with_nrpn(37)
                        .with_child(Widget::slider("LFO 1 Rate").with_range(0, 150).with_midirange(0, 150))
                        .with_child(
                            Widget::dropdown("LFO 1 Sync")
                                .with_option_list("time_syncs")
                                .with_range(0, 15)
                                .with_midirange(151, 166),
                        ),
                ),
        )
        .with_screen(
            // the same parameter on a second screen
            Screen::new("overview")
                .for_synth("mopho")
                .with_widget(Widget::slider("Cutoff (overview)").with_nrpn(15).with_range(0, 164)),
        )
}

fn engine() -> (Engine, TestTransport, CollectingReporter) {
    let registry = SynthRegistry::with_builtin().unwrap();
    let channels = HashMap::from([("mopho".to_string(), Channel::new(2).unwrap())]);
    let model = ParameterModel::build(&layout(), &registry, &channels).unwrap();
    let transport = TestTransport::new();
    let reporter = CollectingReporter::new();
    let engine = Engine::new(registry, model)
        .with_transport(transport.clone())
        .with_reporter(reporter.clone());
    (engine, transport, reporter)
}

fn ch2() -> Channel {
    Channel::new(2).unwrap()
}

fn feed_nrpn(engine: &mut Engine, number: u16, value: u16) -> Option<Received> {
    let now = Instant::now();
    let mut last = None;
    for (controller, byte) in nrpn::encode(number, value) {
        let raw = [0xB0 | ch2().wire(), controller, byte];
        let message = parse_midi_message(&raw).unwrap();
        last = engine.handle_inbound(message, now).unwrap();
    }
    last
}

fn dump(values: &[u16]) -> Vec<u8> {
    let mut payload = MOPHO_HEADER.to_vec();
    payload.extend(pack_7in8(values));
    frame(&payload)
}

fn value_of(engine: &Engine, name: &str) -> i32 {
    let id = engine.model().find(name).unwrap();
    engine.model().controller(id).unwrap().value()
}

#[test]
fn linked_controllers_converge_with_one_write() {
    let (mut engine, transport, _) = engine();
    let cutoff = engine.model().find("Cutoff").unwrap();
    engine.edit(cutoff, 64).unwrap();
    assert_eq!(value_of(&engine, "Cutoff (overview)"), 64);
    assert_eq!(transport.nrpn_writes(), vec![(ch2(), 15, 64)]);
}

#[test]
fn inbound_nrpn_reaches_every_linked_controller_silently() {
    let (mut engine, transport, _) = engine();
    let received = feed_nrpn(&mut engine, 15, 100);
    assert!(matches!(received, Some(Received::Nrpn { value: 100, bound: 2, .. })));
    assert_eq!(value_of(&engine, "Cutoff"), 100);
    assert_eq!(value_of(&engine, "Cutoff (overview)"), 100);
    assert!(transport.operations().is_empty());

    // values beyond the range are clamped
    feed_nrpn(&mut engine, 15, 1000);
    assert_eq!(value_of(&engine, "Cutoff"), 164);
}

#[test]
fn unbound_nrpn_is_ignored() {
    let (mut engine, _, reporter) = engine();
    let received = feed_nrpn(&mut engine, 99, 3);
    assert!(matches!(received, Some(Received::Nrpn { bound: 0, .. })));
    assert!(reporter.reports().is_empty());
}

#[test]
fn dual_control_switches_regime() {
    let (mut engine, transport, _) = engine();
    let dual = engine.model().find("LFO 1 Freq").unwrap();

    feed_nrpn(&mut engine, 37, 90);
    assert_eq!(engine.model().dual_state(dual).unwrap().regime, Regime::Numeric);
    assert_eq!(value_of(&engine, "LFO 1 Rate"), 90);

    feed_nrpn(&mut engine, 37, 155);
    let state = engine.model().dual_state(dual).unwrap();
    assert_eq!(state.regime, Regime::List);
    assert_eq!(state.saved_numeric_value, 90);
    assert_eq!(value_of(&engine, "LFO 1 Sync"), 4);
    assert_eq!(value_of(&engine, "LFO 1 Rate"), 90);

    engine.select_numeric_regime(dual).unwrap();
    assert_eq!(value_of(&engine, "LFO 1 Freq"), 90);
    assert_eq!(transport.nrpn_writes(), vec![(ch2(), 37, 90)]);
}

#[test]
fn received_dump_round_trips_through_a_file() {
    let (mut engine, transport, reporter) = engine();
    let values: Vec<u16> = (0..256u16).map(|i| (i * 13 + 5) % 128).collect();
    let message = dump(&values);

    let received = engine
        .handle_inbound(InboundMessage::Sysex(message.clone()), Instant::now())
        .unwrap();
    assert_eq!(
        received,
        Some(Received::Patch {
            synth: "mopho".into(),
            kind: DumpKind::EditBuffer
        })
    );
    // nrpn 15 is at position 20
    assert_eq!(value_of(&engine, "Cutoff"), values[20] as i32);
    assert!(transport.operations().is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patch.syx");
    engine.save_patch("mopho", &path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), message[1..message.len() - 1]);

    // a fresh engine loads the file and sends the identical dump
    let (mut other, other_transport, _) = self::engine();
    other.load_patch("mopho", &path).unwrap();
    other.send_patch("mopho").unwrap();
    assert_eq!(other_transport.sysex_sent(), vec![message]);
    assert!(reporter.reports().is_empty());
}

#[test]
fn edits_after_a_dump_keep_the_rest_of_the_patch() {
    let (mut engine, transport, _) = engine();
    let values: Vec<u16> = (0..256u16).map(|i| i % 100).collect();
    engine
        .handle_inbound(InboundMessage::Sysex(dump(&values)), Instant::now())
        .unwrap();
    let cutoff = engine.model().find("Cutoff").unwrap();
    engine.edit(cutoff, 150).unwrap();
    engine.send_patch("mopho").unwrap();

    let sent = transport.sysex_sent();
    let payload = &sent[0][1..sent[0].len() - 1];
    let mut expected = values.clone();
    expected[20] = 150;
    assert_eq!(unpack_7in8(&payload[3..]), expected);
}

#[test]
fn foreign_dump_changes_nothing() {
    let (mut engine, _, reporter) = engine();
    feed_nrpn(&mut engine, 15, 42);

    let mut payload = vec![0x01, 0x23, 0x03];
    payload.extend(pack_7in8(&[99; 256]));
    let err = engine
        .handle_inbound(InboundMessage::Sysex(frame(&payload)), Instant::now())
        .unwrap_err();
    assert_eq!(err.name(), "INCORRECT_SYNTH");
    assert_eq!(reporter.names(), vec!["INCORRECT_SYNTH"]);
    assert_eq!(value_of(&engine, "Cutoff"), 42);
    assert_eq!(value_of(&engine, "Osc 1 Freq"), 0);
}

#[test]
fn live_only_synth_refuses_patch_operations() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("minitaur.json"),
        r#"{ "name": "minitaur", "parameters": 64 }"#,
    )
    .unwrap();
    let mut registry = SynthRegistry::with_builtin().unwrap();
    assert_eq!(registry.load_dir(dir.path()).unwrap(), 1);

    let layout = Layout::new().with_screen(
        Screen::new("main")
            .for_synth("minitaur")
            .with_widget(Widget::slider("Cutoff").with_nrpn(19)),
    );
    let model = ParameterModel::build(&layout, &registry, &HashMap::new()).unwrap();
    let transport = TestTransport::new();
    let reporter = CollectingReporter::new();
    let mut engine = Engine::new(registry, model)
        .with_transport(transport.clone())
        .with_reporter(reporter.clone());

    assert_eq!(engine.send_patch("minitaur").unwrap_err().name(), "NO_PATCH_DETAILS");
    assert_eq!(engine.request_patch("minitaur").unwrap_err().name(), "NO_PATCH_DETAILS");
    assert!(transport.operations().is_empty());

    // live control still works
    let cutoff = engine.model().find("Cutoff").unwrap();
    engine.edit(cutoff, 5).unwrap();
    assert_eq!(engine.send_all("minitaur").unwrap(), 1);
    assert_eq!(
        transport.nrpn_writes(),
        vec![(Channel::default(), 19, 5), (Channel::default(), 19, 5)]
    );
    assert_eq!(reporter.names(), vec!["NO_PATCH_DETAILS", "NO_PATCH_DETAILS"]);
}
