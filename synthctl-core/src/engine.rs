//! The dispatch context tying MIDI I/O, the parameter model and patches
//! together. Only the thread that owns the engine touches the model; MIDI
//! input reaches it as [`InboundMessage`]s over a channel.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use synthctl_types::{Channel, ControllerId, DumpKind, Nrpn, ParamKey, UtilityAction};

use crate::error::{CoreError, CoreResult, ErrorReporter, LogReporter};
use crate::midi::nrpn::{CcEvent, NrpnAssembler};
use crate::midi::sysex::SysexAssembler;
use crate::midi::InboundMessage;
use crate::model::{ModelEvent, ParameterModel, ValueChanged};
use crate::patch::{transmit, PatchManager};
use crate::synth::SynthRegistry;
use crate::transport::{MidiTransport, NullTransport};

/// A fully decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete NRPN write. `bound` is the number of controllers it reached.
    Nrpn {
        key: ParamKey,
        value: u16,
        bound: usize,
    },
    Cc {
        channel: Channel,
        controller: u8,
        value: u8,
        bound: usize,
    },
    /// A patch dump was recognised and applied.
    Patch { synth: String, kind: DumpKind },
}

pub struct Engine {
    model: ParameterModel,
    patches: PatchManager,
    nrpn: NrpnAssembler,
    sysex: SysexAssembler,
    transport: Box<dyn MidiTransport>,
    reporter: Box<dyn ErrorReporter>,
    patches_dir: PathBuf,
    changes: Vec<ValueChanged>,
}

impl Engine {
    pub fn new(registry: SynthRegistry, model: ParameterModel) -> Self {
        Self {
            model,
            patches: PatchManager::new(registry),
            nrpn: NrpnAssembler::default(),
            sysex: SysexAssembler::default(),
            transport: Box::new(NullTransport),
            reporter: Box::new(LogReporter),
            patches_dir: PathBuf::from("."),
            changes: Vec::new(),
        }
    }

    pub fn with_transport(mut self, transport: impl MidiTransport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn with_timeouts(mut self, nrpn: Duration, sysex: Duration) -> Self {
        self.nrpn = NrpnAssembler::new(nrpn);
        self.sysex = SysexAssembler::new(sysex);
        self
    }

    /// Directory utility controls load patches from and save them to.
    pub fn with_patches_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.patches_dir = dir.into();
        self
    }

    pub fn model(&self) -> &ParameterModel {
        &self.model
    }

    pub fn patches(&self) -> &PatchManager {
        &self.patches
    }

    pub fn registry(&self) -> &SynthRegistry {
        self.patches.registry()
    }

    /// Controller changes since the last call, oldest first.
    pub fn take_changes(&mut self) -> Vec<ValueChanged> {
        std::mem::take(&mut self.changes)
    }

    /// Default patch file for a synth, used by utility controls.
    pub fn patch_path(&self, synth: &str) -> PathBuf {
        self.patches_dir.join(format!("{}.syx", synth))
    }

    // ─── Inbound ────────────────────────────────────────────────────

    /// Drain every message waiting on the input channel.
    pub fn poll(&mut self, receiver: &Receiver<InboundMessage>) -> Vec<Received> {
        let mut received = Vec::new();
        for message in receiver.try_iter() {
            if let Ok(Some(r)) = self.handle_inbound(message, Instant::now()) {
                received.push(r);
            }
        }
        received
    }

    /// Feed one inbound message through the assemblers and into the model.
    /// A control change interrupts any sysex in progress and vice versa.
    pub fn handle_inbound(
        &mut self,
        message: InboundMessage,
        now: Instant,
    ) -> CoreResult<Option<Received>> {
        let received = match message {
            InboundMessage::ControlChange {
                channel,
                controller,
                value,
            } => {
                self.sysex.abandon();
                match self.nrpn.feed(channel, controller, value, now) {
                    Some(CcEvent::Nrpn {
                        channel,
                        nrpn,
                        value,
                    }) => Nrpn::new(nrpn).map(|nrpn| {
                        let key = ParamKey::new(channel, nrpn);
                        let bound = self.model.receive(key, value);
                        Received::Nrpn { key, value, bound }
                    }),
                    Some(CcEvent::Plain {
                        channel,
                        controller,
                        value,
                    }) => {
                        let bound = self.model.receive_cc(channel, controller, value);
                        Some(Received::Cc {
                            channel,
                            controller,
                            value,
                            bound,
                        })
                    }
                    None => None,
                }
            }
            InboundMessage::Sysex(chunk) => {
                self.nrpn.abandon_all();
                match self.sysex.feed(&chunk, now) {
                    Some(message) => {
                        let result = self.patches.on_sysex(&mut self.model, &message);
                        let (synth, kind) = self.report(result)?;
                        Some(Received::Patch { synth, kind })
                    }
                    None => None,
                }
            }
        };
        self.flush()?;
        Ok(received)
    }

    // ─── User edits ─────────────────────────────────────────────────

    pub fn edit(&mut self, id: ControllerId, value: i32) -> CoreResult {
        self.model.set_value(id, value);
        self.flush()
    }

    pub fn select_option(&mut self, id: ControllerId, option: &str) -> CoreResult<bool> {
        let selected = self.model.select_option(id, option);
        self.flush()?;
        Ok(selected)
    }

    pub fn press_button(&mut self, id: ControllerId, index: usize) -> CoreResult<bool> {
        let pressed = self.model.press_button(id, index);
        self.flush()?;
        Ok(pressed)
    }

    pub fn select_numeric_regime(&mut self, dual: ControllerId) -> CoreResult {
        self.model.select_numeric_regime(dual);
        self.flush()
    }

    /// Press a utility control and run its patch operation.
    pub fn press_utility(&mut self, id: ControllerId) -> CoreResult<bool> {
        let pressed = self.model.press_utility(id);
        self.flush()?;
        Ok(pressed)
    }

    // ─── Patch operations ───────────────────────────────────────────

    pub fn request_patch(&mut self, synth: &str) -> CoreResult {
        let result = self.patches.receive_request(synth, &mut *self.transport);
        self.report(result)
    }

    pub fn send_patch(&mut self, synth: &str) -> CoreResult {
        let result = self.patches.send(&self.model, synth, &mut *self.transport);
        self.report(result)
    }

    pub fn send_all(&mut self, synth: &str) -> CoreResult<usize> {
        let result = self.patches.send_all(&self.model, synth, &mut *self.transport);
        self.report(result)
    }

    pub fn load_patch(&mut self, synth: &str, path: &Path) -> CoreResult<DumpKind> {
        let result = self.patches.load_file(&mut self.model, synth, path);
        let kind = self.report(result)?;
        self.flush()?;
        Ok(kind)
    }

    pub fn save_patch(&mut self, synth: &str, path: &Path) -> CoreResult {
        let result = self.patches.save_file(&self.model, synth, path);
        self.report(result)
    }

    /// Send queued writes and collect changes. Utility presses run here, and
    /// anything they queue is handled in the same pass.
    fn flush(&mut self) -> CoreResult {
        let mut outcome = Ok(());
        loop {
            let events = self.model.take_events();
            if events.is_empty() {
                break;
            }
            let (rest, sent) = transmit(events, &mut *self.transport);
            if let Err(e) = self.report(sent) {
                outcome = Err(e);
            }
            for event in rest {
                match event {
                    ModelEvent::Changed(change) => self.changes.push(change),
                    ModelEvent::Utility {
                        controller,
                        action,
                        synth,
                    } => {
                        if let Err(e) = self.run_utility(controller, action, synth) {
                            outcome = Err(e);
                        }
                    }
                    ModelEvent::Sent { .. } => {}
                }
            }
        }
        outcome
    }

    fn run_utility(
        &mut self,
        id: ControllerId,
        action: UtilityAction,
        synth: Option<String>,
    ) -> CoreResult {
        let Some(synth) = synth else {
            let name = self.model.controller(id).map(|c| c.name()).unwrap_or("?");
            let reason = format!("utility '{}' has no synth", name);
            return self.report(Err(CoreError::InvalidLayout(reason)));
        };
        log::info!(target: "synthctl", "utility {:?} for {}", action, synth);
        let path = self.patch_path(&synth);
        match action {
            UtilityAction::LoadPatch => self.load_patch(&synth, &path).map(|_| ()),
            UtilityAction::SavePatch => self.save_patch(&synth, &path),
            UtilityAction::SendPatch => self.send_patch(&synth),
            UtilityAction::ReceivePatch => self.request_patch(&synth),
            UtilityAction::SendAll => self.send_all(&synth).map(|_| ()),
        }
    }

    fn report<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(e) = &result {
            self.reporter.report(e);
        }
        result
    }
}
