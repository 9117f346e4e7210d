//! Error taxonomy and the reporting collaborator.
//!
//! Every user-visible failure carries a symbolic name (`INCORRECT_SYNTH`,
//! `NO_PATCH_DETAILS`, ...) so front ends can pick their own wording.
//! Malformed partial MIDI streams and out-of-range values never reach this
//! module; they are recovered where they happen.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub type CoreResult<T = ()> = Result<T, CoreError>;

#[derive(Debug)]
pub enum CoreError {
    /// A patch header does not belong to the target synth, or a received
    /// dump matches no registered synth.
    IncorrectSynth { synth: Option<String> },
    /// The synth descriptor lacks header, request, codec or parameter count.
    NotPatchable { synth: String },
    /// No descriptor is registered under this name.
    UnknownSynth(String),
    InvalidDescriptor { synth: String, reason: String },
    InvalidLayout(String),
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    Transport(String),
}

impl CoreError {
    /// Symbolic name used by the error reporter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IncorrectSynth { .. } => "INCORRECT_SYNTH",
            Self::NotPatchable { .. } => "NO_PATCH_DETAILS",
            Self::UnknownSynth(_) => "NO_SYNTH_DATA",
            Self::InvalidDescriptor { .. } => "BAD_SYNTH_DATA",
            Self::InvalidLayout(_) => "BAD_LAYOUT",
            Self::ReadFile { .. } | Self::WriteFile { .. } => "FILE_ERROR",
            Self::Transport(_) => "MIDI_ERROR",
        }
    }

    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_descriptor(synth: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            synth: synth.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncorrectSynth { synth: Some(synth) } => {
                write!(f, "patch data is not for synth '{}'", synth)
            }
            Self::IncorrectSynth { synth: None } => {
                write!(f, "patch data matches no registered synth")
            }
            Self::NotPatchable { synth } => {
                write!(f, "synth '{}' has no patch details", synth)
            }
            Self::UnknownSynth(synth) => write!(f, "no data for '{}' type synth", synth),
            Self::InvalidDescriptor { synth, reason } => {
                write!(f, "invalid synth data for '{}': {}", synth, reason)
            }
            Self::InvalidLayout(reason) => write!(f, "invalid layout: {}", reason),
            Self::ReadFile { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            Self::WriteFile { path, source } => {
                write!(f, "failed to write '{}': {}", path.display(), source)
            }
            Self::Transport(reason) => write!(f, "midi transport error: {}", reason),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } | Self::WriteFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<crate::transport::TransportError> for CoreError {
    fn from(e: crate::transport::TransportError) -> Self {
        Self::Transport(e.0)
    }
}

/// Receives every user-visible failure. Implementations decide how to show it.
pub trait ErrorReporter {
    fn report(&self, error: &CoreError);
}

/// Reporter that writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &CoreError) {
        log::error!(target: "synthctl", "{}: {}", error.name(), error);
    }
}

/// Reporter that keeps `(name, message)` pairs, shareable between a test and
/// the engine it drives.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    reports: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(&'static str, String)> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.reports().into_iter().map(|(name, _)| name).collect()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &CoreError) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((error.name(), error.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn symbolic_names() {
        assert_eq!(
            CoreError::IncorrectSynth { synth: None }.name(),
            "INCORRECT_SYNTH"
        );
        assert_eq!(
            CoreError::NotPatchable {
                synth: "mopho".into()
            }
            .name(),
            "NO_PATCH_DETAILS"
        );
        assert_eq!(CoreError::UnknownSynth("x".into()).name(), "NO_SYNTH_DATA");
        assert_eq!(CoreError::read_file("/a", mock_io_err()).name(), "FILE_ERROR");
    }

    #[test]
    fn display_includes_context() {
        let err = CoreError::IncorrectSynth {
            synth: Some("mopho".into()),
        };
        assert_eq!(err.to_string(), "patch data is not for synth 'mopho'");
        let err = CoreError::write_file("/out/p.syx", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("/out/p.syx"), "got: {msg}");
    }

    #[test]
    fn io_variants_expose_source() {
        assert!(CoreError::read_file("/x", mock_io_err()).source().is_some());
        assert!(CoreError::Transport("gone".into()).source().is_none());
    }

    #[test]
    fn collecting_reporter_is_shared() {
        let reporter = CollectingReporter::new();
        let handle = reporter.clone();
        reporter.report(&CoreError::UnknownSynth("tb303".into()));
        assert_eq!(handle.names(), vec!["NO_SYNTH_DATA"]);
    }
}
