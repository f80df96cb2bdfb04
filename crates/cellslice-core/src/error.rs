//! Error types for the public boundaries of the crate.
//!
//! Internal shape mismatches between the extractor and the parser
//! collaborator (spec.md S7: "a contract violation with the parser
//! collaborator") are not modeled as errors here -- they fall back to an
//! empty result and a `log::warn!`, matching the source's recovery policy.

use std::fmt;

/// Failures that can occur while loading or merging a library spec bundle.
#[derive(Debug)]
pub enum SpecError {
    Malformed(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(error) => write!(f, "malformed spec JSON: {error}"),
            Self::Io(error) => write!(f, "spec module import failed: {error}"),
        }
    }
}

impl std::error::Error for SpecError {}

impl From<serde_json::Error> for SpecError {
    fn from(error: serde_json::Error) -> Self {
        Self::Malformed(error)
    }
}

impl From<std::io::Error> for SpecError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

/// A non-fatal problem surfaced while resolving imports against a symbol
/// table. Unlike `SpecError`, these never abort the caller: they are
/// collected and also emitted via `log::warn!`, per spec.md S7's "Unknown
/// module in a spec import -- recovered: logged as a warning".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Failures raised directly by the public slicing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceError {
    /// `Keyed::pop` was called on an empty set (spec.md S7).
    EmptySet,
    /// The subject-language text failed to parse.
    Parse(String),
    /// `buildTo`/`buildFrom` was asked for an execution event id that was
    /// never logged.
    UnknownEvent(String),
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySet => write!(f, "cannot take from an empty set"),
            Self::Parse(message) => write!(f, "parse error: {message}"),
            Self::UnknownEvent(event_id) => write!(f, "unknown execution event id: {event_id}"),
        }
    }
}

impl std::error::Error for SliceError {}
