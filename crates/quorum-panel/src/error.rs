//! Error types for panel activation.
//!
//! Backend errors are contained per persona. Only an empty panel is an error
//! for the panel as a whole.

use quorum_registry::PersonaId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Failure reported by a backend invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Worth retrying: rate limits, timeouts, dropped connections.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Not worth retrying: bad request, unknown model, refused content.
    #[error("permanent backend error: {0}")]
    Permanent(String),
}

impl BackendError {
    /// Returns true if the call may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// A backend call that failed on every allowed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend call failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Error from the last attempt.
    #[source]
    pub source: BackendError,
}

/// Errors that abort a whole activation.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The registry has no personas to activate.
    #[error("panel has no personas")]
    NoPersonas,
}

/// Per-persona activation failure, reported as data in the activation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationError {
    /// Persona whose slot failed.
    pub persona: PersonaId,
    /// Human-readable cause.
    pub reason: String,
    /// True if the global deadline expired before the persona finished.
    pub timed_out: bool,
}

impl ActivationError {
    pub(crate) fn failed(persona: PersonaId, err: &RetryError) -> Self {
        Self {
            persona,
            reason: err.to_string(),
            timed_out: false,
        }
    }

    pub(crate) fn timed_out(persona: PersonaId, timeout_ms: u64) -> Self {
        Self {
            persona,
            reason: format!("no response within the {timeout_ms}ms panel deadline"),
            timed_out: true,
        }
    }
}
