//! Error types for Quorum Core.

use quorum_council::CouncilError;
use quorum_registry::PersonaId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::learning::LearningEntry;

/// Core error type for session operations.
#[derive(Debug, Error)]
pub enum QuorumError {
    /// Configuration rejected by validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The session is disabled and refuses new prompts.
    #[error("Quorum session is disabled")]
    Disabled,

    /// Too few responses to analyze.
    #[error("Insufficient data: {got} response(s), at least {need} required")]
    InsufficientData { got: usize, need: usize },

    /// Registry error passthrough.
    #[error("Registry error: {0}")]
    Registry(#[from] quorum_registry::RegistryError),

    /// Panel error passthrough.
    #[error("Panel error: {0}")]
    Panel(#[from] quorum_panel::PanelError),

    /// Reading a config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file is not valid TOML for [`QuorumConfig`](crate::QuorumConfig).
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Snapshot (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CouncilError> for QuorumError {
    fn from(err: CouncilError) -> Self {
        match err {
            CouncilError::InsufficientData { got, need } => QuorumError::InsufficientData { got, need },
            other @ CouncilError::InvalidThreshold { .. } => QuorumError::Configuration(other.to_string()),
        }
    }
}

/// A correction attempt that did not produce a rewritten response.
///
/// Reported as data in the prompt outcome; never aborts sibling corrections.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("correction for {persona} failed: {reason}")]
pub struct CorrectionFailure {
    pub persona: PersonaId,
    pub reason: String,
    /// Entry recorded before the attempt failed, if learning is enabled.
    #[serde(default)]
    pub learning: Option<LearningEntry>,
}

impl CorrectionFailure {
    pub(crate) fn new(
        persona: PersonaId,
        reason: impl Into<String>,
        learning: Option<LearningEntry>,
    ) -> Self {
        Self {
            persona,
            reason: reason.into(),
            learning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_council_errors_convert() {
        let err: QuorumError = CouncilError::InsufficientData { got: 1, need: 2 }.into();
        assert!(matches!(err, QuorumError::InsufficientData { got: 1, need: 2 }));

        let err: QuorumError = CouncilError::InvalidThreshold {
            name: "similarity",
            value: 2.0,
        }
        .into();
        match err {
            QuorumError::Configuration(msg) => assert!(msg.contains("similarity")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(QuorumError::Disabled.to_string(), "Quorum session is disabled");
        let failure = CorrectionFailure::new("guardian".into(), "backend refused", None);
        assert_eq!(
            failure.to_string(),
            "correction for guardian failed: backend refused"
        );
    }
}
