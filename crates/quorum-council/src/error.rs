//! Error types for consensus analysis.
//!
//! Analysis is pure and synchronous, so the only failures are too few
//! responses and a misconfigured threshold.

use thiserror::Error;

/// Errors that can occur during consensus analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CouncilError {
    /// Too few responses to define a consensus.
    #[error("Insufficient data: {got} response(s), at least {need} required")]
    InsufficientData {
        /// Responses supplied.
        got: usize,
        /// Responses required.
        need: usize,
    },

    /// A threshold is outside `[0, 1]`.
    #[error("Invalid threshold '{name}': {value} is outside [0, 1]")]
    InvalidThreshold {
        /// Threshold name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
}
