//! # Quorum Panel
//!
//! Panel activation: one prompt, every persona, partial-failure isolation.
//!
//! ## Threat Model
//!
//! Backends are external and unreliable. The panel defends the rest of the
//! pipeline against:
//! - **Flaky backends** (bounded fixed-delay retry of transient errors)
//! - **Broken backends** (permanent errors stop retrying at once)
//! - **Slow backends** (one global deadline races the whole fan-out)
//!
//! No single persona's failure aborts the panel. Failed slots are replaced by
//! low-confidence fallback responses and listed in the report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quorum_panel::{ActivationConfig, PanelCoordinator};
//!
//! let coordinator = PanelCoordinator::new(registry, backend, ActivationConfig::new());
//! let report = coordinator.activate_all("Is the sky blue?").await?;
//! if !report.consensus_reached {
//!     // fewer than two personas answered
//! }
//! ```

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod retry;

pub use backend::{
    persona_system_prompt, BackendInvoker, Completion, InvocationRequest, SamplingParams,
    TokenUsage,
};
pub use coordinator::{ActivationConfig, ActivationReport, PanelCoordinator, MIN_CONSENSUS_RESPONSES};
pub use error::{ActivationError, BackendError, PanelError, Result, RetryError};
pub use retry::{invoke_with_retry, RetryPolicy};
