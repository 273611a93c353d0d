//! # Quorum Core
//!
//! Session controller for a persona panel: every persona answers the same
//! prompt, answers that stray from the panel consensus are flagged, and the
//! flagged personas are asked to correct themselves.
//!
//! ## Components
//!
//! | Stage | Crate | Responsibility |
//! |-------|-------|----------------|
//! | Selection | `quorum-registry` | Pick a backend per persona from capability tables |
//! | Activation | `quorum-panel` | Fan out with retries, one deadline, fallbacks |
//! | Analysis | `quorum-council` | Cluster answers, score deviation from consensus |
//! | Correction | this crate | Rewrite flagged answers, keep the learning log |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       QuorumSession                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │   prompt ──► PanelCoordinator ──► ConsensusAnalyzer         │
//! │                                          │                  │
//! │                                   flagged personas          │
//! │                                          ▼                  │
//! │                               CorrectiveRewriter            │
//! │                                    │         │              │
//! │                               LearningLog  SessionMetrics   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quorum_core::{QuorumConfig, QuorumSession};
//!
//! let config = QuorumConfig::load("quorum.toml")?;
//! let session = QuorumSession::new(config, Arc::new(backend))?;
//!
//! let outcome = session.process_prompt("Is this migration safe to run online?").await?;
//! if outcome.has_hallucinations() {
//!     for correction in &outcome.corrections {
//!         println!("{} revised: {}", correction.persona, correction.corrected);
//!     }
//! }
//! ```
//!
//! ## Notes
//!
//! - A prompt either completes or fails as a whole; there are no partial outcomes
//! - Persona and correction failures are data in the outcome, not errors
//! - Metrics and learning can be exported as JSON and imported later

mod config;
mod error;
mod learning;
mod metrics;
mod outcome;
mod rewriter;
mod session;

pub use config::{ActivationSettings, AnalysisConfig, ConfigPatch, CorrectionConfig, QuorumConfig};
pub use error::{CorrectionFailure, QuorumError};
pub use learning::{
    LearningCategory, LearningEntry, LearningLog, LearningStats, DEFAULT_LEARNING_CAPACITY,
    DOMAIN_DENSITY_THRESHOLD,
};
pub use metrics::{Observation, SessionMetrics};
pub use outcome::{
    BatchItem, BatchReport, BatchSummary, LearningHistory, PromptOutcome, SessionSnapshot,
    SessionStatus,
};
pub use rewriter::{CorrectionRecord, CorrectiveRewriter, RewriterSettings, MAX_CORRECTION_CONFIDENCE};
pub use session::QuorumSession;

// Re-export component types for convenience
pub use quorum_council::{
    AnalysisThresholds, ConsensusAnalyzer, DeviationAnalysis, DeviationType, PanelAnalysis,
    Severity,
};
pub use quorum_panel::{
    ActivationReport, BackendError, BackendInvoker, Completion, InvocationRequest, TokenUsage,
};
pub use quorum_registry::{
    BackendId, Persona, PersonaId, PersonaResponse, RegistryConfig, FALLBACK_BACKEND_ID,
};

/// Core result type for session operations.
pub type Result<T> = std::result::Result<T, QuorumError>;
