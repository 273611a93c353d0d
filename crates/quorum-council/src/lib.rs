//! # Quorum Council
//!
//! Consensus clustering and deviation scoring for persona panels.
//!
//! ## Overview
//!
//! Given the responses of a panel, the council decides what the panel agrees
//! on and how far each individual response strays from it. A response that
//! strays too far is flagged as a hallucination and gets a correction prompt.
//!
//! ## Pipeline
//!
//! ```text
//!  responses (input order)
//!          │
//!          ▼
//!  ┌───────────────┐   greedy, order-preserving, compares against
//!  │  CLUSTERING   │   each cluster's first member
//!  └───────┬───────┘
//!          ▼
//!  ┌───────────────┐   largest cluster, earliest wins ties;
//!  │   CONSENSUS   │   representative = first member
//!  └───────┬───────┘
//!          ▼
//!  ┌───────────────┐   similarity + claim alignment + confidence,
//!  │   DEVIATION   │   severity band, deviation type
//!  └───────────────┘
//! ```
//!
//! ## Pluggable comparison
//!
//! Clustering and scoring only see the [`TextComparator`] and
//! [`ClaimExtractor`] traits. [`LexicalComparator`] is the deterministic
//! default; a semantic model can be swapped in without touching the
//! algorithms.

pub mod analyzer;
pub mod comparator;
pub mod consensus;
pub mod deviation;
pub mod error;

pub use analyzer::{AnalysisThresholds, ConsensusAnalyzer, PanelAnalysis};
pub use comparator::{has_negation, ClaimExtractor, LexicalComparator, TextComparator};
pub use consensus::{
    cluster_responses, scored_count, summarize, ConsensusCluster, ConsensusSummary, MIN_RESPONSES,
};
pub use deviation::{DeviationAnalysis, DeviationType, Severity};
pub use error::CouncilError;

/// Result type for council operations.
pub type Result<T> = std::result::Result<T, CouncilError>;
