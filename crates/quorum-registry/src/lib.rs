//! # Quorum Capability Registry
//!
//! Static persona and backend tables plus the heuristics that pick a backend
//! for each persona on each prompt.
//!
//! ## Purpose
//!
//! This crate provides three capabilities:
//!
//! 1. **Closed tag set** - Persona skills and backend capabilities are
//!    [`Capability`] variants, parsed and validated when the registry loads.
//!
//! 2. **Prompt profiling** - [`PromptProfile::classify`] derives a domain,
//!    complexity, prompt type and keyword list from the raw prompt text.
//!
//! 3. **Backend selection** - [`BackendSelector::select`] scores every
//!    registered backend and returns the winner with a confidence and a
//!    human-readable rationale. It never fails: an unscorable registry falls
//!    back to a backend keyed by the persona's focus.
//!
//! ## Scoring
//!
//! | Criterion | Points |
//! |-----------|--------|
//! | Capability matches prompt type | 3 |
//! | Context class fits complexity | 1-2 |
//! | Capability overlaps persona skills | 2 |
//! | Quality tier (high / premium) | 1 / 2 |
//!
//! Ties keep the backend registered first.
//!
//! ## Example
//!
//! ```rust
//! use quorum_registry::{BackendSelector, CapabilityRegistry, RegistryConfig};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CapabilityRegistry::from_config(&RegistryConfig::default()).unwrap());
//! let selector = BackendSelector::new(registry.clone());
//! let engineer = &registry.personas()[1];
//!
//! let selection = selector.select(engineer, "Debug this async code");
//! assert!(selection.confidence >= 0.5 && selection.confidence <= 0.95);
//! ```

pub mod models;
pub mod profile;
pub mod registry;
pub mod selector;

pub use models::{
    clamp_unit, Backend, BackendId, Capability, ContextClass, Persona, PersonaDirectory,
    PersonaId, FALLBACK_BACKEND_ID, PersonaResponse, PromptType, QualityTier, RegistryError, ResponseOrigin, Result,
};
pub use profile::{domain_keyword_density, Complexity, Domain, PromptProfile};
pub use registry::{BackendSpec, CapabilityRegistry, PersonaSpec, RegistryConfig, DEFAULT_BACKEND_ID};
pub use selector::{BackendSelector, Selection};
