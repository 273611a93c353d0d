//! # Core Data Models for the Capability Registry
//!
//! This module defines the identifiers, tag enums and response records shared
//! by every stage of the panel pipeline. Capability tags are a closed set:
//! configuration strings are parsed into [`Capability`] when a persona or
//! backend is registered, so an unknown tag fails at load time rather than
//! silently never matching during selection.
//!
//! ## Types at a glance
//!
//! | Type | Lifetime | Owner |
//! |------|----------|-------|
//! | [`Persona`] | configuration | [`CapabilityRegistry`](crate::CapabilityRegistry) |
//! | [`Backend`] | configuration | [`CapabilityRegistry`](crate::CapabilityRegistry) |
//! | [`PersonaResponse`] | one prompt | the caller of the panel |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier for a persona.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonaId(String);

impl PersonaId {
    /// Creates a persona id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonaId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Stable identifier for a backend model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Creates a backend id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Closed set of skill and capability tags.
///
/// Personas carry these as skills; backends carry them as capabilities.
/// The selector awards points when the two sets intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Leadership,
    Strategy,
    Diplomacy,
    Ethics,
    TechnicalAnalysis,
    Logic,
    Science,
    Engineering,
    Empathy,
    Psychology,
    Security,
    Tactics,
    Medical,
    Legal,
    Creative,
    Analytical,
    Reasoning,
    Coding,
    LongContext,
    General,
}

impl Capability {
    /// All tags, in declaration order.
    pub const ALL: [Capability; 20] = [
        Capability::Leadership,
        Capability::Strategy,
        Capability::Diplomacy,
        Capability::Ethics,
        Capability::TechnicalAnalysis,
        Capability::Logic,
        Capability::Science,
        Capability::Engineering,
        Capability::Empathy,
        Capability::Psychology,
        Capability::Security,
        Capability::Tactics,
        Capability::Medical,
        Capability::Legal,
        Capability::Creative,
        Capability::Analytical,
        Capability::Reasoning,
        Capability::Coding,
        Capability::LongContext,
        Capability::General,
    ];

    /// Returns the kebab-case tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Leadership => "leadership",
            Capability::Strategy => "strategy",
            Capability::Diplomacy => "diplomacy",
            Capability::Ethics => "ethics",
            Capability::TechnicalAnalysis => "technical-analysis",
            Capability::Logic => "logic",
            Capability::Science => "science",
            Capability::Engineering => "engineering",
            Capability::Empathy => "empathy",
            Capability::Psychology => "psychology",
            Capability::Security => "security",
            Capability::Tactics => "tactics",
            Capability::Medical => "medical",
            Capability::Legal => "legal",
            Capability::Creative => "creative",
            Capability::Analytical => "analytical",
            Capability::Reasoning => "reasoning",
            Capability::Coding => "coding",
            Capability::LongContext => "long-context",
            Capability::General => "general",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase().replace('_', "-");
        Capability::ALL
            .iter()
            .copied()
            .find(|cap| cap.as_str() == needle)
            .ok_or_else(|| RegistryError::UnknownCapability(s.to_string()))
    }
}

/// Coarse intent of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Technical,
    Creative,
    Analytical,
    Empathic,
    Strategic,
}

impl PromptType {
    /// Classification order; the first type whose keywords match wins.
    pub const ORDER: [PromptType; 5] = [
        PromptType::Technical,
        PromptType::Creative,
        PromptType::Analytical,
        PromptType::Empathic,
        PromptType::Strategic,
    ];

    /// The backend capability that serves this kind of prompt.
    pub fn capability(&self) -> Capability {
        match self {
            PromptType::Technical => Capability::TechnicalAnalysis,
            PromptType::Creative => Capability::Creative,
            PromptType::Analytical => Capability::Analytical,
            PromptType::Empathic => Capability::Empathy,
            PromptType::Strategic => Capability::Strategy,
        }
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Technical => "technical",
            PromptType::Creative => "creative",
            PromptType::Analytical => "analytical",
            PromptType::Empathic => "empathic",
            PromptType::Strategic => "strategic",
        }
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        PromptType::ORDER
            .iter()
            .copied()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| RegistryError::UnknownPromptType(s.to_string()))
    }
}

/// Context window size class of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextClass {
    /// Up to ~50k tokens.
    Small,
    /// ~50k to ~100k tokens.
    Medium,
    /// More than ~100k tokens.
    Large,
}

/// Output quality tier of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Standard,
    High,
    Premium,
}

/// A registered persona. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Unique persona id.
    pub id: PersonaId,
    /// Skill tags.
    pub skills: BTreeSet<Capability>,
    /// Prompt type this persona leans toward; keys the fallback backend.
    pub focus: PromptType,
}

impl Persona {
    /// Creates a persona.
    pub fn new(
        id: impl Into<PersonaId>,
        skills: impl IntoIterator<Item = Capability>,
        focus: PromptType,
    ) -> Self {
        Self {
            id: id.into(),
            skills: skills.into_iter().collect(),
            focus,
        }
    }
}

/// A registered backend. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Unique backend id.
    pub id: BackendId,
    /// Capability tags.
    pub capabilities: BTreeSet<Capability>,
    /// Context size class.
    pub context: ContextClass,
    /// Quality tier.
    pub tier: QualityTier,
}

impl Backend {
    /// Creates a backend descriptor.
    pub fn new(
        id: impl Into<BackendId>,
        capabilities: impl IntoIterator<Item = Capability>,
        context: ContextClass,
        tier: QualityTier,
    ) -> Self {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().collect(),
            context,
            tier,
        }
    }
}

/// Where a [`PersonaResponse`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseOrigin {
    /// A backend produced the text.
    Backend,
    /// Synthesized after the backend call failed or timed out.
    Fallback,
}

/// Backend id recorded on synthesized fallback responses.
pub const FALLBACK_BACKEND_ID: &str = "fallback";

/// One persona's answer to a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaResponse {
    /// Persona that answered.
    pub persona: PersonaId,
    /// Response text.
    pub text: String,
    /// Backend that produced the text.
    pub backend: BackendId,
    /// Confidence in `[0, 1]`, as supplied by the backend.
    pub confidence: f64,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Backend output or synthesized fallback.
    pub origin: ResponseOrigin,
}

impl PersonaResponse {
    /// Creates a backend-originated response, clamping confidence into `[0, 1]`.
    pub fn new(
        persona: impl Into<PersonaId>,
        text: impl Into<String>,
        backend: impl Into<BackendId>,
        confidence: f64,
    ) -> Self {
        Self {
            persona: persona.into(),
            text: text.into(),
            backend: backend.into(),
            confidence: clamp_unit(confidence),
            timestamp: Utc::now(),
            origin: ResponseOrigin::Backend,
        }
    }

    /// Creates a low-confidence stand-in for a persona whose call failed.
    ///
    /// The backend is always [`FALLBACK_BACKEND_ID`]; no real backend produced
    /// the text.
    pub fn fallback(persona: PersonaId, confidence: f64) -> Self {
        let text = format!(
            "[{persona}] Unable to complete a full analysis right now. \
             Please weigh the other panel members' responses for this prompt."
        );
        Self {
            persona,
            text,
            backend: BackendId::new(FALLBACK_BACKEND_ID),
            confidence: clamp_unit(confidence),
            timestamp: Utc::now(),
            origin: ResponseOrigin::Fallback,
        }
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns true if this is a synthesized fallback.
    pub fn is_fallback(&self) -> bool {
        self.origin == ResponseOrigin::Fallback
    }
}

/// Clamps a value into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Read-only view of the persona roster.
pub trait PersonaDirectory: Send + Sync {
    /// Lists personas in registration order.
    fn list_personas(&self) -> Vec<Persona>;
}

/// Errors that can occur while loading the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A skill or capability tag is not in the closed tag set.
    #[error("Unknown capability tag: {0}")]
    UnknownCapability(String),

    /// A persona focus or fallback key is not a prompt type.
    #[error("Unknown prompt type: {0}")]
    UnknownPromptType(String),

    /// Two personas share an id.
    #[error("Persona already registered: {0}")]
    DuplicatePersona(String),

    /// Two backends share an id.
    #[error("Backend already registered: {0}")]
    DuplicateBackend(String),

    /// No backend is registered and no default backend is configured.
    #[error("No backends registered and no default backend configured")]
    NoBackends,
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_parse_accepts_snake_and_kebab() {
        assert_eq!(
            "technical_analysis".parse::<Capability>().unwrap(),
            Capability::TechnicalAnalysis
        );
        assert_eq!(
            "Long-Context".parse::<Capability>().unwrap(),
            Capability::LongContext
        );
    }

    #[test]
    fn test_capability_parse_rejects_unknown() {
        let err = "telepathy".parse::<Capability>().unwrap_err();
        assert!(err.to_string().contains("telepathy"));
    }

    #[test]
    fn test_capability_serde_is_kebab_case() {
        let json = serde_json::to_string(&Capability::TechnicalAnalysis).unwrap();
        assert_eq!(json, "\"technical-analysis\"");
    }

    #[test]
    fn test_prompt_type_capability_mapping() {
        assert_eq!(PromptType::Empathic.capability(), Capability::Empathy);
        assert_eq!(PromptType::Strategic.capability(), Capability::Strategy);
        assert_eq!("creative".parse::<PromptType>().unwrap(), PromptType::Creative);
    }

    #[test]
    fn test_response_confidence_is_clamped() {
        let high = PersonaResponse::new("a", "text", "m", 1.7);
        let low = PersonaResponse::new("a", "text", "m", -0.2);
        let nan = PersonaResponse::new("a", "text", "m", f64::NAN);
        assert_eq!(high.confidence, 1.0);
        assert_eq!(low.confidence, 0.0);
        assert_eq!(nan.confidence, 0.0);
    }

    #[test]
    fn test_fallback_response() {
        let r = PersonaResponse::fallback("analyst".into(), 0.3);
        assert!(r.is_fallback());
        assert_eq!(r.backend.as_str(), FALLBACK_BACKEND_ID);
        assert!(r.text.contains("analyst"));
        assert_eq!(r.confidence, 0.3);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = PersonaId::new("strategist");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"strategist\"");
        assert_eq!(id.to_string(), "strategist");
    }
}
