//! # Capability Registry
//!
//! Loads the persona and backend tables from configuration, validates every
//! tag against the closed [`Capability`] set, and serves them read-only for
//! the rest of the process.
//!
//! ## Usage Flow
//!
//! 1. **Configuration**: deserialize a [`RegistryConfig`] (or use the default panel)
//! 2. **Registration**: [`CapabilityRegistry::from_config`] parses and validates tags
//! 3. **Lookup**: personas and backends are read in registration order

use crate::models::{
    Backend, BackendId, Capability, ContextClass, Persona, PersonaDirectory, PersonaId,
    PromptType, QualityTier, RegistryError, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Backend id used when nothing else can be resolved.
pub const DEFAULT_BACKEND_ID: &str = "default";

/// Unvalidated persona entry as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSpec {
    /// Persona id.
    pub id: String,
    /// Skill tag names.
    pub skills: Vec<String>,
    /// Prompt type name.
    pub focus: String,
}

/// Unvalidated backend entry as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    /// Backend id.
    pub id: String,
    /// Capability tag names.
    pub capabilities: Vec<String>,
    /// Context size class.
    pub context: ContextClass,
    /// Quality tier.
    pub tier: QualityTier,
}

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Personas in panel order.
    pub personas: Vec<PersonaSpec>,
    /// Backends in tie-break order.
    pub backends: Vec<BackendSpec>,
    /// Prompt type name to backend id, used when scoring cannot pick.
    pub fallbacks: BTreeMap<String, String>,
    /// Last-resort backend id.
    pub default_backend: Option<String>,
}

fn persona(id: &str, skills: &[&str], focus: &str) -> PersonaSpec {
    PersonaSpec {
        id: id.to_string(),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        focus: focus.to_string(),
    }
}

fn backend(id: &str, caps: &[&str], context: ContextClass, tier: QualityTier) -> BackendSpec {
    BackendSpec {
        id: id.to_string(),
        capabilities: caps.iter().map(|s| s.to_string()).collect(),
        context,
        tier,
    }
}

impl Default for RegistryConfig {
    /// A five-member panel over four backends.
    fn default() -> Self {
        let personas = vec![
            persona("strategist", &["leadership", "strategy", "diplomacy"], "strategic"),
            persona("engineer", &["engineering", "technical-analysis", "coding"], "technical"),
            persona("scientist", &["science", "logic", "analytical"], "analytical"),
            persona("counselor", &["empathy", "psychology", "ethics"], "empathic"),
            persona("guardian", &["security", "tactics", "logic"], "strategic"),
        ];
        let backends = vec![
            backend(
                "claude-opus",
                &["reasoning", "analytical", "strategy", "ethics", "creative", "long-context"],
                ContextClass::Large,
                QualityTier::Premium,
            ),
            backend(
                "claude-sonnet",
                &["technical-analysis", "coding", "analytical", "empathy", "long-context"],
                ContextClass::Large,
                QualityTier::High,
            ),
            backend(
                "gpt-4",
                &["technical-analysis", "logic", "creative", "science"],
                ContextClass::Medium,
                QualityTier::Premium,
            ),
            backend(
                "gemini-pro",
                &["analytical", "science", "long-context", "general"],
                ContextClass::Large,
                QualityTier::Standard,
            ),
        ];
        let fallbacks = [
            ("technical", "claude-sonnet"),
            ("creative", "claude-opus"),
            ("analytical", "gemini-pro"),
            ("empathic", "claude-sonnet"),
            ("strategic", "claude-opus"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            personas,
            backends,
            fallbacks,
            default_backend: Some("claude-sonnet".to_string()),
        }
    }
}

/// Validated, read-only persona and backend tables.
///
/// # Example
///
/// ```rust
/// use quorum_registry::{CapabilityRegistry, RegistryConfig};
///
/// let registry = CapabilityRegistry::from_config(&RegistryConfig::default()).unwrap();
/// assert_eq!(registry.personas().len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    personas: Vec<Persona>,
    backends: Vec<Backend>,
    fallbacks: BTreeMap<PromptType, BackendId>,
    default_backend: Option<BackendId>,
}

impl CapabilityRegistry {
    /// Parses and validates a registry configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - a tag is not a known [`Capability`] or prompt type
    /// - a persona or backend id is registered twice
    /// - no backend is registered and no default backend is configured
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut personas = Vec::with_capacity(config.personas.len());
        let mut seen = HashSet::new();
        for spec in &config.personas {
            if !seen.insert(spec.id.as_str()) {
                return Err(RegistryError::DuplicatePersona(spec.id.clone()));
            }
            let skills = parse_tags(&spec.skills)?;
            let focus: PromptType = spec.focus.parse()?;
            personas.push(Persona::new(spec.id.as_str(), skills, focus));
        }

        let mut backends = Vec::with_capacity(config.backends.len());
        let mut seen = HashSet::new();
        for spec in &config.backends {
            if !seen.insert(spec.id.as_str()) {
                return Err(RegistryError::DuplicateBackend(spec.id.clone()));
            }
            let caps = parse_tags(&spec.capabilities)?;
            backends.push(Backend::new(spec.id.as_str(), caps, spec.context, spec.tier));
        }

        let mut fallbacks = BTreeMap::new();
        for (key, id) in &config.fallbacks {
            let prompt_type: PromptType = key.parse()?;
            fallbacks.insert(prompt_type, BackendId::new(id.as_str()));
        }

        let default_backend = config.default_backend.as_deref().map(BackendId::from);
        if backends.is_empty() && default_backend.is_none() {
            return Err(RegistryError::NoBackends);
        }

        debug!(
            personas = personas.len(),
            backends = backends.len(),
            "capability registry loaded"
        );

        Ok(Self {
            personas,
            backends,
            fallbacks,
            default_backend,
        })
    }

    /// Personas in registration order.
    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    /// Backends in registration order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Looks up a persona by id.
    pub fn persona(&self, id: &PersonaId) -> Option<&Persona> {
        self.personas.iter().find(|p| &p.id == id)
    }

    /// Looks up a backend by id.
    pub fn backend(&self, id: &BackendId) -> Option<&Backend> {
        self.backends.iter().find(|b| &b.id == id)
    }

    /// Resolves the backend to use when scoring cannot choose.
    ///
    /// Order: fallback keyed by `focus`, then the default backend, then the
    /// first registered backend, then [`DEFAULT_BACKEND_ID`].
    pub fn fallback_backend(&self, focus: PromptType) -> BackendId {
        self.fallbacks
            .get(&focus)
            .or(self.default_backend.as_ref())
            .or_else(|| self.backends.first().map(|b| &b.id))
            .cloned()
            .unwrap_or_else(|| BackendId::new(DEFAULT_BACKEND_ID))
    }
}

impl PersonaDirectory for CapabilityRegistry {
    fn list_personas(&self) -> Vec<Persona> {
        self.personas.clone()
    }
}

fn parse_tags(tags: &[String]) -> Result<Vec<Capability>> {
    tags.iter().map(|t| t.parse::<Capability>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let registry = CapabilityRegistry::from_config(&RegistryConfig::default()).unwrap();
        assert_eq!(registry.personas().len(), 5);
        assert_eq!(registry.backends().len(), 4);
        assert_eq!(registry.personas()[0].id.as_str(), "strategist");
    }

    #[test]
    fn test_unknown_skill_rejected_at_registration() {
        let mut config = RegistryConfig::default();
        config.personas[0].skills.push("mind-reading".to_string());
        let err = CapabilityRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownCapability(ref t) if t == "mind-reading"));
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let mut config = RegistryConfig::default();
        let dup = config.backends[0].clone();
        config.backends.push(dup);
        assert!(matches!(
            CapabilityRegistry::from_config(&config),
            Err(RegistryError::DuplicateBackend(_))
        ));
    }

    #[test]
    fn test_no_backends_needs_default() {
        let mut config = RegistryConfig::default();
        config.backends.clear();
        config.default_backend = None;
        assert!(matches!(
            CapabilityRegistry::from_config(&config),
            Err(RegistryError::NoBackends)
        ));

        config.default_backend = Some("router".to_string());
        assert!(CapabilityRegistry::from_config(&config).is_ok());
    }

    #[test]
    fn test_fallback_resolution_order() {
        let mut config = RegistryConfig::default();
        let registry = CapabilityRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.fallback_backend(PromptType::Analytical).as_str(),
            "gemini-pro"
        );

        config.fallbacks.clear();
        let registry = CapabilityRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.fallback_backend(PromptType::Analytical).as_str(),
            "claude-sonnet"
        );

        config.default_backend = None;
        let registry = CapabilityRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.fallback_backend(PromptType::Analytical).as_str(),
            "claude-opus"
        );
    }

    #[test]
    fn test_bad_fallback_key_rejected() {
        let mut config = RegistryConfig::default();
        config
            .fallbacks
            .insert("whimsical".to_string(), "gpt-4".to_string());
        assert!(matches!(
            CapabilityRegistry::from_config(&config),
            Err(RegistryError::UnknownPromptType(_))
        ));
    }

    #[test]
    fn test_directory_lists_in_order() {
        let registry = CapabilityRegistry::from_config(&RegistryConfig::default()).unwrap();
        let ids: Vec<_> = registry
            .list_personas()
            .into_iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(
            ids,
            vec!["strategist", "engineer", "scientist", "counselor", "guardian"]
        );
    }
}
