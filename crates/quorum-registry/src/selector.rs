//! Backend selection for a (persona, prompt) pair.
//!
//! Scoring is integer and deterministic. The highest score wins and ties keep
//! the backend registered first.

use crate::models::{Backend, BackendId, ContextClass, Persona, QualityTier};
use crate::profile::{Complexity, Domain, PromptProfile};
use crate::registry::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const TYPE_MATCH_POINTS: u32 = 3;
const SKILL_MATCH_POINTS: u32 = 2;
const LARGE_CONTEXT_POINTS: u32 = 2;
const MEDIUM_CONTEXT_POINTS: u32 = 1;

/// Base selection confidence.
pub const BASE_CONFIDENCE: f64 = 0.5;
/// Upper bound on selection confidence.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Outcome of backend selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub backend: BackendId,
    pub confidence: f64,
    pub rationale: String,
    pub profile: PromptProfile,
    /// True if scoring could not choose and the fallback table was used.
    pub fallback: bool,
}

/// Per-backend score breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Score {
    type_match: bool,
    context_fit: u32,
    skill_match: bool,
    tier_bonus: u32,
}

impl Score {
    fn total(&self) -> u32 {
        let mut total = self.context_fit + self.tier_bonus;
        if self.type_match {
            total += TYPE_MATCH_POINTS;
        }
        if self.skill_match {
            total += SKILL_MATCH_POINTS;
        }
        total
    }
}

fn context_points(context: ContextClass, complexity: Complexity) -> u32 {
    match (complexity, context) {
        (Complexity::High, ContextClass::Large) => LARGE_CONTEXT_POINTS,
        (Complexity::Medium, ContextClass::Medium | ContextClass::Large) => MEDIUM_CONTEXT_POINTS,
        _ => 0,
    }
}

fn tier_points(tier: QualityTier) -> u32 {
    match tier {
        QualityTier::Premium => 2,
        QualityTier::High => 1,
        QualityTier::Standard => 0,
    }
}

fn score(backend: &Backend, persona: &Persona, profile: &PromptProfile) -> Score {
    Score {
        type_match: backend
            .capabilities
            .contains(&profile.prompt_type.capability()),
        context_fit: context_points(backend.context, profile.complexity),
        skill_match: !backend.capabilities.is_disjoint(&persona.skills),
        tier_bonus: tier_points(backend.tier),
    }
}

/// Picks a backend for each persona from the capability registry.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    registry: Arc<CapabilityRegistry>,
}

impl BackendSelector {
    /// Creates a selector over a registry.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Selects a backend for `persona` answering `prompt`.
    ///
    /// Never fails: if no backend can be scored, the persona's fallback
    /// backend is returned with base confidence.
    pub fn select(&self, persona: &Persona, prompt: &str) -> Selection {
        let profile = PromptProfile::classify(prompt);

        let mut best: Option<(&Backend, Score)> = None;
        for backend in self.registry.backends() {
            let s = score(backend, persona, &profile);
            let better = match &best {
                Some((_, current)) => s.total() > current.total(),
                None => true,
            };
            if better {
                best = Some((backend, s));
            }
        }

        let Some((backend, breakdown)) = best else {
            let backend = self.registry.fallback_backend(persona.focus);
            warn!(
                persona = %persona.id,
                backend = %backend,
                "no backend could be scored, using fallback"
            );
            return Selection {
                rationale: format!(
                    "Fallback backend for {} prompts; no registered backend could be scored",
                    persona.focus
                ),
                backend,
                confidence: BASE_CONFIDENCE,
                profile,
                fallback: true,
            };
        };

        let confidence = selection_confidence(persona, backend, &profile);
        let rationale = rationale(backend, &breakdown, &profile);
        debug!(
            persona = %persona.id,
            backend = %backend.id,
            score = breakdown.total(),
            confidence,
            "backend selected"
        );

        Selection {
            backend: backend.id.clone(),
            confidence,
            rationale,
            profile,
            fallback: false,
        }
    }
}

fn selection_confidence(persona: &Persona, backend: &Backend, profile: &PromptProfile) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if profile.domain != Domain::General {
        confidence += 0.1;
    }
    if profile.keywords.len() > 3 {
        confidence += 0.1;
    }
    if !persona.skills.is_empty() {
        let overlap = persona.skills.intersection(&backend.capabilities).count();
        confidence += 0.1 * overlap as f64 / persona.skills.len() as f64;
    }
    confidence.min(MAX_CONFIDENCE)
}

fn rationale(backend: &Backend, breakdown: &Score, profile: &PromptProfile) -> String {
    let mut reasons = Vec::new();
    if breakdown.type_match {
        reasons.push(format!("matches {} prompt type", profile.prompt_type));
    }
    if breakdown.context_fit > 0 {
        reasons.push(format!(
            "context window suits {} complexity",
            profile.complexity
        ));
    }
    if breakdown.skill_match {
        reasons.push("shares capabilities with persona skills".to_string());
    }
    if breakdown.tier_bonus > 0 {
        reasons.push("high-quality tier".to_string());
    }
    if reasons.is_empty() {
        format!("Selected {} as first registered backend", backend.id)
    } else {
        format!("Selected {}: {}", backend.id, reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capability, PromptType};
    use crate::registry::{BackendSpec, PersonaSpec, RegistryConfig};

    fn spec(id: &str, caps: &[&str], context: ContextClass, tier: QualityTier) -> BackendSpec {
        BackendSpec {
            id: id.to_string(),
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            context,
            tier,
        }
    }

    fn selector(backends: Vec<BackendSpec>) -> BackendSelector {
        let config = RegistryConfig {
            personas: vec![PersonaSpec {
                id: "engineer".to_string(),
                skills: vec!["engineering".to_string(), "coding".to_string()],
                focus: "technical".to_string(),
            }],
            backends,
            fallbacks: [("technical".to_string(), "spare".to_string())]
                .into_iter()
                .collect(),
            default_backend: Some("spare".to_string()),
        };
        BackendSelector::new(Arc::new(CapabilityRegistry::from_config(&config).unwrap()))
    }

    fn engineer() -> Persona {
        Persona::new(
            "engineer",
            [Capability::Engineering, Capability::Coding],
            PromptType::Technical,
        )
    }

    #[test]
    fn test_type_match_dominates() {
        let sel = selector(vec![
            spec("plain", &["general"], ContextClass::Small, QualityTier::Standard),
            spec("techie", &["technical-analysis"], ContextClass::Small, QualityTier::Standard),
        ]);
        let s = sel.select(&engineer(), "debug this code");
        assert_eq!(s.backend.as_str(), "techie");
        assert!(!s.fallback);
        assert!(s.rationale.contains("technical"));
    }

    #[test]
    fn test_ties_go_to_first_registered() {
        let sel = selector(vec![
            spec("first", &["general"], ContextClass::Small, QualityTier::Standard),
            spec("second", &["general"], ContextClass::Small, QualityTier::Standard),
        ]);
        for _ in 0..5 {
            assert_eq!(sel.select(&engineer(), "hello there").backend.as_str(), "first");
        }
    }

    #[test]
    fn test_context_class_rewards_complexity() {
        let sel = selector(vec![
            spec("small", &["general"], ContextClass::Small, QualityTier::Standard),
            spec("large", &["general"], ContextClass::Large, QualityTier::Standard),
        ]);
        let s = sel.select(&engineer(), "a comprehensive review");
        assert_eq!(s.backend.as_str(), "large");
        // Low complexity gives no context points, so the tie keeps the first.
        let s = sel.select(&engineer(), "hello there");
        assert_eq!(s.backend.as_str(), "small");
    }

    #[test]
    fn test_skill_and_tier_points() {
        let sel = selector(vec![
            spec("premium", &["general"], ContextClass::Small, QualityTier::Premium),
            spec("coder", &["coding"], ContextClass::Small, QualityTier::High),
        ]);
        // premium: 2, coder: skill 2 + tier 1 = 3
        assert_eq!(sel.select(&engineer(), "hello there").backend.as_str(), "coder");
    }

    #[test]
    fn test_confidence_bounds() {
        let sel = selector(vec![spec(
            "coder",
            &["coding", "engineering", "technical-analysis"],
            ContextClass::Large,
            QualityTier::Premium,
        )]);
        let low = sel.select(&engineer(), "hi");
        assert!((low.confidence - 0.6).abs() < 1e-9);

        let rich = sel.select(
            &engineer(),
            "design a resilient system architecture for payments ledger",
        );
        assert!(rich.confidence <= MAX_CONFIDENCE);
        assert!((rich.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_no_backends_uses_fallback() {
        let sel = selector(vec![]);
        let s = sel.select(&engineer(), "debug this code");
        assert!(s.fallback);
        assert_eq!(s.backend.as_str(), "spare");
        assert_eq!(s.confidence, BASE_CONFIDENCE);
    }
}
