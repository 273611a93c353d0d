//! Corrective rewriting of flagged responses.
//!
//! A flagged persona is asked to revise its answer in its own voice, with the
//! panel consensus and its peers' answers in view. The rewrite goes through
//! the same backend selection and retry path as the original activation, so
//! it may be served by a different backend than the answer it replaces.

use parking_lot::{Mutex, MutexGuard, RwLock};
use quorum_council::deviation::correction_prompt;
use quorum_council::{ClaimExtractor, DeviationAnalysis, DeviationType, Severity, TextComparator};
use quorum_panel::{
    invoke_with_retry, persona_system_prompt, BackendInvoker, InvocationRequest, RetryPolicy,
};
use quorum_registry::{BackendId, BackendSelector, CapabilityRegistry, PersonaId, PersonaResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::QuorumConfig;
use crate::error::CorrectionFailure;
use crate::learning::{LearningCategory, LearningEntry, LearningLog};

/// Ceiling on a corrected response's confidence.
pub const MAX_CORRECTION_CONFIDENCE: f64 = 0.95;

/// Bonus when the rewrite no longer contradicts the consensus.
const CONSISTENCY_BONUS: f64 = 0.1;

/// Share of key consensus terms that may be missing before it is called out.
const MISSING_POINTS_RATIO: f64 = 0.3;

/// Consensus terms listed when key points are missing.
const MISSING_POINTS_LISTED: usize = 5;

const GUIDELINES: &str = "CORRECTION GUIDELINES:\n\
    1. Factual accuracy: correct or drop claims the rest of the panel disputes.\n\
    2. Logical consistency: make sure no two statements contradict each other.\n\
    3. Contextual alignment: answer the prompt the panel answered, at a comparable depth.\n\
    4. Expertise integration: keep the insight your specialty brings.\n\
    5. Character consistency: stay in your own voice; do not copy another member.";

/// Settings the rewriter reads on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriterSettings {
    /// Record a learning entry per attempt.
    pub enable_learning: bool,
    /// Learning entries kept per persona.
    pub learning_capacity: usize,
    /// Retry policy for the correction call.
    pub retry: RetryPolicy,
}

impl RewriterSettings {
    pub fn from_config(config: &QuorumConfig) -> Self {
        Self {
            enable_learning: config.correction.enable_learning,
            learning_capacity: config.correction.learning_capacity,
            retry: RetryPolicy::new(
                config.activation.max_retries,
                Duration::from_millis(config.activation.retry_delay_ms),
            ),
        }
    }
}

impl Default for RewriterSettings {
    fn default() -> Self {
        Self::from_config(&QuorumConfig::default())
    }
}

/// A successfully rewritten response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub persona: PersonaId,
    pub original: String,
    pub corrected: String,
    /// Backend that served the rewrite.
    pub backend: BackendId,
    /// `min(0.95, similarity to consensus + consistency bonus)`.
    pub confidence: f64,
    /// Entry recorded for this attempt, if learning is enabled.
    pub learning: Option<LearningEntry>,
}

impl CorrectionRecord {
    pub fn learning_stored(&self) -> bool {
        self.learning.is_some()
    }
}

/// Rewrites flagged responses and keeps the learning log.
pub struct CorrectiveRewriter {
    selector: BackendSelector,
    backend: Arc<dyn BackendInvoker>,
    comparator: Arc<dyn TextComparator>,
    claims: Arc<dyn ClaimExtractor>,
    settings: RwLock<RewriterSettings>,
    learning: Mutex<LearningLog>,
}

impl CorrectiveRewriter {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        backend: Arc<dyn BackendInvoker>,
        comparator: Arc<dyn TextComparator>,
        claims: Arc<dyn ClaimExtractor>,
        settings: RewriterSettings,
    ) -> Self {
        Self {
            selector: BackendSelector::new(registry),
            backend,
            comparator,
            claims,
            learning: Mutex::new(LearningLog::new(settings.learning_capacity)),
            settings: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> RewriterSettings {
        *self.settings.read()
    }

    /// Replaces the settings, shrinking the learning log if the cap dropped.
    pub fn configure(&self, settings: RewriterSettings) {
        *self.settings.write() = settings;
        self.learning.lock().set_capacity(settings.learning_capacity);
    }

    /// Locks the learning log. Do not hold the guard across an `.await`.
    pub fn learning(&self) -> MutexGuard<'_, LearningLog> {
        self.learning.lock()
    }

    /// Asks `persona` to revise `original` towards `consensus`.
    ///
    /// When learning is enabled, exactly one learning entry is appended
    /// before the backend is called, so failed attempts are recorded too.
    ///
    /// # Errors
    ///
    /// Returns a [`CorrectionFailure`] if the persona is not registered, the
    /// backend call fails after retries, or the backend returns no text.
    pub async fn correct(
        &self,
        persona: &PersonaId,
        original: &str,
        consensus: &str,
        all: &[PersonaResponse],
        analysis: &DeviationAnalysis,
    ) -> Result<CorrectionRecord, CorrectionFailure> {
        let settings = self.settings();

        let learning = settings.enable_learning.then(|| {
            let category = LearningCategory::categorize(self.claims.as_ref(), original, consensus);
            let entry = LearningEntry::new(
                persona.clone(),
                analysis.deviation_score,
                category,
                analysis.severity,
            );
            self.learning.lock().append(entry.clone());
            entry
        });
        let fail = |reason: String| CorrectionFailure::new(persona.clone(), reason, learning.clone());

        let Some(profile) = self.selector.registry().persona(persona).cloned() else {
            return Err(fail("persona is not registered".to_string()));
        };

        let user_prompt = self.build_prompt(persona, original, consensus, all, analysis);
        let selection = self.selector.select(&profile, &user_prompt);
        debug!(
            persona = %persona,
            backend = %selection.backend,
            severity = %analysis.severity,
            "requesting correction"
        );

        let mut request = InvocationRequest::for_persona(&profile, &selection, user_prompt);
        request.system_prompt = format!(
            "{}\nYou are revising an earlier answer after the rest of the panel reviewed it.",
            persona_system_prompt(&profile)
        );

        let completion = invoke_with_retry(self.backend.as_ref(), &request, &settings.retry)
            .await
            .map_err(|err| fail(err.to_string()))?;

        let corrected = completion.text.trim();
        if corrected.is_empty() {
            return Err(fail("backend returned an empty correction".to_string()));
        }

        let confidence = self.confidence(corrected, consensus);
        info!(
            persona = %persona,
            backend = %completion.backend_used,
            confidence,
            "correction applied"
        );

        Ok(CorrectionRecord {
            persona: persona.clone(),
            original: original.to_string(),
            corrected: corrected.to_string(),
            backend: completion.backend_used,
            confidence,
            learning,
        })
    }

    fn confidence(&self, corrected: &str, consensus: &str) -> f64 {
        let similarity = self.comparator.similarity(corrected, consensus);
        let bonus = if self.claims.contradicts_any(corrected, consensus) {
            0.0
        } else {
            CONSISTENCY_BONUS
        };
        (similarity + bonus).min(MAX_CORRECTION_CONFIDENCE)
    }

    fn build_prompt(
        &self,
        persona: &PersonaId,
        original: &str,
        consensus: &str,
        all: &[PersonaResponse],
        analysis: &DeviationAnalysis,
    ) -> String {
        let contrast = match &analysis.correction_prompt {
            Some(prompt) => prompt.clone(),
            None if all.get(analysis.index).is_some_and(|r| &r.persona == persona) => {
                correction_prompt(
                    all,
                    analysis.index,
                    consensus,
                    analysis.deviation_type,
                    analysis.severity,
                )
            }
            None => format!("YOUR ANSWER:\n{original}\n\nPANEL CONSENSUS:\n{consensus}"),
        };

        let focus = self
            .focus_areas(original, consensus, analysis)
            .iter()
            .map(|area| format!("- {area}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "As {persona}, revise your previous answer. The panel scored its deviation \
             from consensus at {score:.2}.\n\n\
             {contrast}\n\n\
             FOCUS AREAS:\n{focus}\n\n\
             {GUIDELINES}\n\n\
             Reply with the revised answer only.",
            score = analysis.deviation_score,
        )
    }

    /// Concrete revision goals for this deviation.
    pub fn focus_areas(
        &self,
        original: &str,
        consensus: &str,
        analysis: &DeviationAnalysis,
    ) -> Vec<String> {
        let mut areas: Vec<String> = severity_focus(analysis.severity)
            .iter()
            .map(|s| s.to_string())
            .collect();

        areas.push(
            if analysis.deviation_score > 0.7 {
                "High deviation from the panel consensus requires major revision"
            } else if analysis.deviation_score > 0.5 {
                "Moderate deviation requires significant adjustments"
            } else {
                "Minor deviation requires subtle refinements"
            }
            .to_string(),
        );

        if analysis.deviation_type == DeviationType::FactualContradiction
            || self.claims.contradicts_any(original, consensus)
        {
            areas.push("Factual contradictions need resolution".to_string());
        }
        if analysis.deviation_type == DeviationType::LogicalInconsistency
            || self.claims.self_contradicts(original)
        {
            areas.push("Logical inconsistencies need correction".to_string());
        }

        let missing = missing_key_points(original, consensus);
        if !missing.is_empty() {
            areas.push(format!(
                "Missing key points from the consensus: {}",
                missing.join(", ")
            ));
        }
        areas
    }
}

impl std::fmt::Debug for CorrectiveRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrectiveRewriter")
            .field("settings", &self.settings())
            .finish_non_exhaustive()
    }
}

fn severity_focus(severity: Severity) -> [&'static str; 2] {
    match severity {
        Severity::Critical => [
            "Major factual corrections required",
            "Fundamental logical restructuring needed",
        ],
        Severity::High => [
            "Significant factual alignment required",
            "Logical consistency improvements needed",
        ],
        Severity::Medium => [
            "Moderate factual adjustments required",
            "Enhanced logical flow needed",
        ],
        Severity::Low => [
            "Minor factual refinements suggested",
            "Subtle logical improvements recommended",
        ],
    }
}

/// Long consensus terms absent from `original`, when more than 30% are missing.
fn missing_key_points(original: &str, consensus: &str) -> Vec<String> {
    let long_terms = |text: &str| -> BTreeSet<String> {
        quorum_council::comparator::token_set(text)
            .into_iter()
            .filter(|t| t.chars().count() > 4)
            .collect()
    };
    let key = long_terms(consensus);
    let present = long_terms(original);
    let missing: Vec<String> = key.difference(&present).cloned().collect();

    if key.is_empty() || (missing.len() as f64) <= key.len() as f64 * MISSING_POINTS_RATIO {
        return Vec::new();
    }
    missing.into_iter().take(MISSING_POINTS_LISTED).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_points() {
        let consensus = "Rotate credentials quarterly and enforce hardware tokens";
        assert!(missing_key_points(consensus, consensus).is_empty());

        let missing = missing_key_points("Use strong passwords", consensus);
        assert_eq!(
            missing,
            vec!["credentials", "enforce", "hardware", "quarterly", "rotate"]
        );
    }

    #[test]
    fn test_missing_key_points_below_ratio() {
        // 1 of 4 long terms missing is within the 30% allowance
        let consensus = "alpha1 bravo2 charlie delta4";
        let original = "alpha1 bravo2 charlie";
        assert!(missing_key_points(original, consensus).is_empty());
    }

    #[test]
    fn test_severity_focus_lines() {
        assert_eq!(severity_focus(Severity::Critical)[0], "Major factual corrections required");
        assert_eq!(severity_focus(Severity::Low)[1], "Subtle logical improvements recommended");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = QuorumConfig::default();
        config.activation.max_retries = 2;
        config.activation.retry_delay_ms = 50;
        config.correction.enable_learning = false;
        let settings = RewriterSettings::from_config(&config);
        assert!(!settings.enable_learning);
        assert_eq!(settings.retry, RetryPolicy::new(2, Duration::from_millis(50)));
        assert_eq!(settings.learning_capacity, 100);
    }
}
