//! The consensus analyzer facade.
//!
//! Ties clustering, consensus selection and deviation scoring together
//! behind a single [`ConsensusAnalyzer::analyze`] call.

use quorum_registry::{PersonaId, PersonaResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::comparator::{ClaimExtractor, LexicalComparator, TextComparator};
use crate::consensus::{cluster_responses, summarize, ConsensusCluster, ConsensusSummary};
use crate::deviation::{
    confidence_weight, correction_prompt, deviation_score, DeviationAnalysis, DeviationType,
    Severity,
};
use crate::error::CouncilError;
use crate::Result;

/// Thresholds used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisThresholds {
    /// Deviation above this flags a hallucination.
    pub hallucination: f64,
    /// Similarity at or above this joins a cluster.
    pub similarity: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            hallucination: 0.3,
            similarity: 0.7,
        }
    }
}

impl AnalysisThresholds {
    /// Checks both thresholds lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("hallucination", self.hallucination),
            ("similarity", self.similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CouncilError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

/// Result of analyzing one panel's responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelAnalysis {
    pub clusters: Vec<ConsensusCluster>,
    pub consensus: ConsensusSummary,
    /// One entry per backend-origin response, in input order. Fallback
    /// responses are not scored.
    pub analyses: Vec<DeviationAnalysis>,
    /// `1 - hallucinating / scored`.
    pub overall_health: f64,
}

impl PanelAnalysis {
    /// Analyses flagged as hallucinations.
    pub fn flagged(&self) -> impl Iterator<Item = &DeviationAnalysis> {
        self.analyses.iter().filter(|a| a.is_hallucination)
    }

    /// Number of flagged responses.
    pub fn hallucination_count(&self) -> usize {
        self.flagged().count()
    }

    /// Analysis for a persona, if a backend answered for it.
    pub fn analysis_for(&self, persona: &PersonaId) -> Option<&DeviationAnalysis> {
        self.analyses.iter().find(|a| &a.persona == persona)
    }
}

/// Clusters panel responses and scores each one against the consensus.
///
/// # Example
///
/// ```rust
/// use quorum_council::ConsensusAnalyzer;
/// use quorum_registry::PersonaResponse;
///
/// let responses = vec![
///     PersonaResponse::new("a", "The sky is blue.", "m", 0.8),
///     PersonaResponse::new("b", "The sky is blue.", "m", 0.8),
///     PersonaResponse::new("c", "The sky is not blue and is actually green.", "m", 0.8),
/// ];
/// let analysis = ConsensusAnalyzer::new().analyze(&responses).unwrap();
/// assert_eq!(analysis.consensus.outlier_count, 1);
/// assert!(analysis.analyses[2].is_hallucination);
/// ```
#[derive(Clone)]
pub struct ConsensusAnalyzer {
    comparator: Arc<dyn TextComparator>,
    claims: Arc<dyn ClaimExtractor>,
    thresholds: AnalysisThresholds,
}

impl Default for ConsensusAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusAnalyzer {
    /// Creates an analyzer with the lexical strategy and default thresholds.
    pub fn new() -> Self {
        let lexical = Arc::new(LexicalComparator::new());
        Self {
            comparator: lexical.clone(),
            claims: lexical,
            thresholds: AnalysisThresholds::default(),
        }
    }

    /// Creates an analyzer with custom strategies and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::InvalidThreshold`] if a threshold is outside `[0, 1]`.
    pub fn with_strategies(
        comparator: Arc<dyn TextComparator>,
        claims: Arc<dyn ClaimExtractor>,
        thresholds: AnalysisThresholds,
    ) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            comparator,
            claims,
            thresholds,
        })
    }

    /// Replaces the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::InvalidThreshold`] and leaves the analyzer
    /// unchanged if a threshold is outside `[0, 1]`.
    pub fn set_thresholds(&mut self, thresholds: AnalysisThresholds) -> Result<()> {
        thresholds.validate()?;
        self.thresholds = thresholds;
        Ok(())
    }

    pub fn thresholds(&self) -> AnalysisThresholds {
        self.thresholds
    }

    /// Shared handle to the similarity strategy.
    pub fn comparator(&self) -> Arc<dyn TextComparator> {
        Arc::clone(&self.comparator)
    }

    /// Shared handle to the claim strategy.
    pub fn claim_extractor(&self) -> Arc<dyn ClaimExtractor> {
        Arc::clone(&self.claims)
    }

    /// Analyzes a panel's responses.
    ///
    /// Deterministic: the same responses in the same order always produce
    /// the same clusters, representative and scores.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::InsufficientData`] for fewer than two
    /// responses, or when none came from a backend.
    pub fn analyze(&self, responses: &[PersonaResponse]) -> Result<PanelAnalysis> {
        let clusters = cluster_responses(
            responses,
            self.comparator.as_ref(),
            self.thresholds.similarity,
        );
        let consensus = summarize(responses, &clusters)?;
        debug!(
            clusters = clusters.len(),
            representative = %consensus.dominant_persona,
            agreement = consensus.agreement_score,
            "consensus selected"
        );

        let analyses: Vec<DeviationAnalysis> = responses
            .iter()
            .enumerate()
            .filter(|(_, response)| !response.is_fallback())
            .map(|(idx, response)| self.score(responses, idx, response, &consensus))
            .collect();

        let flagged = analyses.iter().filter(|a| a.is_hallucination).count();
        let overall_health = 1.0 - flagged as f64 / analyses.len().max(1) as f64;
        info!(
            responses = responses.len(),
            scored = analyses.len(),
            flagged,
            overall_health,
            "panel analyzed"
        );

        Ok(PanelAnalysis {
            clusters,
            consensus,
            analyses,
            overall_health,
        })
    }

    fn score(
        &self,
        responses: &[PersonaResponse],
        idx: usize,
        response: &PersonaResponse,
        consensus: &ConsensusSummary,
    ) -> DeviationAnalysis {
        let semantic = self.comparator.similarity(&response.text, &consensus.text);
        let factual = self.claims.factual_alignment(&response.text, &consensus.text);
        let weight = confidence_weight(response.confidence, consensus.confidence);
        let score = deviation_score(semantic, factual, weight);

        let is_hallucination = score > self.thresholds.hallucination;
        let severity = Severity::from_score(score);
        let deviation_type =
            DeviationType::classify(self.claims.as_ref(), &response.text, &consensus.text);
        let correction_prompt = is_hallucination.then(|| {
            correction_prompt(responses, idx, &consensus.text, deviation_type, severity)
        });

        DeviationAnalysis {
            persona: response.persona.clone(),
            index: idx,
            deviation_score: score,
            semantic_similarity: semantic,
            factual_alignment: factual,
            confidence_weight: weight,
            is_hallucination,
            severity,
            deviation_type,
            correction_prompt,
        }
    }
}

impl std::fmt::Debug for ConsensusAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusAnalyzer")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(persona: &str, text: &str) -> PersonaResponse {
        PersonaResponse::new(persona, text, "m", 0.8)
    }

    fn sky() -> Vec<PersonaResponse> {
        vec![
            response("a", "The sky is blue."),
            response("b", "The sky is blue."),
            response("c", "The sky is not blue and is actually green."),
        ]
    }

    #[test]
    fn test_sky_scenario() {
        let analysis = ConsensusAnalyzer::new().analyze(&sky()).unwrap();

        assert_eq!(analysis.consensus.participant_count, 2);
        assert_eq!(analysis.consensus.text, "The sky is blue.");
        assert_eq!(analysis.consensus.outlier_count, 1);

        let outlier = &analysis.analyses[2];
        assert!(outlier.is_hallucination);
        assert!(outlier.severity >= Severity::Medium);
        assert_eq!(outlier.deviation_type, DeviationType::FactualContradiction);
        assert!(outlier.correction_prompt.is_some());

        for member in &analysis.analyses[..2] {
            assert_eq!(member.deviation_score, 0.0);
            assert!(!member.is_hallucination);
            assert!(member.correction_prompt.is_none());
        }
        assert!((analysis.overall_health - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(analysis.hallucination_count(), 1);
    }

    #[test]
    fn test_identical_responses_never_deviate() {
        let responses: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|p| response(p, "Ownership moves values; borrowing lends them."))
            .collect();
        let analysis = ConsensusAnalyzer::new().analyze(&responses).unwrap();
        for a in &analysis.analyses {
            assert_eq!(a.deviation_score, 0.0);
            assert!(!a.is_hallucination);
        }
        assert_eq!(analysis.overall_health, 1.0);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let analyzer = ConsensusAnalyzer::new();
        let first = analyzer.analyze(&sky()).unwrap();
        for _ in 0..10 {
            let again = analyzer.analyze(&sky()).unwrap();
            assert_eq!(again.clusters, first.clusters);
            assert_eq!(again.consensus, first.consensus);
            assert_eq!(again.analyses, first.analyses);
        }
    }

    #[test]
    fn test_fallbacks_are_not_scored() {
        let mut responses = vec![response("a", "The sky is blue.")];
        responses.push(PersonaResponse::fallback("x".into(), 0.3));
        responses.push(response("b", "The sky is blue."));
        responses.push(PersonaResponse::fallback("y".into(), 0.3));
        responses.push(PersonaResponse::fallback("z".into(), 0.3));

        let analysis = ConsensusAnalyzer::new().analyze(&responses).unwrap();

        assert_eq!(analysis.consensus.text, "The sky is blue.");
        assert_eq!(analysis.consensus.outlier_count, 0);
        assert_eq!(analysis.analyses.len(), 2);
        assert_eq!(
            analysis.analyses.iter().map(|a| a.index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(analysis.hallucination_count(), 0);
        assert!(analysis.analysis_for(&PersonaId::from("x")).is_none());
        assert_eq!(analysis.overall_health, 1.0);
    }

    #[test]
    fn test_correction_digest_skips_fallbacks() {
        let mut responses = sky();
        responses.push(PersonaResponse::fallback("d".into(), 0.3));
        let analysis = ConsensusAnalyzer::new().analyze(&responses).unwrap();
        let prompt = analysis.analyses[2].correction_prompt.as_deref().unwrap();
        assert!(prompt.contains("- a: The sky is blue."));
        assert!(!prompt.contains("Unable to complete"));
    }

    #[test]
    fn test_two_divergent_responses() {
        let responses = vec![
            response("a", "apples oranges bananas"),
            response("b", "rockets engines boosters"),
        ];
        let analysis = ConsensusAnalyzer::new().analyze(&responses).unwrap();
        assert_eq!(analysis.clusters.len(), 2);
        assert!(analysis.clusters.iter().all(|c| c.len() == 1));
        assert_eq!(analysis.consensus.agreement_score, 0.5);
    }

    #[test]
    fn test_insufficient_responses() {
        let err = ConsensusAnalyzer::new()
            .analyze(&[response("a", "alone")])
            .unwrap_err();
        assert_eq!(err, CouncilError::InsufficientData { got: 1, need: 2 });
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut analyzer = ConsensusAnalyzer::new();
        let bad = AnalysisThresholds {
            hallucination: 1.2,
            similarity: 0.7,
        };
        assert!(analyzer.set_thresholds(bad).is_err());
        assert_eq!(analyzer.thresholds(), AnalysisThresholds::default());
    }

    #[test]
    fn test_strict_threshold_flags_less() {
        let lax = AnalysisThresholds {
            hallucination: 0.9,
            similarity: 0.7,
        };
        let analyzer = ConsensusAnalyzer::with_strategies(
            Arc::new(LexicalComparator),
            Arc::new(LexicalComparator),
            lax,
        )
        .unwrap();
        let analysis = analyzer.analyze(&sky()).unwrap();
        assert_eq!(analysis.hallucination_count(), 0);
    }
}
