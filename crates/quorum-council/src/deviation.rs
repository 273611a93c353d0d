//! Per-response deviation scoring.
//!
//! A response's deviation from consensus blends three agreement signals:
//!
//! | Signal | Weight | Source |
//! |--------|--------|--------|
//! | Semantic similarity to the representative | 0.4 | [`TextComparator`] |
//! | Factual claim alignment | 0.4 | [`ClaimExtractor`] |
//! | Confidence agreement | 0.2 | backend-reported confidence |
//!
//! `deviation = 1 - weighted agreement`, clamped to `[0, 1]`.
//!
//! [`TextComparator`]: crate::comparator::TextComparator

use quorum_registry::{PersonaId, PersonaResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::comparator::ClaimExtractor;

const SEMANTIC_WEIGHT: f64 = 0.4;
const FACTUAL_WEIGHT: f64 = 0.4;
const CONFIDENCE_WEIGHT: f64 = 0.2;

/// Characters of each peer response quoted in a correction prompt.
pub const DIGEST_EXCERPT_CHARS: usize = 240;

/// Severity band of a deviation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bands: critical ≥ 0.8, high ≥ 0.6, medium ≥ 0.4, else low.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Severity::Critical
        } else if score >= 0.6 {
            Severity::High
        } else if score >= 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational classification of how a response deviates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviationType {
    FactualContradiction,
    LogicalInconsistency,
    InsufficientDetail,
    ExcessiveDetail,
    GeneralDeviation,
}

impl DeviationType {
    /// Classifies `text` against the consensus `reference`.
    ///
    /// Checked in order: contradiction of a consensus claim, contradiction
    /// between adjacent own sentences, under half the consensus length, over
    /// twice the consensus length.
    pub fn classify(claims: &dyn ClaimExtractor, text: &str, reference: &str) -> Self {
        let len = text.chars().count() as f64;
        let reference_len = reference.chars().count() as f64;

        if claims.contradicts_any(text, reference) {
            DeviationType::FactualContradiction
        } else if claims.self_contradicts(text) {
            DeviationType::LogicalInconsistency
        } else if len < reference_len * 0.5 {
            DeviationType::InsufficientDetail
        } else if len > reference_len * 2.0 {
            DeviationType::ExcessiveDetail
        } else {
            DeviationType::GeneralDeviation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationType::FactualContradiction => "factual contradiction",
            DeviationType::LogicalInconsistency => "logical inconsistency",
            DeviationType::InsufficientDetail => "insufficient detail",
            DeviationType::ExcessiveDetail => "excessive detail",
            DeviationType::GeneralDeviation => "general deviation",
        }
    }
}

impl fmt::Display for DeviationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far one response sits from consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationAnalysis {
    pub persona: PersonaId,
    /// Index of the response in the analyzed slice.
    pub index: usize,
    pub deviation_score: f64,
    pub semantic_similarity: f64,
    pub factual_alignment: f64,
    pub confidence_weight: f64,
    /// `deviation_score > hallucination threshold`.
    pub is_hallucination: bool,
    pub severity: Severity,
    pub deviation_type: DeviationType,
    /// Present iff `is_hallucination`.
    pub correction_prompt: Option<String>,
}

impl DeviationAnalysis {
    /// `1 - deviation_score`.
    pub fn consensus_alignment(&self) -> f64 {
        1.0 - self.deviation_score
    }
}

/// `max(0, 1 - 2·|confidence - consensus|)`.
pub fn confidence_weight(confidence: f64, consensus_confidence: f64) -> f64 {
    (1.0 - 2.0 * (confidence - consensus_confidence).abs()).max(0.0)
}

/// Combines the three agreement signals into a deviation score.
pub fn deviation_score(semantic: f64, factual: f64, confidence: f64) -> f64 {
    let agreement =
        SEMANTIC_WEIGHT * semantic + FACTUAL_WEIGHT * factual + CONFIDENCE_WEIGHT * confidence;
    (1.0 - agreement).clamp(0.0, 1.0)
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(DIGEST_EXCERPT_CHARS).collect();
    if text.chars().count() > DIGEST_EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

/// Builds the prompt asking a persona to reconsider its answer.
///
/// `responses[index]` is the persona's own answer; every other
/// backend-origin response is quoted in the peer digest.
pub fn correction_prompt(
    responses: &[PersonaResponse],
    index: usize,
    consensus_text: &str,
    deviation_type: DeviationType,
    severity: Severity,
) -> String {
    let own = &responses[index];
    let digest = responses
        .iter()
        .enumerate()
        .filter(|(i, r)| *i != index && !r.is_fallback())
        .map(|(_, r)| format!("- {}: {}", r.persona, excerpt(&r.text)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Your previous answer diverges from the panel consensus ({severity} severity, {deviation_type}).\n\n\
         YOUR ANSWER:\n{own}\n\n\
         PANEL CONSENSUS:\n{consensus_text}\n\n\
         OTHER PANEL MEMBERS:\n{digest}\n\n\
         Revise your answer in your own voice. Focus on:\n\
         - factual accuracy: drop or correct claims the panel disputes\n\
         - logical consistency: make sure your statements do not contradict each other\n\
         - peer insight: incorporate points the other members raised that you missed",
        own = own.text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::LexicalComparator;

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_score(0.0), Severity::Low);
        assert_eq!(Severity::from_score(0.39), Severity::Low);
        assert_eq!(Severity::from_score(0.4), Severity::Medium);
        assert_eq!(Severity::from_score(0.6), Severity::High);
        assert_eq!(Severity::from_score(0.8), Severity::Critical);
        assert_eq!(Severity::from_score(1.0), Severity::Critical);
    }

    #[test]
    fn test_severity_is_monotonic() {
        let mut last = Severity::Low;
        for step in 0..=100 {
            let s = Severity::from_score(step as f64 / 100.0);
            assert!(s >= last);
            last = s;
        }
    }

    #[test]
    fn test_confidence_weight() {
        assert_eq!(confidence_weight(0.8, 0.8), 1.0);
        assert!((confidence_weight(0.8, 0.6) - 0.6).abs() < 1e-9);
        assert_eq!(confidence_weight(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_deviation_score_bounds() {
        assert_eq!(deviation_score(1.0, 1.0, 1.0), 0.0);
        assert_eq!(deviation_score(0.0, 0.0, 0.0), 1.0);
        assert!((deviation_score(0.5, 0.5, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_deviation_type_ordering() {
        let c = LexicalComparator;
        assert_eq!(
            DeviationType::classify(&c, "The sky is not blue and is actually green.", "The sky is blue."),
            DeviationType::FactualContradiction
        );
        assert_eq!(
            DeviationType::classify(&c, "The road is wet. The road is not wet.", "It rained all day long today."),
            DeviationType::LogicalInconsistency
        );
        assert_eq!(
            DeviationType::classify(&c, "Maybe.", "A considerably longer consensus answer."),
            DeviationType::InsufficientDetail
        );
        assert_eq!(
            DeviationType::classify(&c, "A much, much longer answer than the other.", "Short one."),
            DeviationType::ExcessiveDetail
        );
        assert_eq!(
            DeviationType::classify(&c, "Cats purr.", "Dogs bark."),
            DeviationType::GeneralDeviation
        );
        assert_eq!(DeviationType::FactualContradiction.to_string(), "factual contradiction");
    }

    #[test]
    fn test_correction_prompt_contents() {
        let responses = vec![
            PersonaResponse::new("a", "The sky is blue.", "m", 0.8),
            PersonaResponse::new("b", "The sky is blue.", "m", 0.8),
            PersonaResponse::new("c", "The sky is green.", "m", 0.8),
        ];
        let prompt = correction_prompt(
            &responses,
            2,
            "The sky is blue.",
            DeviationType::GeneralDeviation,
            Severity::High,
        );
        assert!(prompt.contains("YOUR ANSWER:\nThe sky is green."));
        assert!(prompt.contains("PANEL CONSENSUS:\nThe sky is blue."));
        assert!(prompt.contains("- a: The sky is blue."));
        assert!(prompt.contains("- b: The sky is blue."));
        assert!(!prompt.contains("- c:"));
        assert!(prompt.contains("high severity"));
        assert!(prompt.contains("factual accuracy"));
    }
}
