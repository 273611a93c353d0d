//! Greedy similarity clustering and consensus selection.
//!
//! Responses are walked in input order. Each joins the first existing cluster
//! whose first member is similar enough, otherwise it starts a new cluster.
//! The largest cluster is the consensus; the earliest-formed cluster wins a
//! size tie, and its first member is the representative.
//!
//! Synthesized fallback responses are never clustered, so they can neither
//! form the consensus nor count towards agreement.

use quorum_registry::{PersonaId, PersonaResponse};
use serde::{Deserialize, Serialize};

use crate::comparator::TextComparator;
use crate::error::CouncilError;
use crate::Result;

/// Minimum responses for a consensus to exist.
pub const MIN_RESPONSES: usize = 2;

/// Responses grouped by similarity to the cluster's first member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusCluster {
    /// Indices into the analyzed response slice, in insertion order.
    pub members: Vec<usize>,
    /// `members.len() / backend-origin responses`.
    pub agreement_score: f64,
}

impl ConsensusCluster {
    /// Index of the representative (first-inserted) member.
    pub fn representative(&self) -> usize {
        self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }
}

/// The panel's consensus position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// Index of the consensus cluster in the cluster list.
    pub cluster: usize,
    /// Index of the representative response.
    pub representative: usize,
    /// Representative response text.
    pub text: String,
    /// Persona that gave the representative response.
    pub dominant_persona: PersonaId,
    /// Mean confidence of the consensus members.
    pub confidence: f64,
    /// Size of the consensus cluster.
    pub participant_count: usize,
    /// `participant_count / backend-origin responses`.
    pub agreement_score: f64,
    /// Backend-origin responses outside the consensus cluster.
    pub outlier_count: usize,
}

/// Clusters responses greedily in input order.
///
/// `threshold` is inclusive: a response joins a cluster when its similarity
/// to the cluster's first member is at least `threshold`. Fallback responses
/// are skipped.
pub fn cluster_responses(
    responses: &[PersonaResponse],
    comparator: &dyn TextComparator,
    threshold: f64,
) -> Vec<ConsensusCluster> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (idx, response) in responses.iter().enumerate() {
        if response.is_fallback() {
            continue;
        }
        let home = groups.iter_mut().find(|members| {
            let first = &responses[members[0]];
            comparator.similarity(&first.text, &response.text) >= threshold
        });
        match home {
            Some(members) => members.push(idx),
            None => groups.push(vec![idx]),
        }
    }

    let total = scored_count(responses).max(1) as f64;
    groups
        .into_iter()
        .map(|members| ConsensusCluster {
            agreement_score: members.len() as f64 / total,
            members,
        })
        .collect()
}

/// Number of backend-origin responses.
pub fn scored_count(responses: &[PersonaResponse]) -> usize {
    responses.iter().filter(|r| !r.is_fallback()).count()
}

/// Picks the consensus cluster and summarizes it.
///
/// # Errors
///
/// Returns [`CouncilError::InsufficientData`] for fewer than
/// [`MIN_RESPONSES`] responses, or when every response is a fallback.
pub fn summarize(
    responses: &[PersonaResponse],
    clusters: &[ConsensusCluster],
) -> Result<ConsensusSummary> {
    if responses.len() < MIN_RESPONSES {
        return Err(CouncilError::InsufficientData {
            got: responses.len(),
            need: MIN_RESPONSES,
        });
    }

    // max_by_key keeps the last maximum; compare reversed indices so the
    // earliest cluster wins ties.
    let (cluster_idx, cluster) = clusters
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_empty())
        .max_by_key(|(i, c)| (c.len(), std::cmp::Reverse(*i)))
        .ok_or(CouncilError::InsufficientData {
            got: scored_count(responses),
            need: MIN_RESPONSES,
        })?;

    let representative = &responses[cluster.representative()];
    let confidence = cluster
        .members
        .iter()
        .map(|&i| responses[i].confidence)
        .sum::<f64>()
        / cluster.len() as f64;

    Ok(ConsensusSummary {
        cluster: cluster_idx,
        representative: cluster.representative(),
        text: representative.text.clone(),
        dominant_persona: representative.persona.clone(),
        confidence,
        participant_count: cluster.len(),
        agreement_score: cluster.agreement_score,
        outlier_count: scored_count(responses) - cluster.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::LexicalComparator;

    fn response(persona: &str, text: &str, confidence: f64) -> PersonaResponse {
        PersonaResponse::new(persona, text, "m", confidence)
    }

    #[test]
    fn test_identical_responses_form_one_cluster() {
        let responses = vec![
            response("a", "Rust is fast.", 0.8),
            response("b", "Rust is fast.", 0.6),
            response("c", "Rust is fast.", 0.7),
        ];
        let clusters = cluster_responses(&responses, &LexicalComparator, 0.7);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
        assert_eq!(clusters[0].agreement_score, 1.0);

        let summary = summarize(&responses, &clusters).unwrap();
        assert_eq!(summary.representative, 0);
        assert_eq!(summary.outlier_count, 0);
        assert!((summary.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_tie_goes_to_first_formed_cluster() {
        let responses = vec![
            response("a", "apples oranges bananas", 0.8),
            response("b", "rockets engines boosters", 0.8),
        ];
        let clusters = cluster_responses(&responses, &LexicalComparator, 0.7);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].agreement_score, 0.5);

        let summary = summarize(&responses, &clusters).unwrap();
        assert_eq!(summary.cluster, 0);
        assert_eq!(summary.dominant_persona.as_str(), "a");
        assert_eq!(summary.agreement_score, 0.5);
        assert_eq!(summary.outlier_count, 1);
    }

    #[test]
    fn test_larger_later_cluster_wins() {
        let responses = vec![
            response("a", "apples oranges bananas", 0.8),
            response("b", "rockets engines boosters", 0.9),
            response("c", "rockets engines boosters", 0.7),
        ];
        let clusters = cluster_responses(&responses, &LexicalComparator, 0.7);
        let summary = summarize(&responses, &clusters).unwrap();
        assert_eq!(summary.cluster, 1);
        assert_eq!(summary.representative, 1);
        assert_eq!(summary.participant_count, 2);
        assert!((summary.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_fallbacks_never_form_consensus() {
        let mut responses = vec![
            response("a", "The sky is blue.", 0.8),
            response("b", "The sky is blue.", 0.8),
        ];
        for persona in ["c", "d", "e"] {
            responses.push(PersonaResponse::fallback(persona.into(), 0.3));
        }
        let clusters = cluster_responses(&responses, &LexicalComparator, 0.7);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1]);
        assert_eq!(clusters[0].agreement_score, 1.0);

        let summary = summarize(&responses, &clusters).unwrap();
        assert_eq!(summary.text, "The sky is blue.");
        assert_eq!(summary.outlier_count, 0);
        assert!((summary.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_all_fallbacks_is_insufficient() {
        let responses = vec![
            PersonaResponse::fallback("a".into(), 0.3),
            PersonaResponse::fallback("b".into(), 0.3),
        ];
        let clusters = cluster_responses(&responses, &LexicalComparator, 0.7);
        assert!(clusters.is_empty());
        assert_eq!(
            summarize(&responses, &clusters).unwrap_err(),
            CouncilError::InsufficientData { got: 0, need: 2 }
        );
    }

    #[test]
    fn test_single_response_is_insufficient() {
        let responses = vec![response("a", "alone", 0.8)];
        let clusters = cluster_responses(&responses, &LexicalComparator, 0.7);
        assert_eq!(
            summarize(&responses, &clusters).unwrap_err(),
            CouncilError::InsufficientData { got: 1, need: 2 }
        );
    }
}
