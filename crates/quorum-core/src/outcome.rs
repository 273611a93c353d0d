//! Result types returned by the session.

use quorum_council::PanelAnalysis;
use quorum_panel::ActivationError;
use quorum_registry::{Persona, PersonaId, PersonaResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::QuorumConfig;
use crate::error::{CorrectionFailure, QuorumError};
use crate::learning::{LearningEntry, LearningStats};
use crate::metrics::SessionMetrics;
use crate::rewriter::CorrectionRecord;
use crate::Result;

/// Everything produced by one [`QuorumSession::process_prompt`](crate::QuorumSession::process_prompt) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOutcome {
    /// Correlates log lines for this prompt.
    pub run_id: Uuid,
    /// Panel responses in persona registration order, fallbacks included.
    pub responses: Vec<PersonaResponse>,
    pub analysis: PanelAnalysis,
    pub corrections: Vec<CorrectionRecord>,
    pub correction_failures: Vec<CorrectionFailure>,
    /// At least two personas answered from a backend.
    pub consensus_reached: bool,
    pub overall_health: f64,
    pub elapsed_ms: u64,
    /// Learning entries recorded while processing this prompt.
    pub learning: Vec<LearningEntry>,
    /// Metrics after this prompt was folded in.
    pub metrics: SessionMetrics,
    pub activation_errors: Vec<ActivationError>,
}

impl PromptOutcome {
    pub fn has_hallucinations(&self) -> bool {
        self.analysis.hallucination_count() > 0
    }

    /// Personas whose responses were flagged.
    pub fn flagged_personas(&self) -> Vec<&PersonaId> {
        self.analysis.flagged().map(|a| &a.persona).collect()
    }

    /// The corrected text for a persona, if its correction succeeded.
    pub fn correction_for(&self, persona: &PersonaId) -> Option<&CorrectionRecord> {
        self.corrections.iter().find(|c| &c.persona == persona)
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub enabled: bool,
    /// Configuration in effect.
    pub config: QuorumConfig,
    pub metrics: SessionMetrics,
    pub personas: Vec<Persona>,
}

/// Learning entries plus their aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningHistory {
    pub entries: Vec<LearningEntry>,
    pub stats: LearningStats,
    /// Current accuracy score, when the history is for one persona.
    ///
    /// A persona with no analyzed responses yet has the initial score of 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// One prompt of a batch run and how it ended.
#[derive(Debug)]
pub struct BatchItem {
    pub prompt: String,
    pub result: Result<PromptOutcome>,
}

impl BatchItem {
    pub fn outcome(&self) -> Option<&PromptOutcome> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&QuorumError> {
        self.result.as_ref().err()
    }
}

/// Totals over a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Prompts submitted, failed ones included.
    pub total: usize,
    /// Prompts that produced an outcome.
    pub successful: usize,
    /// Mean `overall_health` of the successful prompts, 0 if there were none.
    pub average_health: f64,
    pub hallucinations_detected: usize,
    pub corrections_applied: usize,
}

impl BatchSummary {
    /// Share of prompts that produced an outcome.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// Per-prompt results of [`QuorumSession::run_batch`](crate::QuorumSession::run_batch)
/// plus their summary.
#[derive(Debug)]
pub struct BatchReport {
    /// One item per prompt, in submission order.
    pub items: Vec<BatchItem>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Builds the report, computing the summary from the items.
    pub fn from_items(items: Vec<BatchItem>) -> Self {
        let mut summary = BatchSummary {
            total: items.len(),
            ..BatchSummary::default()
        };
        let mut total_health = 0.0;
        for outcome in items.iter().filter_map(BatchItem::outcome) {
            summary.successful += 1;
            total_health += outcome.overall_health;
            summary.hallucinations_detected += outcome.analysis.hallucination_count();
            summary.corrections_applied += outcome.corrections.len();
        }
        if summary.successful > 0 {
            summary.average_health = total_health / summary.successful as f64;
        }
        Self { items, summary }
    }

    /// Outcomes of the prompts that succeeded, in submission order.
    pub fn outcomes(&self) -> impl Iterator<Item = &PromptOutcome> {
        self.items.iter().filter_map(BatchItem::outcome)
    }
}

/// Exportable session state: metrics and learning logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub metrics: SessionMetrics,
    #[serde(default)]
    pub learning: BTreeMap<PersonaId, Vec<LearningEntry>>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
