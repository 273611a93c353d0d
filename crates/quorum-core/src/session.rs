//! The session controller.
//!
//! [`QuorumSession`] owns the registry, the backend handle, the learning log
//! and the running metrics, and drives one prompt at a time through
//! activation, analysis and correction.

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use quorum_council::{ClaimExtractor, ConsensusAnalyzer, LexicalComparator, TextComparator};
use quorum_panel::{BackendInvoker, PanelCoordinator};
use quorum_registry::{CapabilityRegistry, PersonaId};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigPatch, QuorumConfig};
use crate::error::QuorumError;
use crate::metrics::{Observation, SessionMetrics};
use crate::outcome::{
    BatchItem, BatchReport, LearningHistory, PromptOutcome, SessionSnapshot, SessionStatus,
};
use crate::rewriter::{CorrectiveRewriter, RewriterSettings};
use crate::Result;

/// A panel-consensus session.
///
/// # Pipeline
///
/// 1. Every persona answers the prompt (parallel or sequential, one deadline)
/// 2. Responses are clustered and scored against the consensus
/// 3. Flagged personas are asked to correct themselves, each in isolation
/// 4. Metrics and the learning log are updated
///
/// A prompt either completes all four steps or returns an error with the
/// metrics untouched.
///
/// # Example
///
/// ```rust,ignore
/// let session = QuorumSession::new(QuorumConfig::default(), Arc::new(my_backend))?;
/// let outcome = session.process_prompt("Should we shard the orders table?").await?;
/// for correction in &outcome.corrections {
///     println!("{}: {}", correction.persona, correction.corrected);
/// }
/// ```
pub struct QuorumSession {
    config: RwLock<QuorumConfig>,
    registry: Arc<CapabilityRegistry>,
    backend: Arc<dyn BackendInvoker>,
    comparator: Arc<dyn TextComparator>,
    claims: Arc<dyn ClaimExtractor>,
    rewriter: CorrectiveRewriter,
    metrics: Mutex<SessionMetrics>,
}

impl QuorumSession {
    /// Creates a session using the lexical comparison strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation or the registry
    /// tables are inconsistent.
    pub fn new(config: QuorumConfig, backend: Arc<dyn BackendInvoker>) -> Result<Self> {
        let lexical = Arc::new(LexicalComparator::new());
        Self::with_strategies(config, backend, lexical.clone(), lexical)
    }

    /// Creates a session with custom comparison strategies.
    pub fn with_strategies(
        config: QuorumConfig,
        backend: Arc<dyn BackendInvoker>,
        comparator: Arc<dyn TextComparator>,
        claims: Arc<dyn ClaimExtractor>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(CapabilityRegistry::from_config(&config.registry)?);
        let rewriter = CorrectiveRewriter::new(
            Arc::clone(&registry),
            Arc::clone(&backend),
            Arc::clone(&comparator),
            Arc::clone(&claims),
            RewriterSettings::from_config(&config),
        );
        info!(
            personas = registry.personas().len(),
            backends = registry.backends().len(),
            enabled = config.enabled,
            "quorum session created"
        );

        Ok(Self {
            config: RwLock::new(config),
            registry,
            backend,
            comparator,
            claims,
            rewriter,
            metrics: Mutex::new(SessionMetrics::default()),
        })
    }

    /// Runs one prompt through the full pipeline.
    ///
    /// # Errors
    ///
    /// - [`QuorumError::Disabled`] if the session is disabled; nothing runs
    /// - [`QuorumError::InsufficientData`] if fewer than two responses
    ///   remain to analyze; metrics are left untouched
    /// - [`QuorumError::Panel`] if the registry has no personas
    ///
    /// Individual backend and correction failures never surface here; they
    /// are reported in the returned [`PromptOutcome`].
    pub async fn process_prompt(&self, prompt: &str) -> Result<PromptOutcome> {
        let config = self.config.read().clone();
        if !config.enabled {
            return Err(QuorumError::Disabled);
        }

        let run_id = Uuid::new_v4();
        let start = Instant::now();
        info!(%run_id, prompt_chars = prompt.chars().count(), "processing prompt");

        let coordinator = PanelCoordinator::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.backend),
            config.activation_config(),
        );
        let report = coordinator.activate_all(prompt).await?;
        if !report.consensus_reached {
            warn!(
                %run_id,
                successes = report.success_count,
                "fewer than two personas answered, consensus is unreliable"
            );
        }

        let analyzer = ConsensusAnalyzer::with_strategies(
            Arc::clone(&self.comparator),
            Arc::clone(&self.claims),
            config.thresholds(),
        )?;
        let analysis = analyzer.analyze(&report.responses)?;

        let mut corrections = Vec::new();
        let mut correction_failures = Vec::new();
        if config.correction.enable_corrections {
            let attempts = analysis.flagged().map(|flagged| {
                let original = &report.responses[flagged.index].text;
                self.rewriter.correct(
                    &flagged.persona,
                    original,
                    &analysis.consensus.text,
                    &report.responses,
                    flagged,
                )
            });
            for result in join_all(attempts).await {
                match result {
                    Ok(record) => corrections.push(record),
                    Err(failure) => {
                        warn!(%run_id, persona = %failure.persona, reason = %failure.reason, "correction failed");
                        correction_failures.push(failure);
                    }
                }
            }
        } else {
            debug!(%run_id, "corrections disabled");
        }

        let learning = corrections
            .iter()
            .filter_map(|c| c.learning.clone())
            .chain(correction_failures.iter().filter_map(|f| f.learning.clone()))
            .collect();

        let observations: Vec<Observation> = analysis
            .analyses
            .iter()
            .map(|a| Observation {
                persona: a.persona.clone(),
                backend: report.responses[a.index].backend.clone(),
                hallucinated: a.is_hallucination,
            })
            .collect();

        let elapsed = start.elapsed();
        let metrics = {
            let mut metrics = self.metrics.lock();
            metrics.record(&observations, elapsed.as_secs_f64() * 1000.0, corrections.len());
            metrics.clone()
        };

        info!(
            %run_id,
            flagged = analysis.hallucination_count(),
            corrected = corrections.len(),
            health = analysis.overall_health,
            elapsed_ms = elapsed.as_millis() as u64,
            "prompt processed"
        );

        Ok(PromptOutcome {
            run_id,
            consensus_reached: report.consensus_reached,
            overall_health: analysis.overall_health,
            elapsed_ms: elapsed.as_millis() as u64,
            responses: report.responses,
            activation_errors: report.errors,
            analysis,
            corrections,
            correction_failures,
            learning,
            metrics,
        })
    }

    /// Runs prompts one after another and summarizes the results.
    ///
    /// A failing prompt is recorded in its [`BatchItem`] and counted in the
    /// summary total; the remaining prompts still run.
    pub async fn run_batch(&self, prompts: &[&str]) -> BatchReport {
        info!(prompts = prompts.len(), "running prompt batch");
        let mut items = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let result = self.process_prompt(prompt).await;
            if let Err(err) = &result {
                warn!(error = %err, "batch prompt failed");
            }
            items.push(BatchItem {
                prompt: (*prompt).to_string(),
                result,
            });
        }

        let report = BatchReport::from_items(items);
        info!(
            total = report.summary.total,
            successful = report.summary.successful,
            average_health = report.summary.average_health,
            "prompt batch complete"
        );
        report
    }

    /// Enables or disables prompt processing.
    pub fn set_enabled(&self, enabled: bool) {
        self.config.write().enabled = enabled;
        info!(enabled, "quorum session toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    /// Returns a copy of the active configuration.
    pub fn config(&self) -> QuorumConfig {
        self.config.read().clone()
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::Configuration`] and leaves the session
    /// unchanged if the patched config fails validation.
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<()> {
        let mut config = self.config.write();
        let next = config.apply(patch)?;
        self.rewriter.configure(RewriterSettings::from_config(&next));
        *config = next;
        info!("configuration updated");
        Ok(())
    }

    pub fn status(&self) -> SessionStatus {
        let config = self.config();
        SessionStatus {
            enabled: config.enabled,
            config,
            metrics: self.metrics.lock().clone(),
            personas: self.registry.personas().to_vec(),
        }
    }

    /// Learning entries and statistics for one persona, or all of them.
    ///
    /// For a single persona the history also carries its current accuracy.
    pub fn learning_history(&self, persona: Option<&PersonaId>) -> LearningHistory {
        let accuracy = persona.map(|id| {
            self.metrics
                .lock()
                .persona_accuracy
                .get(id)
                .copied()
                .unwrap_or(1.0)
        });
        let log = self.rewriter.learning();
        LearningHistory {
            entries: log.entries(persona),
            stats: log.stats(persona),
            accuracy,
        }
    }

    /// Clears learning for one persona, or all of them.
    pub fn clear_learning(&self, persona: Option<&PersonaId>) {
        self.rewriter.learning().clear(persona);
        match persona {
            Some(id) => info!(persona = %id, "learning cleared"),
            None => info!("learning cleared"),
        }
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = SessionMetrics::default();
        info!("metrics reset");
    }

    /// Copies out metrics and learning logs.
    pub fn export_state(&self) -> SessionSnapshot {
        SessionSnapshot {
            metrics: self.metrics.lock().clone(),
            learning: self.rewriter.learning().export(),
        }
    }

    /// Replaces metrics and learning logs with a snapshot.
    ///
    /// Scores are clamped into `[0, 1]` and each persona's log is trimmed to
    /// the configured capacity.
    pub fn import_state(&self, snapshot: SessionSnapshot) {
        let SessionSnapshot {
            mut metrics,
            learning,
        } = snapshot;
        metrics.sanitize();
        *self.metrics.lock() = metrics;
        self.rewriter.learning().import(learning);
        info!("session state imported");
    }
}

impl std::fmt::Debug for QuorumSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumSession")
            .field("enabled", &self.is_enabled())
            .field("personas", &self.registry.personas().len())
            .finish_non_exhaustive()
    }
}
