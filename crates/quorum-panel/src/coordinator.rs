//! # Panel Activation Coordinator
//!
//! Fans one prompt out to every registered persona and collects the answers.
//!
//! ## Failure Isolation
//!
//! A persona's slot can end three ways:
//! - **Answered**: the backend replied within the retry budget
//! - **Failed**: every attempt failed, or the error was permanent
//! - **Timed out**: the global panel deadline expired first
//!
//! Failed and timed-out slots become low-confidence fallback responses when
//! fallback is enabled, and are dropped otherwise. Either way the failure is
//! recorded in [`ActivationReport::errors`] and never aborts the panel.
//!
//! ## Architecture
//!
//! ```text
//!             prompt
//!               │
//!     ┌─────────┼─────────┐      BackendSelector picks a backend per persona
//!     ▼         ▼         ▼
//! ┌───────┐ ┌───────┐ ┌───────┐
//! │retry()│ │retry()│ │retry()│  one future per persona (parallel mode)
//! └───┬───┘ └───┬───┘ └───┬───┘
//!     └─────────┼─────────┘      raced against one global deadline
//!               ▼
//!        ActivationReport        slots kept in registration order
//! ```

use futures::stream::{FuturesUnordered, StreamExt};
use quorum_registry::{BackendSelector, CapabilityRegistry, Persona, PersonaResponse, Selection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::backend::{BackendInvoker, Completion, InvocationRequest};
use crate::error::{ActivationError, PanelError, Result, RetryError};
use crate::retry::{invoke_with_retry, RetryPolicy};

/// Minimum number of real answers for consensus analysis to be meaningful.
pub const MIN_CONSENSUS_RESPONSES: usize = 2;

/// Configuration for [`PanelCoordinator`].
///
/// # Example
///
/// ```rust
/// use quorum_panel::ActivationConfig;
/// use std::time::Duration;
///
/// let config = ActivationConfig::new()
///     .with_parallel(false)
///     .with_timeout(Duration::from_secs(5))
///     .with_max_retries(2);
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationConfig {
    /// Run persona calls concurrently.
    pub parallel: bool,
    /// Deadline for the whole panel.
    pub timeout: Duration,
    /// Attempts per persona call, including the first.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Synthesize fallback responses for failed personas.
    pub fallback_enabled: bool,
    /// Confidence given to fallback responses.
    pub fallback_confidence: f64,
}

impl ActivationConfig {
    /// Creates a config with default values.
    ///
    /// Defaults:
    /// - Parallel: enabled
    /// - Timeout: 30s
    /// - Max retries: 3
    /// - Retry delay: 1s
    /// - Fallback: enabled, confidence 0.3
    #[must_use]
    pub const fn new() -> Self {
        Self {
            parallel: true,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            fallback_enabled: true,
            fallback_confidence: 0.3,
        }
    }

    /// Enables or disables parallel activation.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the panel deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets attempts per persona.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enables or disables fallback responses.
    #[must_use]
    pub const fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Sets the confidence given to fallback responses.
    #[must_use]
    pub const fn with_fallback_confidence(mut self, confidence: f64) -> Self {
        self.fallback_confidence = confidence;
        self
    }

    /// Retry policy derived from this config.
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one panel activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationReport {
    /// Responses in persona registration order, fallbacks included.
    pub responses: Vec<PersonaResponse>,
    pub elapsed_ms: u64,
    /// Personas answered by a backend.
    pub success_count: usize,
    /// Personas that failed or timed out.
    pub failure_count: usize,
    /// Mean confidence over `responses`; 0 when empty.
    pub average_confidence: f64,
    /// True when at least two personas answered.
    pub consensus_reached: bool,
    pub errors: Vec<ActivationError>,
}

/// A persona's planned call.
struct Plan<'a> {
    persona: &'a Persona,
    selection: Selection,
    request: InvocationRequest,
}

/// Slot result: `None` means the deadline expired first.
type Slot = Option<std::result::Result<Completion, RetryError>>;

/// Fans prompts out to the persona panel.
pub struct PanelCoordinator {
    selector: BackendSelector,
    backend: Arc<dyn BackendInvoker>,
    config: ActivationConfig,
}

impl PanelCoordinator {
    /// Creates a coordinator over a registry and a backend.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        backend: Arc<dyn BackendInvoker>,
        config: ActivationConfig,
    ) -> Self {
        Self {
            selector: BackendSelector::new(registry),
            backend,
            config,
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    /// Returns the backend selector.
    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// Activates every persona on `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::NoPersonas`] if the registry is empty. Backend
    /// failures never surface here; they are reported in the returned
    /// [`ActivationReport`].
    pub async fn activate_all(&self, prompt: &str) -> Result<ActivationReport> {
        let personas = self.selector.registry().personas();
        if personas.is_empty() {
            return Err(PanelError::NoPersonas);
        }

        let start = Instant::now();
        let deadline = start + self.config.timeout;
        info!(
            personas = personas.len(),
            parallel = self.config.parallel,
            "activating panel"
        );

        let plans: Vec<Plan<'_>> = personas
            .iter()
            .map(|persona| {
                let selection = self.selector.select(persona, prompt);
                let request = InvocationRequest::for_persona(persona, &selection, prompt);
                Plan {
                    persona,
                    selection,
                    request,
                }
            })
            .collect();

        let slots = if self.config.parallel {
            self.run_parallel(&plans, deadline).await
        } else {
            self.run_sequential(&plans, deadline).await
        };

        let report = self.assemble(&plans, slots, start.elapsed());
        info!(
            successes = report.success_count,
            failures = report.failure_count,
            elapsed_ms = report.elapsed_ms,
            "panel activation finished"
        );
        Ok(report)
    }

    async fn run_parallel(&self, plans: &[Plan<'_>], deadline: Instant) -> Vec<Slot> {
        let backend = self.backend.as_ref();
        let policy = self.config.retry_policy();
        let policy = &policy;

        let mut slots: Vec<Slot> = plans.iter().map(|_| None).collect();
        let mut pending: FuturesUnordered<_> = plans
            .iter()
            .enumerate()
            .map(|(idx, plan)| async move {
                (idx, invoke_with_retry(backend, &plan.request, policy).await)
            })
            .collect();

        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some((idx, result))) => slots[idx] = Some(result),
                Ok(None) => break,
                Err(_) => {
                    let pending = slots.iter().filter(|s| s.is_none()).count();
                    warn!(pending, "panel deadline expired");
                    break;
                }
            }
        }
        slots
    }

    async fn run_sequential(&self, plans: &[Plan<'_>], deadline: Instant) -> Vec<Slot> {
        let policy = self.config.retry_policy();
        let mut slots: Vec<Slot> = plans.iter().map(|_| None).collect();

        for (idx, plan) in plans.iter().enumerate() {
            let call = invoke_with_retry(self.backend.as_ref(), &plan.request, &policy);
            match timeout_at(deadline, call).await {
                Ok(result) => slots[idx] = Some(result),
                Err(_) => {
                    warn!(
                        remaining = plans.len() - idx,
                        "panel deadline expired"
                    );
                    break;
                }
            }
        }
        slots
    }

    fn assemble(&self, plans: &[Plan<'_>], slots: Vec<Slot>, elapsed: Duration) -> ActivationReport {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let mut responses = Vec::with_capacity(plans.len());
        let mut errors = Vec::new();
        let mut success_count = 0;

        for (plan, slot) in plans.iter().zip(slots) {
            let persona_id = plan.persona.id.clone();
            let error = match slot {
                Some(Ok(completion)) => {
                    let confidence = completion.confidence.unwrap_or(plan.selection.confidence);
                    responses.push(PersonaResponse::new(
                        persona_id,
                        completion.text,
                        completion.backend_used,
                        confidence,
                    ));
                    success_count += 1;
                    continue;
                }
                Some(Err(err)) => ActivationError::failed(persona_id.clone(), &err),
                None => ActivationError::timed_out(persona_id.clone(), timeout_ms),
            };

            warn!(persona = %persona_id, reason = %error.reason, "persona failed");
            if self.config.fallback_enabled {
                debug!(persona = %persona_id, "using fallback response");
                responses.push(PersonaResponse::fallback(
                    persona_id,
                    self.config.fallback_confidence,
                ));
            }
            errors.push(error);
        }

        let average_confidence = if responses.is_empty() {
            0.0
        } else {
            responses.iter().map(|r| r.confidence).sum::<f64>() / responses.len() as f64
        };

        ActivationReport {
            success_count,
            failure_count: plans.len() - success_count,
            average_confidence,
            consensus_reached: success_count >= MIN_CONSENSUS_RESPONSES,
            elapsed_ms: elapsed.as_millis() as u64,
            responses,
            errors,
        }
    }
}

impl std::fmt::Debug for PanelCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelCoordinator")
            .field("selector", &self.selector)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
