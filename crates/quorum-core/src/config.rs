//! Configuration types for a Quorum session.
//!
//! Every section defaults independently, so a TOML file only needs the keys
//! it changes:
//!
//! ```toml
//! [analysis]
//! hallucination_threshold = 0.4
//!
//! [activation]
//! parallel = false
//! timeout_ms = 5000
//! ```

use quorum_council::AnalysisThresholds;
use quorum_panel::ActivationConfig;
use quorum_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::QuorumError;
use crate::Result;

const TIMEOUT_MS_RANGE: (u64, u64) = (100, 300_000);
const MAX_RETRIES_RANGE: (u32, u32) = (1, 10);
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Configuration for a [`QuorumSession`](crate::QuorumSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Whether the session accepts prompts.
    pub enabled: bool,

    /// Consensus analysis thresholds.
    pub analysis: AnalysisConfig,

    /// Panel activation settings.
    pub activation: ActivationSettings,

    /// Correction and learning settings.
    pub correction: CorrectionConfig,

    /// Persona and backend tables.
    pub registry: RegistryConfig,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            analysis: AnalysisConfig::default(),
            activation: ActivationSettings::default(),
            correction: CorrectionConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Consensus analysis configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Deviation above this flags a hallucination (0.0 - 1.0).
    pub hallucination_threshold: f64,

    /// Similarity needed to join a consensus cluster (0.0 - 1.0).
    pub similarity_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hallucination_threshold: 0.3,
            similarity_threshold: 0.7,
        }
    }
}

/// Panel activation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSettings {
    /// Call personas concurrently.
    pub parallel: bool,

    /// Deadline for the whole panel, in milliseconds.
    pub timeout_ms: u64,

    /// Attempts per persona call, including the first.
    pub max_retries: u32,

    /// Pause between attempts, in milliseconds.
    pub retry_delay_ms: u64,

    /// Substitute fallback responses for failed personas.
    pub fallback_enabled: bool,
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            parallel: true,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            fallback_enabled: true,
        }
    }
}

/// Correction and learning configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Rewrite flagged responses.
    pub enable_corrections: bool,

    /// Record a learning entry per correction attempt.
    pub enable_learning: bool,

    /// Learning entries kept per persona; the oldest are evicted first.
    pub learning_capacity: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enable_corrections: true,
            enable_learning: true,
            learning_capacity: 100,
        }
    }
}

/// Partial update applied by [`QuorumSession::update_config`](crate::QuorumSession::update_config).
///
/// `None` leaves the current value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub enabled: Option<bool>,
    pub hallucination_threshold: Option<f64>,
    pub similarity_threshold: Option<f64>,
    pub parallel: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub fallback_enabled: Option<bool>,
    pub enable_corrections: Option<bool>,
    pub enable_learning: Option<bool>,
    pub learning_capacity: Option<usize>,
}

impl QuorumConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every numeric setting against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`QuorumError::Configuration`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        unit("analysis.hallucination_threshold", self.analysis.hallucination_threshold)?;
        unit("analysis.similarity_threshold", self.analysis.similarity_threshold)?;

        let a = &self.activation;
        if !(TIMEOUT_MS_RANGE.0..=TIMEOUT_MS_RANGE.1).contains(&a.timeout_ms) {
            return Err(invalid(format!(
                "activation.timeout_ms must be within [{}, {}], got {}",
                TIMEOUT_MS_RANGE.0, TIMEOUT_MS_RANGE.1, a.timeout_ms
            )));
        }
        if !(MAX_RETRIES_RANGE.0..=MAX_RETRIES_RANGE.1).contains(&a.max_retries) {
            return Err(invalid(format!(
                "activation.max_retries must be within [{}, {}], got {}",
                MAX_RETRIES_RANGE.0, MAX_RETRIES_RANGE.1, a.max_retries
            )));
        }
        if a.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(invalid(format!(
                "activation.retry_delay_ms must be at most {MAX_RETRY_DELAY_MS}, got {}",
                a.retry_delay_ms
            )));
        }
        if self.correction.learning_capacity == 0 {
            return Err(invalid("correction.learning_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Returns a validated copy with `patch` applied; `self` is untouched.
    pub fn apply(&self, patch: &ConfigPatch) -> Result<Self> {
        let mut next = self.clone();
        if let Some(v) = patch.enabled {
            next.enabled = v;
        }
        if let Some(v) = patch.hallucination_threshold {
            next.analysis.hallucination_threshold = v;
        }
        if let Some(v) = patch.similarity_threshold {
            next.analysis.similarity_threshold = v;
        }
        if let Some(v) = patch.parallel {
            next.activation.parallel = v;
        }
        if let Some(v) = patch.timeout_ms {
            next.activation.timeout_ms = v;
        }
        if let Some(v) = patch.max_retries {
            next.activation.max_retries = v;
        }
        if let Some(v) = patch.retry_delay_ms {
            next.activation.retry_delay_ms = v;
        }
        if let Some(v) = patch.fallback_enabled {
            next.activation.fallback_enabled = v;
        }
        if let Some(v) = patch.enable_corrections {
            next.correction.enable_corrections = v;
        }
        if let Some(v) = patch.enable_learning {
            next.correction.enable_learning = v;
        }
        if let Some(v) = patch.learning_capacity {
            next.correction.learning_capacity = v;
        }
        next.validate()?;
        Ok(next)
    }

    /// Analyzer thresholds.
    pub fn thresholds(&self) -> AnalysisThresholds {
        AnalysisThresholds {
            hallucination: self.analysis.hallucination_threshold,
            similarity: self.analysis.similarity_threshold,
        }
    }

    /// Coordinator settings.
    pub fn activation_config(&self) -> ActivationConfig {
        let a = &self.activation;
        ActivationConfig::new()
            .with_parallel(a.parallel)
            .with_timeout(Duration::from_millis(a.timeout_ms))
            .with_max_retries(a.max_retries)
            .with_retry_delay(Duration::from_millis(a.retry_delay_ms))
            .with_fallback(a.fallback_enabled)
    }
}

fn invalid(msg: impl Into<String>) -> QuorumError {
    QuorumError::Configuration(msg.into())
}

fn unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}
