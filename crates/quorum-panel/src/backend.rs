//! The backend invocation contract.
//!
//! The panel never talks to a model directly. Everything goes through
//! [`BackendInvoker`], so tests and embedders can plug in any text generator.

use async_trait::async_trait;
use quorum_registry::{BackendId, Complexity, Persona, PersonaId, Selection};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Sampling parameters sent with each invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl SamplingParams {
    /// Sampling scaled to prompt complexity.
    pub const fn for_complexity(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Low => Self {
                temperature: 0.3,
                max_tokens: 1024,
            },
            Complexity::Medium => Self {
                temperature: 0.5,
                max_tokens: 2048,
            },
            Complexity::High => Self {
                temperature: 0.7,
                max_tokens: 4096,
            },
        }
    }
}

/// One request to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub persona: PersonaId,
    pub backend: BackendId,
    pub system_prompt: String,
    pub user_prompt: String,
    pub sampling: SamplingParams,
}

impl InvocationRequest {
    /// Builds a request for a persona from a backend selection.
    pub fn for_persona(persona: &Persona, selection: &Selection, user_prompt: impl Into<String>) -> Self {
        Self {
            persona: persona.id.clone(),
            backend: selection.backend.clone(),
            system_prompt: persona_system_prompt(persona),
            user_prompt: user_prompt.into(),
            sampling: SamplingParams::for_complexity(selection.profile.complexity),
        }
    }
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A successful backend reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    /// Backend that actually served the call; may differ from the requested one.
    pub backend_used: BackendId,
    pub usage: Option<TokenUsage>,
    /// Backend-reported confidence. `None` means the selection confidence is used.
    pub confidence: Option<f64>,
}

impl Completion {
    /// Creates a completion without usage or confidence.
    pub fn new(text: impl Into<String>, backend_used: impl Into<BackendId>) -> Self {
        Self {
            text: text.into(),
            backend_used: backend_used.into(),
            usage: None,
            confidence: None,
        }
    }

    /// Attaches a confidence value.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attaches token usage.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Text-generation capability used by the panel and the rewriter.
///
/// Implementations must be safe to call concurrently; the panel issues one
/// call per persona at the same time in parallel mode.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    /// Runs a single request.
    async fn invoke(&self, request: &InvocationRequest) -> Result<Completion, BackendError>;
}

/// System prompt framing a persona's voice.
pub fn persona_system_prompt(persona: &Persona) -> String {
    let skills = if persona.skills.is_empty() {
        "general reasoning".to_string()
    } else {
        persona
            .skills
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "You are {}, a member of an expert panel with expertise in {}. \
         Approach every prompt from a {} perspective. \
         Answer in your own voice, state facts precisely, and say so when you are unsure.",
        persona.id, skills, persona.focus
    )
}
