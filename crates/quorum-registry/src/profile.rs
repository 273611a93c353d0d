//! Prompt classification: domain, complexity, type and keywords.
//!
//! Everything here is a pure function of the prompt text. Single-word
//! keywords match whole words; entries containing a space or hyphen match as
//! substrings of the lower-cased prompt.

use crate::models::PromptType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("WORD_RE regex should compile"));

/// Words never treated as prompt keywords.
const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "this", "that",
    "these", "those",
];

/// Maximum number of keywords kept per prompt.
pub const MAX_KEYWORDS: usize = 10;

/// Subject area of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    MachineLearning,
    Security,
    Psychology,
    Engineering,
    Strategy,
    Medical,
    Legal,
    Business,
    General,
}

impl Domain {
    /// Domains in lookup order. `General` is the default and has no table.
    pub const LOOKUP: [Domain; 8] = [
        Domain::MachineLearning,
        Domain::Security,
        Domain::Psychology,
        Domain::Engineering,
        Domain::Strategy,
        Domain::Medical,
        Domain::Legal,
        Domain::Business,
    ];

    /// Keyword table for this domain.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Domain::MachineLearning => &["ml", "ai", "neural", "model", "training", "algorithm"],
            Domain::Security => &["security", "vulnerability", "attack", "encryption", "auth"],
            Domain::Psychology => &["emotion", "behavior", "mental", "cognitive", "feeling"],
            Domain::Engineering => &["system", "design", "architecture", "build", "technical"],
            Domain::Strategy => &["plan", "strategy", "goal", "objective", "tactical"],
            Domain::Medical => &["health", "medical", "treatment", "diagnosis", "patient"],
            Domain::Legal => &["law", "legal", "contract", "compliance", "regulation"],
            Domain::Business => &["market", "business", "revenue", "customer", "sales"],
            Domain::General => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::MachineLearning => "machine-learning",
            Domain::Security => "security",
            Domain::Psychology => "psychology",
            Domain::Engineering => "engineering",
            Domain::Strategy => "strategy",
            Domain::Medical => "medical",
            Domain::Legal => "legal",
            Domain::Business => "business",
            Domain::General => "general",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How demanding a prompt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        })
    }
}

const HIGH_COMPLEXITY: &[&str] = &[
    "complex",
    "advanced",
    "sophisticated",
    "intricate",
    "comprehensive",
    "detailed analysis",
    "multi-step",
    "architecture",
];

const MEDIUM_COMPLEXITY: &[&str] = &["analyze", "explain", "compare", "evaluate", "design", "implement"];

fn type_keywords(prompt_type: PromptType) -> &'static [&'static str] {
    match prompt_type {
        PromptType::Technical => &["code", "programming", "technical", "algorithm", "implementation", "debug"],
        PromptType::Creative => &["creative", "story", "imagine", "brainstorm", "innovative", "artistic"],
        PromptType::Analytical => &["analyze", "data", "research", "study", "investigate", "examine"],
        PromptType::Empathic => &["feel", "emotion", "support", "help", "understand", "relationship"],
        PromptType::Strategic => &["plan", "strategy", "goal", "future", "decision", "approach"],
    }
}

/// Lower-cased prompt split into words, for table lookups.
struct Words {
    lowered: String,
    words: Vec<String>,
    set: HashSet<String>,
}

impl Words {
    fn new(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let words: Vec<String> = WORD_RE
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect();
        let set = words.iter().cloned().collect();
        Self { lowered, words, set }
    }

    fn matches(&self, keyword: &str) -> bool {
        if keyword.contains(' ') || keyword.contains('-') {
            self.lowered.contains(keyword)
        } else {
            self.set.contains(keyword)
        }
    }

    fn matches_any(&self, table: &[&str]) -> bool {
        table.iter().any(|k| self.matches(k))
    }
}

/// Classification of a single prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptProfile {
    pub domain: Domain,
    pub complexity: Complexity,
    pub prompt_type: PromptType,
    /// Up to [`MAX_KEYWORDS`] distinct keywords in order of appearance.
    pub keywords: Vec<String>,
    /// Prompt length in characters.
    pub length: usize,
}

impl PromptProfile {
    /// Classifies a prompt.
    ///
    /// ```rust
    /// use quorum_registry::{Complexity, Domain, PromptProfile, PromptType};
    ///
    /// let p = PromptProfile::classify("Debug this complex encryption code");
    /// assert_eq!(p.domain, Domain::Security);
    /// assert_eq!(p.complexity, Complexity::High);
    /// assert_eq!(p.prompt_type, PromptType::Technical);
    /// ```
    pub fn classify(text: &str) -> Self {
        let words = Words::new(text);

        let domain = Domain::LOOKUP
            .iter()
            .copied()
            .find(|d| words.matches_any(d.keywords()))
            .unwrap_or(Domain::General);

        let complexity = if words.matches_any(HIGH_COMPLEXITY) {
            Complexity::High
        } else if words.matches_any(MEDIUM_COMPLEXITY) {
            Complexity::Medium
        } else {
            Complexity::Low
        };

        let prompt_type = PromptType::ORDER
            .iter()
            .copied()
            .find(|t| words.matches_any(type_keywords(*t)))
            .unwrap_or(PromptType::Analytical);

        let mut seen = HashSet::new();
        let keywords = words
            .words
            .iter()
            .filter(|w| w.len() > 3 && !STOP_WORDS.contains(&w.as_str()))
            .filter(|w| seen.insert(w.to_string()))
            .take(MAX_KEYWORDS)
            .cloned()
            .collect();

        Self {
            domain,
            complexity,
            prompt_type,
            keywords,
            length: text.chars().count(),
        }
    }
}

/// Fraction of words in `text` that appear in any domain keyword table.
pub fn domain_keyword_density(text: &str) -> f64 {
    let words = Words::new(text);
    if words.words.is_empty() {
        return 0.0;
    }
    let hits = words
        .words
        .iter()
        .filter(|w| {
            Domain::LOOKUP
                .iter()
                .any(|d| d.keywords().contains(&w.as_str()))
        })
        .count();
    hits as f64 / words.words.len() as f64
}
