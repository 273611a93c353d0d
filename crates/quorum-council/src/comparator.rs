//! Text comparison strategies.
//!
//! Defines the [`TextComparator`] and [`ClaimExtractor`] traits that the
//! clustering and deviation code is written against, plus
//! [`LexicalComparator`], the deterministic default implementing both.
//!
//! A semantic backend (embeddings, an NLI model) can replace the lexical
//! heuristics by implementing the same traits.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("PUNCTUATION_RE regex should compile"));

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("SENTENCE_RE regex should compile"));

/// Words ignored when extracting keywords.
pub const STOP_WORDS: &[&str] = &["the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by"];

/// Negation markers, after apostrophes are stripped.
pub const NEGATION_MARKERS: &[&str] = &[
    "not", "no", "never", "none", "cannot", "shouldnt", "wont", "isnt", "arent", "doesnt", "dont",
    "cant",
];

/// Copular and auxiliary verbs that mark a sentence as a factual claim.
pub const CLAIM_VERBS: &[&str] = &["is", "are", "was", "were", "will", "can", "has", "have", "be", "been"];

/// Keywords kept per text.
pub const MAX_KEYWORDS: usize = 10;

const JACCARD_WEIGHT: f64 = 0.6;
const KEYWORD_WEIGHT: f64 = 0.4;
const ALIGNMENT_OVERLAP: f64 = 0.5;
const CONTRADICTION_OVERLAP: f64 = 0.6;

/// Scores how similar two texts are.
pub trait TextComparator: Send + Sync {
    /// Similarity in `[0, 1]`. Identical texts score 1.
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Extracts and compares factual claims.
pub trait ClaimExtractor: Send + Sync {
    /// Non-empty sentences, trimmed.
    fn sentences(&self, text: &str) -> Vec<String>;

    /// Sentences that assert something.
    fn claims(&self, text: &str) -> Vec<String>;

    /// True if two claims state the same thing.
    fn aligned(&self, a: &str, b: &str) -> bool;

    /// True if two statements say opposite things about the same subject.
    fn contradicts(&self, a: &str, b: &str) -> bool;

    /// Share of claims in `a` with an aligned claim in `b`, over the larger
    /// claim count. Two claim-free texts are fully aligned; one claim-free
    /// text against one with claims is not aligned at all.
    fn factual_alignment(&self, a: &str, b: &str) -> f64 {
        let claims_a = self.claims(a);
        let claims_b = self.claims(b);
        match (claims_a.is_empty(), claims_b.is_empty()) {
            (true, true) => return 1.0,
            (true, false) | (false, true) => return 0.0,
            _ => {}
        }
        let aligned = claims_a
            .iter()
            .filter(|ca| claims_b.iter().any(|cb| self.aligned(ca, cb)))
            .count();
        aligned as f64 / claims_a.len().max(claims_b.len()) as f64
    }

    /// True if any claim in `a` contradicts any claim in `b`.
    fn contradicts_any(&self, a: &str, b: &str) -> bool {
        let claims_b = self.claims(b);
        self.claims(a)
            .iter()
            .any(|ca| claims_b.iter().any(|cb| self.contradicts(ca, cb)))
    }

    /// True if two adjacent sentences of `text` contradict each other.
    fn self_contradicts(&self, text: &str) -> bool {
        self.sentences(text)
            .windows(2)
            .any(|pair| self.contradicts(&pair[0], &pair[1]))
    }
}

/// Bag-of-words comparator: token Jaccard plus keyword overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalComparator;

impl LexicalComparator {
    pub fn new() -> Self {
        Self
    }
}

/// Lower-cased words with punctuation removed, in order.
fn words(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    PUNCTUATION_RE
        .replace_all(&lowered, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Words longer than two characters.
pub fn tokens(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// Distinct tokens.
pub fn token_set(text: &str) -> BTreeSet<String> {
    tokens(text).into_iter().collect()
}

/// First [`MAX_KEYWORDS`] distinct non-stop-word tokens longer than three characters.
pub fn keywords(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for token in tokens(text) {
        if out.len() == MAX_KEYWORDS {
            break;
        }
        if token.chars().count() > 3 && !STOP_WORDS.contains(&token.as_str()) {
            out.insert(token);
        }
    }
    out
}

/// True if `text` contains a negation marker.
pub fn has_negation(text: &str) -> bool {
    words(text)
        .iter()
        .any(|w| NEGATION_MARKERS.contains(&w.as_str()))
}

/// |A ∩ B| / |A ∪ B|; two empty sets are identical.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    let union = a.union(b).count();
    shared as f64 / union as f64
}

impl TextComparator for LexicalComparator {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let token_sim = jaccard(&token_set(a), &token_set(b));
        let keyword_sim = jaccard(&keywords(a), &keywords(b));
        (JACCARD_WEIGHT * token_sim + KEYWORD_WEIGHT * keyword_sim).clamp(0.0, 1.0)
    }
}

impl ClaimExtractor for LexicalComparator {
    fn sentences(&self, text: &str) -> Vec<String> {
        SENTENCE_RE
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn claims(&self, text: &str) -> Vec<String> {
        self.sentences(text)
            .into_iter()
            .filter(|s| words(s).iter().any(|w| CLAIM_VERBS.contains(&w.as_str())))
            .collect()
    }

    fn aligned(&self, a: &str, b: &str) -> bool {
        let ta = token_set(a);
        let tb = token_set(b);
        let larger = ta.len().max(tb.len());
        if larger == 0 {
            return true;
        }
        ta.intersection(&tb).count() as f64 / larger as f64 > ALIGNMENT_OVERLAP
    }

    /// Negation present on exactly one side, and the remaining content of the
    /// shorter statement is mostly contained in the longer one.
    fn contradicts(&self, a: &str, b: &str) -> bool {
        if has_negation(a) == has_negation(b) {
            return false;
        }
        let strip = |text: &str| -> BTreeSet<String> {
            token_set(text)
                .into_iter()
                .filter(|t| !NEGATION_MARKERS.contains(&t.as_str()))
                .collect()
        };
        let ta = strip(a);
        let tb = strip(b);
        let smaller = ta.len().min(tb.len());
        if smaller == 0 {
            return false;
        }
        ta.intersection(&tb).count() as f64 / smaller as f64 > CONTRADICTION_OVERLAP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: &str = "The sky is blue.";
    const GREEN: &str = "The sky is not blue and is actually green.";

    #[test]
    fn test_tokens_strip_punctuation_and_short_words() {
        assert_eq!(tokens("It's a Blue-ish SKY!"), vec!["its", "blueish", "sky"]);
    }

    #[test]
    fn test_identical_texts_are_fully_similar() {
        let c = LexicalComparator::new();
        assert_eq!(c.similarity(BLUE, BLUE), 1.0);
        assert_eq!(c.similarity("", ""), 1.0);
        assert_eq!(c.similarity("ok", "no"), 1.0);
    }

    #[test]
    fn test_sky_similarity() {
        let c = LexicalComparator::new();
        // tokens 3/7, keywords {blue} vs {blue, actually, green} = 1/3
        let expected = 0.6 * 3.0 / 7.0 + 0.4 / 3.0;
        assert!((c.similarity(BLUE, GREEN) - expected).abs() < 1e-9);
        assert_eq!(c.similarity(BLUE, GREEN), c.similarity(GREEN, BLUE));
    }

    #[test]
    fn test_disjoint_texts() {
        let c = LexicalComparator::new();
        assert_eq!(c.similarity("apples oranges", "rockets engines"), 0.0);
    }

    #[test]
    fn test_claims_require_claim_verbs() {
        let c = LexicalComparator::new();
        let claims = c.claims("Water is wet. Consider the options! Fire burns.");
        assert_eq!(claims, vec!["Water is wet".to_string()]);
        // "this" contains "is" but is not the word "is"
        assert!(c.claims("Look at this").is_empty());
    }

    #[test]
    fn test_factual_alignment_edges() {
        let c = LexicalComparator::new();
        assert_eq!(c.factual_alignment("Hello there", "Goodbye now"), 1.0);
        assert_eq!(c.factual_alignment(BLUE, "Hello there"), 0.0);
        assert_eq!(c.factual_alignment(BLUE, BLUE), 1.0);
        assert_eq!(c.factual_alignment(BLUE, GREEN), 0.0);
    }

    #[test]
    fn test_negation_contradiction() {
        let c = LexicalComparator::new();
        assert!(has_negation(GREEN));
        assert!(has_negation("It won't rain"));
        assert!(!has_negation(BLUE));
        assert!(c.contradicts(BLUE, GREEN));
        assert!(c.contradicts_any(GREEN, BLUE));
        assert!(!c.contradicts(BLUE, BLUE));
        assert!(!c.contradicts(BLUE, "The market is not open"));
    }

    #[test]
    fn test_self_contradiction_checks_adjacent_sentences() {
        let c = LexicalComparator::new();
        assert!(c.self_contradicts("The door is open. The door is not open."));
        assert!(!c.self_contradicts("The door is open. The window is closed."));
    }

    #[test]
    fn test_keywords_capped() {
        let text = "alpha bravo charlie delta echoes foxtrot golfer hotel india juliet kilos";
        assert_eq!(keywords(text).len(), MAX_KEYWORDS);
        assert!(!keywords(text).contains("kilos"));
    }
}
