//! Per-persona learning log.
//!
//! Every correction attempt leaves a [`LearningEntry`] describing how far the
//! persona strayed and in what way. Entries are kept per persona in arrival
//! order and capped; the oldest entry is evicted first.

use chrono::{DateTime, Utc};
use quorum_council::{has_negation, ClaimExtractor, Severity};
use quorum_registry::{domain_keyword_density, PersonaId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

/// Density of domain keywords at which a deviation counts as domain-specific.
pub const DOMAIN_DENSITY_THRESHOLD: f64 = 0.1;

/// Default number of entries kept per persona.
pub const DEFAULT_LEARNING_CAPACITY: usize = 100;

/// What kind of mistake a learning entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LearningCategory {
    Factual,
    Logical,
    Contextual,
    DomainSpecific,
}

impl LearningCategory {
    /// Categorizes a deviation of `original` from `consensus`.
    ///
    /// Checked in order: a negation mismatch or contradicted claim is
    /// factual, a contradiction between adjacent own sentences is logical,
    /// dense domain vocabulary is domain-specific, anything else contextual.
    pub fn categorize(claims: &dyn ClaimExtractor, original: &str, consensus: &str) -> Self {
        if has_negation(original) != has_negation(consensus)
            || claims.contradicts_any(original, consensus)
        {
            LearningCategory::Factual
        } else if claims.self_contradicts(original) {
            LearningCategory::Logical
        } else if domain_keyword_density(original) >= DOMAIN_DENSITY_THRESHOLD {
            LearningCategory::DomainSpecific
        } else {
            LearningCategory::Contextual
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningCategory::Factual => "factual",
            LearningCategory::Logical => "logical",
            LearningCategory::Contextual => "contextual",
            LearningCategory::DomainSpecific => "domain-specific",
        }
    }
}

impl fmt::Display for LearningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded correction attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEntry {
    pub persona: PersonaId,
    pub deviation_score: f64,
    pub category: LearningCategory,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl LearningEntry {
    pub fn new(
        persona: PersonaId,
        deviation_score: f64,
        category: LearningCategory,
        severity: Severity,
    ) -> Self {
        Self {
            persona,
            deviation_score,
            category,
            severity,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate view over learning entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total: usize,
    pub by_persona: BTreeMap<PersonaId, usize>,
    pub by_category: BTreeMap<LearningCategory, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    /// Mean deviation score; 0 when empty.
    pub average_deviation: f64,
}

impl LearningStats {
    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LearningEntry>) -> Self {
        let mut stats = Self::default();
        let mut deviation_sum = 0.0;
        for entry in entries {
            stats.total += 1;
            deviation_sum += entry.deviation_score;
            *stats.by_persona.entry(entry.persona.clone()).or_default() += 1;
            *stats.by_category.entry(entry.category).or_default() += 1;
            *stats.by_severity.entry(entry.severity).or_default() += 1;
        }
        if stats.total > 0 {
            stats.average_deviation = deviation_sum / stats.total as f64;
        }
        stats
    }
}

/// Capped per-persona history of correction attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningLog {
    capacity: usize,
    entries: BTreeMap<PersonaId, VecDeque<LearningEntry>>,
}

impl Default for LearningLog {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_CAPACITY)
    }
}

impl LearningLog {
    /// Creates an empty log keeping `capacity` entries per persona (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the cap, evicting the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        for queue in self.entries.values_mut() {
            Self::evict(queue, self.capacity);
        }
    }

    /// Appends an entry under its persona.
    pub fn append(&mut self, entry: LearningEntry) {
        let queue = self.entries.entry(entry.persona.clone()).or_default();
        queue.push_back(entry);
        Self::evict(queue, self.capacity);
    }

    fn evict(queue: &mut VecDeque<LearningEntry>, capacity: usize) {
        while queue.len() > capacity {
            queue.pop_front();
        }
    }

    /// Entries for one persona, or all personas ordered by persona id.
    pub fn entries(&self, persona: Option<&PersonaId>) -> Vec<LearningEntry> {
        match persona {
            Some(id) => self
                .entries
                .get(id)
                .map(|q| q.iter().cloned().collect())
                .unwrap_or_default(),
            None => self.entries.values().flatten().cloned().collect(),
        }
    }

    /// Total entries across all personas.
    pub fn len(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears one persona's entries, or everything.
    pub fn clear(&mut self, persona: Option<&PersonaId>) {
        match persona {
            Some(id) => {
                self.entries.remove(id);
            }
            None => self.entries.clear(),
        }
    }

    /// Statistics for one persona, or across all personas.
    pub fn stats(&self, persona: Option<&PersonaId>) -> LearningStats {
        match persona {
            Some(id) => LearningStats::from_entries(self.entries.get(id).into_iter().flatten()),
            None => LearningStats::from_entries(self.entries.values().flatten()),
        }
    }

    /// Copies the log out as plain vectors.
    pub fn export(&self) -> BTreeMap<PersonaId, Vec<LearningEntry>> {
        self.entries
            .iter()
            .map(|(id, q)| (id.clone(), q.iter().cloned().collect()))
            .collect()
    }

    /// Replaces the log contents, keeping the newest entries within capacity.
    pub fn import(&mut self, entries: BTreeMap<PersonaId, Vec<LearningEntry>>) {
        let capacity = self.capacity;
        self.entries = entries
            .into_iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(id, list)| {
                let mut queue: VecDeque<_> = list.into();
                Self::evict(&mut queue, capacity);
                (id, queue)
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_council::LexicalComparator;

    fn entry(persona: &str, score: f64, category: LearningCategory) -> LearningEntry {
        LearningEntry::new(persona.into(), score, category, Severity::from_score(score))
    }

    #[test]
    fn test_categorize_order() {
        let c = LexicalComparator;
        assert_eq!(
            LearningCategory::categorize(&c, "The sky is not blue.", "The sky is blue."),
            LearningCategory::Factual
        );
        assert_eq!(
            LearningCategory::categorize(
                &c,
                "The door is open. The door is not open.",
                "We cannot know the weather tomorrow."
            ),
            LearningCategory::Logical
        );
        assert_eq!(
            LearningCategory::categorize(
                &c,
                "Rotate the encryption keys after every breach",
                "Plan the quarter carefully"
            ),
            LearningCategory::DomainSpecific
        );
        assert_eq!(
            LearningCategory::categorize(&c, "Cats like warm windowsills", "Dogs enjoy long walks"),
            LearningCategory::Contextual
        );
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = LearningLog::new(3);
        for i in 0..5 {
            log.append(entry("engineer", i as f64 / 10.0, LearningCategory::Contextual));
        }
        log.append(entry("scientist", 0.5, LearningCategory::Factual));

        let engineer = log.entries(Some(&"engineer".into()));
        assert_eq!(engineer.len(), 3);
        assert_eq!(engineer[0].deviation_score, 0.2);
        assert_eq!(engineer[2].deviation_score, 0.4);
        assert_eq!(log.len(), 4);

        log.set_capacity(1);
        assert_eq!(log.entries(Some(&"engineer".into()))[0].deviation_score, 0.4);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_stats() {
        let mut log = LearningLog::default();
        log.append(entry("engineer", 0.9, LearningCategory::Factual));
        log.append(entry("engineer", 0.5, LearningCategory::Logical));
        log.append(entry("counselor", 0.4, LearningCategory::Factual));

        let all = log.stats(None);
        assert_eq!(all.total, 3);
        assert_eq!(all.by_persona[&PersonaId::from("engineer")], 2);
        assert_eq!(all.by_category[&LearningCategory::Factual], 2);
        assert_eq!(all.by_severity[&Severity::Critical], 1);
        assert_eq!(all.by_severity[&Severity::Medium], 2);
        assert!((all.average_deviation - 0.6).abs() < 1e-9);

        let one = log.stats(Some(&"counselor".into()));
        assert_eq!(one.total, 1);
        assert_eq!(log.stats(Some(&"nobody".into())), LearningStats::default());
    }

    #[test]
    fn test_clear() {
        let mut log = LearningLog::default();
        log.append(entry("engineer", 0.5, LearningCategory::Factual));
        log.append(entry("guardian", 0.5, LearningCategory::Factual));

        log.clear(Some(&"engineer".into()));
        assert!(log.entries(Some(&"engineer".into())).is_empty());
        assert_eq!(log.len(), 1);

        log.clear(None);
        assert!(log.is_empty());
    }

    #[test]
    fn test_import_respects_capacity() {
        let mut source = LearningLog::new(10);
        for i in 0..6 {
            source.append(entry("engineer", i as f64 / 10.0, LearningCategory::Factual));
        }
        let mut target = LearningLog::new(4);
        target.import(source.export());
        let kept = target.entries(None);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].deviation_score, 0.2);
    }
}
