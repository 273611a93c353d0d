//! Running session metrics.

use quorum_registry::{clamp_unit, BackendId, PersonaId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ACCURACY_PENALTY: f64 = 0.95;
const ACCURACY_REWARD: f64 = 1.01;
const PERFORMANCE_PENALTY: f64 = 0.98;
const PERFORMANCE_REWARD: f64 = 1.005;
const HEALTH_SMOOTHING: f64 = 0.5;

/// How one persona fared on one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub persona: PersonaId,
    /// Backend that produced the analyzed response.
    pub backend: BackendId,
    pub hallucinated: bool,
}

/// Counters and moving scores accumulated across prompts.
///
/// Every score lies in `[0, 1]` and starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMetrics {
    pub total_prompts: u64,
    pub hallucinations_detected: u64,
    pub corrections_applied: u64,
    /// Mean end-to-end processing time in milliseconds.
    pub average_processing_ms: f64,
    /// Exponentially smoothed share of non-hallucinating responses.
    pub system_health: f64,
    pub persona_accuracy: BTreeMap<PersonaId, f64>,
    pub backend_performance: BTreeMap<BackendId, f64>,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            total_prompts: 0,
            hallucinations_detected: 0,
            corrections_applied: 0,
            average_processing_ms: 0.0,
            system_health: 1.0,
            persona_accuracy: BTreeMap::new(),
            backend_performance: BTreeMap::new(),
        }
    }
}

impl SessionMetrics {
    /// Folds one processed prompt into the metrics.
    pub fn record(&mut self, observations: &[Observation], elapsed_ms: f64, corrections: usize) {
        self.total_prompts += 1;
        let n = self.total_prompts as f64;
        self.average_processing_ms += (elapsed_ms.max(0.0) - self.average_processing_ms) / n;

        let flagged = observations.iter().filter(|o| o.hallucinated).count();
        self.hallucinations_detected += flagged as u64;
        self.corrections_applied += corrections as u64;

        if !observations.is_empty() {
            let healthy = 1.0 - flagged as f64 / observations.len() as f64;
            self.system_health = clamp_unit(
                HEALTH_SMOOTHING * self.system_health + (1.0 - HEALTH_SMOOTHING) * healthy,
            );
        }

        for o in observations {
            let (accuracy, performance) = if o.hallucinated {
                (ACCURACY_PENALTY, PERFORMANCE_PENALTY)
            } else {
                (ACCURACY_REWARD, PERFORMANCE_REWARD)
            };
            let a = self.persona_accuracy.entry(o.persona.clone()).or_insert(1.0);
            *a = clamp_unit(*a * accuracy);
            let p = self.backend_performance.entry(o.backend.clone()).or_insert(1.0);
            *p = clamp_unit(*p * performance);
        }
    }

    /// Clamps every score into `[0, 1]`; used on imported snapshots.
    pub fn sanitize(&mut self) {
        self.system_health = clamp_unit(self.system_health);
        if !self.average_processing_ms.is_finite() || self.average_processing_ms < 0.0 {
            self.average_processing_ms = 0.0;
        }
        for v in self.persona_accuracy.values_mut() {
            *v = clamp_unit(*v);
        }
        for v in self.backend_performance.values_mut() {
            *v = clamp_unit(*v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(persona: &str, backend: &str, hallucinated: bool) -> Observation {
        Observation {
            persona: persona.into(),
            backend: backend.into(),
            hallucinated,
        }
    }

    #[test]
    fn test_record_updates() {
        let mut m = SessionMetrics::default();
        m.record(
            &[obs("a", "x", false), obs("b", "x", false), obs("c", "y", true)],
            300.0,
            1,
        );
        assert_eq!(m.total_prompts, 1);
        assert_eq!(m.hallucinations_detected, 1);
        assert_eq!(m.corrections_applied, 1);
        assert_eq!(m.average_processing_ms, 300.0);
        assert!((m.system_health - (0.5 + 0.5 * (2.0 / 3.0))).abs() < 1e-9);
        assert_eq!(m.persona_accuracy[&PersonaId::from("a")], 1.0);
        assert!((m.persona_accuracy[&PersonaId::from("c")] - 0.95).abs() < 1e-9);
        assert!((m.backend_performance[&BackendId::from("y")] - 0.98).abs() < 1e-9);

        m.record(&[obs("a", "x", false), obs("c", "y", false)], 100.0, 0);
        assert_eq!(m.average_processing_ms, 200.0);
        assert!((m.persona_accuracy[&PersonaId::from("c")] - 0.95 * 1.01).abs() < 1e-9);
    }

    #[test]
    fn test_scores_stay_in_bounds_over_many_events() {
        let mut m = SessionMetrics::default();
        for i in 0..1000 {
            let bad = i % 3 == 0 || (300..500).contains(&i);
            m.record(
                &[obs("a", "x", bad), obs("b", "y", !bad), obs("c", "x", i % 7 == 0)],
                (i % 50) as f64,
                usize::from(bad),
            );
            for v in m
                .persona_accuracy
                .values()
                .chain(m.backend_performance.values())
                .chain(std::iter::once(&m.system_health))
            {
                assert!((0.0..=1.0).contains(v), "score out of bounds: {v}");
            }
        }
        assert_eq!(m.total_prompts, 1000);
    }

    #[test]
    fn test_unbroken_hallucination_run_stays_non_negative() {
        let mut m = SessionMetrics::default();
        for _ in 0..1000 {
            m.record(&[obs("a", "x", true), obs("b", "x", true)], 10.0, 0);
        }
        let accuracy = m.persona_accuracy[&PersonaId::from("a")];
        let performance = m.backend_performance[&BackendId::from("x")];
        assert!((0.0..1e-3).contains(&accuracy));
        assert!((0.0..=1.0).contains(&performance));
        assert!((0.0..1e-3).contains(&m.system_health));
        assert_eq!(m.hallucinations_detected, 2000);
    }

    #[test]
    fn test_sanitize_clamps() {
        let mut m = SessionMetrics {
            system_health: 1.7,
            average_processing_ms: f64::NAN,
            ..Default::default()
        };
        m.persona_accuracy.insert("a".into(), -0.2);
        m.sanitize();
        assert_eq!(m.system_health, 1.0);
        assert_eq!(m.average_processing_ms, 0.0);
        assert_eq!(m.persona_accuracy[&PersonaId::from("a")], 0.0);
    }
}
