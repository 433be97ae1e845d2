use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Signal, SignalContribution};
use super::registry::WeightRegistry;

/// Floor/ceiling applied to both scores after summation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self {
            floor: 0.0,
            ceiling: 1000.0,
        }
    }
}

impl ScoreBounds {
    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.floor, self.ceiling)
    }
}

/// Signals that resolved through a registry fallback, reported once per run
/// as data-quality warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FallbackTally {
    pub unknown_types: usize,
    pub unknown_sources: usize,
}

/// Output of one pair computation: both scores, the audit breakdown, and
/// fallback counts. Deterministic for a fixed history, registry snapshot,
/// and `as_of` instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComputation {
    pub raw_score: f64,
    pub decayed_score: f64,
    pub signal_count: usize,
    pub last_signal_at: Option<DateTime<Utc>>,
    pub breakdown: Vec<SignalContribution>,
    pub fallbacks: FallbackTally,
}

/// Compute raw and decayed scores over a pair's complete signal history.
///
/// Per signal: `contribution = weight(type) x value x confidence(source) x
/// decay(type, age)`. The raw score forces confidence and decay to 1.0.
/// Signals dated in the future relative to `as_of` are treated as age zero.
pub fn compute_scores(
    signals: &[Signal],
    registry: &WeightRegistry,
    bounds: ScoreBounds,
    as_of: DateTime<Utc>,
) -> ScoreComputation {
    let mut raw_total = 0.0_f64;
    let mut decayed_total = 0.0_f64;
    let mut breakdown = Vec::with_capacity(signals.len());
    let mut fallbacks = FallbackTally::default();
    let mut last_signal_at: Option<DateTime<Utc>> = None;

    for signal in signals {
        let weight = registry.weight_for(&signal.signal_type);
        let value = signal.detail.value();
        let confidence = registry.confidence_for(&signal.source);
        let age_days = (as_of - signal.occurred_at).num_days().max(0);
        let decay = registry.decay_for(&signal.signal_type, age_days);

        if !registry.knows_type(&signal.signal_type) {
            fallbacks.unknown_types += 1;
        }
        if !registry.knows_source(&signal.source) {
            fallbacks.unknown_sources += 1;
        }

        let contribution = f64::from(weight) * value * confidence * decay;
        raw_total += f64::from(weight) * value;
        decayed_total += contribution;

        breakdown.push(SignalContribution {
            signal_id: signal.id.clone(),
            signal_type: signal.signal_type.clone(),
            source: signal.source.clone(),
            weight,
            value,
            confidence,
            decay,
            contribution,
        });

        last_signal_at = match last_signal_at {
            Some(latest) if latest >= signal.occurred_at => Some(latest),
            _ => Some(signal.occurred_at),
        };
    }

    ScoreComputation {
        raw_score: bounds.clamp(raw_total),
        decayed_score: bounds.clamp(decayed_total),
        signal_count: signals.len(),
        last_signal_at,
        breakdown,
        fallbacks,
    }
}
