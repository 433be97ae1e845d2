use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ActionPriority, ActionType, Tier, TriggerRecord};
use super::tiers::TierTable;

/// Escalation-control knobs: minimum time between repeated firings of the
/// same action for a pair, and the per-day ceiling on decayed-score gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerPolicy {
    pub dedup_window_hours: i64,
    pub daily_increase_cap: f64,
}

impl Default for TriggerPolicy {
    /// The cap default leaves room for a strong first day (a demo request
    /// plus a promotion and more) while still bounding runaway streams.
    fn default() -> Self {
        Self {
            dedup_window_hours: 72,
            daily_increase_cap: 500.0,
        }
    }
}

impl TriggerPolicy {
    pub fn dedup_window(&self) -> Duration {
        Duration::hours(self.dedup_window_hours)
    }
}

/// Result of clipping a recomputed score against the daily increase cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CappedScore {
    /// Score to persist, clipped so today's cumulative increase never
    /// exceeds the cap.
    pub score: f64,
    /// Increase to record against today's ledger.
    pub increase: f64,
    pub tripped: bool,
}

/// Clip the decayed-score delta so the pair's cumulative increase for the
/// day stays within the cap. Decreases pass through untouched and record no
/// increase.
pub fn apply_daily_cap(
    previous_score: f64,
    computed_score: f64,
    accrued_today: f64,
    cap: f64,
) -> CappedScore {
    let increase = computed_score - previous_score;
    if increase <= 0.0 {
        return CappedScore {
            score: computed_score,
            increase: 0.0,
            tripped: false,
        };
    }

    let remaining = (cap - accrued_today).max(0.0);
    if increase > remaining {
        CappedScore {
            score: previous_score + remaining,
            increase: remaining,
            tripped: true,
        }
    } else {
        CappedScore {
            score: computed_score,
            increase,
            tripped: false,
        }
    }
}

/// Everything the transition decision needs; assembled by the persistence
/// guard, evaluated without side effects.
#[derive(Debug, Clone)]
pub struct TriggerInput<'a> {
    /// Tier stored before this batch; a pair seen for the first time starts
    /// from an implicit cold baseline.
    pub previous_tier: Option<Tier>,
    pub new_tier: Tier,
    pub score: f64,
    pub has_verified_contact: bool,
    /// Fired triggers for the pair, as returned by the store.
    pub recent_triggers: &'a [TriggerRecord],
    pub now: DateTime<Utc>,
}

/// Outcome of the tier-transition state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerDecision {
    /// New tier is at or below the previous one; the score still persists.
    NoIncrease,
    /// Same action fired for this pair within the dedup window.
    Suppressed { action: ActionType },
    Fire(FiredAction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiredAction {
    pub action: ActionType,
    pub priority: ActionPriority,
    pub reason: String,
    pub downgraded: bool,
    pub enqueue_escalation: bool,
}

/// Decide whether a tier transition emits an action. Only increases fire;
/// escalate/auto-schedule require a verified contact channel and otherwise
/// downgrade to watch with the reason recorded.
pub fn evaluate(input: &TriggerInput<'_>, table: &TierTable, policy: &TriggerPolicy) -> TriggerDecision {
    let previous = input.previous_tier.unwrap_or(Tier::Cold);
    if input.new_tier <= previous {
        return TriggerDecision::NoIncrease;
    }

    let mapped = table.action_for(input.new_tier);
    if mapped == ActionType::Ignore {
        return TriggerDecision::NoIncrease;
    }

    let needs_contact = matches!(mapped, ActionType::Escalate | ActionType::AutoSchedule);
    let (action, downgraded, precondition_note) = if needs_contact && !input.has_verified_contact {
        (
            ActionType::Watch,
            true,
            format!(
                "; downgraded from {} (no verified contact channel on file)",
                mapped.label()
            ),
        )
    } else {
        (mapped, false, String::new())
    };

    let window = policy.dedup_window();
    let duplicate = input
        .recent_triggers
        .iter()
        .any(|record| record.action == action && input.now - record.created_at <= window);
    if duplicate {
        return TriggerDecision::Suppressed { action };
    }

    let reason = format!(
        "tier increased from {} to {} at score {:.1}{}",
        previous.label(),
        input.new_tier.label(),
        input.score,
        precondition_note
    );

    TriggerDecision::Fire(FiredAction {
        action,
        priority: TierTable::priority_for(input.new_tier),
        reason,
        downgraded,
        enqueue_escalation: input.new_tier == Tier::Burning && !downgraded,
    })
}
