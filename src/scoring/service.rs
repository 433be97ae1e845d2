use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::calculator::{compute_scores, FallbackTally, ScoreBounds};
use super::domain::{
    ActionType, EntityPair, EscalationRecord, EscalationStatus, ScoreRecord, SignalId, Tier,
    TriggerRecord,
};
use super::registry::WeightRegistry;
use super::repository::{EngineStore, PairCommit, StoreError};
use super::tiers::TierTable;
use super::trigger::{apply_daily_cap, evaluate, TriggerDecision, TriggerInput, TriggerPolicy};

static TRIGGER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ESCALATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_trigger_id() -> String {
    let id = TRIGGER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("trg-{id:06}")
}

fn next_escalation_id() -> String {
    let id = ESCALATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("esc-{id:06}")
}

/// What one pair contributed to the run summary.
#[derive(Debug, Clone)]
pub struct PairReport {
    pub pair: EntityPair,
    pub tier: Tier,
    pub decayed_score: f64,
    pub signals_consumed: usize,
    pub fired: Option<ActionType>,
    pub suppressed_by_dedup: bool,
    pub cap_tripped: bool,
    pub fallbacks: FallbackTally,
}

/// Executes the read-compute-decide-persist cycle for one entity pair as a
/// single logical unit. Idempotency comes from recomputing over the entire
/// signal history every time; re-processing is self-correcting rather than
/// merely avoided.
pub struct PairProcessor<'a, S: EngineStore> {
    store: &'a S,
    registry: &'a WeightRegistry,
    tier_table: &'a TierTable,
    policy: TriggerPolicy,
    bounds: ScoreBounds,
}

impl<'a, S: EngineStore> PairProcessor<'a, S> {
    pub fn new(
        store: &'a S,
        registry: &'a WeightRegistry,
        tier_table: &'a TierTable,
        policy: TriggerPolicy,
        bounds: ScoreBounds,
    ) -> Self {
        Self {
            store,
            registry,
            tier_table,
            policy,
            bounds,
        }
    }

    pub fn process(&self, pair: &EntityPair, now: DateTime<Utc>) -> Result<PairReport, StoreError> {
        let history = self.store.history(pair)?;
        let computation = compute_scores(&history, self.registry, self.bounds, now);

        let previous = self.store.fetch(pair)?;
        let previous_score = previous.as_ref().map(|r| r.decayed_score).unwrap_or(0.0);
        let previous_tier = previous.as_ref().map(|r| r.tier);

        let accrued = self.store.accrued_increase(pair, now.date_naive())?;
        let capped = apply_daily_cap(
            previous_score,
            computation.decayed_score,
            accrued,
            self.policy.daily_increase_cap,
        );
        if capped.tripped {
            warn!(
                person = %pair.person.0,
                company = %pair.company.0,
                computed = computation.decayed_score,
                persisted = capped.score,
                cap = self.policy.daily_increase_cap,
                "daily score-increase cap tripped"
            );
        }

        let tier = self.tier_table.resolve(capped.score);
        let has_verified_contact = self.store.has_verified_channel(&pair.person)?;
        let recent = self
            .store
            .recent_triggers(pair, now - self.policy.dedup_window())?;

        let decision = evaluate(
            &TriggerInput {
                previous_tier,
                new_tier: tier,
                score: capped.score,
                has_verified_contact,
                recent_triggers: &recent,
                now,
            },
            self.tier_table,
            &self.policy,
        );

        let score = ScoreRecord {
            pair: pair.clone(),
            raw_score: computation.raw_score,
            decayed_score: capped.score,
            tier,
            last_signal_at: computation.last_signal_at,
            signal_count: computation.signal_count,
            computed_at: now,
            breakdown: computation.breakdown,
        };

        let mut fired = None;
        let mut suppressed_by_dedup = false;
        let mut trigger = None;
        let mut escalation = None;

        match decision {
            TriggerDecision::NoIncrease => {}
            TriggerDecision::Suppressed { action } => {
                suppressed_by_dedup = true;
                info!(
                    person = %pair.person.0,
                    company = %pair.company.0,
                    action = action.label(),
                    window_hours = self.policy.dedup_window_hours,
                    "trigger suppressed by dedup window"
                );
            }
            TriggerDecision::Fire(outcome) => {
                let mut metadata = BTreeMap::new();
                metadata.insert(
                    "previous_tier".to_string(),
                    previous_tier.unwrap_or(Tier::Cold).label().to_string(),
                );
                metadata.insert("new_tier".to_string(), tier.label().to_string());
                metadata.insert(
                    "auto_execute".to_string(),
                    self.tier_table.auto_execute(tier).to_string(),
                );
                if outcome.downgraded {
                    metadata.insert("downgraded".to_string(), "true".to_string());
                }

                info!(
                    person = %pair.person.0,
                    company = %pair.company.0,
                    action = outcome.action.label(),
                    priority = outcome.priority.label(),
                    tier = tier.label(),
                    "trigger fired"
                );

                if outcome.enqueue_escalation {
                    escalation = Some(EscalationRecord {
                        id: next_escalation_id(),
                        pair: pair.clone(),
                        priority: outcome.priority,
                        status: EscalationStatus::Pending,
                        created_at: now,
                    });
                }

                fired = Some(outcome.action);
                trigger = Some(TriggerRecord {
                    id: next_trigger_id(),
                    pair: pair.clone(),
                    action: outcome.action,
                    priority: outcome.priority,
                    score: capped.score,
                    tier,
                    reason: outcome.reason,
                    metadata,
                    created_at: now,
                    processed: false,
                });
            }
        }

        let consumed_signal_ids: Vec<SignalId> = history
            .iter()
            .filter(|signal| !signal.consumed)
            .map(|signal| signal.id.clone())
            .collect();
        let signals_consumed = consumed_signal_ids.len();

        self.store.commit(PairCommit {
            score,
            trigger,
            escalation,
            consumed_signal_ids,
            increase_recorded: capped.increase,
        })?;

        Ok(PairReport {
            pair: pair.clone(),
            tier,
            decayed_score: capped.score,
            signals_consumed,
            fired,
            suppressed_by_dedup,
            cap_tripped: capped.tripped,
            fallbacks: computation.fallbacks,
        })
    }
}
