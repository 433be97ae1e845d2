use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    EntityPair, EscalationRecord, EscalationStatus, PersonId, ScoreRecord, Signal, SignalId,
    TriggerRecord,
};
use super::registry::RegistryTables;

/// Error enumeration for store failures. `Unavailable` during registry load
/// is fatal for the run; anywhere else it is a per-pair recoverable.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Inbound signal table. Producers append at any time, independent of the
/// engine's run cadence; the engine only ever reads.
pub trait SignalStore: Send + Sync {
    fn append(&self, signal: Signal) -> Result<Signal, StoreError>;

    /// Pairs with at least one unconsumed signal newer than `since`.
    fn unconsumed_pairs(&self, since: DateTime<Utc>) -> Result<Vec<EntityPair>, StoreError>;

    /// Complete lifetime history for one pair, consumed signals included.
    /// Decay and totals must reflect everything ever seen, not just the
    /// current batch.
    fn history(&self, pair: &EntityPair) -> Result<Vec<Signal>, StoreError>;
}

/// Everything the per-pair commit writes in one atomic unit: the upserted
/// score, any fired trigger/escalation, the consumed-flag updates, and the
/// day's accrued score increase. A crash must never apply these partially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCommit {
    pub score: ScoreRecord,
    pub trigger: Option<TriggerRecord>,
    pub escalation: Option<EscalationRecord>,
    pub consumed_signal_ids: Vec<SignalId>,
    pub increase_recorded: f64,
}

/// Score, trigger, and escalation tables plus the per-day increase ledger.
pub trait ScoreStore: Send + Sync {
    fn fetch(&self, pair: &EntityPair) -> Result<Option<ScoreRecord>, StoreError>;

    /// Fired triggers for a pair since the given instant, newest first.
    /// Suppressed actions are never recorded, so this is exactly the dedup
    /// history.
    fn recent_triggers(
        &self,
        pair: &EntityPair,
        since: DateTime<Utc>,
    ) -> Result<Vec<TriggerRecord>, StoreError>;

    /// Cumulative decayed-score increase already recorded for the pair on
    /// the given day, consulted by the daily cap.
    fn accrued_increase(&self, pair: &EntityPair, day: NaiveDate) -> Result<f64, StoreError>;

    /// Apply one pair's results atomically.
    fn commit(&self, commit: PairCommit) -> Result<(), StoreError>;

    /// Trigger records not yet picked up by the outbound-action consumer.
    fn open_triggers(&self) -> Result<Vec<TriggerRecord>, StoreError>;

    /// Mark a trigger as handled downstream.
    fn mark_trigger_processed(&self, trigger_id: &str) -> Result<(), StoreError>;

    /// Pending escalation queue entries for the meeting-scheduling consumer.
    fn pending_escalations(&self) -> Result<Vec<EscalationRecord>, StoreError>;

    /// Advance an escalation's lifecycle as reported by the scheduling
    /// consumer.
    fn update_escalation_status(
        &self,
        escalation_id: &str,
        status: EscalationStatus,
    ) -> Result<(), StoreError>;
}

/// Contact channels on file, checked by escalate/auto-schedule
/// preconditions.
pub trait ContactDirectory: Send + Sync {
    fn has_verified_channel(&self, person: &PersonId) -> Result<bool, StoreError>;
}

/// Source of the three lookup tables; reloaded once per run so table edits
/// are picked up without a restart. A load failure aborts the run.
pub trait RuleStore: Send + Sync {
    fn load(&self) -> Result<RegistryTables, StoreError>;
}

/// Helper bound for components that need the whole store surface.
pub trait EngineStore: SignalStore + ScoreStore + ContactDirectory {}

impl<T: SignalStore + ScoreStore + ContactDirectory> EngineStore for T {}
