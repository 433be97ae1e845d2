//! Buyer-intent scoring: signal aggregation, time decay, tier resolution,
//! and rate-limited trigger evaluation for (person, company) pairs.

pub mod calculator;
pub mod domain;
pub mod import;
pub mod memory;
pub mod registry;
pub mod repository;
pub mod router;
pub mod runner;
pub mod service;
pub mod tiers;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use calculator::{compute_scores, FallbackTally, ScoreBounds, ScoreComputation};
pub use memory::MemoryStore;

pub use domain::{
    ActionPriority, ActionType, CompanyId, ContactChannel, EmailAction, EntityPair,
    EscalationRecord, EscalationStatus, PersonId, ScoreRecord, Signal, SignalContribution,
    SignalDetail, SignalId, SignalType, Tier, TriggerRecord,
};
pub use registry::{
    ConfidenceModifier, DecayRule, FileRuleStore, RegistryDefaults, RegistryError, RegistryTables,
    StandardRuleStore, WeightEntry, WeightRegistry,
};
pub use repository::{
    ContactDirectory, EngineStore, PairCommit, RuleStore, ScoreStore, SignalStore, StoreError,
};
pub use router::{scoring_router, EngineState, EscalationStatusUpdate, SignalSubmission};
pub use runner::{BatchRunner, EngineError, PairFailure, RunSummary, ScoringSettings};
pub use service::{PairProcessor, PairReport};
pub use tiers::{TierBand, TierConfigError, TierTable};
pub use trigger::{apply_daily_cap, evaluate, CappedScore, TriggerDecision, TriggerPolicy};
