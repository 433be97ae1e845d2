use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::scoring::domain::{
    EntityPair, PersonId, Signal, SignalDetail, SignalId, SignalType,
};
use crate::scoring::memory::MemoryStore;
use crate::scoring::registry::{RegistryDefaults, RegistryTables, WeightRegistry};
use crate::scoring::repository::{
    ContactDirectory, PairCommit, RuleStore, ScoreStore, SignalStore, StoreError,
};
use crate::scoring::runner::ScoringSettings;

/// Fixed evaluation instant so decay arithmetic stays reproducible.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0)
        .single()
        .expect("valid fixture instant")
}

pub(super) fn pair(person: &str, company: &str) -> EntityPair {
    EntityPair::new(person, company)
}

pub(super) fn signal(
    id: &str,
    pair: &EntityPair,
    signal_type: &str,
    source: &str,
    age_days: i64,
) -> Signal {
    Signal {
        id: SignalId(id.to_string()),
        person: pair.person.clone(),
        company: pair.company.clone(),
        signal_type: SignalType::new(signal_type),
        source: source.to_string(),
        detail: SignalDetail::Custom {
            value: None,
            fields: BTreeMap::new(),
        },
        occurred_at: now() - Duration::days(age_days),
        consumed: false,
    }
}

pub(super) fn signal_with_value(
    id: &str,
    pair: &EntityPair,
    signal_type: &str,
    source: &str,
    age_days: i64,
    value: f64,
) -> Signal {
    let mut built = signal(id, pair, signal_type, source, age_days);
    built.detail = SignalDetail::Custom {
        value: Some(value),
        fields: BTreeMap::new(),
    };
    built
}

pub(super) fn registry() -> WeightRegistry {
    WeightRegistry::standard(RegistryDefaults::default()).expect("standard tables validate")
}

pub(super) fn settings() -> ScoringSettings {
    ScoringSettings::default()
}

/// The three signals from the worked example: promotion via enrichment
/// (age 5), email open via CRM (age 10), demo request via web form (age 2).
/// Decayed score 209, raw 180.
pub(super) fn example_signals(pair: &EntityPair) -> Vec<Signal> {
    vec![
        Signal {
            id: SignalId("sig-promo".to_string()),
            person: pair.person.clone(),
            company: pair.company.clone(),
            signal_type: SignalType::new("promotion"),
            source: "enrichment_api".to_string(),
            detail: SignalDetail::Promotion {
                new_title: "VP of Operations".to_string(),
            },
            occurred_at: now() - Duration::days(5),
            consumed: false,
        },
        Signal {
            id: SignalId("sig-open".to_string()),
            person: pair.person.clone(),
            company: pair.company.clone(),
            signal_type: SignalType::new("email_open"),
            source: "crm".to_string(),
            detail: SignalDetail::EmailEngagement {
                campaign: "q3-nurture".to_string(),
                action: crate::scoring::domain::EmailAction::Open,
            },
            occurred_at: now() - Duration::days(10),
            consumed: false,
        },
        Signal {
            id: SignalId("sig-demo".to_string()),
            person: pair.person.clone(),
            company: pair.company.clone(),
            signal_type: SignalType::new("demo_request"),
            source: "web_form".to_string(),
            detail: SignalDetail::DemoRequest {
                form: "pricing-page".to_string(),
            },
            occurred_at: now() - Duration::days(2),
            consumed: false,
        },
    ]
}

pub(super) fn seeded_store(signals: Vec<Signal>) -> MemoryStore {
    let store = MemoryStore::new();
    for signal in signals {
        store.append(signal).expect("fixture signals are unique");
    }
    store
}

/// Rule store that always fails, exercising the abort-before-processing
/// contract.
pub(super) struct UnavailableRuleStore;

impl RuleStore for UnavailableRuleStore {
    fn load(&self) -> Result<RegistryTables, StoreError> {
        Err(StoreError::Unavailable("rules database offline".to_string()))
    }
}

/// Store wrapper that fails history reads for one pair so runner tests can
/// prove per-pair isolation.
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    pub(super) fail_pair: EntityPair,
}

impl SignalStore for FlakyStore {
    fn append(&self, signal: Signal) -> Result<Signal, StoreError> {
        self.inner.append(signal)
    }

    fn unconsumed_pairs(&self, since: DateTime<Utc>) -> Result<Vec<EntityPair>, StoreError> {
        self.inner.unconsumed_pairs(since)
    }

    fn history(&self, pair: &EntityPair) -> Result<Vec<Signal>, StoreError> {
        if pair == &self.fail_pair {
            return Err(StoreError::Unavailable("transient read failure".to_string()));
        }
        self.inner.history(pair)
    }
}

impl ScoreStore for FlakyStore {
    fn fetch(
        &self,
        pair: &EntityPair,
    ) -> Result<Option<crate::scoring::domain::ScoreRecord>, StoreError> {
        self.inner.fetch(pair)
    }

    fn recent_triggers(
        &self,
        pair: &EntityPair,
        since: DateTime<Utc>,
    ) -> Result<Vec<crate::scoring::domain::TriggerRecord>, StoreError> {
        self.inner.recent_triggers(pair, since)
    }

    fn accrued_increase(
        &self,
        pair: &EntityPair,
        day: chrono::NaiveDate,
    ) -> Result<f64, StoreError> {
        self.inner.accrued_increase(pair, day)
    }

    fn commit(&self, commit: PairCommit) -> Result<(), StoreError> {
        self.inner.commit(commit)
    }

    fn open_triggers(&self) -> Result<Vec<crate::scoring::domain::TriggerRecord>, StoreError> {
        self.inner.open_triggers()
    }

    fn mark_trigger_processed(&self, trigger_id: &str) -> Result<(), StoreError> {
        self.inner.mark_trigger_processed(trigger_id)
    }

    fn pending_escalations(
        &self,
    ) -> Result<Vec<crate::scoring::domain::EscalationRecord>, StoreError> {
        self.inner.pending_escalations()
    }

    fn update_escalation_status(
        &self,
        escalation_id: &str,
        status: crate::scoring::domain::EscalationStatus,
    ) -> Result<(), StoreError> {
        self.inner.update_escalation_status(escalation_id, status)
    }
}

impl ContactDirectory for FlakyStore {
    fn has_verified_channel(&self, person: &PersonId) -> Result<bool, StoreError> {
        self.inner.has_verified_channel(person)
    }
}
