use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use super::domain::{
    ContactChannel, EntityPair, EscalationRecord, EscalationStatus, PersonId, ScoreRecord, Signal,
    TriggerRecord,
};
use super::repository::{ContactDirectory, PairCommit, ScoreStore, SignalStore, StoreError};

#[derive(Default)]
struct MemoryState {
    signals: Vec<Signal>,
    scores: HashMap<EntityPair, ScoreRecord>,
    triggers: Vec<TriggerRecord>,
    escalations: Vec<EscalationRecord>,
    daily_increases: HashMap<(EntityPair, NaiveDate), f64>,
    contacts: HashMap<PersonId, Vec<(ContactChannel, bool)>>,
}

/// Mutex-protected store backing the serve mode and the test suites. The
/// single lock makes each commit atomic, which is the contract the
/// idempotency guard relies on.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, person: PersonId, channel: ContactChannel, verified: bool) {
        let mut state = self.lock();
        state
            .contacts
            .entry(person)
            .or_default()
            .push((channel, verified));
    }

    /// All stored signals, consumed or not; retained for audit.
    pub fn signals(&self) -> Vec<Signal> {
        self.lock().signals.clone()
    }

    pub fn triggers(&self) -> Vec<TriggerRecord> {
        self.lock().triggers.clone()
    }

    pub fn escalations(&self) -> Vec<EscalationRecord> {
        self.lock().escalations.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().expect("memory store mutex poisoned")
    }
}

impl SignalStore for MemoryStore {
    fn append(&self, signal: Signal) -> Result<Signal, StoreError> {
        let mut state = self.lock();
        if state.signals.iter().any(|existing| existing.id == signal.id) {
            return Err(StoreError::Conflict);
        }
        state.signals.push(signal.clone());
        Ok(signal)
    }

    fn unconsumed_pairs(&self, since: DateTime<Utc>) -> Result<Vec<EntityPair>, StoreError> {
        let state = self.lock();
        let pairs: BTreeSet<EntityPair> = state
            .signals
            .iter()
            .filter(|signal| !signal.consumed && signal.occurred_at >= since)
            .map(Signal::pair)
            .collect();
        Ok(pairs.into_iter().collect())
    }

    fn history(&self, pair: &EntityPair) -> Result<Vec<Signal>, StoreError> {
        let state = self.lock();
        let mut history: Vec<Signal> = state
            .signals
            .iter()
            .filter(|signal| signal.person == pair.person && signal.company == pair.company)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(history)
    }
}

impl ScoreStore for MemoryStore {
    fn fetch(&self, pair: &EntityPair) -> Result<Option<ScoreRecord>, StoreError> {
        Ok(self.lock().scores.get(pair).cloned())
    }

    fn recent_triggers(
        &self,
        pair: &EntityPair,
        since: DateTime<Utc>,
    ) -> Result<Vec<TriggerRecord>, StoreError> {
        let state = self.lock();
        let mut recent: Vec<TriggerRecord> = state
            .triggers
            .iter()
            .filter(|record| &record.pair == pair && record.created_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recent)
    }

    fn accrued_increase(&self, pair: &EntityPair, day: NaiveDate) -> Result<f64, StoreError> {
        let state = self.lock();
        Ok(state
            .daily_increases
            .get(&(pair.clone(), day))
            .copied()
            .unwrap_or(0.0))
    }

    fn commit(&self, commit: PairCommit) -> Result<(), StoreError> {
        let mut state = self.lock();

        let day = commit.score.computed_at.date_naive();
        let pair = commit.score.pair.clone();

        state.scores.insert(pair.clone(), commit.score);
        if let Some(trigger) = commit.trigger {
            state.triggers.push(trigger);
        }
        if let Some(escalation) = commit.escalation {
            state.escalations.push(escalation);
        }

        let consumed: BTreeSet<_> = commit.consumed_signal_ids.into_iter().collect();
        for signal in &mut state.signals {
            if consumed.contains(&signal.id) {
                signal.consumed = true;
            }
        }

        if commit.increase_recorded > 0.0 {
            *state.daily_increases.entry((pair, day)).or_insert(0.0) += commit.increase_recorded;
        }

        Ok(())
    }

    fn open_triggers(&self) -> Result<Vec<TriggerRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .triggers
            .iter()
            .filter(|record| !record.processed)
            .cloned()
            .collect())
    }

    fn mark_trigger_processed(&self, trigger_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let record = state
            .triggers
            .iter_mut()
            .find(|record| record.id == trigger_id)
            .ok_or(StoreError::NotFound)?;
        record.processed = true;
        Ok(())
    }

    fn pending_escalations(&self) -> Result<Vec<EscalationRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .escalations
            .iter()
            .filter(|record| record.status == EscalationStatus::Pending)
            .cloned()
            .collect())
    }

    fn update_escalation_status(
        &self,
        escalation_id: &str,
        status: EscalationStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let record = state
            .escalations
            .iter_mut()
            .find(|record| record.id == escalation_id)
            .ok_or(StoreError::NotFound)?;
        record.status = status;
        Ok(())
    }
}

impl ContactDirectory for MemoryStore {
    fn has_verified_channel(&self, person: &PersonId) -> Result<bool, StoreError> {
        let state = self.lock();
        Ok(state
            .contacts
            .get(person)
            .map(|channels| channels.iter().any(|(_, verified)| *verified))
            .unwrap_or(false))
    }
}
