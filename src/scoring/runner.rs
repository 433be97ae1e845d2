use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::calculator::ScoreBounds;
use super::registry::{RegistryDefaults, RegistryError, WeightRegistry};
use super::repository::{EngineStore, RuleStore, StoreError};
use super::service::PairProcessor;
use super::tiers::{TierConfigError, TierTable};
use super::trigger::TriggerPolicy;

/// Knobs governing one batch cycle; everything here is configuration.
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    /// Discovery window for unconsumed signals, in days.
    pub lookback_days: i64,
    /// Soft per-run budget; once exceeded the runner stops pulling new
    /// pairs but lets the in-flight pair finish.
    pub run_budget: Option<std::time::Duration>,
    pub policy: TriggerPolicy,
    pub bounds: ScoreBounds,
    pub defaults: RegistryDefaults,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            run_budget: None,
            policy: TriggerPolicy::default(),
            bounds: ScoreBounds::default(),
            defaults: RegistryDefaults::default(),
        }
    }
}

/// Fatal conditions that abort a run before or during pair discovery.
/// Per-pair failures never surface here; they land in the summary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to load scoring rules: {0}")]
    Rules(#[source] StoreError),
    #[error("invalid registry tables: {0}")]
    Registry(#[from] RegistryError),
    #[error("invalid tier configuration: {0}")]
    TierConfig(#[from] TierConfigError),
    #[error("signal store unreachable: {0}")]
    Store(#[source] StoreError),
}

/// A pair that failed to compute or persist; retried on the next run since
/// its signals stay unconsumed.
#[derive(Debug, Clone, Serialize)]
pub struct PairFailure {
    pub person: String,
    pub company: String,
    pub error: String,
}

/// Structured account of one execution cycle, the single source of truth
/// for what happened.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pairs_discovered: usize,
    pub pairs_scored: usize,
    pub pairs_failed: usize,
    pub pairs_skipped: usize,
    pub signals_consumed: usize,
    pub triggers_fired: usize,
    pub triggers_suppressed: usize,
    pub cap_trips: usize,
    pub unknown_type_signals: usize,
    pub unknown_source_signals: usize,
    pub errors: Vec<PairFailure>,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            pairs_discovered = self.pairs_discovered,
            pairs_scored = self.pairs_scored,
            pairs_failed = self.pairs_failed,
            pairs_skipped = self.pairs_skipped,
            signals_consumed = self.signals_consumed,
            triggers_fired = self.triggers_fired,
            triggers_suppressed = self.triggers_suppressed,
            cap_trips = self.cap_trips,
            "scoring run finished"
        );
        if self.unknown_type_signals > 0 || self.unknown_source_signals > 0 {
            warn!(
                unknown_types = self.unknown_type_signals,
                unknown_sources = self.unknown_source_signals,
                "signals resolved through registry fallbacks"
            );
        }
    }
}

/// Orchestrates one execution cycle: snapshot the rules, discover pairs
/// from unconsumed signals, drive the per-pair processor, and collect the
/// run summary. Pairs are independent units of work; one pair's failure
/// never aborts the run.
pub struct BatchRunner<'a, S: EngineStore, R: RuleStore> {
    store: &'a S,
    rules: &'a R,
    settings: &'a ScoringSettings,
}

impl<'a, S: EngineStore, R: RuleStore> BatchRunner<'a, S, R> {
    pub fn new(store: &'a S, rules: &'a R, settings: &'a ScoringSettings) -> Self {
        Self {
            store,
            rules,
            settings,
        }
    }

    pub fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, EngineError> {
        let clock = std::time::Instant::now();

        // A partial or default-weight run would produce silently wrong
        // scores, so rule loading failures abort before any pair is touched.
        let tables = self.rules.load().map_err(EngineError::Rules)?;
        let tier_bands = tables.tier_bands.clone();
        let registry = WeightRegistry::from_tables(tables, self.settings.defaults)?;
        let tier_table = match tier_bands {
            Some(bands) => TierTable::new(bands, self.settings.bounds.floor)?,
            None => TierTable::standard(),
        };

        let since = now - Duration::days(self.settings.lookback_days);
        let pairs = self.store.unconsumed_pairs(since).map_err(EngineError::Store)?;

        let processor = PairProcessor::new(
            self.store,
            &registry,
            &tier_table,
            self.settings.policy,
            self.settings.bounds,
        );

        let mut summary = RunSummary {
            started_at: now,
            finished_at: now,
            pairs_discovered: pairs.len(),
            pairs_scored: 0,
            pairs_failed: 0,
            pairs_skipped: 0,
            signals_consumed: 0,
            triggers_fired: 0,
            triggers_suppressed: 0,
            cap_trips: 0,
            unknown_type_signals: 0,
            unknown_source_signals: 0,
            errors: Vec::new(),
        };

        for (index, pair) in pairs.iter().enumerate() {
            if let Some(budget) = self.settings.run_budget {
                if clock.elapsed() > budget {
                    summary.pairs_skipped = pairs.len() - index;
                    warn!(
                        skipped = summary.pairs_skipped,
                        "run budget exceeded, leaving remaining pairs for the next cycle"
                    );
                    break;
                }
            }

            match processor.process(pair, now) {
                Ok(report) => {
                    summary.pairs_scored += 1;
                    summary.signals_consumed += report.signals_consumed;
                    if report.fired.is_some() {
                        summary.triggers_fired += 1;
                    }
                    if report.suppressed_by_dedup {
                        summary.triggers_suppressed += 1;
                    }
                    if report.cap_tripped {
                        summary.cap_trips += 1;
                    }
                    summary.unknown_type_signals += report.fallbacks.unknown_types;
                    summary.unknown_source_signals += report.fallbacks.unknown_sources;
                }
                Err(err) => {
                    summary.pairs_failed += 1;
                    error!(
                        person = %pair.person.0,
                        company = %pair.company.0,
                        error = %err,
                        "pair processing failed, signals left unconsumed for retry"
                    );
                    summary.errors.push(PairFailure {
                        person: pair.person.0.clone(),
                        company: pair.company.0.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        summary.finished_at = Utc::now();
        summary.log();
        Ok(summary)
    }
}
