use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::domain::SignalType;
use super::repository::{RuleStore, StoreError};
use super::tiers::TierBand;

/// Maps a signal type to an integer weight. Inactive entries disable the
/// type (weight 0); unknown types fall back to the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub signal_type: SignalType,
    pub weight: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Maps an age threshold (days) to a multiplicative decay factor, optionally
/// scoped to a subset of signal types. Absence of scope means the rule
/// applies to all types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayRule {
    pub name: String,
    pub max_age_days: i64,
    pub factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<BTreeSet<SignalType>>,
}

impl DecayRule {
    fn covers(&self, signal_type: &SignalType) -> bool {
        match &self.applies_to {
            Some(scope) => scope.contains(signal_type),
            None => true,
        }
    }
}

/// Maps a data source name to a trust multiplier in [0, 2].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceModifier {
    pub source: String,
    pub multiplier: f64,
}

/// Fallback constants applied when a signal references an unknown type or
/// source. Data-quality warnings, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistryDefaults {
    pub default_weight: i32,
    pub fallback_confidence: f64,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            default_weight: 40,
            fallback_confidence: 0.5,
        }
    }
}

/// Raw lookup tables as loaded from the rule store, before validation. The
/// optional tier bands let a rules file override the standard band table;
/// they are re-validated on every run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistryTables {
    pub weights: Vec<WeightEntry>,
    pub decay_rules: Vec<DecayRule>,
    pub confidence: Vec<ConfidenceModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_bands: Option<Vec<TierBand>>,
}

impl RegistryTables {
    /// Documented default tables used when no rules file is configured.
    pub fn standard() -> Self {
        let weight = |signal_type: &str, weight: i32| WeightEntry {
            signal_type: SignalType::new(signal_type),
            weight,
            active: true,
        };

        Self {
            weights: vec![
                weight("promotion", 70),
                weight("email_open", 10),
                weight("email_click", 20),
                weight("email_reply", 45),
                weight("page_visit", 15),
                weight("demo_request", 100),
                weight("funding_round", 60),
            ],
            decay_rules: vec![
                DecayRule {
                    name: "fresh".to_string(),
                    max_age_days: 7,
                    factor: 1.0,
                    applies_to: None,
                },
                DecayRule {
                    name: "recent".to_string(),
                    max_age_days: 14,
                    factor: 0.85,
                    applies_to: None,
                },
                DecayRule {
                    name: "aging".to_string(),
                    max_age_days: 30,
                    factor: 0.6,
                    applies_to: None,
                },
                DecayRule {
                    name: "stale".to_string(),
                    max_age_days: 90,
                    factor: 0.3,
                    applies_to: None,
                },
                DecayRule {
                    name: "ancient".to_string(),
                    max_age_days: 3650,
                    factor: 0.1,
                    applies_to: None,
                },
            ],
            confidence: vec![
                ConfidenceModifier {
                    source: "crm".to_string(),
                    multiplier: 1.0,
                },
                ConfidenceModifier {
                    source: "enrichment_api".to_string(),
                    multiplier: 1.15,
                },
                ConfidenceModifier {
                    source: "product_telemetry".to_string(),
                    multiplier: 1.2,
                },
                ConfidenceModifier {
                    source: "web_form".to_string(),
                    multiplier: 1.2,
                },
                ConfidenceModifier {
                    source: "list_import".to_string(),
                    multiplier: 0.7,
                },
            ],
            tier_bands: None,
        }
    }
}

/// Validation failures raised while building the per-run snapshot. Any of
/// these aborts the batch before a single pair is processed.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("decay rule '{name}' has factor {factor} outside [0, 1]")]
    DecayFactorOutOfRange { name: String, factor: f64 },
    #[error("decay rule '{name}' has non-positive age threshold {max_age_days}")]
    DecayThresholdInvalid { name: String, max_age_days: i64 },
    #[error("confidence multiplier {multiplier} for source '{source_name}' outside [0, 2]")]
    ConfidenceOutOfRange { source_name: String, multiplier: f64 },
    #[error("duplicate weight entry for signal type '{0}'")]
    DuplicateWeight(String),
}

/// Immutable per-run snapshot of the three lookup tables. Loaded once per
/// batch, read-only afterwards, safe for concurrent reads.
#[derive(Debug, Clone)]
pub struct WeightRegistry {
    weights: BTreeMap<SignalType, WeightEntry>,
    decay_rules: Vec<DecayRule>,
    confidence: BTreeMap<String, f64>,
    defaults: RegistryDefaults,
}

impl WeightRegistry {
    pub fn from_tables(
        tables: RegistryTables,
        defaults: RegistryDefaults,
    ) -> Result<Self, RegistryError> {
        let mut weights = BTreeMap::new();
        for entry in tables.weights {
            if weights.contains_key(&entry.signal_type) {
                return Err(RegistryError::DuplicateWeight(entry.signal_type.0));
            }
            weights.insert(entry.signal_type.clone(), entry);
        }

        let mut decay_rules = tables.decay_rules;
        for rule in &decay_rules {
            if !(0.0..=1.0).contains(&rule.factor) {
                return Err(RegistryError::DecayFactorOutOfRange {
                    name: rule.name.clone(),
                    factor: rule.factor,
                });
            }
            if rule.max_age_days <= 0 {
                return Err(RegistryError::DecayThresholdInvalid {
                    name: rule.name.clone(),
                    max_age_days: rule.max_age_days,
                });
            }
        }
        decay_rules.sort_by_key(|rule| rule.max_age_days);

        let mut confidence = BTreeMap::new();
        for modifier in tables.confidence {
            if !(0.0..=2.0).contains(&modifier.multiplier) {
                return Err(RegistryError::ConfidenceOutOfRange {
                    source_name: modifier.source,
                    multiplier: modifier.multiplier,
                });
            }
            confidence.insert(modifier.source, modifier.multiplier);
        }

        Ok(Self {
            weights,
            decay_rules,
            confidence,
            defaults,
        })
    }

    pub fn standard(defaults: RegistryDefaults) -> Result<Self, RegistryError> {
        Self::from_tables(RegistryTables::standard(), defaults)
    }

    /// Weight for a signal type: registry entry when known and active, zero
    /// when explicitly disabled, configured default otherwise.
    pub fn weight_for(&self, signal_type: &SignalType) -> i32 {
        match self.weights.get(signal_type) {
            Some(entry) if entry.active => entry.weight,
            Some(_) => 0,
            None => self.defaults.default_weight,
        }
    }

    /// First rule (ascending by threshold) whose threshold the age does not
    /// exceed and whose scope covers the type; 1.0 when no rule matches.
    pub fn decay_for(&self, signal_type: &SignalType, age_days: i64) -> f64 {
        self.decay_rules
            .iter()
            .find(|rule| age_days <= rule.max_age_days && rule.covers(signal_type))
            .map(|rule| rule.factor)
            .unwrap_or(1.0)
    }

    /// Trust multiplier for a source; unknown sources use the lowest-trust
    /// fallback constant.
    pub fn confidence_for(&self, source: &str) -> f64 {
        self.confidence
            .get(source)
            .copied()
            .unwrap_or(self.defaults.fallback_confidence)
    }

    pub fn knows_type(&self, signal_type: &SignalType) -> bool {
        self.weights.contains_key(signal_type)
    }

    pub fn knows_source(&self, source: &str) -> bool {
        self.confidence.contains_key(source)
    }
}

/// Rule store serving the built-in tables; used when no rules file is set.
#[derive(Debug, Clone, Default)]
pub struct StandardRuleStore;

impl RuleStore for StandardRuleStore {
    fn load(&self) -> Result<RegistryTables, StoreError> {
        Ok(RegistryTables::standard())
    }
}

/// Rule store reading a JSON rules document from disk on every run, so table
/// edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct FileRuleStore {
    path: PathBuf,
}

impl FileRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleStore for FileRuleStore {
    fn load(&self) -> Result<RegistryTables, StoreError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| {
            StoreError::Unavailable(format!("rules file {}: {err}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            StoreError::Unavailable(format!("rules file {}: {err}", self.path.display()))
        })
    }
}

/// Rule source selected at startup: a rules file when configured, the
/// built-in tables otherwise.
#[derive(Debug, Clone)]
pub enum RuleSource {
    Standard(StandardRuleStore),
    File(FileRuleStore),
}

impl RuleSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(FileRuleStore::new(path)),
            None => Self::Standard(StandardRuleStore),
        }
    }
}

impl RuleStore for RuleSource {
    fn load(&self) -> Result<RegistryTables, StoreError> {
        match self {
            RuleSource::Standard(store) => store.load(),
            RuleSource::File(store) => store.load(),
        }
    }
}
