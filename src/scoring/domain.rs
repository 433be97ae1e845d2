use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for a scored person.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub String);

/// Identifier wrapper for the company side of a pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

/// Identifier wrapper for a single intent signal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalId(pub String);

/// The (person, company) key identifying one scored subject. `Ord` so batch
/// iteration over discovered pairs is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityPair {
    pub person: PersonId,
    pub company: CompanyId,
}

impl EntityPair {
    pub fn new(person: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            person: PersonId(person.into()),
            company: CompanyId(company.into()),
        }
    }
}

/// Open-ended signal type; well-known values live in the weight registry and
/// unknown values resolve to the configured default weight.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalType(pub String);

impl SignalType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// Typed payload variants for the signal types the engine understands, with an
/// opaque structured fallback for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    Promotion {
        new_title: String,
    },
    EmailEngagement {
        campaign: String,
        action: EmailAction,
    },
    DemoRequest {
        form: String,
    },
    PageVisit {
        url: String,
    },
    FundingRound {
        amount_usd: u64,
    },
    Custom {
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
}

impl SignalDetail {
    /// Multiplier applied alongside the registry weight. Defaults to 1.0
    /// unless the payload carries an explicit value.
    pub fn value(&self) -> f64 {
        match self {
            SignalDetail::Custom { value: Some(v), .. } => *v,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailAction {
    Open,
    Click,
    Reply,
}

/// An immutable timestamped fact about a pair. Append-only; nothing mutates a
/// stored signal except the consumed flag flipped by the per-pair commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub person: PersonId,
    pub company: CompanyId,
    pub signal_type: SignalType,
    pub source: String,
    pub detail: SignalDetail,
    pub occurred_at: DateTime<Utc>,
    pub consumed: bool,
}

impl Signal {
    pub fn pair(&self) -> EntityPair {
        EntityPair {
            person: self.person.clone(),
            company: self.company.clone(),
        }
    }
}

/// Five ordered score bands; ordering drives the fire-on-increase rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cold,
    Warm,
    Engaged,
    Hot,
    Burning,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Cold,
        Tier::Warm,
        Tier::Engaged,
        Tier::Hot,
        Tier::Burning,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Tier::Cold => "cold",
            Tier::Warm => "warm",
            Tier::Engaged => "engaged",
            Tier::Hot => "hot",
            Tier::Burning => "burning",
        }
    }
}

/// Action a tier maps to when a transition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Ignore,
    Watch,
    Nurture,
    Escalate,
    AutoSchedule,
}

impl ActionType {
    pub const fn label(self) -> &'static str {
        match self {
            ActionType::Ignore => "ignore",
            ActionType::Watch => "watch",
            ActionType::Nurture => "nurture",
            ActionType::Escalate => "escalate",
            ActionType::AutoSchedule => "auto_schedule",
        }
    }
}

/// Priority attached to a fired trigger, derived from the tier reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl ActionPriority {
    pub const fn label(self) -> &'static str {
        match self {
            ActionPriority::Low => "low",
            ActionPriority::Medium => "medium",
            ActionPriority::High => "high",
            ActionPriority::Urgent => "urgent",
        }
    }
}

/// Discrete contribution of one signal to a pair's score, kept on the score
/// record so every number is auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub signal_id: SignalId,
    pub signal_type: SignalType,
    pub source: String,
    pub weight: i32,
    pub value: f64,
    pub confidence: f64,
    pub decay: f64,
    pub contribution: f64,
}

/// One row per pair, a mutable aggregate with upsert semantics, never
/// deleted. Soft history lives in the breakdown payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub pair: EntityPair,
    pub raw_score: f64,
    pub decayed_score: f64,
    pub tier: Tier,
    pub last_signal_at: Option<DateTime<Utc>>,
    pub signal_count: usize,
    pub computed_at: DateTime<Utc>,
    pub breakdown: Vec<SignalContribution>,
}

/// One row per fired action, consumed downstream by the outreach system
/// which flips the processed flag once it has acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub id: String,
    pub pair: EntityPair,
    pub action: ActionType,
    pub priority: ActionPriority,
    pub score: f64,
    pub tier: Tier,
    pub reason: String,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
}

/// Queue entry for the top tier. The meeting-scheduling consumer reads
/// pending entries and reports the outcome back through the status field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: String,
    pub pair: EntityPair,
    pub priority: ActionPriority,
    pub status: EscalationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
}

impl EscalationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EscalationStatus::Pending => "pending",
            EscalationStatus::Scheduled => "scheduled",
            EscalationStatus::Completed => "completed",
            EscalationStatus::Cancelled => "cancelled",
        }
    }
}

/// Verified contact channel kinds checked by trigger preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Email,
    Phone,
}
