use serde::{Deserialize, Serialize};

use super::domain::{ActionPriority, ActionType, Tier};

/// One configured score band. Lower bound inclusive, upper bound exclusive;
/// the last band is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub tier: Tier,
    pub lower: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    pub action: ActionType,
    #[serde(default)]
    pub auto_execute: bool,
}

/// Misconfigured band tables are a fatal startup error, never a runtime one.
#[derive(Debug, thiserror::Error)]
pub enum TierConfigError {
    #[error("tier table must contain exactly {expected} bands, found {found}")]
    WrongBandCount { expected: usize, found: usize },
    #[error("tier bands must appear in ascending tier order, found {0} out of place")]
    TierOutOfOrder(&'static str),
    #[error("first band must start at the score floor {floor}, found {lower}")]
    FloorMismatch { floor: f64, lower: f64 },
    #[error("gap or overlap between bands at score {at}: previous band ends at {expected}")]
    Discontiguous { at: f64, expected: f64 },
    #[error("band for tier {0} must have an upper bound")]
    MissingUpperBound(&'static str),
    #[error("top band must be open-ended")]
    BoundedTopBand,
}

/// Five ordered, non-overlapping, gap-free bands mapped to actions. Bands
/// are configuration and only exist in validated form; deserialize the raw
/// `TierBand` rows and go through [`TierTable::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    bands: Vec<TierBand>,
}

impl TierTable {
    pub fn new(bands: Vec<TierBand>, floor: f64) -> Result<Self, TierConfigError> {
        if bands.len() != Tier::ALL.len() {
            return Err(TierConfigError::WrongBandCount {
                expected: Tier::ALL.len(),
                found: bands.len(),
            });
        }

        for (band, expected) in bands.iter().zip(Tier::ALL) {
            if band.tier != expected {
                return Err(TierConfigError::TierOutOfOrder(band.tier.label()));
            }
        }

        let first = &bands[0];
        if (first.lower - floor).abs() > f64::EPSILON {
            return Err(TierConfigError::FloorMismatch {
                floor,
                lower: first.lower,
            });
        }

        for pair in bands.windows(2) {
            let upper = pair[0]
                .upper
                .ok_or(TierConfigError::MissingUpperBound(pair[0].tier.label()))?;
            if (upper - pair[1].lower).abs() > f64::EPSILON {
                return Err(TierConfigError::Discontiguous {
                    at: pair[1].lower,
                    expected: upper,
                });
            }
        }

        if bands[bands.len() - 1].upper.is_some() {
            return Err(TierConfigError::BoundedTopBand);
        }

        Ok(Self { bands })
    }

    /// Default bands: cold 0-49, warm 50-99, engaged 100-199, hot 200-299,
    /// burning 300+.
    pub fn standard() -> Self {
        let band = |tier, lower, upper, action, auto_execute| TierBand {
            tier,
            lower,
            upper,
            action,
            auto_execute,
        };

        Self::new(
            vec![
                band(Tier::Cold, 0.0, Some(50.0), ActionType::Ignore, false),
                band(Tier::Warm, 50.0, Some(100.0), ActionType::Watch, false),
                band(Tier::Engaged, 100.0, Some(200.0), ActionType::Nurture, false),
                band(Tier::Hot, 200.0, Some(300.0), ActionType::Escalate, false),
                band(Tier::Burning, 300.0, None, ActionType::AutoSchedule, true),
            ],
            0.0,
        )
        .expect("standard tier table is contiguous")
    }

    /// Range lookup on the decayed score; boundary scores resolve to the
    /// higher tier (inclusive lower bound). Scores below the first band
    /// clamp to the lowest tier.
    pub fn resolve(&self, score: f64) -> Tier {
        self.bands
            .iter()
            .rev()
            .find(|band| score >= band.lower)
            .map(|band| band.tier)
            .unwrap_or(self.bands[0].tier)
    }

    pub fn action_for(&self, tier: Tier) -> ActionType {
        self.band(tier).action
    }

    pub fn auto_execute(&self, tier: Tier) -> bool {
        self.band(tier).auto_execute
    }

    pub const fn priority_for(tier: Tier) -> ActionPriority {
        match tier {
            Tier::Cold | Tier::Warm => ActionPriority::Low,
            Tier::Engaged => ActionPriority::Medium,
            Tier::Hot => ActionPriority::High,
            Tier::Burning => ActionPriority::Urgent,
        }
    }

    pub fn bands(&self) -> &[TierBand] {
        &self.bands
    }

    fn band(&self, tier: Tier) -> &TierBand {
        self.bands
            .iter()
            .find(|band| band.tier == tier)
            .expect("validated table covers every tier")
    }
}
