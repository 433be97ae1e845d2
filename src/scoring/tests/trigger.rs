use std::collections::BTreeMap;

use chrono::Duration;

use super::common::*;
use crate::scoring::domain::{ActionPriority, ActionType, Tier, TriggerRecord};
use crate::scoring::tiers::TierTable;
use crate::scoring::trigger::{
    apply_daily_cap, evaluate, TriggerDecision, TriggerInput, TriggerPolicy,
};

fn fired_record(action: ActionType, hours_ago: i64) -> TriggerRecord {
    TriggerRecord {
        id: "trg-fixture".to_string(),
        pair: pair("p1", "acme"),
        action,
        priority: ActionPriority::Low,
        score: 60.0,
        tier: Tier::Warm,
        reason: "tier increased from cold to warm at score 60.0".to_string(),
        metadata: BTreeMap::new(),
        created_at: now() - Duration::hours(hours_ago),
        processed: false,
    }
}

fn input<'a>(
    previous: Option<Tier>,
    new_tier: Tier,
    score: f64,
    has_contact: bool,
    recent: &'a [TriggerRecord],
) -> TriggerInput<'a> {
    TriggerInput {
        previous_tier: previous,
        new_tier,
        score,
        has_verified_contact: has_contact,
        recent_triggers: recent,
        now: now(),
    }
}

#[test]
fn default_cap_admits_a_strong_first_day() {
    // Promotion + email open + demo request land at 209 decayed; the default
    // policy must let that through uncapped or the escalate transition could
    // never happen on day one.
    let policy = TriggerPolicy::default();
    let capped = apply_daily_cap(0.0, 209.0, 0.0, policy.daily_increase_cap);
    assert_eq!(capped.score, 209.0);
    assert!(!capped.tripped);
}

#[test]
fn cap_passes_small_increases_through() {
    let capped = apply_daily_cap(100.0, 160.0, 0.0, 150.0);
    assert_eq!(capped.score, 160.0);
    assert_eq!(capped.increase, 60.0);
    assert!(!capped.tripped);
}

#[test]
fn cap_clips_to_remaining_headroom() {
    let capped = apply_daily_cap(100.0, 300.0, 40.0, 150.0);
    assert_eq!(capped.score, 210.0);
    assert_eq!(capped.increase, 110.0);
    assert!(capped.tripped);
}

#[test]
fn cap_exhausted_headroom_freezes_the_score() {
    let capped = apply_daily_cap(100.0, 300.0, 150.0, 150.0);
    assert_eq!(capped.score, 100.0);
    assert_eq!(capped.increase, 0.0);
    assert!(capped.tripped);
}

#[test]
fn decreases_bypass_the_cap() {
    let capped = apply_daily_cap(200.0, 120.0, 150.0, 150.0);
    assert_eq!(capped.score, 120.0);
    assert_eq!(capped.increase, 0.0);
    assert!(!capped.tripped);
}

#[test]
fn tier_decrease_fires_nothing() {
    let decision = evaluate(
        &input(Some(Tier::Hot), Tier::Warm, 60.0, true, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    assert_eq!(decision, TriggerDecision::NoIncrease);
}

#[test]
fn same_tier_fires_nothing() {
    let decision = evaluate(
        &input(Some(Tier::Engaged), Tier::Engaged, 150.0, true, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    assert_eq!(decision, TriggerDecision::NoIncrease);
}

#[test]
fn first_score_uses_the_cold_baseline() {
    let decision = evaluate(
        &input(None, Tier::Warm, 60.0, true, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    match decision {
        TriggerDecision::Fire(fired) => {
            assert_eq!(fired.action, ActionType::Watch);
            assert_eq!(fired.priority, ActionPriority::Low);
            assert!(!fired.downgraded);
        }
        other => panic!("expected fire, got {other:?}"),
    }
}

#[test]
fn increase_to_hot_escalates_with_high_priority() {
    let decision = evaluate(
        &input(Some(Tier::Warm), Tier::Hot, 209.0, true, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    match decision {
        TriggerDecision::Fire(fired) => {
            assert_eq!(fired.action, ActionType::Escalate);
            assert_eq!(fired.priority, ActionPriority::High);
            assert!(fired.reason.contains("warm"));
            assert!(fired.reason.contains("hot"));
            assert!(!fired.enqueue_escalation);
        }
        other => panic!("expected fire, got {other:?}"),
    }
}

#[test]
fn missing_contact_downgrades_escalate_to_watch() {
    let decision = evaluate(
        &input(Some(Tier::Warm), Tier::Hot, 209.0, false, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    match decision {
        TriggerDecision::Fire(fired) => {
            assert_eq!(fired.action, ActionType::Watch);
            assert!(fired.downgraded);
            assert!(fired.reason.contains("downgraded from escalate"));
        }
        other => panic!("expected fire, got {other:?}"),
    }
}

#[test]
fn duplicate_action_inside_window_is_suppressed() {
    let recent = vec![fired_record(ActionType::Escalate, 24)];
    let decision = evaluate(
        &input(Some(Tier::Warm), Tier::Hot, 209.0, true, &recent),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    assert_eq!(
        decision,
        TriggerDecision::Suppressed {
            action: ActionType::Escalate
        }
    );
}

#[test]
fn dedup_matches_the_post_downgrade_action() {
    // A watch fired yesterday suppresses today's downgraded escalate, since
    // both resolve to the same outbound action.
    let recent = vec![fired_record(ActionType::Watch, 24)];
    let decision = evaluate(
        &input(Some(Tier::Warm), Tier::Hot, 209.0, false, &recent),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    assert_eq!(
        decision,
        TriggerDecision::Suppressed {
            action: ActionType::Watch
        }
    );
}

#[test]
fn stale_trigger_outside_window_does_not_suppress() {
    let recent = vec![fired_record(ActionType::Escalate, 96)];
    let decision = evaluate(
        &input(Some(Tier::Warm), Tier::Hot, 209.0, true, &recent),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    assert!(matches!(decision, TriggerDecision::Fire(_)));
}

#[test]
fn burning_enqueues_an_escalation() {
    let decision = evaluate(
        &input(Some(Tier::Hot), Tier::Burning, 340.0, true, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    match decision {
        TriggerDecision::Fire(fired) => {
            assert_eq!(fired.action, ActionType::AutoSchedule);
            assert_eq!(fired.priority, ActionPriority::Urgent);
            assert!(fired.enqueue_escalation);
        }
        other => panic!("expected fire, got {other:?}"),
    }
}

#[test]
fn downgraded_burning_does_not_enqueue() {
    let decision = evaluate(
        &input(Some(Tier::Hot), Tier::Burning, 340.0, false, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    match decision {
        TriggerDecision::Fire(fired) => {
            assert_eq!(fired.action, ActionType::Watch);
            assert!(fired.downgraded);
            assert!(!fired.enqueue_escalation);
        }
        other => panic!("expected fire, got {other:?}"),
    }
}

#[test]
fn increase_into_cold_band_stays_quiet() {
    // Scores can rise without leaving cold; the mapped ignore action never
    // produces a trigger row.
    let decision = evaluate(
        &input(None, Tier::Cold, 20.0, true, &[]),
        &TierTable::standard(),
        &TriggerPolicy::default(),
    );
    assert_eq!(decision, TriggerDecision::NoIncrease);
}
