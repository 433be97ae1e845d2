use crate::scoring::domain::{ActionPriority, ActionType, Tier};
use crate::scoring::tiers::{TierBand, TierConfigError, TierTable};

fn band(tier: Tier, lower: f64, upper: Option<f64>, action: ActionType) -> TierBand {
    TierBand {
        tier,
        lower,
        upper,
        action,
        auto_execute: false,
    }
}

fn standard_bands() -> Vec<TierBand> {
    vec![
        band(Tier::Cold, 0.0, Some(50.0), ActionType::Ignore),
        band(Tier::Warm, 50.0, Some(100.0), ActionType::Watch),
        band(Tier::Engaged, 100.0, Some(200.0), ActionType::Nurture),
        band(Tier::Hot, 200.0, Some(300.0), ActionType::Escalate),
        band(Tier::Burning, 300.0, None, ActionType::AutoSchedule),
    ]
}

#[test]
fn boundaries_resolve_to_the_higher_tier() {
    let table = TierTable::standard();
    assert_eq!(table.resolve(0.0), Tier::Cold);
    assert_eq!(table.resolve(49.9), Tier::Cold);
    assert_eq!(table.resolve(50.0), Tier::Warm);
    assert_eq!(table.resolve(99.9), Tier::Warm);
    assert_eq!(table.resolve(100.0), Tier::Engaged);
    assert_eq!(table.resolve(200.0), Tier::Hot);
    assert_eq!(table.resolve(299.9), Tier::Hot);
    assert_eq!(table.resolve(300.0), Tier::Burning);
    assert_eq!(table.resolve(1000.0), Tier::Burning);
}

#[test]
fn every_score_maps_to_exactly_one_band() {
    let table = TierTable::standard();
    for score in 0..=1000 {
        let score = f64::from(score);
        let containing = table
            .bands()
            .iter()
            .filter(|band| score >= band.lower && band.upper.map(|u| score < u).unwrap_or(true))
            .count();
        assert_eq!(containing, 1, "score {score} covered by {containing} bands");
        assert_eq!(
            table.resolve(score),
            table
                .bands()
                .iter()
                .find(|band| score >= band.lower
                    && band.upper.map(|u| score < u).unwrap_or(true))
                .map(|band| band.tier)
                .expect("covering band exists"),
        );
    }
}

#[test]
fn actions_and_priorities_follow_the_tier() {
    let table = TierTable::standard();
    assert_eq!(table.action_for(Tier::Warm), ActionType::Watch);
    assert_eq!(table.action_for(Tier::Hot), ActionType::Escalate);
    assert_eq!(table.action_for(Tier::Burning), ActionType::AutoSchedule);
    assert!(table.auto_execute(Tier::Burning));
    assert!(!table.auto_execute(Tier::Hot));

    assert_eq!(TierTable::priority_for(Tier::Cold), ActionPriority::Low);
    assert_eq!(TierTable::priority_for(Tier::Warm), ActionPriority::Low);
    assert_eq!(TierTable::priority_for(Tier::Engaged), ActionPriority::Medium);
    assert_eq!(TierTable::priority_for(Tier::Hot), ActionPriority::High);
    assert_eq!(TierTable::priority_for(Tier::Burning), ActionPriority::Urgent);
}

#[test]
fn rejects_band_gaps() {
    let mut bands = standard_bands();
    bands[1].lower = 60.0;
    let error = TierTable::new(bands, 0.0).expect_err("gap between cold and warm");
    assert!(matches!(error, TierConfigError::Discontiguous { .. }));
}

#[test]
fn rejects_band_overlaps() {
    let mut bands = standard_bands();
    bands[2].lower = 90.0;
    let error = TierTable::new(bands, 0.0).expect_err("warm and engaged overlap");
    assert!(matches!(error, TierConfigError::Discontiguous { .. }));
}

#[test]
fn rejects_out_of_order_tiers() {
    let mut bands = standard_bands();
    bands.swap(1, 2);
    let error = TierTable::new(bands, 0.0).expect_err("tiers out of order");
    assert!(matches!(error, TierConfigError::TierOutOfOrder(_)));
}

#[test]
fn rejects_wrong_band_count() {
    let mut bands = standard_bands();
    bands.pop();
    let error = TierTable::new(bands, 0.0).expect_err("four bands rejected");
    assert!(matches!(error, TierConfigError::WrongBandCount { .. }));
}

#[test]
fn rejects_first_band_off_the_floor() {
    let mut bands = standard_bands();
    bands[0].lower = 5.0;
    let error = TierTable::new(bands, 0.0).expect_err("floor mismatch");
    assert!(matches!(error, TierConfigError::FloorMismatch { .. }));
}

#[test]
fn rejects_bounded_top_band() {
    let mut bands = standard_bands();
    bands[4].upper = Some(400.0);
    let error = TierTable::new(bands, 0.0).expect_err("top band must be open");
    assert!(matches!(error, TierConfigError::BoundedTopBand));
}

#[test]
fn rejects_missing_upper_bound_mid_table() {
    let mut bands = standard_bands();
    bands[1].upper = None;
    let error = TierTable::new(bands, 0.0).expect_err("inner band must be bounded");
    assert!(matches!(error, TierConfigError::MissingUpperBound(_)));
}
