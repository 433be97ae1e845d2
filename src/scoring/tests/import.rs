use chrono::{TimeZone, Utc};

use crate::scoring::domain::{ContactChannel, EmailAction, SignalDetail, SignalType};
use crate::scoring::import::{contacts_from_reader, signals_from_reader, ImportError};

#[test]
fn parses_signal_rows_with_typed_details() {
    let csv = "\
id,person_id,company_id,signal_type,source,occurred_at,detail,value
sig-1,p1,acme,promotion,enrichment_api,2026-08-15T09:30:00Z,VP of Operations,
sig-2,p1,acme,email_click,crm,2026-08-16,q3-nurture,
sig-3,p1,acme,page_visit,product_telemetry,2026-08-17T10:00:00Z,/pricing,
";
    let signals = signals_from_reader(csv.as_bytes()).expect("rows parse");
    assert_eq!(signals.len(), 3);

    assert_eq!(signals[0].signal_type, SignalType::new("promotion"));
    assert_eq!(
        signals[0].detail,
        SignalDetail::Promotion {
            new_title: "VP of Operations".to_string()
        }
    );
    assert!(!signals[0].consumed);

    assert_eq!(
        signals[1].detail,
        SignalDetail::EmailEngagement {
            campaign: "q3-nurture".to_string(),
            action: EmailAction::Click,
        }
    );
    // Date-only timestamps land at midnight UTC.
    assert_eq!(
        signals[1].occurred_at,
        Utc.with_ymd_and_hms(2026, 8, 16, 0, 0, 0).single().unwrap()
    );

    assert_eq!(
        signals[2].detail,
        SignalDetail::PageVisit {
            url: "/pricing".to_string()
        }
    );
}

#[test]
fn explicit_value_column_becomes_a_custom_payload() {
    let csv = "\
id,person_id,company_id,signal_type,source,occurred_at,detail,value
sig-1,p1,acme,page_visit,crm,2026-08-17T10:00:00Z,/pricing,3.0
";
    let signals = signals_from_reader(csv.as_bytes()).expect("row parses");
    match &signals[0].detail {
        SignalDetail::Custom { value, fields } => {
            assert_eq!(*value, Some(3.0));
            assert_eq!(fields.get("detail").map(String::as_str), Some("/pricing"));
        }
        other => panic!("expected custom payload, got {other:?}"),
    }
    assert_eq!(signals[0].detail.value(), 3.0);
}

#[test]
fn unknown_signal_types_fall_back_to_custom() {
    let csv = "\
id,person_id,company_id,signal_type,source,occurred_at,detail,value
sig-1,p1,acme,conference_badge_scan,list_import,2026-08-17T10:00:00Z,,
";
    let signals = signals_from_reader(csv.as_bytes()).expect("row parses");
    assert!(matches!(
        signals[0].detail,
        SignalDetail::Custom { value: None, .. }
    ));
}

#[test]
fn bad_timestamp_names_the_offending_signal() {
    let csv = "\
id,person_id,company_id,signal_type,source,occurred_at,detail,value
sig-bad,p1,acme,email_open,crm,yesterday,,
";
    let error = signals_from_reader(csv.as_bytes()).expect_err("timestamp rejected");
    match error {
        ImportError::InvalidTimestamp { signal_id, value } => {
            assert_eq!(signal_id, "sig-bad");
            assert_eq!(value, "yesterday");
        }
        other => panic!("expected timestamp error, got {other}"),
    }
}

#[test]
fn parses_contact_rows() {
    let csv = "\
person_id,channel,verified
p1,email,true
p1,phone,false
p2,Email,true
";
    let contacts = contacts_from_reader(csv.as_bytes()).expect("rows parse");
    assert_eq!(contacts.len(), 3);
    assert_eq!(contacts[0].1, ContactChannel::Email);
    assert!(contacts[0].2);
    assert_eq!(contacts[1].1, ContactChannel::Phone);
    assert!(!contacts[1].2);
    // Channel matching is case-insensitive.
    assert_eq!(contacts[2].1, ContactChannel::Email);
}

#[test]
fn unknown_channel_is_rejected() {
    let csv = "\
person_id,channel,verified
p1,fax,true
";
    let error = contacts_from_reader(csv.as_bytes()).expect_err("channel rejected");
    match error {
        ImportError::InvalidChannel { person_id, value } => {
            assert_eq!(person_id, "p1");
            assert_eq!(value, "fax");
        }
        other => panic!("expected channel error, got {other}"),
    }
}
