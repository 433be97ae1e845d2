use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{
    CompanyId, ContactChannel, EmailAction, PersonId, Signal, SignalDetail, SignalId, SignalType,
};

/// Error raised while seeding a run from CSV exports.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read import file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse import file: {0}")]
    Csv(#[from] csv::Error),
    #[error("signal '{signal_id}' has unparseable timestamp '{value}'")]
    InvalidTimestamp { signal_id: String, value: String },
    #[error("contact row for '{person_id}' has unknown channel '{value}'")]
    InvalidChannel { person_id: String, value: String },
    #[error("duplicate signal id '{0}' in import")]
    DuplicateSignal(String),
}

/// Parse a signal export with columns `id, person_id, company_id,
/// signal_type, source, occurred_at` plus optional `value` and `detail`.
pub fn signals_from_path(path: impl AsRef<Path>) -> Result<Vec<Signal>, ImportError> {
    signals_from_reader(File::open(path)?)
}

pub fn signals_from_reader<R: Read>(reader: R) -> Result<Vec<Signal>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut signals = Vec::new();

    for record in csv_reader.deserialize::<SignalRow>() {
        let row = record?;
        let occurred_at =
            parse_timestamp(&row.occurred_at).ok_or_else(|| ImportError::InvalidTimestamp {
                signal_id: row.id.clone(),
                value: row.occurred_at.clone(),
            })?;

        let signal_type = SignalType::new(row.signal_type.clone());
        let detail = detail_for(&signal_type, row.detail.as_deref(), row.value);

        signals.push(Signal {
            id: SignalId(row.id),
            person: PersonId(row.person_id),
            company: CompanyId(row.company_id),
            signal_type,
            source: row.source,
            detail,
            occurred_at,
            consumed: false,
        });
    }

    Ok(signals)
}

/// Parse a contact export with columns `person_id, channel, verified`.
pub fn contacts_from_path(
    path: impl AsRef<Path>,
) -> Result<Vec<(PersonId, ContactChannel, bool)>, ImportError> {
    contacts_from_reader(File::open(path)?)
}

pub fn contacts_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<(PersonId, ContactChannel, bool)>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut contacts = Vec::new();

    for record in csv_reader.deserialize::<ContactRow>() {
        let row = record?;
        let channel = match row.channel.to_ascii_lowercase().as_str() {
            "email" => ContactChannel::Email,
            "phone" => ContactChannel::Phone,
            other => {
                return Err(ImportError::InvalidChannel {
                    person_id: row.person_id,
                    value: other.to_string(),
                })
            }
        };
        contacts.push((PersonId(row.person_id), channel, row.verified));
    }

    Ok(contacts)
}

#[derive(Debug, Deserialize)]
struct SignalRow {
    id: String,
    person_id: String,
    company_id: String,
    signal_type: String,
    source: String,
    occurred_at: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    detail: Option<String>,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    person_id: String,
    channel: String,
    #[serde(default)]
    verified: bool,
}

fn detail_for(signal_type: &SignalType, detail: Option<&str>, value: Option<f64>) -> SignalDetail {
    let text = detail.unwrap_or_default().to_string();

    // An explicit value column overrides the 1.0 default, which only the
    // custom payload can carry.
    if value.is_some() {
        let mut fields = BTreeMap::new();
        if !text.is_empty() {
            fields.insert("detail".to_string(), text);
        }
        return SignalDetail::Custom { value, fields };
    }

    match signal_type.0.as_str() {
        "promotion" => SignalDetail::Promotion { new_title: text },
        "demo_request" => SignalDetail::DemoRequest { form: text },
        "page_visit" => SignalDetail::PageVisit { url: text },
        "email_open" => SignalDetail::EmailEngagement {
            campaign: text,
            action: EmailAction::Open,
        },
        "email_click" => SignalDetail::EmailEngagement {
            campaign: text,
            action: EmailAction::Click,
        },
        "email_reply" => SignalDetail::EmailEngagement {
            campaign: text,
            action: EmailAction::Reply,
        },
        _ => {
            let mut fields = BTreeMap::new();
            if !text.is_empty() {
                fields.insert("detail".to_string(), text);
            }
            SignalDetail::Custom { value, fields }
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}
