//! The inbound form record and its projection into a log row.

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Column titles of the `Submissions` sheet, in row order.
pub const HEADERS: [&str; 14] = [
    "Timestamp",
    "Form ID",
    "Scroll No",
    "Date",
    "Tower",
    "Flat No",
    "Owner Name",
    "Contact",
    "Owner Email",
    "Extension Locations",
    "Advisory Accepted",
    "Signature Saved",
    "PDF Generated",
    "Email Status",
];

/// 1-based column holding the form id.
pub const FORM_ID_COLUMN: usize = 2;
/// 1-based column holding the PDF flag.
pub const PDF_COLUMN: usize = 13;
/// 1-based column holding the email status.
pub const EMAIL_STATUS_COLUMN: usize = 14;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SENT: &str = "SENT";

/// Display format of the Timestamp column; the date prefix is what the
/// summary's "today" count matches on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single form post.
///
/// Every field is optional. Values are read leniently: numbers are shown
/// as text, flags follow truthiness (`false`, `0`, `""` and `null` are
/// false), and the raw object is kept for the fallback alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub scroll_no: String,
    pub date: String,
    pub tower: String,
    pub flat_no: String,
    pub owner_name: String,
    pub contact_number: String,
    pub email: String,
    pub extension_locations: Option<String>,
    pub advisory_acknowledged: bool,
    pub has_signature: bool,
    pub pdf_base64: Option<String>,
    pub raw: Value,
}

impl Submission {
    /// Parses a request body. Anything but a JSON object is malformed input.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        match value {
            Value::Object(_) => Ok(Self::from_value(value)),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object, found {}",
                kind(&other)
            ))),
        }
    }

    /// Builds a record from an already decoded JSON object. Non-object
    /// values yield an all-default record.
    pub fn from_value(raw: Value) -> Self {
        let empty = Map::new();
        let map = raw.as_object().unwrap_or(&empty);

        let extension_locations = match map.get("extension_locations") {
            Some(Value::Array(items)) => {
                let joined = items
                    .iter()
                    .filter_map(display)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                (!joined.is_empty()).then_some(joined)
            }
            Some(v) => display(v).filter(|s| !s.is_empty()),
            None => None,
        };

        let pdf_base64 = match map.get("pdf_base64") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        Submission {
            scroll_no: text(map, "scroll_no"),
            date: text(map, "date"),
            tower: text(map, "tower"),
            flat_no: text(map, "flat_no"),
            owner_name: text(map, "owner_name"),
            contact_number: text(map, "contact_number"),
            email: text(map, "email"),
            extension_locations,
            advisory_acknowledged: truthy(map.get("advisory_acknowledged")),
            has_signature: truthy(map.get("signature")),
            pdf_base64,
            raw,
        }
    }

    pub fn has_pdf(&self) -> bool {
        self.pdf_base64.is_some()
    }
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).and_then(display).unwrap_or_default()
}

fn display(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        other => Some(other.to_string()),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Identifier of one submission: `SPR-` followed by the submission time in
/// epoch milliseconds, written in uppercase base 36.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormId(String);

impl FormId {
    pub fn from_timestamp(timestamp: &DateTime<Utc>) -> Self {
        let millis = timestamp.timestamp_millis();
        let digits = to_base36(millis.unsigned_abs());
        if millis < 0 {
            FormId(format!("SPR--{}", digits))
        } else {
            FormId(format!("SPR-{}", digits))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Local display form of a submission time, shared by the log row and the email body.
pub fn display_time(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "YES" } else { "NO" };
    text.to_string()
}

/// Projects a submission into the 14 display values of a log row.
pub fn format_row(record: &Submission, form_id: &FormId, timestamp: &DateTime<Utc>) -> Vec<String> {
    vec![
        display_time(timestamp),
        form_id.to_string(),
        record.scroll_no.clone(),
        record.date.clone(),
        record.tower.clone(),
        record.flat_no.clone(),
        record.owner_name.clone(),
        record.contact_number.clone(),
        record.email.clone(),
        record
            .extension_locations
            .clone()
            .unwrap_or_else(|| "None".to_string()),
        yes_no(record.advisory_acknowledged),
        yes_no(record.has_signature),
        yes_no(record.has_pdf()),
        STATUS_PENDING.to_string(),
    ]
}
