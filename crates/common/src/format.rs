//! Normalization of requisite values into the backend's wire format.
//!
//! Date-typed requisites must arrive as `YYYY-MM-DD HH:MM:SS`. Users paste
//! dates in ISO-like forms (`2026-03-01`, `2026/03/01 14:30`) and in
//! day-first Russian form (`01.03.2026`); both are reformatted into the
//! canonical shape with missing time components defaulted to `00`. Anything
//! that does not look like a date passes through untouched — the backend
//! decides what to do with it.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// `YYYY-MM-DD[ HH:MM[:SS]]` with `-`, `/`, or `.` separators.
static ISO_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{2})[-/.](\d{2})(?:[T ](\d{2}):(\d{2})(?::(\d{2}))?)?$")
        .expect("pattern compiles")
});

/// `DD.MM.YYYY[ HH:MM[:SS]]`, day first.
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})\.(\d{2})\.(\d{4})(?:\s+(\d{2}):(\d{2})(?::(\d{2}))?)?$")
        .expect("pattern compiles")
});

/// A requisite value bound for the wire.
///
/// Requisites are keyed by numeric identifier and serialized as `t{id}` form
/// fields; [`encode_requisites`] performs that serialization in one place so
/// the string-keyed dynamic field names never leak into call sites.
#[derive(Debug, Clone, PartialEq)]
pub enum RequisiteValue {
    /// Free text, reformatted if it looks like a date.
    Text(String),
    /// Numeric value, sent as its decimal representation.
    Integer(i64),
    /// A concrete datetime, formatted canonically.
    Date(NaiveDateTime),
    /// Absent value; serialization decides between skipping and sending an
    /// empty string.
    Empty,
}

impl RequisiteValue {
    /// Wire representation, `None` for [`RequisiteValue::Empty`].
    #[must_use]
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(normalize_date_like(text).into_owned()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Date(datetime) => Some(format_datetime(datetime)),
            Self::Empty => None,
        }
    }
}

impl From<String> for RequisiteValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequisiteValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for RequisiteValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<NaiveDateTime> for RequisiteValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Date(value)
    }
}

/// Format a datetime in the backend's canonical form.
#[must_use]
pub fn format_datetime(datetime: &NaiveDateTime) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Reformat `value` to `YYYY-MM-DD HH:MM:SS` when it matches a known date
/// pattern; otherwise return it unchanged.
#[must_use]
pub fn normalize_date_like(value: &str) -> Cow<'_, str> {
    if value.is_empty() {
        return Cow::Borrowed(value);
    }

    if let Some(captures) = ISO_LIKE.captures(value) {
        return Cow::Owned(canonical(
            &captures[1],
            &captures[2],
            &captures[3],
            captures.get(4).map(|m| m.as_str()),
            captures.get(5).map(|m| m.as_str()),
            captures.get(6).map(|m| m.as_str()),
        ));
    }

    if let Some(captures) = DAY_FIRST.captures(value) {
        return Cow::Owned(canonical(
            &captures[3],
            &captures[2],
            &captures[1],
            captures.get(4).map(|m| m.as_str()),
            captures.get(5).map(|m| m.as_str()),
            captures.get(6).map(|m| m.as_str()),
        ));
    }

    Cow::Borrowed(value)
}

fn canonical(
    year: &str,
    month: &str,
    day: &str,
    hours: Option<&str>,
    minutes: Option<&str>,
    seconds: Option<&str>,
) -> String {
    format!(
        "{year}-{month}-{day} {}:{}:{}",
        hours.unwrap_or("00"),
        minutes.unwrap_or("00"),
        seconds.unwrap_or("00"),
    )
}

/// Serialize a requisite map into `t{id}` form fields.
///
/// With `keep_empty`, absent values serialize as empty strings (the save/set
/// semantics); otherwise they are skipped entirely (the create semantics).
#[must_use]
pub fn encode_requisites(
    requisites: &BTreeMap<u32, RequisiteValue>,
    keep_empty: bool,
) -> Vec<(String, String)> {
    requisites
        .iter()
        .filter_map(|(id, value)| match value.to_wire() {
            Some(wire) => Some((format!("t{id}"), wire)),
            None if keep_empty => Some((format!("t{id}"), String::new())),
            None => None,
        })
        .collect()
}
