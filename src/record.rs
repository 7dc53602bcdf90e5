use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Bool,
    Date,
    Int,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Date(NaiveDateTime),
    Int(i64),
    Missing,
}

const DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

impl FieldValue {
    /// Types a raw cell as read from the data layer. Values that do not parse
    /// for their kind are treated as missing.
    pub fn parse(kind: FieldKind, raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return FieldValue::Missing,
        };
        let value = match kind {
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(FieldValue::Bool(true)),
                "false" | "f" | "0" | "no" => Some(FieldValue::Bool(false)),
                _ => None,
            },
            FieldKind::Int => raw.parse().ok().map(FieldValue::Int),
            FieldKind::Date => parse_date(raw).map(FieldValue::Date),
        };
        value.unwrap_or_else(|| {
            trace!("Could not parse {raw:?} as {kind:?}");
            FieldValue::Missing
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// One fetched business entity. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: i64,
    fields: BTreeMap<String, FieldValue>,
}

static MISSING: FieldValue = FieldValue::Missing;

impl Record {
    pub fn new(id: i64) -> Self {
        Record {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&MISSING)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}
