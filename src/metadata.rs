//! Document metadata: the value model, the `Key: value` sidecar format and
//! per-key normalization.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Key holding the captured summary
pub const SUMMARY_KEY: &str = "summary";

/// Key flagging metadata that came from the notebook itself
pub const NOTEBOOK_FLAG_KEY: &str = "ipython";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Date(NaiveDateTime),
    List(Vec<String>),
    Bool(bool),
    Json(Value),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Metadata of one document, keyed by lowercase names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) -> Option<MetadataValue> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Text value under `key`, if it is textual
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_text)
    }

    /// Build metadata from raw pairs, lower-casing keys and normalizing
    /// each value. Later duplicates win.
    pub fn from_pairs<I>(pairs: I, normalizer: &dyn MetadataNormalizer) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut metadata = Metadata::new();
        for (key, value) in pairs {
            let key = key.to_lowercase();
            let value = normalizer.normalize(&key, value)?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }
}

/// Turns raw metadata values into their typed form.
///
/// The host decides what each key means; [`StandardNormalizer`] covers the
/// usual blog fields.
pub trait MetadataNormalizer: Send + Sync {
    /// `key` is already lower-cased.
    fn normalize(&self, key: &str, value: Value) -> Result<MetadataValue>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormalizer;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];

impl MetadataNormalizer for StandardNormalizer {
    fn normalize(&self, key: &str, value: Value) -> Result<MetadataValue> {
        match (key, value) {
            ("date" | "modified", Value::String(s)) => parse_date(&s)
                .map(MetadataValue::Date)
                .ok_or_else(|| Error::metadata(key, format!("unrecognized date '{s}'"))),
            ("date" | "modified", other) => Err(Error::metadata(key, format!("expected a date string, got {other}"))),
            ("tags" | "authors", Value::String(s)) => Ok(MetadataValue::List(split_list(&s))),
            ("tags" | "authors", Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(Error::metadata(key, format!("expected a string entry, got {other}"))),
                })
                .collect::<Result<Vec<_>>>()
                .map(MetadataValue::List),
            (_, Value::String(s)) => Ok(MetadataValue::Text(s.trim().to_string())),
            (_, Value::Bool(b)) => Ok(MetadataValue::Bool(b)),
            (_, other) => Ok(MetadataValue::Json(other)),
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a `Key: value` metadata block.
///
/// Lines indented by four spaces or a tab continue the previous value.
/// Parsing stops at the first blank line; a leading `---` line and a closing
/// `---` or `...` line are accepted.
pub fn parse_metadata_text(text: &str) -> Result<Vec<(String, String)>> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut lines = text.lines().peekable();

    if lines.peek().map(|line| line.trim_end()) == Some("---") {
        lines.next();
    }

    for line in lines {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed == "---" || trimmed == "..." {
            break;
        }

        if line.starts_with("    ") || line.starts_with('\t') {
            match pairs.last_mut() {
                Some((_, value)) => {
                    value.push('\n');
                    value.push_str(trimmed.trim_start());
                }
                None => return Err(Error::metadata(trimmed.trim_start(), "continuation line without a key")),
            }
            continue;
        }

        match trimmed.split_once(':') {
            Some((key, value)) if is_metadata_key(key) => {
                pairs.push((key.to_string(), value.trim().to_string()));
            }
            _ => return Err(Error::metadata(trimmed, "expected a 'Key: value' line")),
        }
    }

    Ok(pairs)
}

fn is_metadata_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
