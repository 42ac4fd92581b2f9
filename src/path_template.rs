//! Resolves `${variable}` path templates against STAC Items.
//!
//! `collection` and `id` come from the item itself, `year`, `month` and `day`
//! are taken from `properties.datetime`, and any other name is looked up in
//! `properties` verbatim, so extension properties such as `${eo:cloud_cover}`
//! work without escaping.
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use crate::error::Error;
use crate::item::Item;

pub const DEFAULT_PATH_TEMPLATE: &str = "${collection}/${id}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:\{(?<braced>[^{}]*)\}|(?<named>[A-Za-z_][A-Za-z0-9_:]*)|(?<escaped>\$))")
            .expect("Regex pattern should always compile")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Collection,
    Id,
    Year,
    Month,
    Day,
    Property(String),
}

impl Field {
    fn from_name(name: &str) -> Self {
        match name {
            "collection" => Self::Collection,
            "id" => Self::Id,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            other => Self::Property(other.to_string()),
        }
    }

    fn resolve(&self, item: &Item) -> Result<String, Error> {
        match self {
            Self::Collection => item
                .collection
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| Error::MissingField("collection".to_string())),
            Self::Id if item.id.is_empty() => Err(Error::MissingField("id".to_string())),
            Self::Id => Ok(item.id.clone()),
            Self::Year => Ok(item_date(item)?.year().to_string()),
            Self::Month => Ok(item_date(item)?.month().to_string()),
            Self::Day => Ok(item_date(item)?.day().to_string()),
            Self::Property(key) => {
                let value = item
                    .property(key)
                    .ok_or_else(|| Error::MissingField(key.clone()))?;
                render_value(key, &value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed path template. Parsing rejects malformed placeholders, so a
/// resolved path can never carry a leftover `${...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = template.trim_end_matches('/');
        let mut segments = vec![];
        let mut literal = String::new();
        let mut last = 0;

        for captures in placeholder_regex().captures_iter(trimmed) {
            let whole = captures.get(0).expect("Capture group 0 always exists");
            push_literal(&mut literal, &trimmed[last..whole.start()]).map_err(|r| invalid(r))?;
            last = whole.end();

            if captures.name("escaped").is_some() {
                literal.push('$');
                continue;
            }
            let name = captures
                .name("braced")
                .or_else(|| captures.name("named"))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            if name.is_empty() {
                return Err(invalid("empty placeholder name"));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Field(Field::from_name(name)));
        }
        push_literal(&mut literal, &trimmed[last..]).map_err(|r| invalid(r))?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitutes every placeholder, returning the directory part of the key.
    pub fn substitute(&self, item: &Item) -> Result<String, Error> {
        let mut path = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Field(field) => path.push_str(&field.resolve(item)?),
            }
        }
        Ok(path)
    }

    /// Returns the full object key for `item`: the substituted template
    /// followed by `<id>.json`.
    pub fn resolve(&self, item: &Item) -> Result<String, Error> {
        if item.id.is_empty() {
            return Err(Error::MissingField("id".to_string()));
        }
        let dir = self.substitute(item)?;
        let file_name = format!("{}.json", item.id);
        if dir.is_empty() {
            return Ok(file_name);
        }
        Ok(format!("{}/{}", dir.trim_end_matches('/'), file_name))
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_PATH_TEMPLATE).expect("Default template should always parse")
    }
}

impl FromStr for PathTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolves `template` against `item` in one step.
pub fn resolve(item: &Item, template: &str) -> Result<String, Error> {
    PathTemplate::parse(template)?.resolve(item)
}

fn push_literal(literal: &mut String, text: &str) -> Result<(), &'static str> {
    if text.contains('$') {
        return Err("unterminated or invalid placeholder");
    }
    literal.push_str(text);
    Ok(())
}

fn render_value(key: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        // Capitalized to match keys already written by the pipeline.
        Value::Bool(true) => Ok("True".to_string()),
        Value::Bool(false) => Ok("False".to_string()),
        Value::Null => Err(Error::MissingField(key.to_string())),
        Value::Array(_) | Value::Object(_) => Err(Error::UnsupportedValue(key.to_string())),
    }
}

fn item_date(item: &Item) -> Result<NaiveDate, Error> {
    let datetime = item.properties.datetime.as_deref();
    datetime
        .and_then(parse_date)
        .ok_or_else(|| Error::InvalidDate(datetime.map(str::to_string)))
}

/// Accepts RFC 3339 timestamps as well as the looser ISO-8601 shapes
/// pipelines tend to emit (no offset, space separator, bare date).
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
