use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date layouts recognised during inference, tried in order. A column is a
/// date column when one of these parses every non-null value.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y",
];

const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    #[default]
    String,
    Date,
    Boolean,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    /// Canonical rendering used for keys: ISO dates, integral floats without
    /// a fractional part, lower-case booleans.
    pub fn canonical(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format_number(*f),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format(CANONICAL_DATE_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Tokens that loaders treat as a missing value.
pub fn is_null_token(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_ascii_lowercase();
    matches!(
        lowered.trim_start_matches('#'),
        "na" | "n/a" | "n.a." | "nan" | "null" | "none" | "missing"
    )
}

pub fn parse_integer(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

pub fn parse_float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if !trimmed.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

pub fn parse_date_with(value: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), format).ok()
}

/// Parses with the first layout in [`DATE_FORMATS`] that accepts the value.
pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| parse_date_with(value, format))
}

/// First layout in [`DATE_FORMATS`] that parses every value, if any.
pub fn detect_date_format<'a, I>(values: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    DATE_FORMATS.iter().copied().find(|format| {
        values
            .clone()
            .into_iter()
            .all(|value| parse_date_with(value, format).is_some())
    })
}

/// Parses a raw cell as the given type. `date_format` pins the layout for
/// date columns; without it every known layout is tried.
pub fn parse_typed_value(
    value: &str,
    ty: ColumnType,
    date_format: Option<&str>,
) -> Option<Value> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match ty {
        ColumnType::String => Some(Value::String(trimmed.to_string())),
        ColumnType::Integer => parse_integer(trimmed).map(Value::Integer),
        ColumnType::Float => parse_float(trimmed).map(Value::Float),
        ColumnType::Boolean => parse_boolean(trimmed).map(Value::Boolean),
        ColumnType::Date => match date_format {
            Some(format) => parse_date_with(trimmed, format),
            None => parse_naive_date(trimmed),
        }
        .map(Value::Date),
    }
}
