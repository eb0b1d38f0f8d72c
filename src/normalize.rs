//! String normalization shared by profiling, scoring, and key coercion.
//!
//! Values and names are compared in a folded form: lower-case, with all
//! whitespace and separator punctuation removed. `"ABC 1234"`, `"abc-1234"`
//! and `"ABC1234"` all normalize to `"abc1234"`.

use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

use crate::data::{ColumnType, parse_typed_value};

/// Separator between component values of a composite key. Never produced by
/// normalization, so concatenated keys cannot collide across components.
pub const KEY_SEPARATOR: &str = "\u{1f}";

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[\s\-_/\\.,;:|()\[\]{}"'`]+"#).expect("separator pattern is valid")
    })
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Removes whitespace and separator punctuation, borrowing when nothing matches.
pub fn strip_separators(input: &str) -> Cow<'_, str> {
    let pattern = separator_pattern();
    if pattern.is_match(input) {
        Cow::Owned(pattern.replace_all(input, "").into_owned())
    } else {
        Cow::Borrowed(input)
    }
}

/// Trims and collapses internal whitespace runs to a single space.
pub fn collapse_whitespace(input: &str) -> Cow<'_, str> {
    let trimmed = input.trim();
    let pattern = whitespace_pattern();
    if trimmed.contains(|c: char| c.is_whitespace() && c != ' ') || trimmed.contains("  ") {
        Cow::Owned(pattern.replace_all(trimmed, " ").into_owned())
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// Folded form of free text. Empty after folding means the value carries no
/// comparable content.
pub fn normalize_text(value: &str) -> Option<String> {
    let stripped = strip_separators(value);
    let folded = lowercase(stripped.as_ref());
    if folded.is_empty() {
        None
    } else {
        Some(folded.into_owned())
    }
}

/// Folded form of a column name: case-folded with separators stripped.
pub fn normalize_name(name: &str) -> String {
    lowercase(strip_separators(name).as_ref()).into_owned()
}

/// Normalized form of a raw cell for a column of type `ty`.
///
/// Typed columns go through their canonical typed rendering so that
/// `"05/01/2024"` and `"2024-01-05"` meet in the middle; strings are folded
/// with [`normalize_text`]. Values that do not parse as `ty` yield `None`.
pub fn normalize_value(raw: &str, ty: ColumnType, date_format: Option<&str>) -> Option<String> {
    match ty {
        ColumnType::String => normalize_text(raw),
        _ => parse_typed_value(raw, ty, date_format).map(|value| value.canonical()),
    }
}

/// Joins component values into one composite key; any missing component
/// makes the whole key missing.
pub fn composite_key<'a, I>(components: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut key = String::new();
    for (idx, component) in components.into_iter().enumerate() {
        let component = component?;
        if idx > 0 {
            key.push_str(KEY_SEPARATOR);
        }
        key.push_str(component);
    }
    Some(key)
}
