use std::{
    borrow::Cow,
    collections::{BTreeSet, HashMap},
};

use log::debug;
use serde::Serialize;

use crate::{
    config::NameStrategy,
    data::{
        ColumnType, format_number, parse_boolean, parse_date_with, parse_float, parse_integer,
        parse_naive_date,
    },
    matcher::KeyCorrespondence,
    normalize::{composite_key, normalize_value},
    profile::{ColumnProfile, TableProfile},
    similarity::string_similarity,
};

/// Shared representation both sides of a key component are brought into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyForm {
    Text,
    Numeric,
    Date,
    Boolean,
}

/// Picks the representation for a component from the two column types.
pub fn key_form(left: ColumnType, right: ColumnType) -> KeyForm {
    use ColumnType::*;
    match (left, right) {
        (Date, Date) | (Date, String) | (String, Date) => KeyForm::Date,
        (l, r) if l.is_numeric() && (r.is_numeric() || r == String) => KeyForm::Numeric,
        (String, r) if r.is_numeric() => KeyForm::Numeric,
        (Boolean, Boolean) | (Boolean, String) | (String, Boolean) => KeyForm::Boolean,
        _ => KeyForm::Text,
    }
}

/// Form a column's profiled values are already in.
pub fn native_form(ty: ColumnType) -> KeyForm {
    match ty {
        ColumnType::Integer | ColumnType::Float => KeyForm::Numeric,
        ColumnType::Date => KeyForm::Date,
        ColumnType::Boolean => KeyForm::Boolean,
        ColumnType::String => KeyForm::Text,
    }
}

/// Brings one raw cell into `form`. `None` means the value could not be
/// represented and will not join.
pub fn coerce_value(raw: &str, own: &ColumnProfile, form: KeyForm) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match form {
        KeyForm::Text => normalize_value(trimmed, own.column_type, own.date_format.as_deref()),
        KeyForm::Date => match own.date_format.as_deref() {
            Some(format) => parse_date_with(trimmed, format),
            None => parse_naive_date(trimmed),
        }
        .map(|date| date.format("%Y-%m-%d").to_string()),
        KeyForm::Numeric => {
            let compact = trimmed.replace(char::is_whitespace, "");
            parse_integer(&compact)
                .map(|i| i.to_string())
                .or_else(|| parse_float(&compact).map(format_number))
        }
        KeyForm::Boolean => parse_boolean(trimmed).map(|b| b.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoercedColumn {
    pub values: Vec<Option<String>>,
    /// Non-null inputs that could not be coerced.
    pub skipped: usize,
}

pub fn coerce_column(values: &[Option<String>], own: &ColumnProfile, form: KeyForm) -> CoercedColumn {
    let cells = values
        .iter()
        .map(|value| KeyCell {
            value: value.as_deref(),
            source: own,
        })
        .collect::<Vec<_>>();
    coerce_cells(&cells, form)
}

/// Row values of a profiled column in `form`. Borrows the profile's own
/// normalized values when they are already in that form.
pub fn column_in_form(column: &ColumnProfile, form: KeyForm) -> Cow<'_, [Option<String>]> {
    if native_form(column.column_type) == form {
        Cow::Borrowed(&column.normalized)
    } else {
        Cow::Owned(coerce_column(&column.raw, column, form).values)
    }
}

/// One key cell and the input column it was read from.
#[derive(Debug, Clone, Copy)]
pub struct KeyCell<'a> {
    pub value: Option<&'a str>,
    pub source: &'a ColumnProfile,
}

/// Coerces cells that may come from different input columns; each cell is
/// read with its own column's layout.
pub fn coerce_cells(cells: &[KeyCell<'_>], form: KeyForm) -> CoercedColumn {
    let mut skipped = 0usize;
    let values = cells
        .iter()
        .map(|cell| {
            let raw = cell.value.map(str::trim).filter(|v| !v.is_empty())?;
            let coerced = coerce_value(raw, cell.source, form);
            if coerced.is_none() {
                skipped += 1;
                debug!(
                    "'{}' | value '{}' cannot be read as {:?}; it will not join",
                    cell.source.name, raw, form
                );
            }
            coerced
        })
        .collect();
    CoercedColumn { values, skipped }
}

/// Approximate matching of text key values, applied before the equi-join.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueSnap {
    /// Minimum similarity for a value to take over its counterpart's spelling.
    pub cutoff: f64,
    pub strategy: NameStrategy,
}

/// Replaces every value without an exact counterpart in `targets` by the most
/// similar target scoring at least `snap.cutoff`. Ties go to the first target
/// in sorted order. Returns how many values were replaced.
pub fn snap_values(values: &mut [Option<String>], targets: &BTreeSet<String>, snap: ValueSnap) -> usize {
    let mut memo: HashMap<String, Option<String>> = HashMap::new();
    let mut snapped = 0usize;
    for slot in values.iter_mut() {
        let Some(value) = slot.as_deref() else {
            continue;
        };
        if targets.contains(value) {
            continue;
        }
        let replacement = memo
            .entry(value.to_string())
            .or_insert_with(|| best_target(value, targets, snap))
            .clone();
        if let Some(target) = replacement {
            debug!("'{value}' snapped to '{target}'");
            *slot = Some(target);
            snapped += 1;
        }
    }
    snapped
}

fn best_target(value: &str, targets: &BTreeSet<String>, snap: ValueSnap) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for target in targets {
        let score = string_similarity(value, target, snap.strategy);
        if score >= snap.cutoff && best.is_none_or(|(_, current)| score > current) {
            best = Some((target, score));
        }
    }
    best.map(|(target, _)| target.clone())
}

/// Join-ready keys for both sides of a correspondence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercedKeys {
    #[serde(skip)]
    pub left: Vec<Option<String>>,
    #[serde(skip)]
    pub right: Vec<Option<String>>,
    /// Per-component coerced right values, in correspondence order.
    #[serde(skip)]
    pub right_components: Vec<Vec<Option<String>>>,
    pub forms: Vec<KeyForm>,
    pub left_skipped: usize,
    pub right_skipped: usize,
    /// Left text values replaced by a similar right value.
    pub left_snapped: usize,
}

/// Coerces the key components of both sides and assembles composite keys.
///
/// `left_cells[i]` holds the cells of the left key's i-th column (in
/// correspondence order), likewise for the right side. Each component's form
/// comes from the column types in the two profiles. With `snap`, left text
/// values without an exact right counterpart take the spelling of the most
/// similar right value.
pub fn coerce_keys(
    correspondence: &KeyCorrespondence,
    left_profile: &TableProfile,
    left_cells: &[Vec<KeyCell<'_>>],
    right_profile: &TableProfile,
    right_cells: &[Vec<KeyCell<'_>>],
    snap: Option<ValueSnap>,
) -> CoercedKeys {
    let mut forms = Vec::with_capacity(correspondence.arity());
    let mut left_columns = Vec::with_capacity(correspondence.arity());
    let mut right_columns = Vec::with_capacity(correspondence.arity());
    let mut left_skipped = 0usize;
    let mut right_skipped = 0usize;
    let mut left_snapped = 0usize;

    let components = correspondence
        .left
        .columns
        .iter()
        .zip(&correspondence.right.columns)
        .zip(left_cells.iter().zip(right_cells));
    for ((l_idx, r_idx), (left_values, right_values)) in components {
        let form = key_form(
            left_profile.column(*l_idx).column_type,
            right_profile.column(*r_idx).column_type,
        );
        let mut left = coerce_cells(left_values, form);
        let right = coerce_cells(right_values, form);
        if let Some(snap) = snap
            && form == KeyForm::Text
        {
            let targets = right.values.iter().flatten().cloned().collect::<BTreeSet<_>>();
            left_snapped += snap_values(&mut left.values, &targets, snap);
        }
        left_skipped += left.skipped;
        right_skipped += right.skipped;
        forms.push(form);
        left_columns.push(left.values);
        right_columns.push(right.values);
    }

    CoercedKeys {
        left: assemble(&left_columns),
        right: assemble(&right_columns),
        right_components: right_columns,
        forms,
        left_skipped,
        right_skipped,
        left_snapped,
    }
}

/// Composite key per row from per-component values.
pub fn assemble(columns: &[Vec<Option<String>>]) -> Vec<Option<String>> {
    let rows = columns.first().map(Vec::len).unwrap_or(0);
    (0..rows)
        .map(|row| composite_key(columns.iter().map(|c| c[row].as_deref())))
        .collect()
}
