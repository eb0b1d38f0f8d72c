//! Per-column statistics that drive key discovery.
//!
//! Type inference is strict: a column takes a type only when every non-null
//! value parses as that type (integer, then float, then date, then boolean);
//! anything else is a string column. Malformed values are never voted away.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    data::{ColumnType, detect_date_format, parse_boolean, parse_float, parse_integer},
    normalize::normalize_value,
    table::{Column, Table},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub index: usize,
    pub column_type: ColumnType,
    /// Layout shared by every value of a date column.
    pub date_format: Option<String>,
    pub non_null: usize,
    pub distinct: usize,
    /// Distinct normalized values divided by the non-null count.
    pub uniqueness: f64,
    pub null_ratio: f64,
    /// Raw cells, kept so keys can be re-read in a counterpart's form.
    #[serde(skip)]
    pub raw: Vec<Option<String>>,
    /// Normalized form of each row's value, aligned with the table rows.
    #[serde(skip)]
    pub normalized: Vec<Option<String>>,
    #[serde(skip)]
    pub value_set: BTreeSet<String>,
}

impl ColumnProfile {
    pub fn is_complete(&self) -> bool {
        self.non_null > 0 && self.non_null == self.normalized.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableProfile {
    pub table: String,
    pub row_count: usize,
    pub columns: Vec<ColumnProfile>,
}

impl TableProfile {
    pub fn column(&self, index: usize) -> &ColumnProfile {
        &self.columns[index]
    }

    pub fn type_counts(&self) -> (usize, usize, usize) {
        self.columns
            .iter()
            .fold((0, 0, 0), |(numeric, date, text), c| match c.column_type {
                ColumnType::Integer | ColumnType::Float => (numeric + 1, date, text),
                ColumnType::Date => (numeric, date + 1, text),
                ColumnType::String | ColumnType::Boolean => (numeric, date, text + 1),
            })
    }
}

pub fn profile_table(table: &Table) -> TableProfile {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| profile_column(index, column))
        .collect();
    TableProfile {
        table: table.name().to_string(),
        row_count: table.row_count(),
        columns,
    }
}

pub fn profile_column(index: usize, column: &Column) -> ColumnProfile {
    let present = present_values(column);
    let (column_type, date_format) = infer_type(&present);

    let normalized = column
        .values()
        .iter()
        .map(|value| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .and_then(|v| normalize_value(v, column_type, date_format))
        })
        .collect::<Vec<_>>();
    let value_set = normalized
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>();

    let rows = column.len();
    let non_null = normalized.iter().filter(|v| v.is_some()).count();
    let distinct = value_set.len();
    ColumnProfile {
        name: column.name().to_string(),
        index,
        column_type,
        date_format: date_format.map(str::to_string),
        non_null,
        distinct,
        uniqueness: ratio(distinct, non_null),
        null_ratio: if rows == 0 {
            0.0
        } else {
            ratio(rows - non_null, rows)
        },
        raw: column.values().to_vec(),
        normalized,
        value_set,
    }
}

/// Strict type inference over the non-null values of a column.
pub fn infer_type(values: &[&str]) -> (ColumnType, Option<&'static str>) {
    if values.is_empty() {
        return (ColumnType::String, None);
    }
    if values.iter().all(|v| parse_integer(v).is_some()) {
        return (ColumnType::Integer, None);
    }
    if values.iter().all(|v| parse_float(v).is_some()) {
        return (ColumnType::Float, None);
    }
    if let Some(format) = detect_date_format(values.iter().copied()) {
        return (ColumnType::Date, Some(format));
    }
    if values.iter().all(|v| parse_boolean(v).is_some()) {
        return (ColumnType::Boolean, None);
    }
    (ColumnType::String, None)
}

fn present_values(column: &Column) -> Vec<&str> {
    column
        .values()
        .iter()
        .filter_map(|v| v.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
