use std::collections::HashSet;

use serde::Serialize;

use crate::error::{AutoJoinError, Result};

/// A named column of nullable raw cell values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    name: String,
    values: Vec<Option<String>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&str> {
        self.values.get(row).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Immutable column-major snapshot of one input dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        if let Some(ragged) = columns.iter().find(|c| c.len() != row_count) {
            return Err(AutoJoinError::RaggedTable {
                table: name,
                column: ragged.name.clone(),
                expected: row_count,
                found: ragged.len(),
            });
        }
        Ok(Self {
            name,
            columns,
            row_count,
        })
    }

    /// Builds a table from row-major records; short rows are padded with nulls.
    pub fn from_rows(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self> {
        let mut columns: Vec<Vec<Option<String>>> = headers
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().flatten());
            }
        }
        let columns = headers
            .into_iter()
            .zip(columns)
            .map(|(header, values)| Column::new(header, values))
            .collect();
        Self::new(name, columns)
    }

    /// Convenience constructor from text cells where `""` is null.
    pub fn from_text_rows(name: &str, headers: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect()
            })
            .collect();
        Self::from_rows(name, headers, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, index: usize) -> Vec<Option<&str>> {
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    /// Copy without repeated rows; the first occurrence of each row is kept.
    pub fn without_duplicate_rows(&self) -> Self {
        let mut seen = HashSet::with_capacity(self.row_count);
        let keep = (0..self.row_count)
            .filter(|row| seen.insert(self.row(*row)))
            .collect::<Vec<_>>();
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), keep.iter().map(|r| c.values[*r].clone()).collect()))
            .collect();
        Self {
            name: self.name.clone(),
            columns,
            row_count: keep.len(),
        }
    }

    /// Row-major copy of the cells, mainly for writers and previews.
    pub fn rows(&self) -> Vec<Vec<Option<String>>> {
        (0..self.row_count)
            .map(|idx| {
                self.columns
                    .iter()
                    .map(|c| c.values[idx].clone())
                    .collect()
            })
            .collect()
    }

    /// Rejects tables that cannot take part in a join.
    pub fn ensure_joinable(&self) -> Result<()> {
        if self.columns.is_empty() || self.row_count == 0 {
            return Err(AutoJoinError::EmptyTable {
                table: self.name.clone(),
                columns: self.columns.len(),
                rows: self.row_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_rows_maps_empty_cells_to_null() {
        let table =
            Table::from_text_rows("t", &["id", "name"], &[&["1", "a"], &["2", ""]]).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1), vec![Some("2"), None]);
        assert_eq!(table.column_by_name("name").unwrap().get(0), Some("a"));
    }

    #[test]
    fn duplicate_rows_are_dropped_keeping_first() {
        let table = Table::from_text_rows(
            "t",
            &["id", "name"],
            &[&["1", "a"], &["2", ""], &["1", "a"], &["2", ""], &["1", "b"]],
        )
        .unwrap();
        let unique = table.without_duplicate_rows();
        assert_eq!(unique.row_count(), 3);
        assert_eq!(unique.row(1), vec![Some("2"), None]);
        assert_eq!(unique.row(2), vec![Some("1"), Some("b")]);
        assert_eq!(unique.name(), "t");
    }

    #[test]
    fn new_rejects_ragged_columns() {
        let err = Table::new(
            "t",
            vec![
                Column::new("a", vec![Some("1".into())]),
                Column::new("b", vec![]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, AutoJoinError::RaggedTable { found: 0, .. }));
    }

    #[test]
    fn ensure_joinable_rejects_empty_tables() {
        let no_rows = Table::from_text_rows("t", &["id"], &[]).unwrap();
        assert!(matches!(
            no_rows.ensure_joinable(),
            Err(AutoJoinError::EmptyTable { rows: 0, .. })
        ));
        let no_columns = Table::new("t", Vec::new()).unwrap();
        assert!(no_columns.ensure_joinable().is_err());
    }

    #[test]
    fn rows_round_trip_through_from_rows() {
        let table = Table::from_text_rows("t", &["a", "b"], &[&["1", "x"], &["", "y"]]).unwrap();
        let rebuilt = Table::from_rows("t", table.headers(), table.rows()).unwrap();
        assert_eq!(rebuilt, table);
    }
}
