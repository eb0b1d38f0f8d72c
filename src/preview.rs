//! Aligned plain-text rendering for joined tables, profiles, and reports.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::table::Table;

const COLUMN_GAP: &str = "  ";
const MIN_RULE_WIDTH: usize = 3;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let rules = widths
        .iter()
        .map(|w| "-".repeat((*w).max(MIN_RULE_WIDTH)))
        .collect::<Vec<_>>();
    let rule_widths = widths
        .iter()
        .map(|w| (*w).max(MIN_RULE_WIDTH))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let _ = writeln!(output, "{}", format_row(&rules, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Renders at most `limit` rows of `table` (all rows when `limit` is 0);
/// null cells are shown empty.
pub fn render_preview(table: &Table, limit: usize) -> String {
    let take = if limit == 0 {
        table.row_count()
    } else {
        limit.min(table.row_count())
    };
    let rows = (0..take)
        .map(|idx| {
            table
                .row(idx)
                .into_iter()
                .map(|cell| cell.unwrap_or_default().to_string())
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    render_table(&table.headers(), &rows)
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }
    widths
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, (value, width)) in values.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str(COLUMN_GAP);
        }
        let cell = sanitize_cell(value);
        let padding = width.saturating_sub(display_width(&cell));
        line.push_str(&cell);
        line.extend(std::iter::repeat_n(' ', padding));
    }
    line.truncate(line.trim_end_matches(' ').len());
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, e.g. \x1b[31m
            chars.by_ref().find(|next| *next == 'm');
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_aligns_columns() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec!["1".to_string(), "Alice".to_string()],
            vec!["2".to_string(), "Bob".to_string()],
        ];

        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines, vec!["id  name", "---  -----", "1   Alice", "2   Bob"]);
    }

    #[test]
    fn render_table_normalizes_control_characters() {
        let headers = vec!["note".to_string()];
        let rows = vec![vec!["line1\nline2\tvalue".to_string()]];

        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "line1 line2 value");
    }

    #[test]
    fn render_preview_limits_rows_and_blanks_nulls() {
        let table =
            Table::from_text_rows("t", &["id", "v"], &[&["1", ""], &["2", "b"], &["3", "c"]])
                .unwrap();
        let rendered = render_preview(&table, 2);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, vec!["id  v", "---  ---", "1", "2   b"]);
    }
}
