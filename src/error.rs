//! Fatal error conditions raised by the matching engine.
//!
//! Everything that is not listed here degrades gracefully: a table pair that
//! fails to clear the similarity threshold is reported as unmatched, and a key
//! value that cannot be coerced becomes null and simply does not join. Both
//! are recorded in the [`Report`](crate::report::Report) instead.

use thiserror::Error;

/// Result type alias for the engine's fallible operations.
pub type Result<T> = std::result::Result<T, AutoJoinError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AutoJoinError {
    /// Fewer than two tables were handed to the engine.
    #[error("at least two tables are required to join, got {count}")]
    TooFewTables { count: usize },

    /// A table has no columns or no rows.
    #[error("table '{table}' is empty ({columns} column(s), {rows} row(s))")]
    EmptyTable {
        table: String,
        columns: usize,
        rows: usize,
    },

    /// Columns of one table disagree on their length.
    #[error("column '{column}' in table '{table}' has {found} value(s), expected {expected}")]
    RaggedTable {
        table: String,
        column: String,
        expected: usize,
        found: usize,
    },

    /// No key candidate could be formed, not even the all-columns fallback.
    #[error("no candidate key could be formed for table '{table}'")]
    NoCandidateKey { table: String },

    /// A configuration value is outside its accepted range.
    #[error("invalid value {value} for '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}
