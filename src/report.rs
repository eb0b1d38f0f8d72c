//! Record of every decision a run made, in input order.
//!
//! Nothing is dropped silently: each non-anchor table shows up exactly once,
//! either as matched (with the key pair, its score, and execution statistics)
//! or as unmatched (with the tables that were tried and the best score seen).

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{coerce::KeyForm, config::MatchConfig, matcher::KeyCorrespondence};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub anchor: String,
    pub config: MatchConfig,
    pub outcomes: Vec<PairOutcome>,
    /// Shape of the merged table; absent until the plan has been executed.
    pub output_rows: Option<usize>,
    pub output_columns: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Matched {
        /// Position of the table among the inputs.
        index: usize,
        table: String,
        joined_to: String,
        /// Joined to an earlier table because the anchor had no qualifying key.
        via_fallback: bool,
        correspondence: KeyCorrespondence,
        execution: Option<StepExecution>,
    },
    Unmatched {
        index: usize,
        table: String,
        attempted: Vec<String>,
        reason: UnmatchedReason,
        best: Option<KeyCorrespondence>,
    },
}

impl PairOutcome {
    pub fn table(&self) -> &str {
        match self {
            PairOutcome::Matched { table, .. } | PairOutcome::Unmatched { table, .. } => table,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            PairOutcome::Matched { index, .. } | PairOutcome::Unmatched { index, .. } => *index,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, PairOutcome::Matched { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// Pairs were scored but none reached the threshold.
    BelowThreshold { threshold: f64, evaluated: usize },
    /// No candidate pair had comparable arity, so nothing was scored.
    NoComparableCandidates,
}

/// What happened when a matched step was executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepExecution {
    /// Input position of the table joined in by this step.
    pub index: usize,
    pub table: String,
    pub key_forms: Vec<KeyForm>,
    /// Key values that failed coercion on the accumulated (left) side.
    pub left_skipped: usize,
    pub right_skipped: usize,
    /// Accumulated text key values joined through a similar right value.
    pub left_snapped: usize,
    pub matched_left_rows: usize,
    pub matched_right_rows: usize,
    pub added_columns: Vec<String>,
    pub output_rows: usize,
}

impl Report {
    pub fn new(anchor: impl Into<String>, config: MatchConfig) -> Self {
        Self {
            anchor: anchor.into(),
            config,
            outcomes: Vec::new(),
            output_rows: None,
            output_columns: None,
        }
    }

    pub fn matched_tables(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_matched())
            .map(PairOutcome::table)
            .collect()
    }

    pub fn unmatched_tables(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_matched())
            .map(PairOutcome::table)
            .collect()
    }

    /// First outcome for a table called `table`. Inputs may share a name;
    /// [`Report::outcome_at`] is unambiguous.
    pub fn outcome(&self, table: &str) -> Option<&PairOutcome> {
        self.outcomes.iter().find(|o| o.table() == table)
    }

    pub fn outcome_at(&self, index: usize) -> Option<&PairOutcome> {
        self.outcomes.iter().find(|o| o.index() == index)
    }

    /// Attaches execution statistics to the matched outcomes, by input position.
    pub fn record_executions(&mut self, executions: Vec<StepExecution>) {
        for step in executions {
            let slot = self.outcomes.iter_mut().find_map(|outcome| match outcome {
                PairOutcome::Matched {
                    index, execution, ..
                } if *index == step.index => Some(execution),
                _ => None,
            });
            if let Some(slot) = slot {
                *slot = Some(step);
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing join report")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("Writing report to {path:?}"))
    }

    /// One row per outcome for [`crate::preview::render_table`].
    pub fn summary_rows(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let headers = ["table", "status", "joined_to", "key", "name", "overlap", "score"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = self
            .outcomes
            .iter()
            .map(|outcome| match outcome {
                PairOutcome::Matched {
                    table,
                    joined_to,
                    via_fallback,
                    correspondence,
                    ..
                } => vec![
                    table.clone(),
                    if *via_fallback { "matched (fallback)" } else { "matched" }.to_string(),
                    joined_to.clone(),
                    key_pair_label(correspondence),
                    format!("{:.3}", correspondence.score.name_similarity),
                    format!("{:.3}", correspondence.score.value_overlap),
                    format!("{:.3}", correspondence.score.combined),
                ],
                PairOutcome::Unmatched { table, best, .. } => {
                    let mut row = vec![table.clone(), "unmatched".to_string(), String::new()];
                    match best {
                        Some(c) => row.extend([
                            key_pair_label(c),
                            format!("{:.3}", c.score.name_similarity),
                            format!("{:.3}", c.score.value_overlap),
                            format!("{:.3}", c.score.combined),
                        ]),
                        None => row.extend(std::iter::repeat_n(String::new(), 4)),
                    }
                    row
                }
            })
            .collect();
        (headers, rows)
    }
}

fn key_pair_label(correspondence: &KeyCorrespondence) -> String {
    format!(
        "{} = {}",
        correspondence.left.label(),
        correspondence.right.label()
    )
}
