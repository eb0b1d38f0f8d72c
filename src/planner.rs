//! Join planning: decides, for every table after the anchor, which table it
//! joins to and on which key correspondence.
//!
//! The first table is the anchor. Each later table is matched against the
//! anchor first; when that fails, it may join to any earlier table that is
//! already part of the plan. Planning only reads the input tables, so the
//! plan (and therefore the set of unmatched tables) does not depend on the
//! join type.

use std::{borrow::Cow, cmp::Ordering};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    candidates::{KeyCandidate, generate_candidates},
    coerce::ValueSnap,
    config::{JoinHow, MatchConfig},
    error::Result,
    matcher::{KeyCorrespondence, MatchOutcome, compare_correspondences, match_tables},
    profile::{TableProfile, profile_table},
    report::{PairOutcome, Report, UnmatchedReason},
    table::Table,
};

/// Profile and ranked key candidates for one input table.
#[derive(Debug, Clone)]
pub struct TableAnalysis {
    pub profile: TableProfile,
    pub candidates: Vec<KeyCandidate>,
}

pub fn analyze(table: &Table, config: &MatchConfig) -> Result<TableAnalysis> {
    let profile = profile_table(table);
    let (numeric, date, text) = profile.type_counts();
    debug!(
        "{} | {} row(s), {} numeric, {} date, {} text column(s)",
        profile.table, profile.row_count, numeric, date, text
    );
    let candidates = generate_candidates(&profile, config)?;
    Ok(TableAnalysis {
        profile,
        candidates,
    })
}

/// One join of the accumulated result with an input table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinStep {
    /// Index of the already-joined table whose key columns are used.
    pub left: usize,
    /// Index of the table being joined in.
    pub right: usize,
    pub correspondence: KeyCorrespondence,
    pub how: JoinHow,
    /// Approximate matching of text key values, when enabled.
    pub snap: Option<ValueSnap>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPlan {
    pub anchor: usize,
    /// Steps in input order of their right table.
    pub steps: Vec<JoinStep>,
}

impl JoinPlan {
    /// Anchor first, then every table that a step joins in.
    pub fn joined_tables(&self) -> Vec<usize> {
        std::iter::once(self.anchor)
            .chain(self.steps.iter().map(|s| s.right))
            .collect()
    }
}

/// Everything decided before any rows are joined.
#[derive(Debug, Clone)]
pub struct PlannedJoin<'a> {
    /// The inputs as matched, after optional duplicate-row removal.
    pub tables: Cow<'a, [Table]>,
    pub analyses: Vec<TableAnalysis>,
    pub plan: JoinPlan,
    pub report: Report,
}

/// Builds the plan and the decision report for `analyses`, which must be in
/// input order with the anchor first.
pub fn build_plan(analyses: &[TableAnalysis], config: &MatchConfig) -> (JoinPlan, Report) {
    let anchor = 0usize;
    let anchor_name = analyses
        .first()
        .map(|a| a.profile.table.clone())
        .unwrap_or_default();
    let mut report = Report::new(anchor_name, config.clone());
    let mut steps = Vec::new();
    let mut joined = vec![anchor];

    for right in 1..analyses.len() {
        let right_name = analyses[right].profile.table.clone();
        let mut attempted = Vec::new();
        let mut evaluated = 0usize;
        let mut best_seen: Option<KeyCorrespondence> = None;
        let mut accepted: Option<(usize, KeyCorrespondence)> = None;

        for &left in &joined {
            // Fallback partners are only consulted once the anchor has failed.
            if accepted.as_ref().is_some_and(|(l, _)| *l == anchor) {
                break;
            }
            attempted.push(analyses[left].profile.table.clone());
            match pair_outcome(&analyses[left], &analyses[right], config) {
                MatchOutcome::Matched(correspondence) => {
                    let better = accepted.as_ref().is_none_or(|(_, current)| {
                        compare_correspondences(&correspondence, current) == Ordering::Less
                    });
                    if better {
                        accepted = Some((left, correspondence));
                    }
                }
                MatchOutcome::Unmatched { evaluated: n, best } => {
                    evaluated += n;
                    if let Some(best) = best
                        && best_seen.as_ref().is_none_or(|current| {
                            compare_correspondences(&best, current) == Ordering::Less
                        })
                    {
                        best_seen = Some(best);
                    }
                }
            }
        }

        match accepted {
            Some((left, correspondence)) => {
                let via_fallback = left != anchor;
                info!(
                    "{} | Join by {} (score {:.3}{})",
                    right_name,
                    correspondence.describe(),
                    correspondence.score.combined,
                    if via_fallback { ", via earlier table" } else { "" }
                );
                report.outcomes.push(PairOutcome::Matched {
                    index: right,
                    table: right_name,
                    joined_to: analyses[left].profile.table.clone(),
                    via_fallback,
                    correspondence: correspondence.clone(),
                    execution: None,
                });
                steps.push(JoinStep {
                    left,
                    right,
                    correspondence,
                    how: config.how,
                    snap: config.value_similarity.map(|cutoff| ValueSnap {
                        cutoff,
                        strategy: config.strategy,
                    }),
                });
                joined.push(right);
            }
            None => {
                let reason = if evaluated == 0 {
                    UnmatchedReason::NoComparableCandidates
                } else {
                    UnmatchedReason::BelowThreshold {
                        threshold: config.threshold,
                        evaluated,
                    }
                };
                match &best_seen {
                    Some(best) => warn!(
                        "{} | No join key found (best {} scored {:.3}, threshold {:.3}); table left out",
                        right_name,
                        best.describe(),
                        best.score.combined,
                        config.threshold
                    ),
                    None => warn!(
                        "{} | No comparable key candidates; table left out",
                        right_name
                    ),
                }
                report.outcomes.push(PairOutcome::Unmatched {
                    index: right,
                    table: right_name,
                    attempted,
                    reason,
                    best: best_seen,
                });
            }
        }
    }

    (JoinPlan { anchor, steps }, report)
}

fn pair_outcome(left: &TableAnalysis, right: &TableAnalysis, config: &MatchConfig) -> MatchOutcome {
    match_tables(
        &left.profile,
        &left.candidates,
        &right.profile,
        &right.candidates,
        config,
    )
}
