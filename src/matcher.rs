//! Key matching between two profiled tables.
//!
//! Every candidate key of the left table is paired with every candidate of
//! the right table of the same arity. Composite components are aligned
//! best-first by name similarity, the pair is scored, and the best pair that
//! clears the threshold wins under a total, deterministic ordering.

use std::{cmp::Ordering, collections::BTreeSet};

use log::debug;
use serde::Serialize;

use crate::{
    candidates::KeyCandidate,
    coerce::{assemble, column_in_form, key_form},
    config::{MatchConfig, NameStrategy},
    profile::TableProfile,
    similarity::{MatchScore, name_similarity, value_overlap},
};

/// A resolved key mapping between two tables. The right key's components are
/// ordered to line up with the left key's components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCorrespondence {
    pub left_table: String,
    pub right_table: String,
    pub left: KeyCandidate,
    pub right: KeyCandidate,
    /// Name similarity of each aligned component pair.
    pub component_similarity: Vec<f64>,
    pub score: MatchScore,
}

impl KeyCorrespondence {
    pub fn arity(&self) -> usize {
        self.left.arity()
    }

    pub fn describe(&self) -> String {
        format!(
            "{}[{}] <-> {}[{}]",
            self.left_table,
            self.left.names.join(", "),
            self.right_table,
            self.right.names.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(KeyCorrespondence),
    Unmatched {
        /// Candidate pairs that were scored.
        evaluated: usize,
        /// Highest-ranked pair seen, even though it missed the threshold.
        best: Option<KeyCorrespondence>,
    },
}

impl MatchOutcome {
    pub fn matched(&self) -> Option<&KeyCorrespondence> {
        match self {
            MatchOutcome::Matched(correspondence) => Some(correspondence),
            MatchOutcome::Unmatched { .. } => None,
        }
    }
}

/// Greedy best-first pairing of composite components.
///
/// All component pairs are ranked by name similarity (ties by left, then
/// right position) and taken in that order while both sides are free.
/// Returns, for each left position, the matched right position and the
/// similarity of that pair.
pub fn align_components(
    left_profile: &TableProfile,
    left: &KeyCandidate,
    right_profile: &TableProfile,
    right: &KeyCandidate,
    strategy: NameStrategy,
) -> Vec<(usize, f64)> {
    let mut pairs = Vec::with_capacity(left.arity() * right.arity());
    for (l_pos, l_idx) in left.columns.iter().enumerate() {
        for (r_pos, r_idx) in right.columns.iter().enumerate() {
            let similarity = name_similarity(
                &left_profile.column(*l_idx).name,
                &right_profile.column(*r_idx).name,
                strategy,
            );
            pairs.push((l_pos, r_pos, similarity));
        }
    }
    pairs.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut assigned: Vec<Option<(usize, f64)>> = vec![None; left.arity()];
    let mut right_taken = vec![false; right.arity()];
    for (l_pos, r_pos, similarity) in pairs {
        if assigned[l_pos].is_none() && !right_taken[r_pos] {
            assigned[l_pos] = Some((r_pos, similarity));
            right_taken[r_pos] = true;
        }
    }
    assigned.into_iter().flatten().collect()
}

/// Scores one candidate pair. Pairs of different arity are not comparable
/// and yield `None`.
pub fn score_pair(
    left_profile: &TableProfile,
    left: &KeyCandidate,
    right_profile: &TableProfile,
    right: &KeyCandidate,
    config: &MatchConfig,
) -> Option<KeyCorrespondence> {
    if left.arity() != right.arity() {
        return None;
    }
    let alignment = align_components(left_profile, left, right_profile, right, config.strategy);
    let order = alignment.iter().map(|(pos, _)| *pos).collect::<Vec<_>>();
    let component_similarity = alignment.iter().map(|(_, sim)| *sim).collect::<Vec<_>>();
    let aligned_right = right.reordered(&order);

    let name_score =
        component_similarity.iter().sum::<f64>() / component_similarity.len().max(1) as f64;
    let (left_values, right_values) =
        joinable_value_sets(left_profile, &left.columns, right_profile, &aligned_right.columns);
    let overlap = value_overlap(&left_values, &right_values);
    let score = MatchScore::new(name_score, overlap, config.name_weight);

    Some(KeyCorrespondence {
        left_table: left_profile.table.clone(),
        right_table: right_profile.table.clone(),
        left: left.clone(),
        right: aligned_right,
        component_similarity,
        score,
    })
}

/// Distinct key values of both sides, each component read in the form the
/// join will compare it in, so the overlap predicts what the equi-join finds.
fn joinable_value_sets(
    left_profile: &TableProfile,
    left_columns: &[usize],
    right_profile: &TableProfile,
    right_columns: &[usize],
) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut left_components = Vec::with_capacity(left_columns.len());
    let mut right_components = Vec::with_capacity(right_columns.len());
    for (l_idx, r_idx) in left_columns.iter().zip(right_columns) {
        let left = left_profile.column(*l_idx);
        let right = right_profile.column(*r_idx);
        let form = key_form(left.column_type, right.column_type);
        left_components.push(column_in_form(left, form).into_owned());
        right_components.push(column_in_form(right, form).into_owned());
    }
    let collect = |components: &[Vec<Option<String>>]| {
        assemble(components)
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
    };
    (collect(&left_components), collect(&right_components))
}

/// Total order over correspondences, best first: higher combined score,
/// then higher value overlap, then lower arity, then column names.
pub fn compare_correspondences(a: &KeyCorrespondence, b: &KeyCorrespondence) -> Ordering {
    b.score
        .combined
        .total_cmp(&a.score.combined)
        .then_with(|| b.score.value_overlap.total_cmp(&a.score.value_overlap))
        .then_with(|| a.arity().cmp(&b.arity()))
        .then_with(|| a.left.names.cmp(&b.left.names))
        .then_with(|| a.right.names.cmp(&b.right.names))
}

/// Searches the candidate product space of two tables for the best key pair
/// that clears `config.threshold`.
///
/// Pairs without superset candidates are searched first; pairs involving a
/// superset of a single-column key are only tried when that finds nothing,
/// which keeps a single key reachable from a table whose keys are composite.
pub fn match_tables(
    left_profile: &TableProfile,
    left_candidates: &[KeyCandidate],
    right_profile: &TableProfile,
    right_candidates: &[KeyCandidate],
    config: &MatchConfig,
) -> MatchOutcome {
    let mut evaluated = 0usize;
    let mut best_seen: Option<KeyCorrespondence> = None;

    for supersets in [false, true] {
        let mut best_accepted: Option<KeyCorrespondence> = None;
        for left in left_candidates {
            for right in right_candidates {
                if (left.superset || right.superset) != supersets {
                    continue;
                }
                let Some(candidate) = score_pair(left_profile, left, right_profile, right, config)
                else {
                    continue;
                };
                evaluated += 1;
                let accepted = candidate.score.clears(config.threshold);
                debug!(
                    "{} | name {:.3} overlap {:.3} combined {:.3}{}",
                    candidate.describe(),
                    candidate.score.name_similarity,
                    candidate.score.value_overlap,
                    candidate.score.combined,
                    if accepted { "" } else { " (below threshold)" }
                );
                if accepted && is_better(&candidate, best_accepted.as_ref()) {
                    best_accepted = Some(candidate.clone());
                }
                if is_better(&candidate, best_seen.as_ref()) {
                    best_seen = Some(candidate);
                }
            }
        }
        if let Some(correspondence) = best_accepted {
            return MatchOutcome::Matched(correspondence);
        }
    }

    MatchOutcome::Unmatched {
        evaluated,
        best: best_seen,
    }
}

fn is_better(candidate: &KeyCorrespondence, incumbent: Option<&KeyCorrespondence>) -> bool {
    incumbent.is_none_or(|current| compare_correspondences(candidate, current) == Ordering::Less)
}
