use std::{cmp::Ordering, collections::HashSet};

use itertools::Itertools;
use log::{debug, trace};
use serde::Serialize;

use crate::{
    config::MatchConfig,
    error::{AutoJoinError, Result},
    normalize::composite_key,
    profile::{TableProfile, ratio},
};

/// An ordered set of columns of one table that (nearly) identifies its rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCandidate {
    /// Column positions within the owning table.
    pub columns: Vec<usize>,
    pub names: Vec<String>,
    /// Uniqueness of the concatenated normalized component values.
    pub uniqueness: f64,
    /// Every component is non-null on every row.
    pub complete: bool,
    /// Whole-row candidate used when nothing else qualified.
    pub fallback: bool,
    /// Contains a column that is already a key on its own.
    pub superset: bool,
}

impl KeyCandidate {
    fn from_columns(
        profile: &TableProfile,
        columns: Vec<usize>,
        fallback: bool,
        superset: bool,
    ) -> Self {
        let names = columns
            .iter()
            .map(|idx| profile.column(*idx).name.clone())
            .collect();
        let complete = columns.iter().all(|idx| profile.column(*idx).is_complete());
        let uniqueness = composite_uniqueness(profile, &columns);
        Self {
            columns,
            names,
            uniqueness,
            complete,
            fallback,
            superset,
        }
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn label(&self) -> String {
        self.names.join("+")
    }

    /// Reorders the components, e.g. to line up with a counterpart key.
    pub fn reordered(&self, order: &[usize]) -> Self {
        Self {
            columns: order.iter().map(|pos| self.columns[*pos]).collect(),
            names: order.iter().map(|pos| self.names[*pos].clone()).collect(),
            ..self.clone()
        }
    }
}

/// Per-row composite values of `columns`; rows with any null component are `None`.
pub fn composite_values(profile: &TableProfile, columns: &[usize]) -> Vec<Option<String>> {
    (0..profile.row_count)
        .map(|row| {
            composite_key(
                columns
                    .iter()
                    .map(|idx| profile.column(*idx).normalized[row].as_deref()),
            )
        })
        .collect()
}

/// Distinct complete tuples over complete rows, never below the best
/// component's own uniqueness: adding a column to a key can only split
/// groups of equal rows, never merge them.
pub fn composite_uniqueness(profile: &TableProfile, columns: &[usize]) -> f64 {
    let component_best = columns
        .iter()
        .map(|idx| profile.column(*idx).uniqueness)
        .fold(0.0_f64, f64::max);
    if columns.len() == 1 {
        return component_best;
    }
    let values = composite_values(profile, columns);
    let complete = values.iter().flatten().count();
    let distinct = values.iter().flatten().collect::<HashSet<_>>().len();
    ratio(distinct, complete).max(component_best)
}

/// Proposes key candidates for one table, best first.
///
/// Singles at or above `min_uniqueness` come first; composites up to
/// `max_composite_arity` supplement them. Combinations that contain a column
/// which is already a key on its own are kept as supersets and rank after
/// every other candidate, so they only matter against a table whose keys are
/// all composite. When nothing qualifies the whole row becomes the only
/// candidate.
pub fn generate_candidates(profile: &TableProfile, config: &MatchConfig) -> Result<Vec<KeyCandidate>> {
    let column_count = profile.columns.len();
    if column_count == 0 {
        return Err(AutoJoinError::NoCandidateKey {
            table: profile.table.clone(),
        });
    }

    let mut candidates: Vec<KeyCandidate> = profile
        .columns
        .iter()
        .filter(|c| c.non_null > 0 && c.uniqueness >= config.min_uniqueness)
        .map(|c| KeyCandidate::from_columns(profile, vec![c.index], false, false))
        .collect();
    let single_keys = candidates
        .iter()
        .map(|c| c.columns[0])
        .collect::<HashSet<_>>();
    let eligible = profile
        .columns
        .iter()
        .filter(|c| c.non_null > 0)
        .map(|c| c.index)
        .collect::<Vec<_>>();

    let max_arity = config.max_composite_arity.min(eligible.len());
    for arity in 2..=max_arity {
        for combination in eligible.iter().copied().combinations(arity) {
            let uniqueness = composite_uniqueness(profile, &combination);
            trace!(
                "{} | composite {:?} uniqueness {:.3}",
                profile.table, combination, uniqueness
            );
            if uniqueness >= config.min_uniqueness {
                let superset = combination.iter().any(|c| single_keys.contains(c));
                candidates.push(KeyCandidate::from_columns(profile, combination, false, superset));
            }
        }
    }

    if candidates.is_empty() {
        debug!(
            "{} | no column combination reaches uniqueness {:.2}; using the full row",
            profile.table, config.min_uniqueness
        );
        candidates.push(KeyCandidate::from_columns(
            profile,
            (0..column_count).collect(),
            true,
            false,
        ));
    }

    candidates.sort_by(rank_candidates);
    candidates.truncate(config.max_candidates);
    debug!(
        "{} | key candidates: {}",
        profile.table,
        candidates.iter().map(KeyCandidate::label).join(", ")
    );
    Ok(candidates)
}

fn rank_candidates(a: &KeyCandidate, b: &KeyCandidate) -> Ordering {
    a.superset
        .cmp(&b.superset)
        .then_with(|| a.arity().cmp(&b.arity()))
        .then_with(|| b.uniqueness.total_cmp(&a.uniqueness))
        .then_with(|| b.complete.cmp(&a.complete))
        .then_with(|| a.columns.cmp(&b.columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{profile::profile_table, table::Table};

    fn flights() -> Table {
        Table::from_text_rows(
            "flights",
            &["Flight", "Date", "Gate", "Carrier"],
            &[
                &["AB100", "2024-01-01", "A1", "AB"],
                &["AB100", "2024-01-02", "A2", "AB"],
                &["CD200", "2024-01-01", "B1", "CD"],
                &["CD200", "2024-01-02", "B1", "CD"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn composite_key_found_when_no_single_column_is_unique() {
        let profile = profile_table(&flights());
        let candidates = generate_candidates(&profile, &MatchConfig::default()).unwrap();
        let labels = candidates.iter().map(KeyCandidate::label).collect::<Vec<_>>();
        assert!(labels.contains(&"Flight+Date".to_string()));
        assert!(candidates.iter().all(|c| c.arity() == 2));
        assert!(candidates.iter().all(|c| !c.fallback));
    }

    #[test]
    fn supersets_of_single_keys_rank_last() {
        let table = Table::from_text_rows(
            "t",
            &["id", "group", "bucket"],
            &[&["1", "a", "x"], &["2", "a", "y"], &["3", "b", "x"], &["4", "b", "y"]],
        )
        .unwrap();
        let profile = profile_table(&table);
        let candidates = generate_candidates(&profile, &MatchConfig::default()).unwrap();
        let labels = candidates.iter().map(KeyCandidate::label).collect::<Vec<_>>();
        assert_eq!(labels, vec!["id", "group+bucket", "id+group", "id+bucket"]);
        assert!(!candidates[1].superset);
        assert!(candidates[2..].iter().all(|c| c.superset));
    }

    #[test]
    fn fallback_uses_full_row_when_nothing_qualifies() {
        let table = Table::from_text_rows("t", &["a", "b"], &[&["1", "x"], &["1", "x"]]).unwrap();
        let profile = profile_table(&table);
        let candidates = generate_candidates(&profile, &MatchConfig::default()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].fallback);
        assert_eq!(candidates[0].columns, vec![0, 1]);
    }

    #[test]
    fn zero_columns_yield_no_candidate_error() {
        let table = Table::new("bare", Vec::new()).unwrap();
        let profile = profile_table(&table);
        assert!(matches!(
            generate_candidates(&profile, &MatchConfig::default()),
            Err(AutoJoinError::NoCandidateKey { .. })
        ));
    }

    #[test]
    fn candidate_list_is_capped() {
        let headers = ["a", "b", "c", "d", "e", "f", "g"];
        let rows: Vec<Vec<String>> = (0..4)
            .map(|r| headers.iter().map(|h| format!("{h}{r}")).collect())
            .collect();
        let rows_ref: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        let rows_slices: Vec<&[&str]> = rows_ref.iter().map(Vec::as_slice).collect();
        let table = Table::from_text_rows("wide", &headers, &rows_slices).unwrap();
        let profile = profile_table(&table);
        let config = MatchConfig {
            max_candidates: 3,
            ..MatchConfig::default()
        };
        let candidates = generate_candidates(&profile, &config).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].label(), "a");
    }

    #[test]
    fn composite_uniqueness_never_drops_below_components() {
        let table = Table::from_text_rows(
            "t",
            &["a", "b"],
            &[&["1", ""], &["2", ""], &["3", "x"], &["3", "x"]],
        )
        .unwrap();
        let profile = profile_table(&table);
        let composite = composite_uniqueness(&profile, &[0, 1]);
        assert!(composite >= profile.column(0).uniqueness);
        assert!(composite >= profile.column(1).uniqueness);
    }
}
