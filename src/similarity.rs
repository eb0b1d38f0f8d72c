use std::collections::BTreeSet;

use serde::Serialize;

use crate::{config::NameStrategy, normalize::normalize_name};

/// Evidence for one candidate-key pair across two tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchScore {
    pub name_similarity: f64,
    pub value_overlap: f64,
    pub combined: f64,
}

impl MatchScore {
    /// Convex combination of the two sub-scores, `name_weight` going to the
    /// name similarity.
    pub fn new(name_similarity: f64, value_overlap: f64, name_weight: f64) -> Self {
        let name_similarity = name_similarity.clamp(0.0, 1.0);
        let value_overlap = value_overlap.clamp(0.0, 1.0);
        let combined = if name_similarity == value_overlap {
            name_similarity
        } else {
            name_weight * name_similarity + (1.0 - name_weight) * value_overlap
        };
        Self {
            name_similarity,
            value_overlap,
            combined: combined.clamp(0.0, 1.0),
        }
    }

    /// Threshold 1.0 accepts only exact name and value agreement; below that
    /// the combined score decides.
    pub fn clears(&self, threshold: f64) -> bool {
        if threshold >= 1.0 {
            self.name_similarity >= 1.0 && self.value_overlap >= 1.0
        } else {
            self.combined >= threshold
        }
    }
}

pub fn name_similarity(left: &str, right: &str, strategy: NameStrategy) -> f64 {
    string_similarity(&normalize_name(left), &normalize_name(right), strategy)
}

/// Ratio of two already-folded strings under `strategy`.
pub fn string_similarity(left: &str, right: &str, strategy: NameStrategy) -> f64 {
    if left == right {
        return 1.0;
    }
    let score = match strategy {
        NameStrategy::EditDistance => strsim::normalized_levenshtein(left, right),
        NameStrategy::Phonetic => strsim::jaro_winkler(left, right),
    };
    score.clamp(0.0, 1.0)
}

/// Share of the smaller set found in the larger one, so a reference table
/// holding a superset of the other's keys still scores 1.0.
pub fn value_overlap(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    let smaller = left.len().min(right.len());
    if smaller == 0 {
        return 0.0;
    }
    let (scanned, lookup) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };
    let shared = scanned.iter().filter(|v| lookup.contains(*v)).count();
    shared as f64 / smaller as f64
}
