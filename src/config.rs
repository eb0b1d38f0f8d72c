use std::{fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AutoJoinError;

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_NAME_WEIGHT: f64 = 0.5;
pub const DEFAULT_MIN_UNIQUENESS: f64 = 0.95;
pub const DEFAULT_MAX_COMPOSITE_ARITY: usize = 2;
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Join semantics applied uniformly to every step of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum JoinHow {
    #[default]
    Inner,
    Left,
    Outer,
}

impl JoinHow {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinHow::Inner => "inner",
            JoinHow::Left => "left",
            JoinHow::Outer => "outer",
        }
    }

    pub fn keeps_unmatched_left(&self) -> bool {
        matches!(self, JoinHow::Left | JoinHow::Outer)
    }

    pub fn keeps_unmatched_right(&self) -> bool {
        matches!(self, JoinHow::Outer)
    }
}

impl fmt::Display for JoinHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm used to compare column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum NameStrategy {
    /// Normalized Levenshtein ratio.
    #[default]
    #[value(alias = "levenshtein")]
    #[serde(alias = "levenshtein")]
    EditDistance,
    /// Jaro-Winkler ratio, tolerant of transpositions and shared prefixes.
    #[value(alias = "jaro")]
    #[serde(alias = "jaro")]
    Phonetic,
}

impl NameStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameStrategy::EditDistance => "edit-distance",
            NameStrategy::Phonetic => "phonetic",
        }
    }
}

impl fmt::Display for NameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning knobs for profiling, key search, and joining.
///
/// Loadable from YAML; every field is optional there and falls back to the
/// defaults below. Command-line flags override whatever the file provides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    pub how: JoinHow,
    pub strategy: NameStrategy,
    /// Minimum combined score a key pair needs; 1.0 demands an exact match.
    pub threshold: f64,
    /// Weight of name similarity in the combined score (value overlap gets the rest).
    pub name_weight: f64,
    pub min_uniqueness: f64,
    pub max_composite_arity: usize,
    pub max_candidates: usize,
    /// When set, text key values with no exact counterpart join the most
    /// similar counterpart value scoring at least this much.
    pub value_similarity: Option<f64>,
    /// Remove repeated rows from every input before matching.
    pub drop_duplicates: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            how: JoinHow::default(),
            strategy: NameStrategy::default(),
            threshold: DEFAULT_THRESHOLD,
            name_weight: DEFAULT_NAME_WEIGHT,
            min_uniqueness: DEFAULT_MIN_UNIQUENESS,
            max_composite_arity: DEFAULT_MAX_COMPOSITE_ARITY,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            value_similarity: None,
            drop_duplicates: false,
        }
    }
}

impl MatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: MatchConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AutoJoinError> {
        check_unit("threshold", self.threshold)?;
        check_unit("name_weight", self.name_weight)?;
        check_unit("min_uniqueness", self.min_uniqueness)?;
        if let Some(cutoff) = self.value_similarity {
            check_unit("value_similarity", cutoff)?;
        }
        if self.max_composite_arity == 0 {
            return Err(AutoJoinError::InvalidParameter {
                name: "max_composite_arity",
                value: self.max_composite_arity.to_string(),
                reason: "must be at least 1",
            });
        }
        if self.max_candidates == 0 {
            return Err(AutoJoinError::InvalidParameter {
                name: "max_candidates",
                value: self.max_candidates.to_string(),
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), AutoJoinError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AutoJoinError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be between 0.0 and 1.0",
        })
    }
}
