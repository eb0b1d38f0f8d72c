use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{JoinHow, MatchConfig, NameStrategy};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Discover join keys across CSV files and merge them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Increase log detail (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find key correspondences and join every file onto the first one
    Join(JoinArgs),
    /// Show column profiles and candidate keys for each file
    Profile(ProfileArgs),
}

/// Matching options shared by every subcommand. Unset flags fall back to the
/// config file, then to the built-in defaults.
#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Minimum uniqueness ratio for a column set to count as a key
    #[arg(long = "min-uniqueness")]
    pub min_uniqueness: Option<f64>,
    /// Largest number of columns combined into one composite key
    #[arg(long = "max-arity")]
    pub max_arity: Option<usize>,
    /// Number of key candidates kept per table
    #[arg(long = "max-candidates")]
    pub max_candidates: Option<usize>,
    /// YAML file with matching options
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|'); sniffed when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct JoinArgs {
    /// Input files; the first one is the anchor every other file joins to
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,
    /// Join type applied to every step
    #[arg(long, value_enum)]
    pub how: Option<JoinHow>,
    /// Column name similarity measure
    #[arg(long, value_enum)]
    pub strategy: Option<NameStrategy>,
    /// Minimum combined score for a key pair (1.0 accepts exact matches only)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Weight of name similarity in the combined score
    #[arg(long = "name-weight")]
    pub name_weight: Option<f64>,
    /// Join misspelled text keys to their most similar counterpart scoring at least this
    #[arg(long = "fuzzy-values", value_name = "CUTOFF")]
    pub fuzzy_values: Option<f64>,
    /// Drop repeated rows from every input before matching
    #[arg(long = "drop-duplicates")]
    pub drop_duplicates: bool,
    #[command(flatten)]
    pub matching: MatchArgs,
    #[command(flatten)]
    pub input: InputArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output delimiter (defaults from the output extension, else comma)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Write the match report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Render the merged table as an aligned preview instead of CSV
    #[arg(long)]
    pub table: bool,
    /// Number of rows shown by --table (0 shows all)
    #[arg(long = "preview-rows", default_value_t = 20)]
    pub preview_rows: usize,
    /// Plan and report only; do not execute the join
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Input files to profile
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,
    #[command(flatten)]
    pub matching: MatchArgs,
    #[command(flatten)]
    pub input: InputArgs,
}

impl MatchArgs {
    /// Loads the config file (if any) and applies the flags on top.
    pub fn resolve(&self) -> anyhow::Result<MatchConfig> {
        let mut config = match &self.config {
            Some(path) => MatchConfig::load(path)?,
            None => MatchConfig::default(),
        };
        if let Some(value) = self.min_uniqueness {
            config.min_uniqueness = value;
        }
        if let Some(value) = self.max_arity {
            config.max_composite_arity = value;
        }
        if let Some(value) = self.max_candidates {
            config.max_candidates = value;
        }
        Ok(config)
    }
}

impl JoinArgs {
    pub fn resolve_config(&self) -> anyhow::Result<MatchConfig> {
        let mut config = self.matching.resolve()?;
        if let Some(how) = self.how {
            config.how = how;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(weight) = self.name_weight {
            config.name_weight = weight;
        }
        if let Some(cutoff) = self.fuzzy_values {
            config.value_similarity = Some(cutoff);
        }
        if self.drop_duplicates {
            config.drop_duplicates = true;
        }
        Ok(config)
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "csv-autojoin",
            "join",
            "a.csv",
            "b.csv",
            "--how",
            "outer",
            "--strategy",
            "phonetic",
            "--threshold",
            "0.8",
            "--max-arity",
            "3",
            "--fuzzy-values",
            "0.85",
            "--drop-duplicates",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Join(args) = cli.command else {
            panic!("expected join command");
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.how, JoinHow::Outer);
        assert_eq!(config.strategy, NameStrategy::Phonetic);
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.max_composite_arity, 3);
        assert_eq!(config.value_similarity, Some(0.85));
        assert!(config.drop_duplicates);
        assert_eq!(config.min_uniqueness, MatchConfig::default().min_uniqueness);
    }

    #[test]
    fn delimiter_names_are_accepted() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert!(parse_delimiter("::").is_err());
    }
}
