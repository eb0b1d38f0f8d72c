#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_autojoin::table::Table;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds an in-memory table where empty cells are null.
pub fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_text_rows(name, headers, rows).expect("well-formed table")
}

pub fn flights() -> Table {
    table(
        "flights",
        &["Flight", "Origin"],
        &[
            &["ABC1234", "FRA"],
            &["XYZ0001", "FRA"],
            &["QRS5555", "MUC"],
        ],
    )
}

pub fn bags() -> Table {
    table(
        "bags",
        &["FLNo", "Bags"],
        &[&["ABC 1234", "12"], &["XYZ 0001", "40"], &["QRS 5555", "12"]],
    )
}

pub const FLIGHTS_CSV: &str = "Flight,Origin\nABC1234,FRA\nXYZ0001,FRA\nQRS5555,MUC\n";
pub const BAGS_CSV: &str = "FLNo;Bags\nABC 1234;12\nXYZ 0001;40\nQRS 5555;12\n";
pub const WEATHER_CSV: &str = "Station,Temperature\nS-1,12.5\nS-2,13.1\n";
