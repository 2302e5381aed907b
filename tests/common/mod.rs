//! Common test utilities for integration tests
//!
//! This module contains shared test fixtures and helper functions used across
//! integration tests. These utilities are not compiled into the library.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use md2anki::{BuildSummary, DeckBuilder, DeckConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated test fixture with automatic cleanup
///
/// Creates a temporary copy of a notes directory, allowing tests to run in
/// parallel without interfering with each other. The package is written to
/// `out/deck.apkg` next to the copied notes.
pub struct TestFixture {
    _root: TempDir,
    notes_path: PathBuf,
    output_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture from the default go_notes directory
    pub fn new() -> Result<Self> {
        Self::new_from("tests/fixtures/go_notes")
    }

    /// Create a new test fixture from a specific source directory
    pub fn new_from(source: impl AsRef<Path>) -> Result<Self> {
        let root = TempDir::new()?;
        let notes_path = root.path().join("notes");

        copy_dir_all(source.as_ref(), &notes_path)?;

        Ok(Self {
            output_path: root.path().join("out").join("deck.apkg"),
            notes_path,
            _root: root,
        })
    }

    pub fn notes_path(&self) -> &Path {
        &self.notes_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Configuration pointing at the copied notes
    pub fn config(&self) -> DeckConfig {
        DeckConfig {
            input_dir: self.notes_path.clone(),
            output_file: self.output_path.clone(),
            deck_name: "GO Part 3 - Go Runtime".to_string(),
            ..DeckConfig::default()
        }
    }

    /// Run a full build with a fixed timestamp
    pub fn build(&self) -> Result<BuildSummary> {
        DeckBuilder::new(self.config())
            .with_timestamp(fixed_timestamp())
            .build()
    }
}

pub fn fixed_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Recursively copy all files and directories from src to dst
fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    std::fs::create_dir_all(&dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_dir_all(entry.path(), dst.as_ref().join(entry.file_name()))?;
        } else {
            std::fs::copy(entry.path(), dst.as_ref().join(entry.file_name()))?;
        }
    }
    Ok(())
}
