use crate::config::DeckConfig;
use crate::deck::{Deck, Model, Note};
use crate::discovery::discover_documents;
use crate::extractor::{document_title, extract_notes};
use crate::flat_log::{read_flat_log, FlatLogWriter};
use crate::package::PackageWriter;
use crate::reporting;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    /// Markdown documents read (zero for imports)
    pub documents: usize,
    /// Notes written to the package
    pub notes: usize,
    /// Flat log written during extraction, if any
    pub log_path: Option<PathBuf>,
    pub package_path: PathBuf,
}

/// Turns a directory of markdown notes into a flashcard package.
///
/// # Overview
///
/// A build runs strictly in sequence:
///
/// 1. list the documents of the input directory in file name order,
/// 2. read each one and extract its `## ` sections as notes, appending every
///    note to the flat log as it is found,
/// 3. transform the fields of every note into HTML,
/// 4. write the deck as one `.apkg` package.
///
/// Any I/O failure stops the run; malformed markup never does.
///
/// # Example
///
/// ```no_run
/// use md2anki::{DeckBuilder, DeckConfig};
///
/// let config = DeckConfig::load(None)?;
/// let summary = DeckBuilder::new(config).build()?;
/// println!("{} cards", summary.notes);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct DeckBuilder {
    config: DeckConfig,
    created_at: DateTime<Utc>,
}

impl DeckBuilder {
    pub fn new(config: DeckConfig) -> Self {
        Self {
            config,
            created_at: Utc::now(),
        }
    }

    /// Fixes the timestamp recorded in the package, for reproducible output.
    pub fn with_timestamp(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Builds the package from the markdown documents of the input directory.
    pub fn build(&self) -> Result<BuildSummary> {
        let log_path = self.config.log_path();
        let (notes, documents) = self.collect_notes(&log_path)?;

        let deck = self.assemble_deck(&notes);
        self.write_package(&deck)?;

        reporting::report_summary(Some(&log_path), &self.config.output_file, deck.len());
        Ok(BuildSummary {
            documents,
            notes: deck.len(),
            log_path: Some(log_path),
            package_path: self.config.output_file.clone(),
        })
    }

    /// Builds the package from an existing flat log instead of markdown.
    pub fn import(&self, flat_log: &Path) -> Result<BuildSummary> {
        let notes = read_flat_log(flat_log)?;
        log::info!("Read {} note(s) from {}", notes.len(), flat_log.display());

        let deck = self.assemble_deck(&notes);
        self.write_package(&deck)?;

        reporting::report_summary(None, &self.config.output_file, deck.len());
        Ok(BuildSummary {
            documents: 0,
            notes: deck.len(),
            log_path: None,
            package_path: self.config.output_file.clone(),
        })
    }

    /// Extracts the notes of every document, logging each one.
    ///
    /// Returns the notes in processing order and the number of documents read.
    fn collect_notes(&self, log_path: &Path) -> Result<(Vec<Note>, usize)> {
        let documents =
            discover_documents(&self.config.input_dir, &self.config.skip_prefixes)?;
        log::debug!(
            "Found {} document(s) in {}",
            documents.len(),
            self.config.input_dir.display()
        );

        let mut log_writer = FlatLogWriter::create(log_path)?;
        let mut notes = Vec::new();

        for path in &documents {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            reporting::report_processing(&file_name);

            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let extracted = extract_notes(&content, &document_title(path));
            log::debug!("  {} note(s) in {}", extracted.len(), file_name);

            for note in extracted {
                log_writer.write_note(&note)?;
                notes.push(note);
            }
        }

        let lines = log_writer.finish()?;
        log::debug!("Wrote {} line(s) to {}", lines, log_path.display());

        Ok((notes, documents.len()))
    }

    fn assemble_deck(&self, notes: &[Note]) -> Deck {
        let model = Model::new(
            self.config.model_id(),
            self.config.model_name.clone(),
            self.config.css(),
        );
        let mut deck = Deck::new(self.config.deck_id(), self.config.deck_name.clone(), model);

        for note in notes {
            deck.add_note(note.transformed());
        }
        deck
    }

    fn write_package(&self, deck: &Deck) -> Result<()> {
        if let Some(parent) = self.config.output_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory {}", parent.display())
                })?;
            }
        }

        PackageWriter::new(self.created_at).write(deck, &self.config.output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::read_package_notes;
    use tempfile::TempDir;

    fn config_for(dir: &Path) -> DeckConfig {
        DeckConfig {
            input_dir: dir.join("notes"),
            output_file: dir.join("out").join("deck.apkg"),
            deck_name: "Test".to_string(),
            ..DeckConfig::default()
        }
    }

    #[test]
    fn test_build_orders_notes_by_file_then_heading() -> Result<()> {
        let dir = TempDir::new()?;
        let notes_dir = dir.path().join("notes");
        fs::create_dir(&notes_dir)?;
        fs::write(notes_dir.join("b.md"), "## B1\nb one\n## B2\nb *two*\n")?;
        fs::write(notes_dir.join("a.md"), "## A1\na `one`\n")?;
        fs::write(notes_dir.join("anki.md"), "## Skipped\nx\n")?;

        let summary = DeckBuilder::new(config_for(dir.path())).build()?;
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.notes, 3);

        let log = fs::read_to_string(notes_dir.join("ANKI.txt"))?;
        assert_eq!(log, "a: A1\ta `one`\nb: B1\tb one\nb: B2\tb *two*\n");

        let notes = read_package_notes(&summary.package_path)?;
        let questions: Vec<_> = notes.iter().map(|n| n.question.as_str()).collect();
        assert_eq!(questions, vec!["a: A1", "b: B1", "b: B2"]);
        assert_eq!(notes[0].answer, "a <code>one</code>");
        assert_eq!(notes[2].answer, "b <i>two</i>");
        Ok(())
    }

    #[test]
    fn test_empty_directory_builds_empty_deck() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir(dir.path().join("notes"))?;

        let summary = DeckBuilder::new(config_for(dir.path())).build()?;
        assert_eq!(summary.notes, 0);
        assert!(summary.package_path.exists());
        assert!(read_package_notes(&summary.package_path)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_input_directory_aborts() {
        let dir = TempDir::new().unwrap();
        let result = DeckBuilder::new(config_for(dir.path())).build();
        assert!(result.is_err());
        assert!(!dir.path().join("out").join("deck.apkg").exists());
    }

    #[test]
    fn test_import_transforms_flat_log() -> Result<()> {
        let dir = TempDir::new()?;
        let log_path = dir.path().join("ANKI.txt");
        fs::write(&log_path, "go: **chan**\tv := <-ch<br>done\n\n")?;

        let summary = DeckBuilder::new(config_for(dir.path())).import(&log_path)?;
        assert_eq!(summary.notes, 1);
        assert!(summary.log_path.is_none());

        let notes = read_package_notes(&summary.package_path)?;
        assert_eq!(notes, vec![Note::new("go: <b>chan</b>", "v := &larr;ch<br>done")]);
        Ok(())
    }
}
