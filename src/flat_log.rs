//! Tab-separated flat log of extracted notes.
//!
//! Each note is written as one `question\tanswer\n` line with the untransformed
//! field values. Line breaks inside a field are stored as `<br>` and tabs as a
//! single space, so a field never spills onto a second line. The file can be
//! fed back into [`read_flat_log`] to rebuild a package without the original
//! markdown.

use crate::deck::Note;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes notes to the flat log as they are extracted.
pub struct FlatLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl FlatLogWriter {
    /// Creates (or truncates) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create flat log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write_note(&mut self, note: &Note) -> Result<()> {
        writeln!(
            self.writer,
            "{}\t{}",
            encode_field(&note.question),
            encode_field(&note.answer)
        )
        .with_context(|| format!("Failed to write to flat log {}", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    /// Flushes the log and returns the number of lines written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush flat log {}", self.path.display()))?;
        Ok(self.lines)
    }
}

/// Flattens a field onto a single line.
pub fn encode_field(field: &str) -> String {
    field
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
        .replace('\t', " ")
}

/// Reads notes back from a flat log.
///
/// Blank lines and lines without a tab are skipped; anything after the second
/// tab-separated part is ignored. Both fields are trimmed.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_flat_log(path: &Path) -> Result<Vec<Note>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read flat log {}", path.display()))?;
    Ok(parse_flat_log(&content))
}

fn parse_flat_log(content: &str) -> Vec<Note> {
    let mut notes = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut parts = line.split('\t');
        match (parts.next(), parts.next()) {
            (Some(question), Some(answer)) => {
                notes.push(Note::new(question.trim(), answer.trim()))
            }
            _ => log::warn!("Skipping flat log line {} without an answer", idx + 1),
        }
    }

    notes
}
