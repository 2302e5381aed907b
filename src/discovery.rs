use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File stem reserved for the flat log and similar bookkeeping notes.
const RESERVED_STEM: &str = "anki";

/// Lists the markdown documents of `input_dir` in processing order.
///
/// Only regular files ending in `.md` are returned, sorted by file name.
/// Files whose stem is `anki` (any case) or whose name starts with one of
/// `skip_prefixes` are left out.
///
/// # Errors
///
/// Returns an error if the directory or one of its entries cannot be read.
pub fn discover_documents(input_dir: &Path, skip_prefixes: &[String]) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read input directory {}", input_dir.display()))?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };

        if !file_name.ends_with(".md") {
            continue;
        }

        if is_skipped(file_name, skip_prefixes) {
            log::debug!("Skipping {}", file_name);
            continue;
        }

        documents.push(path);
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

/// Whether a markdown file is excluded from processing.
pub fn is_skipped(file_name: &str, skip_prefixes: &[String]) -> bool {
    let stem = file_name.strip_suffix(".md").unwrap_or(file_name);
    stem.eq_ignore_ascii_case(RESERVED_STEM)
        || skip_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prefixes() -> Vec<String> {
        vec!["md2anki".to_string()]
    }

    #[test]
    fn test_is_skipped() {
        assert!(is_skipped("anki.md", &prefixes()));
        assert!(is_skipped("ANKI.md", &prefixes()));
        assert!(is_skipped("md2anki-notes.md", &prefixes()));
        assert!(!is_skipped("anki-basics.md", &prefixes()));
        assert!(!is_skipped("loops.md", &prefixes()));
        assert!(!is_skipped("loops.md", &[]));
    }

    #[test]
    fn test_discover_sorts_and_filters() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("b_slices.md"), "## Q\nA")?;
        fs::write(dir.path().join("a_maps.md"), "## Q\nA")?;
        fs::write(dir.path().join("Anki.md"), "## Q\nA")?;
        fs::write(dir.path().join("md2anki.md"), "## Q\nA")?;
        fs::write(dir.path().join("ANKI.txt"), "q\ta\n")?;
        fs::create_dir(dir.path().join("nested.md"))?;

        let documents = discover_documents(dir.path(), &prefixes())?;
        let names: Vec<_> = documents
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a_maps.md", "b_slices.md"]);
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = discover_documents(&dir.path().join("missing"), &prefixes());
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read input directory"));
    }
}
