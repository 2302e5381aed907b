//! md2anki library
//!
//! This library turns a directory of markdown question/answer notes into an
//! Anki flashcard package. The primary interface is the md2anki binary, but
//! the library can be used programmatically for testing or custom
//! integrations.
//!
//! ## Public API
//!
//! The main entry point is [`DeckBuilder`], configured by a [`DeckConfig`].
//!
//! Building blocks:
//! - [`transform`] - Convert a note field into display-safe HTML
//! - [`extract_notes`] - Split a markdown document into question/answer notes
//! - [`PackageWriter`] - Serialize a [`Deck`] into an `.apkg` file

mod builder;
mod config;
mod deck;
mod discovery;
mod extractor;
mod flat_log;
mod package;
mod reporting;
mod transform;

pub use builder::{BuildSummary, DeckBuilder};
pub use config::{default_config_path, DeckConfig};
pub use deck::{derive_id, Deck, Model, Note, DEFAULT_CSS};
pub use discovery::discover_documents;
pub use extractor::{convert_fenced_code, document_title, extract_notes};
pub use flat_log::{read_flat_log, FlatLogWriter};
pub use package::{read_package_notes, PackageWriter};
pub use transform::{html_escape, transform};
