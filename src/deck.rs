use crate::transform::transform;
use sha2::{Digest, Sha256};

/// Lower bound of generated deck and model ids.
const ID_RANGE_START: i64 = 1 << 30;

/// Width of the generated id range, `[2^30, 2^31)`.
const ID_RANGE_LEN: u64 = 1 << 30;

/// Characters of the base-91 alphabet used for note GUIDs.
const GUID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_`{|}~";

/// Stylesheet shared by every card of the deck.
pub const DEFAULT_CSS: &str = r#".card {
    font-family: 'Helvetica Neue', Arial, sans-serif;
    font-size: 16px;
    text-align: left;
    color: black;
    background-color: white;
    line-height: 1.5em;
}
code {
    font-family: Menlo, Monaco, 'Courier New', monospace;
    background-color: #f5f5f5;
    padding: 2px 4px;
    border-radius: 3px;
    font-size: 90%;
    color: #c7254e;
}
pre {
    margin: 10px 0;
    padding: 12px;
    background-color: #f8f8f8;
    border: 1px solid #ddd;
    border-radius: 4px;
    overflow-x: auto;
}
pre code {
    background-color: transparent;
    padding: 0;
    border-radius: 0;
    font-size: 14px;
    color: #333;
    line-height: 1.4;
    display: block;
    white-space: pre;
}
b {
    font-weight: bold;
    color: #333;
}
i {
    font-style: italic;
}
"#;

/// One question/answer pair destined for a flashcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub question: String,
    pub answer: String,
}

impl Note {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Returns the note with both fields run through [`transform`].
    pub fn transformed(&self) -> Self {
        Self {
            question: transform(&self.question),
            answer: transform(&self.answer),
        }
    }

    /// Field values in model order.
    pub fn fields(&self) -> [&str; 2] {
        [&self.question, &self.answer]
    }

    /// Stable GUID derived from the field values.
    ///
    /// Two notes with the same fields share a GUID, which lets a viewer
    /// update a previously imported card instead of duplicating it.
    pub fn guid(&self) -> String {
        guid_for(&self.fields())
    }
}

/// A card template: the fixed `Question`/`Answer` fields and how they render.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub css: String,
}

impl Model {
    pub const FIELDS: [&'static str; 2] = ["Question", "Answer"];
    pub const TEMPLATE_NAME: &'static str = "Card 1";
    pub const FRONT_TEMPLATE: &'static str = "{{Question}}";
    pub const BACK_TEMPLATE: &'static str = "{{FrontSide}}<hr id=\"answer\">{{Answer}}";

    pub fn new(id: i64, name: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            css: css.into(),
        }
    }
}

/// An ordered collection of notes rendered with one [`Model`].
#[derive(Debug, Clone)]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub model: Model,
    notes: Vec<Note>,
}

impl Deck {
    pub fn new(id: i64, name: impl Into<String>, model: Model) -> Self {
        Self {
            id,
            name: name.into(),
            model,
            notes: Vec::new(),
        }
    }

    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Derives a deck or model id from its name.
///
/// The result lies in `[2^30, 2^31)`, the same range viewers use for
/// randomly generated ids.
pub fn derive_id(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    ID_RANGE_START + (u64::from_be_bytes(prefix) % ID_RANGE_LEN) as i64
}

/// Base-91 GUID of the SHA-256 of `values` joined by `__`.
pub fn guid_for(values: &[&str]) -> String {
    let digest = Sha256::digest(values.join("__").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    let mut n = u64::from_be_bytes(prefix);
    let base = GUID_ALPHABET.len() as u64;
    let mut encoded = Vec::new();
    while n > 0 {
        encoded.push(GUID_ALPHABET[(n % base) as usize]);
        n /= base;
    }
    encoded.reverse();

    String::from_utf8_lossy(&encoded).into_owned()
}
