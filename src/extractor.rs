use crate::deck::Note;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Marker that opens a question heading.
const HEADING_MARKER: &str = "## ";

/// A triple-backtick fence with an optional language tag.
static FENCED_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```\w*\s*\n(.*?)\n```").unwrap());

/// A `## ` section of a document before it becomes a [`Note`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// Heading text with the marker removed
    pub heading: &'a str,
    /// Everything between the heading line and the next heading, untrimmed
    pub body: &'a str,
}

/// Splits a markdown document into its `## ` sections.
///
/// A heading is a line that starts with `## `. Text before the first heading
/// belongs to no section. A heading on the last line without a trailing
/// newline still opens a section, with an empty body.
///
/// # Example
///
/// ````markdown
/// Preamble is ignored.
///
/// ## What is a goroutine?
/// A lightweight thread managed by the Go runtime.
///
/// ## What does `<-ch` do?
/// Receives from the channel.
/// ````
pub fn split_sections(content: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut open: Option<(&str, usize)> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if let Some(heading) = line.strip_prefix(HEADING_MARKER) {
            if let Some((prev_heading, body_start)) = open.take() {
                sections.push(Section {
                    heading: prev_heading,
                    body: body_before(content, body_start, line_start),
                });
            }
            open = Some((heading.trim_end_matches(['\n', '\r']), offset));
        }
    }

    if let Some((heading, body_start)) = open {
        sections.push(Section {
            heading,
            body: &content[body_start..],
        });
    }

    sections
}

/// Body text up to the newline that ends the line before the next heading.
fn body_before(content: &str, start: usize, next_heading: usize) -> &str {
    if next_heading <= start {
        return "";
    }
    let body = &content[start..next_heading];
    body.strip_suffix('\n').unwrap_or(body)
}

/// Extracts one [`Note`] per `## ` section of a document.
///
/// The question is `"{title}: {heading}"`, the answer is the section body with
/// surrounding whitespace removed and fenced code converted by
/// [`convert_fenced_code`].
pub fn extract_notes(content: &str, title: &str) -> Vec<Note> {
    split_sections(content)
        .into_iter()
        .map(|section| {
            let question = format!("{}: {}", title, section.heading.trim());
            let answer = convert_fenced_code(section.body.trim());
            Note::new(question, answer)
        })
        .collect()
}

/// Replaces triple-backtick fences with `<pre><code>` blocks.
///
/// The fence markers and the optional language tag are dropped; the enclosed
/// lines are kept verbatim. A fence without a closing partner is left as is.
pub fn convert_fenced_code(answer: &str) -> String {
    FENCED_CODE_RE
        .replace_all(answer, "<pre><code>${1}</code></pre>")
        .into_owned()
}

/// Title of a document: its file name without the `.md` extension.
pub fn document_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match name.strip_suffix(".md") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}
