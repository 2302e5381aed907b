//! Markdown-to-HTML content transformer for flashcard fields.
//!
//! A field is split into pieces before it is escaped: the operator sequences
//! `<-`, `<<` and `>>`, literal `<br>` tags and `<pre><code>` blocks are
//! claimed as opaque pieces, everything else stays plain text. One escape pass
//! then runs over the plain text (including the text inside code blocks), the
//! claimed pieces are emitted as markup, and markdown emphasis is translated
//! in the regions outside code blocks.
//!
//! # Example
//!
//! ```
//! use md2anki::transform;
//!
//! let html = transform("Use **bold**, `a < b` and x <- ch<br>next");
//! assert_eq!(
//!     html,
//!     "Use <b>bold</b>, <code>a &lt; b</code> and x &larr; ch<br>next"
//! );
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

const BREAK_TAG: &str = "<br>";
const CODE_OPEN: &str = "<pre><code>";
const CODE_CLOSE: &str = "</code></pre>";

/// `for i = 0; i <` style loop headers as they come out of dictated notes.
static LOOP_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"for\s+(\w+)\s*:?=\s*(\d+);\s*(\w+)\s*<\s*").unwrap());

static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.*?)`").unwrap());

/// Operator sequences that must not reach the HTML escaper as raw angle brackets.
///
/// Claimed in declaration order, so `<-` wins over `<<` in `<<-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// `<-`, the channel operator.
    Arrow,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
}

impl Operator {
    const ALL: [Operator; 3] = [Operator::Arrow, Operator::ShiftLeft, Operator::ShiftRight];

    fn literal(self) -> &'static str {
        match self {
            Operator::Arrow => "<-",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            Operator::Arrow => "&larr;",
            Operator::ShiftLeft => "&laquo;",
            Operator::ShiftRight => "&raquo;",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Operator(Operator),
    Break,
    CodeOpen,
    CodeClose,
}

impl Piece {
    /// Renders the piece as HTML, treating code delimiters as plain text.
    fn render_literal(&self, out: &mut String) {
        match self {
            Piece::Text(text) => out.push_str(&html_escape(text)),
            Piece::Operator(op) => out.push_str(op.entity()),
            Piece::Break => out.push_str(BREAK_TAG),
            Piece::CodeOpen => out.push_str(&html_escape(CODE_OPEN)),
            Piece::CodeClose => out.push_str(&html_escape(CODE_CLOSE)),
        }
    }
}

/// Transforms a raw question or answer into HTML for a card field.
///
/// Never fails: unbalanced markup is left in place and escaped like any other
/// text.
pub fn transform(content: &str) -> String {
    let normalized = normalize_loop_headers(content);

    let mut pieces = vec![Piece::Text(normalized.into_owned())];
    for op in Operator::ALL {
        pieces = claim(pieces, op.literal(), || Piece::Operator(op));
    }
    pieces = claim(pieces, BREAK_TAG, || Piece::Break);
    pieces = claim(pieces, CODE_OPEN, || Piece::CodeOpen);
    pieces = claim(pieces, CODE_CLOSE, || Piece::CodeClose);

    render(&pieces)
}

/// HTML-escapes `&`, `<`, `>`, `"` and `'`.
pub fn html_escape(content: &str) -> Cow<'_, str> {
    ::html_escape::encode_quoted_attribute(content)
}

fn normalize_loop_headers(content: &str) -> Cow<'_, str> {
    LOOP_HEADER_RE.replace_all(content, "for ${1} := ${2}; ${3} < ")
}

/// Splits every text piece on `pattern`, putting `make()` where each
/// occurrence was. Already claimed pieces are left untouched.
fn claim(pieces: Vec<Piece>, pattern: &str, make: impl Fn() -> Piece) -> Vec<Piece> {
    let mut out = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let Piece::Text(text) = piece else {
            out.push(piece);
            continue;
        };

        let mut parts = text.split(pattern);
        if let Some(first) = parts.next() {
            push_text(&mut out, first);
        }
        for part in parts {
            out.push(make());
            push_text(&mut out, part);
        }
    }
    out
}

fn push_text(out: &mut Vec<Piece>, text: &str) {
    if !text.is_empty() {
        out.push(Piece::Text(text.to_string()));
    }
}

/// Pairs each `<pre><code>` with the first `</code></pre>` after it.
///
/// Returns `(open, close)` piece indices. Openers inside a block and
/// delimiters without a partner are not part of any pair.
fn code_block_spans(pieces: &[Piece]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < pieces.len() {
        if pieces[i] == Piece::CodeOpen {
            if let Some(offset) = pieces[i + 1..].iter().position(|p| *p == Piece::CodeClose) {
                let close = i + 1 + offset;
                spans.push((i, close));
                i = close + 1;
                continue;
            }
            break;
        }
        i += 1;
    }
    spans
}

fn render(pieces: &[Piece]) -> String {
    let mut out = String::new();
    let mut cursor = 0;

    for (open, close) in code_block_spans(pieces) {
        out.push_str(&render_prose(&pieces[cursor..open]));

        out.push_str(CODE_OPEN);
        for piece in &pieces[open + 1..close] {
            piece.render_literal(&mut out);
        }
        out.push_str(CODE_CLOSE);

        cursor = close + 1;
    }
    out.push_str(&render_prose(&pieces[cursor..]));

    out
}

/// Renders pieces outside code blocks, then applies markdown emphasis.
fn render_prose(pieces: &[Piece]) -> String {
    if pieces.is_empty() {
        return String::new();
    }

    let mut html = String::new();
    for piece in pieces {
        piece.render_literal(&mut html);
    }
    apply_emphasis(&html)
}

fn apply_emphasis(html: &str) -> String {
    let html = BOLD_RE.replace_all(html, "<b>${1}</b>");
    let html = ITALIC_RE.replace_all(&html, "<i>${1}</i>");
    INLINE_CODE_RE
        .replace_all(&html, "<code>${1}</code>")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_only_escaped() {
        let input = r#"Tom & Jerry's "a < b > c""#;
        assert_eq!(transform(input), html_escape(input));
        assert_eq!(
            transform(input),
            "Tom &amp; Jerry&#x27;s &quot;a &lt; b &gt; c&quot;"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(transform(""), "");
    }

    #[test]
    fn test_unicode_passes_through() {
        assert_eq!(transform("Что такое горутина?"), "Что такое горутина?");
    }

    #[test]
    fn test_bold_italic_and_inline_code() {
        assert_eq!(transform("**x**"), "<b>x</b>");
        assert_eq!(transform("*x*"), "<i>x</i>");
        assert_eq!(transform("`y`"), "<code>y</code>");
        assert_eq!(
            transform("a **b** c *d* e `f`"),
            "a <b>b</b> c <i>d</i> e <code>f</code>"
        );
    }

    #[test]
    fn test_emphasis_is_non_greedy() {
        assert_eq!(transform("**a** and **b**"), "<b>a</b> and <b>b</b>");
        assert_eq!(transform("`a` or `b`"), "<code>a</code> or <code>b</code>");
    }

    #[test]
    fn test_emphasis_does_not_span_lines() {
        assert_eq!(transform("*a\nb*"), "*a\nb*");
    }

    #[test]
    fn test_unbalanced_markers_stay_literal() {
        assert_eq!(transform("2 * 3"), "2 * 3");
        assert_eq!(transform("a ` b"), "a ` b");
    }

    #[test]
    fn test_inline_code_content_is_escaped() {
        assert_eq!(transform("`a < b`"), "<code>a &lt; b</code>");
    }

    #[test]
    fn test_operators_become_entities() {
        let output = transform("v := <-ch; x << 2; y >> 1");
        assert_eq!(output, "v := &larr;ch; x &laquo; 2; y &raquo; 1");
        assert!(!output.contains("<-"));
        assert!(!output.contains("<<"));
        assert!(!output.contains(">>"));
    }

    #[test]
    fn test_arrow_is_claimed_before_shift() {
        assert_eq!(transform("<<-"), "&lt;&larr;");
        assert_eq!(transform(">>>"), "&raquo;&gt;");
    }

    #[test]
    fn test_break_tags_survive_escaping() {
        assert_eq!(transform("line one<br>line <two>"), "line one<br>line &lt;two&gt;");
    }

    #[test]
    fn test_emphasis_may_span_break() {
        assert_eq!(transform("**a<br>b**"), "<b>a<br>b</b>");
    }

    #[test]
    fn test_loop_header_is_normalized() {
        assert_eq!(
            transform("for  j=1;j<n; j++"),
            "for j := 1; j &lt; n; j++"
        );
        assert_eq!(
            transform("for i := 0; i < 10; i++"),
            "for i := 0; i &lt; 10; i++"
        );
    }

    #[test]
    fn test_code_block_keeps_layout_and_escapes_content() {
        let input = "Example:\n<pre><code>func main() {\n    if a < b && c {\n        x <- 1\n    }\n}</code></pre>\nDone";
        let output = transform(input);
        assert_eq!(
            output,
            "Example:\n<pre><code>func main() {\n    if a &lt; b &amp;&amp; c {\n        x &larr; 1\n    }\n}</code></pre>\nDone"
        );
    }

    #[test]
    fn test_code_block_round_trip() {
        let code = "for i := 0; i < 3; i++ {\n\tfmt.Println(\"i\", i)\n}\n  // \"done\"";
        let output = transform(&format!("<pre><code>{}</code></pre>", code));

        let inner = output
            .strip_prefix(CODE_OPEN)
            .and_then(|s| s.strip_suffix(CODE_CLOSE))
            .unwrap();
        let restored = ::html_escape::decode_html_entities(inner);
        assert_eq!(restored, code);
    }

    #[test]
    fn test_no_emphasis_inside_code_block() {
        let output = transform("**bold** <pre><code>p := *ptr * 2</code></pre> *it*");
        assert_eq!(
            output,
            "<b>bold</b> <pre><code>p := *ptr * 2</code></pre> <i>it</i>"
        );
    }

    #[test]
    fn test_break_inside_code_block_is_kept() {
        assert_eq!(
            transform("<pre><code>a<br>b</code></pre>"),
            "<pre><code>a<br>b</code></pre>"
        );
    }

    #[test]
    fn test_multiple_code_blocks() {
        assert_eq!(
            transform("<pre><code>a<b</code></pre> and <pre><code>c>d</code></pre>"),
            "<pre><code>a&lt;b</code></pre> and <pre><code>c&gt;d</code></pre>"
        );
    }

    #[test]
    fn test_unclosed_code_block_is_escaped() {
        assert_eq!(
            transform("<pre><code>x < y"),
            "&lt;pre&gt;&lt;code&gt;x &lt; y"
        );
    }

    #[test]
    fn test_stray_closer_is_escaped() {
        assert_eq!(
            transform("x</code></pre>"),
            "x&lt;/code&gt;&lt;/pre&gt;"
        );
    }

    #[test]
    fn test_nested_opener_inside_block_is_literal() {
        assert_eq!(
            transform("<pre><code>a<pre><code>b</code></pre>"),
            "<pre><code>a&lt;pre&gt;&lt;code&gt;b</code></pre>"
        );
    }

    #[test]
    fn test_claim_splits_only_text_pieces() {
        let pieces = vec![Piece::Text("a<br>b".to_string()), Piece::Break];
        let claimed = claim(pieces, BREAK_TAG, || Piece::Break);
        assert_eq!(
            claimed,
            vec![
                Piece::Text("a".to_string()),
                Piece::Break,
                Piece::Text("b".to_string()),
                Piece::Break,
            ]
        );
    }
}
