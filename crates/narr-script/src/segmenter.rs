//! Text segmenter
//!
//! Partitions a reply into alternating prose spans and directives. Every inline
//! `{...}` object is excised from the prose; only the ones satisfying the
//! directive grammar survive as [`Directive`]s. A fenced block holding nothing
//! but inline objects (the usual `json` fence around a directive) is
//! unwrapped; any other fenced block is kept whole so speech can skip it.
//!
//! The output always holds `directives.len() + 1` prose spans: directive `i`
//! follows prose span `i` and precedes prose span `i + 1`.

use crate::directive::{parse_token, Directive, TOKEN_RE};
use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[\w+#.\-]*[ \t]*\n?(.*?)```").expect("fenced block pattern is valid")
});

/// One element of the alternating sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Prose span (may be empty)
    Prose(&'a str),
    /// Parsed directive
    Directive(&'a Directive),
}

/// Prose spans and the directives between them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmented {
    prose: Vec<String>,
    directives: Vec<Directive>,
}

impl Segmented {
    /// Prose spans in source order
    #[inline]
    #[must_use]
    pub fn prose(&self) -> &[String] {
        &self.prose
    }

    /// Successfully parsed directives in source order
    #[inline]
    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Directive trailing prose span `index`, if any
    #[inline]
    #[must_use]
    pub fn directive_after(&self, index: usize) -> Option<&Directive> {
        self.directives.get(index)
    }

    /// Walk the alternating `[prose, directive, prose, ...]` sequence
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.prose.iter().enumerate().flat_map(move |(i, span)| {
            std::iter::once(Segment::Prose(span.as_str()))
                .chain(self.directives.get(i).map(Segment::Directive))
        })
    }

    /// All prose concatenated, directives removed
    #[must_use]
    pub fn prose_text(&self) -> String {
        self.prose.concat()
    }
}

/// Split `text` into prose spans and directives
#[must_use]
pub fn segment(text: &str) -> Segmented {
    let text = unwrap_object_fences(text);

    let mut prose = Vec::new();
    let mut directives = Vec::new();
    let mut buffer = String::new();
    let mut cursor = 0;

    for token in TOKEN_RE.find_iter(&text) {
        buffer.push_str(&text[cursor..token.start()]);
        cursor = token.end();

        match parse_token(token.as_str()) {
            Ok(directive) => {
                prose.push(std::mem::take(&mut buffer));
                directives.push(directive);
            }
            Err(e) if e.is_parse_miss() => {
                tracing::debug!(token = token.as_str(), error = %e, "discarding malformed directive");
            }
            Err(_) => {
                tracing::trace!(token = token.as_str(), "removing inert inline object");
            }
        }
    }

    buffer.push_str(&text[cursor..]);
    prose.push(buffer);

    Segmented { prose, directives }
}

/// Drop the fence around blocks whose body is only inline objects
fn unwrap_object_fences(text: &str) -> std::borrow::Cow<'_, str> {
    FENCED_BLOCK_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let body = &caps[1];
        if TOKEN_RE.replace_all(body, "").trim().is_empty() {
            body.to_string()
        } else {
            caps[0].to_string()
        }
    })
}
