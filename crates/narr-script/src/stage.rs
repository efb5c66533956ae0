//! Stage builder
//!
//! Groups segmented prose into speak-then-act units. Each prose span is split
//! at sentence terminators (`.`, `!`, `?` followed by whitespace); the
//! directive trailing the span rides on the span's last piece only.

use crate::directive::Directive;
use crate::segmenter::Segmented;
use serde::{Deserialize, Serialize};

/// Smallest schedulable unit of narration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Text to narrate (may be empty)
    pub text: String,
    /// Focus action issued when the stage starts
    pub command: Option<Directive>,
}

impl Stage {
    /// Create a stage
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, command: Option<Directive>) -> Self {
        Self {
            text: text.into(),
            command,
        }
    }

    /// Stage with text only
    #[inline]
    #[must_use]
    pub fn speak(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }

    /// Stage with a command only
    #[inline]
    #[must_use]
    pub fn act(command: Directive) -> Self {
        Self::new(String::new(), Some(command))
    }

    /// Whether there is anything to narrate
    #[inline]
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Neither text nor command
    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.has_text() && self.command.is_none()
    }
}

/// Builds ordered stages from segmented text
#[derive(Debug, Clone, Copy, Default)]
pub struct StageBuilder;

impl StageBuilder {
    /// Create new stage builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build stages in narrative order, dropping degenerate ones
    #[must_use]
    pub fn build(&self, segmented: &Segmented) -> Vec<Stage> {
        let mut stages = Vec::new();

        for (index, span) in segmented.prose().iter().enumerate() {
            let pieces = split_sentences(span);
            let last = pieces.len() - 1;

            for (position, piece) in pieces.into_iter().enumerate() {
                let command = if position == last {
                    segmented.directive_after(index).cloned()
                } else {
                    None
                };

                let stage = Stage::new(collapse_whitespace(piece), command);
                if !stage.is_degenerate() {
                    stages.push(stage);
                }
            }
        }

        stages
    }
}

/// Split a span after each terminator that is followed by whitespace
///
/// Never empty; the last piece is `""` when the span ends in terminator plus
/// whitespace. Terminators inside a fenced code block do not split.
fn split_sentences(span: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_fence = false;
    let mut chars = span.char_indices().peekable();

    while let Some((at, c)) = chars.next() {
        if c == '`' && span[at..].starts_with("```") {
            in_fence = !in_fence;
            chars.next();
            chars.next();
            continue;
        }
        if in_fence || !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(_, next)) = chars.peek() else {
            break;
        };
        if !next.is_whitespace() {
            continue;
        }

        pieces.push(&span[start..at + c.len_utf8()]);
        while chars.peek().is_some_and(|&(_, ws)| ws.is_whitespace()) {
            chars.next();
        }
        start = chars.peek().map_or(span.len(), |&(i, _)| i);
    }

    pieces.push(&span[start..]);
    pieces
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::segment;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_sentences() {
        assert_eq!(split_sentences("A. B! C? D"), ["A.", "B!", "C?", "D"]);
        assert_eq!(split_sentences("A. "), ["A.", ""]);
        assert_eq!(split_sentences("A."), ["A."]);
        assert_eq!(split_sentences("R$ 3.5 bi."), ["R$ 3.5 bi."]);
        assert_eq!(split_sentences(""), [""]);
    }

    #[test]
    fn directive_rides_last_piece() {
        let s = segment(r#"Um. Dois {"action":"focus_node","node_id":"n2"} três."#);
        let stages = StageBuilder::new().build(&s);
        assert_eq!(
            stages,
            [
                Stage::speak("Um."),
                Stage::new("Dois", Some(Directive::focus_node("n2"))),
                Stage::speak("três."),
            ]
        );
    }

    #[test]
    fn leading_directive_becomes_command_only_stage() {
        let s = segment(r#"{"action":"focus_node","node_id":"n1"} Olá."#);
        let stages = StageBuilder::new().build(&s);
        assert_eq!(
            stages,
            [Stage::act(Directive::focus_node("n1")), Stage::speak("Olá.")]
        );
    }

    #[test]
    fn degenerate_stages_dropped() {
        let stages = StageBuilder::new().build(&segment("   \n  "));
        assert!(stages.is_empty());
    }

    #[test]
    fn code_block_is_never_split() {
        assert_eq!(
            split_sentences("Rode:\n```\nx = 1. y = 2.\n```\nPronto. Fim."),
            ["Rode:\n```\nx = 1. y = 2.\n```\nPronto.", "Fim."]
        );
    }

    #[test]
    fn whitespace_is_collapsed() {
        let stages = StageBuilder::new().build(&segment("Linha um\ncontinua.   Outra."));
        assert_eq!(stages, [Stage::speak("Linha um continua."), Stage::speak("Outra.")]);
    }
}
