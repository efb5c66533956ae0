//! Display and speech renderings of assistant text

use crate::segmenter::segment;
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("code block pattern is valid"));
static FENCE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[\w+#.\-]*").expect("fence marker pattern is valid"));
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#+\s*").expect("heading pattern is valid"));
static INLINE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\(\[]?\bID:\s*[\w\-]+[\)\]]?").expect("inline id pattern is valid")
});
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank lines pattern is valid"));

/// User-visible rendering of a raw reply
///
/// Directive tokens, inert inline objects, stray `json` labels and fence
/// markers (with their language tag) are removed; markdown is otherwise kept.
#[must_use]
pub fn display_text(raw: &str) -> String {
    let prose = segment(raw).prose_text();
    let prose = FENCE_MARKER_RE.replace_all(&prose, "");

    let lines: Vec<String> = prose
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();

    BLANK_LINES_RE
        .replace_all(lines.join("\n").trim(), "\n\n")
        .into_owned()
}

/// Text handed to speech synthesis
///
/// Strips fenced code, markdown artifacts that sound bad when spoken and
/// inline `ID:` tags.
#[must_use]
pub fn speech_text(text: &str) -> String {
    let text = CODE_BLOCK_RE.replace_all(text, " ");
    let text = FENCE_MARKER_RE.replace_all(&text, " ");
    let text = HEADING_RE.replace_all(&text, "");
    let text = INLINE_ID_RE.replace_all(&text, "");
    let text = text.replace('*', "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strips_tokens_and_keeps_markdown() {
        let raw = "O **PIB** cresceu. {\"action\": \"focus_node\", \"node_id\": \"n1\"} Fim.";
        assert_eq!(display_text(raw), "O **PIB** cresceu. Fim.");
    }

    #[test]
    fn display_strips_fenced_json() {
        let raw = "Veja:\n```json\n{\"action\": \"focus_node\", \"node_id\": \"n1\"}\n```\nPronto.";
        assert_eq!(display_text(raw), "Veja:\n\nPronto.");
    }

    #[test]
    fn display_hides_malformed_directive() {
        let raw = "A {\"action\": \"focus_node\" \"node_id\": \"n1\"} B";
        assert_eq!(display_text(raw), "A B");
    }

    #[test]
    fn speech_drops_markdown_and_ids() {
        let text = "## Resumo\nA **Fundação Seade** (ID: seade_01) publicou *dados*.";
        assert_eq!(speech_text(text), "Resumo A Fundação Seade publicou dados.");
    }

    #[test]
    fn speech_drops_code_blocks() {
        assert_eq!(speech_text("Antes ```x = 1``` depois"), "Antes depois");
        assert_eq!(speech_text("Rode: ```python print(total) ``` Fim."), "Rode: Fim.");
        assert_eq!(speech_text("Sem fechamento ```rust"), "Sem fechamento");
    }

    #[test]
    fn display_drops_fence_language_tags() {
        let raw = "Veja o código:\n```python\nprint(total)\n```\nIsso é tudo.";
        assert_eq!(
            display_text(raw),
            "Veja o código:\n\nprint(total)\n\nIsso é tudo."
        );
    }
}
