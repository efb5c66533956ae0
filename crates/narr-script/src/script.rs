//! One-shot compilation of a reply into a narration script

use crate::clean::display_text;
use crate::directive::Directive;
use crate::linker::{EntityAutoLinker, EntityLabel, LinkerConfig};
use crate::segmenter::segment;
use crate::stage::{Stage, StageBuilder};

/// Everything playback needs from one assistant reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationScript {
    /// Reply after auto-linking
    pub enriched: String,
    /// User-visible text
    pub display: String,
    /// Stages in narrative order
    pub stages: Vec<Stage>,
    /// Ids that received a synthesized directive
    pub linked_ids: Vec<String>,
}

impl NarrationScript {
    /// Stage commands in execution order
    pub fn commands(&self) -> impl Iterator<Item = &Directive> {
        self.stages.iter().filter_map(|s| s.command.as_ref())
    }

    /// Whether there is nothing to play
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Linker plus stage builder
#[derive(Debug, Clone, Default)]
pub struct ScriptCompiler {
    linker: EntityAutoLinker,
    builder: StageBuilder,
}

impl ScriptCompiler {
    /// Create compiler
    #[inline]
    #[must_use]
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            linker: EntityAutoLinker::new(config),
            builder: StageBuilder::new(),
        }
    }

    /// Link, segment and stage a reply
    #[must_use]
    pub fn compile(&self, answer: &str, entities: &[EntityLabel]) -> NarrationScript {
        let linked = self.linker.link(answer, entities);
        let segmented = segment(&linked.text);
        let stages = self.builder.build(&segmented);

        tracing::debug!(
            stages = stages.len(),
            directives = segmented.directives().len(),
            linked = linked.linked_ids.len(),
            "compiled narration script"
        );

        NarrationScript {
            display: display_text(&linked.text),
            enriched: linked.text,
            stages,
            linked_ids: linked.linked_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::speech_text;
    use pretty_assertions::assert_eq;

    #[test]
    fn compiles_reference_reply() {
        let compiler = ScriptCompiler::new(LinkerConfig::default());
        let script = compiler.compile(
            r#"O PIB cresceu. {"action": "focus_node", "node_id": "n1"} Isso impactou a Organização X."#,
            &[EntityLabel::new("org_x", "Organização X")],
        );

        assert_eq!(
            script.stages,
            [
                Stage::speak("O PIB cresceu."),
                Stage::act(Directive::focus_node("n1")),
                Stage::new(
                    "Isso impactou a Organização X.",
                    Some(Directive::focus_node("org_x"))
                ),
            ]
        );
        assert_eq!(script.display, "O PIB cresceu. Isso impactou a Organização X.");
        assert_eq!(script.linked_ids, ["org_x"]);
    }

    #[test]
    fn empty_reply_has_no_stages() {
        let script = ScriptCompiler::default().compile("", &[]);
        assert!(script.is_empty());
        assert_eq!(script.display, "");
    }

    #[test]
    fn code_blocks_are_shown_but_never_spoken() {
        let script = ScriptCompiler::default().compile(
            "Veja o código:\n```python\nprint(total)\n```\nIsso é tudo.",
            &[],
        );

        assert_eq!(script.stages.len(), 1);
        assert_eq!(speech_text(&script.stages[0].text), "Veja o código: Isso é tudo.");
        assert_eq!(script.display, "Veja o código:\n\nprint(total)\n\nIsso é tudo.");
    }
}
