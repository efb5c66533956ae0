//! Narrator Script - from assistant reply to playable stages
//!
//! Turns a free-text assistant reply into an ordered list of speak-then-act
//! [`Stage`]s:
//! - Excises focus directives (and any other inline `{...}` object) from prose
//! - Links entity mentions the model forgot to focus
//! - Splits prose into sentence-sized stages carrying at most one directive
//! - Cleans text for display and for speech synthesis
//!
//! # Pipeline
//!
//! ```text
//! answer → EntityAutoLinker → segment() → StageBuilder → Vec<Stage>
//!                                 └──────→ display_text()
//! ```
//!
//! # Example
//!
//! ```rust
//! use narr_script::{EntityLabel, LinkerConfig, ScriptCompiler};
//!
//! let compiler = ScriptCompiler::new(LinkerConfig::default());
//! let entities = vec![EntityLabel::new("org_x", "Organização X")];
//! let script = compiler.compile(
//!     r#"O PIB cresceu. {"action": "focus_node", "node_id": "n1"} Isso impactou a Organização X."#,
//!     &entities,
//! );
//!
//! assert_eq!(script.stages.len(), 3);
//! assert_eq!(script.commands().count(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod clean;
pub mod directive;
pub mod error;
pub mod linker;
pub mod script;
pub mod segmenter;
pub mod stage;

pub use clean::{display_text, speech_text};
pub use directive::{normalize_element_id, parse_token, Directive};
pub use error::ScriptError;
pub use linker::{EntityAutoLinker, EntityLabel, LinkedText, LinkerConfig};
pub use script::{NarrationScript, ScriptCompiler};
pub use segmenter::{segment, Segment, Segmented};
pub use stage::{Stage, StageBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building narration scripts
    pub use crate::{
        Directive, EntityLabel, LinkerConfig, NarrationScript, ScriptCompiler, Stage,
        StageBuilder,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
