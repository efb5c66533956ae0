//! Focus directives embedded in assistant replies
//!
//! The only wire format parsed exactly. A directive is a flat object literal
//! whose first key is `"action"`:
//!
//! ```text
//! directive := "{" "\"action\"" ":" str ( "," str ":" str )* "}"
//! str       := "\"" [^"{}]* "\""
//! ```
//!
//! Nested braces, escaped quotes and non-string values are unsupported and
//! count as parse-misses.

use crate::error::ScriptError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Any flat inline object, optionally preceded by a stray `json` label
pub(crate) static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:\bjson\s*)?\{[^{}]*\}").expect("token pattern is valid")
});

static ACTION_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\{\s*"action"\s*:"#).expect("action head pattern is valid"));

static GRAMMAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\{\s*"action"\s*:\s*"[^"{}]*"\s*(?:,\s*"[^"{}]*"\s*:\s*"[^"{}]*"\s*)*\}$"#,
    )
    .expect("directive grammar pattern is valid")
});

static ID_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\(\[]?\s*(?i:id)\s*:\s*").expect("id prefix pattern is valid")
});

/// A structured focus action
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Directive {
    /// Focus a single node
    FocusNode {
        /// Target node id
        node_id: String,
    },
    /// Focus the edge between two nodes
    FocusEdge {
        /// Source node id
        source: String,
        /// Target node id
        target: String,
    },
}

impl Directive {
    /// Create a `focus_node` directive
    #[inline]
    #[must_use]
    pub fn focus_node(node_id: impl Into<String>) -> Self {
        Self::FocusNode {
            node_id: node_id.into(),
        }
    }

    /// Create a `focus_edge` directive
    #[inline]
    #[must_use]
    pub fn focus_edge(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::FocusEdge {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Wire name of the action
    #[inline]
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::FocusNode { .. } => "focus_node",
            Self::FocusEdge { .. } => "focus_edge",
        }
    }

    /// Node id targeted by a `focus_node`, normalized
    #[must_use]
    pub fn focused_node(&self) -> Option<&str> {
        match self {
            Self::FocusNode { node_id } => Some(normalize_element_id(node_id)),
            Self::FocusEdge { .. } => None,
        }
    }

    /// Serialize back into the inline token form
    ///
    /// The `action` key always comes first, so the output satisfies the grammar
    /// as long as the ids contain no quotes or braces.
    #[must_use]
    pub fn to_token(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FocusNode { node_id } => write!(f, "focus_node({node_id})"),
            Self::FocusEdge { source, target } => write!(f, "focus_edge({source} -> {target})"),
        }
    }
}

/// Parse one inline token into a directive
///
/// # Errors
/// - `ScriptError::NotADirective` when the object has no leading `"action"` key
/// - `ScriptError::Grammar` when it breaks the flat string-pair grammar
/// - `ScriptError::Payload` for unknown actions or missing fields
pub fn parse_token(token: &str) -> Result<Directive, ScriptError> {
    let object = token.find('{').map_or(token, |at| &token[at..]).trim();

    if !ACTION_HEAD_RE.is_match(object) {
        return Err(ScriptError::NotADirective);
    }
    if !GRAMMAR_RE.is_match(object) {
        return Err(ScriptError::Grammar(object.to_string()));
    }

    Ok(serde_json::from_str(object)?)
}

/// Strip an accidental `ID:` label (optionally bracketed) from an element id
#[must_use]
pub fn normalize_element_id(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(prefix) = ID_PREFIX_RE.find(trimmed) else {
        return trimmed;
    };

    let rest = &trimmed[prefix.end()..];
    let rest = if trimmed.starts_with(['(', '[']) {
        rest.trim_end_matches([')', ']'])
    } else {
        rest
    };
    rest.trim()
}
