//! Error types for script parsing
//!
//! None of these reach the user: a token that fails to parse is excised from
//! the prose and logged, never rendered and never executed.

/// Why an inline `{...}` token did not yield a directive
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Object does not start with an `"action"` key; inert text
    #[error("inline object is not a directive")]
    NotADirective,

    /// Starts like a directive but breaks the flat string-pair grammar
    #[error("directive grammar violation: {0}")]
    Grammar(String),

    /// Grammar is fine but the payload is not a known directive
    #[error("invalid directive payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ScriptError {
    /// Whether the token looked like a directive at all
    #[inline]
    #[must_use]
    pub fn is_parse_miss(&self) -> bool {
        matches!(self, Self::Grammar(_) | Self::Payload(_))
    }
}
