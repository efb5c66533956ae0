//! Entity auto-linker
//!
//! Recall improvement for replies that mention a graph entity by label but
//! forget the matching `focus_node` directive. A synthesized directive is
//! inserted right after the first unambiguous mention.
//!
//! Each id is linked at most once per message, and never when the original
//! text already references it, so running the linker on its own output adds
//! nothing.

use crate::directive::{normalize_element_id, Directive, TOKEN_RE};
use crate::segmenter::segment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

/// Auto-linker tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Whether linking runs at all
    pub enabled: bool,
    /// Maximum labels considered per message, longest first
    pub max_candidates: usize,
    /// Labels shorter than this (in chars) are never linked
    pub min_label_chars: usize,
}

impl LinkerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With candidate cap
    #[inline]
    #[must_use]
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// With minimum label length
    #[inline]
    #[must_use]
    pub fn with_min_label_chars(mut self, min: usize) -> Self {
        self.min_label_chars = min;
        self
    }

    /// Disable linking
    #[inline]
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_candidates: 300,
            min_label_chars: 4,
        }
    }
}

/// A linkable graph entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLabel {
    /// Element id
    pub id: String,
    /// Display label
    pub label: String,
}

impl EntityLabel {
    /// Create new entity label
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Linker output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedText {
    /// Text with synthesized directives inserted
    pub text: String,
    /// Ids that received a synthesized directive, in insertion order
    pub linked_ids: Vec<String>,
}

/// Synthesizes `focus_node` directives for unfocused entity mentions
#[derive(Debug, Clone, Default)]
pub struct EntityAutoLinker {
    config: LinkerConfig,
}

impl EntityAutoLinker {
    /// Create linker
    #[inline]
    #[must_use]
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Insert directives for mentioned entities lacking one
    #[must_use]
    pub fn link(&self, text: &str, entities: &[EntityLabel]) -> LinkedText {
        if !self.config.enabled || entities.is_empty() {
            return LinkedText {
                text: text.to_string(),
                linked_ids: Vec::new(),
            };
        }

        // Referenced ids come from the untouched text only.
        let mut seen: HashSet<String> = segment(text)
            .directives()
            .iter()
            .filter_map(Directive::focused_node)
            .map(str::to_string)
            .collect();

        let mut candidates: Vec<&EntityLabel> = entities
            .iter()
            .filter(|e| e.label.trim().chars().count() >= self.config.min_label_chars)
            .collect();
        candidates.sort_by_key(|e| std::cmp::Reverse(e.label.trim().chars().count()));
        if candidates.len() > self.config.max_candidates {
            tracing::debug!(
                total = candidates.len(),
                cap = self.config.max_candidates,
                "entity vocabulary truncated for linking"
            );
            candidates.truncate(self.config.max_candidates);
        }

        let mut current = text.to_string();
        let mut linked_ids = Vec::new();
        let mut claimed: Vec<Range<usize>> = Vec::new();

        for entity in candidates {
            let id = normalize_element_id(&entity.id);
            if id.is_empty() || seen.contains(id) {
                continue;
            }
            let Some((mention, at)) = find_mention(&current, entity.label.trim(), &claimed) else {
                continue;
            };

            let mut token = Directive::focus_node(id).to_token();
            if current[at..].chars().next().is_some_and(|c| !c.is_whitespace()) {
                token.push(' ');
            }
            current.insert_str(at, &token);

            for range in &mut claimed {
                if range.start >= at {
                    *range = range.start + token.len()..range.end + token.len();
                }
            }
            claimed.push(mention);

            tracing::debug!(id, label = %entity.label, "linked entity mention");
            seen.insert(id.to_string());
            linked_ids.push(id.to_string());
        }

        LinkedText {
            text: current,
            linked_ids,
        }
    }
}

/// First boundary-anchored mention of `label` and the offset right after it
///
/// The right boundary (emphasis run plus one punctuation or space char) is
/// part of the mention, so a sentence-final full stop stays before the
/// inserted directive. Mentions inside inline objects or overlapping a mention
/// already claimed by a longer label are skipped.
fn find_mention(
    haystack: &str,
    label: &str,
    claimed: &[Range<usize>],
) -> Option<(Range<usize>, usize)> {
    let pattern = format!(
        r#"(?i)(?:^|[\s"'“‘(\[*])({})(\**(?:[\s.,;:!?"'”’)\]]|$))"#,
        regex::escape(label)
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::debug!(label, error = %e, "label pattern rejected");
            return None;
        }
    };

    let tokens: Vec<Range<usize>> = TOKEN_RE.find_iter(haystack).map(|m| m.range()).collect();

    let found = re.captures_iter(haystack).find_map(|caps| {
        let mention = caps.get(1)?;
        let range = mention.range();
        if tokens.iter().any(|t| t.contains(&range.start))
            || claimed.iter().any(|c| c.start < range.end && range.start < c.end)
        {
            return None;
        }
        let at = caps.get(2).map_or(range.end, |tail| tail.end());
        Some((range, at))
    });
    found
}
