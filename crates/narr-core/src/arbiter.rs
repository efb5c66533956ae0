//! Audio Backend Arbiter
//!
//! Picks the playback policy once per turn. The choice is threaded through the
//! whole turn and never re-derived, so toggling the voice mid-turn cannot mix
//! a premium clip with per-stage synthesis.

use crate::backend::{ChatResponse, VoiceMode};
use serde::{Deserialize, Serialize};

/// Playback policy for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackPolicy {
    /// Play the single pre-rendered clip, pace commands on a timer
    Premium {
        /// Base64 clip from the chat response
        encoded: String,
    },
    /// Synthesize and play stage by stage
    Incremental,
    /// Commands only, fixed delay between stages
    Silent,
}

impl PlaybackPolicy {
    /// Policy name for logs and events
    #[inline]
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Premium { .. } => PolicyKind::Premium,
            Self::Incremental => PolicyKind::Incremental,
            Self::Silent => PolicyKind::Silent,
        }
    }
}

/// Policy discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Pre-rendered clip
    Premium,
    /// Per-stage synthesis
    Incremental,
    /// No audio
    Silent,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Premium => "premium",
            Self::Incremental => "incremental",
            Self::Silent => "silent",
        })
    }
}

/// Chooses between the pre-rendered clip and per-stage synthesis
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioArbiter;

impl AudioArbiter {
    /// Decide the policy for a turn
    ///
    /// `voice` is the mode snapshotted when the turn started.
    #[must_use]
    pub fn select(response: &ChatResponse, voice: VoiceMode) -> PlaybackPolicy {
        if !voice.audio_enabled() {
            return PlaybackPolicy::Silent;
        }

        match response.premium_audio() {
            Some(encoded) => PlaybackPolicy::Premium {
                encoded: encoded.to_string(),
            },
            None => PlaybackPolicy::Incremental,
        }
    }
}
