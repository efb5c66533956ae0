//! Backend contract
//!
//! Wire types for the chat, synthesis and usage endpoints, and the
//! [`NarratorBackend`] trait the scheduler talks to.

use crate::audio::AudioClip;
use crate::error::BackendError;
use async_trait::async_trait;
use narr_graph::GraphData;
use narr_script::display_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting
    User,
    /// The narrator
    Assistant,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Raw content (assistant replies keep their directives)
    pub content: String,
}

impl ChatMessage {
    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Text to show the user
    #[must_use]
    pub fn display_content(&self) -> String {
        match self.role {
            Role::User => self.content.clone(),
            Role::Assistant => display_text(&self.content),
        }
    }
}

/// Requested narration voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    /// No audio
    #[default]
    None,
    /// Cheap local synthesis
    Local,
    /// Server-rendered premium voice
    Premium,
}

impl VoiceMode {
    /// Whether audio output is on
    #[inline]
    #[must_use]
    pub fn audio_enabled(self) -> bool {
        self != Self::None
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Local => "local",
            Self::Premium => "premium",
        }
    }
}

impl std::fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "local" => Ok(Self::Local),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown voice mode: {other}")),
        }
    }
}

/// Chat request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Job whose graph is being discussed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Full transcript, oldest first
    pub messages: Vec<ChatMessage>,
    /// Current graph elements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cytoscape: Option<GraphData>,
    /// Current graph statistics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    /// Voice the reply should be rendered with
    pub voice_mode: VoiceMode,
}

/// Chat response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
    /// Reply text, possibly carrying directives
    pub answer: String,
    /// Metered cost of this reply
    pub cost_usd: Option<f64>,
    /// Pre-rendered narration of the whole reply
    pub audio_base64: Option<String>,
    /// Model that produced the reply
    pub model_used: Option<String>,
    /// Voice used for `audio_base64`
    pub voice_type: Option<String>,
    /// Non-fatal service warning
    pub warning: Option<String>,
}

impl ChatResponse {
    /// Plain reply without audio
    #[must_use]
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }

    /// Attach a pre-rendered clip
    #[must_use]
    pub fn with_audio(mut self, audio_base64: impl Into<String>) -> Self {
        self.audio_base64 = Some(audio_base64.into());
        self
    }

    /// Attach a cost
    #[must_use]
    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    /// Pre-rendered clip, if present and non-empty
    #[must_use]
    pub fn premium_audio(&self) -> Option<&str> {
        self.audio_base64
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

/// Synthesis request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Voice to use
    pub voice_mode: VoiceMode,
}

/// Usage snapshot mirrored from the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    /// Total spend
    pub total_usd: f64,
    /// Spend avoided through cheaper paths
    pub estimated_savings_usd: f64,
    /// Messages served
    pub messages_count: u64,
    /// Service-side timestamp of the snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// The opaque service behind the narrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarratorBackend: Send + Sync {
    /// Request a reply for the transcript
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;

    /// Synthesize one stage of speech
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioClip, BackendError>;

    /// Fetch the usage snapshot
    async fn usage(&self) -> Result<UsageStats, BackendError>;
}
