//! Narrator Core - narrated playback of assistant replies over a graph
//!
//! Drives a conversation whose replies are narrated while the graph view
//! follows along:
//! - Sends the transcript and graph context to the narrator service
//! - Compiles replies into speak-then-act stages
//! - Chooses one audio policy per turn (premium clip, per-stage synthesis or
//!   silent pacing)
//! - Walks stages in order, focusing the graph before each stage is spoken
//! - Cancels cleanly at any await point
//!
//! # Architecture
//!
//! ```text
//! send() ─→ NarratorBackend::chat ─→ ScriptCompiler ─→ AudioArbiter
//!                                                         │
//!           ┌──────────────┬──────────────────────────────┤
//!        Premium       Incremental                      Silent
//!   clip ∥ paced walk  focus → synthesize → play     paced focus only
//!           └──────────────┴───────────┬──────────────────┘
//!                                FocusCommander → GraphView
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod arbiter;
pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod scheduler;
pub mod session;
pub mod usage;

pub use arbiter::{AudioArbiter, PlaybackPolicy, PolicyKind};
pub use audio::{
    AudioChannel, AudioClip, AudioSink, FallbackVoice, FileAudioSink, LogVoice, NullAudioSink,
    PlaybackEnd,
};
pub use backend::{
    ChatMessage, ChatRequest, ChatResponse, NarratorBackend, Role, SynthesisRequest, UsageStats,
    VoiceMode,
};
pub use config::{BackendConfig, NarratorConfig, PlaybackConfig};
pub use error::{AudioError, BackendError, ConfigError, NarratorError, TransitionError};
pub use events::{next_event, NarratorEvent, TurnOutcome, TurnReport};
pub use http::HttpBackend;
pub use scheduler::Narrator;
pub use session::{allowed_transitions, validate_transition, NarratorState, SessionFlags, TurnId};
pub use usage::UsageLedger;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
