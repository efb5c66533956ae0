//! Narrator events broadcast to UIs and loggers

use crate::arbiter::PolicyKind;
use crate::session::TurnId;
use narr_script::Directive;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Every stage played
    Completed,
    /// Stopped by the user
    Cancelled,
    /// Chat request failed; an apology was appended to the transcript
    Failed,
}

/// Summary returned by `Narrator::send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Turn id
    pub turn: TurnId,
    /// How it ended
    pub outcome: TurnOutcome,
    /// Stages started before the turn ended
    pub stages_played: usize,
}

/// Something observable happened during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NarratorEvent {
    /// User message accepted
    TurnStarted {
        /// Turn id
        turn: TurnId,
    },
    /// Reply compiled and a policy chosen
    ReplyReceived {
        /// Turn id
        turn: TurnId,
        /// Text to show
        display: String,
        /// Stage count
        stages: usize,
        /// Chosen playback policy
        policy: PolicyKind,
    },
    /// Chat request failed
    TurnFailed {
        /// Turn id
        turn: TurnId,
        /// Message appended to the transcript
        message: String,
    },
    /// Stage playback began
    StageStarted {
        /// Turn id
        turn: TurnId,
        /// Stage index
        index: usize,
        /// Stage text
        text: String,
    },
    /// Stage command sent to the graph
    FocusApplied {
        /// Turn id
        turn: TurnId,
        /// Stage index
        index: usize,
        /// Command
        directive: Directive,
        /// Whether the target resolved
        applied: bool,
    },
    /// Stage audio failed and the fallback voice took over
    SpeechFallback {
        /// Turn id
        turn: TurnId,
        /// Stage index
        index: usize,
        /// Failure text
        reason: String,
    },
    /// Cancellation requested
    Cancelled {
        /// Turn id
        turn: TurnId,
    },
    /// Turn over; the session is about to return to idle
    TurnFinished {
        /// Turn id
        turn: TurnId,
        /// How it ended
        outcome: TurnOutcome,
    },
}

impl NarratorEvent {
    /// Turn this event belongs to
    #[must_use]
    pub fn turn(&self) -> TurnId {
        match self {
            Self::TurnStarted { turn }
            | Self::ReplyReceived { turn, .. }
            | Self::TurnFailed { turn, .. }
            | Self::StageStarted { turn, .. }
            | Self::FocusApplied { turn, .. }
            | Self::SpeechFallback { turn, .. }
            | Self::Cancelled { turn }
            | Self::TurnFinished { turn, .. } => *turn,
        }
    }
}

/// Next event from a subscription, skipping past any the receiver missed
///
/// Returns `None` once the narrator is dropped.
pub async fn next_event(events: &mut broadcast::Receiver<NarratorEvent>) -> Option<NarratorEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event subscriber fell behind"),
            Err(RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lagging_subscriber_keeps_receiving() {
        let (tx, mut rx) = broadcast::channel(2);
        let turns: Vec<TurnId> = (0..4).map(|_| TurnId::new()).collect();
        for turn in &turns {
            tx.send(NarratorEvent::Cancelled { turn: *turn }).unwrap();
        }
        drop(tx);

        let first = next_event(&mut rx).await.unwrap();
        assert_eq!(first.turn(), turns[2]);
        let second = next_event(&mut rx).await.unwrap();
        assert_eq!(second.turn(), turns[3]);
        assert!(next_event(&mut rx).await.is_none());
    }
}
