//! Playback session state machine
//!
//! ```text
//! Idle → Thinking → (Speaking ⇄ Acting) → Idle
//!           └──────────┴────────┴→ Stopping → Idle
//! ```
//!
//! At most one turn is in flight: `Idle → Thinking` is the only way in, and it
//! is claimed atomically.

use crate::error::{NarratorError, TransitionError};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use ulid::Ulid;

/// Unique turn identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Ulid);

impl TurnId {
    /// Generate new turn ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarratorState {
    /// Ready for a message
    #[default]
    Idle,
    /// Waiting for the chat reply
    Thinking,
    /// Narration audio in progress
    Speaking,
    /// Driving the graph
    Acting,
    /// Cancellation requested, unwinding
    Stopping,
}

impl NarratorState {
    /// Whether a turn is in flight
    #[inline]
    #[must_use]
    pub fn is_busy(self) -> bool {
        self != Self::Idle
    }
}

impl std::fmt::Display for NarratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Acting => "acting",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Validates a state transition
///
/// # Errors
/// `TransitionError::IllegalTransition` when the state machine forbids it.
pub fn validate_transition(from: NarratorState, to: NarratorState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::IllegalTransition { from, to })
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: NarratorState) -> Vec<NarratorState> {
    use NarratorState::{Acting, Idle, Speaking, Stopping, Thinking};
    match from {
        Idle => vec![Thinking],
        Thinking => vec![Speaking, Acting, Stopping, Idle],
        Speaking => vec![Acting, Stopping, Idle],
        Acting => vec![Speaking, Stopping, Idle],
        Stopping => vec![Idle],
    }
}

/// UI-facing flags derived from the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionFlags {
    /// Waiting for the reply
    pub is_thinking: bool,
    /// Narrating (audio or graph)
    pub is_speaking: bool,
    /// Interruption banner
    pub is_stopping: bool,
}

impl From<NarratorState> for SessionFlags {
    fn from(state: NarratorState) -> Self {
        Self {
            is_thinking: state == NarratorState::Thinking,
            is_speaking: matches!(state, NarratorState::Speaking | NarratorState::Acting),
            is_stopping: state == NarratorState::Stopping,
        }
    }
}

/// Observable state cell
#[derive(Debug)]
pub(crate) struct SessionState {
    tx: watch::Sender<NarratorState>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(NarratorState::Idle);
        Self { tx }
    }

    pub(crate) fn current(&self) -> NarratorState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<NarratorState> {
        self.tx.subscribe()
    }

    /// Claim the session for a new turn
    pub(crate) fn begin_turn(&self) -> Result<(), NarratorError> {
        let mut claimed = false;
        self.tx.send_if_modified(|state| {
            if *state == NarratorState::Idle {
                *state = NarratorState::Thinking;
                claimed = true;
            }
            claimed
        });

        if claimed {
            Ok(())
        } else {
            Err(NarratorError::TurnInFlight)
        }
    }

    /// Wait until a cancelled turn has released the session
    pub(crate) async fn settled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|state| *state != NarratorState::Stopping).await;
    }

    /// Move to `to`; staying in the same state is a no-op
    pub(crate) fn transition(&self, to: NarratorState) -> Result<(), TransitionError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if *state == to {
                return false;
            }
            match validate_transition(*state, to) {
                Ok(()) => {
                    *state = to;
                    true
                }
                Err(e) => {
                    result = Err(e);
                    false
                }
            }
        });
        result
    }

    /// Return to `Idle` from wherever the turn ended
    pub(crate) fn finish(&self) {
        self.tx.send_if_modified(|state| {
            let changed = *state != NarratorState::Idle;
            *state = NarratorState::Idle;
            changed
        });
    }
}
