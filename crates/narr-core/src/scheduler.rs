//! Playback Scheduler
//!
//! [`Narrator`] runs one conversational turn at a time:
//! 1. Claim the session (`Idle → Thinking`), rejecting concurrent sends
//! 2. Ask the backend for a reply, racing the cancellation token
//! 3. Compile the reply into stages and pick a playback policy once
//! 4. Walk the stages strictly in order under that policy
//! 5. Return to `Idle`, whether the turn completed, failed or was cancelled
//!
//! Every suspension point races the turn's [`CancellationToken`], so a cancel
//! unwinds the loop at the next await instead of after the current stage.

use crate::arbiter::{AudioArbiter, PlaybackPolicy};
use crate::audio::{
    AudioChannel, AudioClip, AudioSink, FallbackVoice, LogVoice, NullAudioSink, PlaybackEnd,
};
use crate::backend::{
    ChatMessage, ChatRequest, NarratorBackend, SynthesisRequest, UsageStats, VoiceMode,
};
use crate::config::{NarratorConfig, PlaybackConfig};
use crate::error::{AudioError, NarratorError};
use crate::events::{NarratorEvent, TurnOutcome, TurnReport};
use crate::http::HttpBackend;
use crate::session::{NarratorState, SessionFlags, SessionState, TurnId};
use crate::usage::UsageLedger;
use narr_graph::{FocusCommander, GraphController, GraphSnapshot};
use narr_script::{speech_text, Directive, ScriptCompiler, Stage};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

const EVENT_CAPACITY: usize = 256;

/// The narrator: chat transcript, playback scheduler and cancellation
pub struct Narrator {
    backend: Arc<dyn NarratorBackend>,
    commander: FocusCommander,
    compiler: ScriptCompiler,
    audio: AudioChannel,
    fallback: Arc<dyn FallbackVoice>,
    playback: PlaybackConfig,
    job_id: Option<String>,
    voice: Mutex<VoiceMode>,
    graph: Mutex<GraphSnapshot>,
    transcript: Mutex<Vec<ChatMessage>>,
    session: SessionState,
    turn: Mutex<Option<(TurnId, CancellationToken)>>,
    usage: Mutex<UsageLedger>,
    events: broadcast::Sender<NarratorEvent>,
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("state", &self.state())
            .field("voice", &self.voice_mode())
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

/// Resets the session when a turn ends, even if its future is dropped
struct TurnGuard<'a> {
    narrator: &'a Narrator,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.narrator.turn.lock().take();
        self.narrator.audio.stop();
        self.narrator.session.finish();
    }
}

impl Narrator {
    /// Create a narrator with silent audio and a logging fallback voice
    #[must_use]
    pub fn new(
        backend: Arc<dyn NarratorBackend>,
        graph: GraphController,
        config: &NarratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            commander: FocusCommander::new(graph, config.focus.clone()),
            compiler: ScriptCompiler::new(config.linker.clone()),
            audio: AudioChannel::new(Arc::new(NullAudioSink)),
            fallback: Arc::new(LogVoice),
            playback: config.playback.clone(),
            job_id: config.backend.job_id.clone(),
            voice: Mutex::new(config.playback.voice_mode),
            graph: Mutex::new(GraphSnapshot::default()),
            transcript: Mutex::new(Vec::new()),
            session: SessionState::new(),
            turn: Mutex::new(None),
            usage: Mutex::new(UsageLedger::default()),
            events,
        }
    }

    /// Narrator talking to the narrator service over HTTP
    ///
    /// # Errors
    /// - `NarratorError::Config` if `config` fails validation
    /// - `NarratorError::Backend` if the HTTP client cannot be built
    pub fn connect(graph: GraphController, config: &NarratorConfig) -> Result<Self, NarratorError> {
        config.validate()?;
        let backend = HttpBackend::new(config.backend.clone())?;
        Ok(Self::new(Arc::new(backend), graph, config))
    }

    /// With audio output
    #[must_use]
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio = AudioChannel::new(sink);
        self
    }

    /// With fallback narration
    #[must_use]
    pub fn with_fallback_voice(mut self, voice: Arc<dyn FallbackVoice>) -> Self {
        self.fallback = voice;
        self
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> NarratorState {
        self.session.current()
    }

    /// UI flags for the current state
    #[inline]
    #[must_use]
    pub fn flags(&self) -> SessionFlags {
        SessionFlags::from(self.state())
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<NarratorState> {
        self.session.subscribe()
    }

    /// Receive narrator events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NarratorEvent> {
        self.events.subscribe()
    }

    /// Graph this narrator drives
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &GraphController {
        self.commander.graph()
    }

    /// Voice mode for the next turn
    #[must_use]
    pub fn voice_mode(&self) -> VoiceMode {
        *self.voice.lock()
    }

    /// Change the voice mode; a running turn keeps the mode it started with
    pub fn set_voice_mode(&self, voice: VoiceMode) {
        *self.voice.lock() = voice;
        info!(%voice, "voice mode changed");
    }

    /// Transcript so far
    #[must_use]
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    /// Session cost tally
    #[must_use]
    pub fn usage(&self) -> UsageLedger {
        self.usage.lock().clone()
    }

    /// Load a graph into the view and the chat context
    ///
    /// # Errors
    /// `NarratorError::Graph` if the view rejects the elements.
    pub fn load_graph(&self, snapshot: GraphSnapshot) -> Result<(), NarratorError> {
        self.commander.graph().load(&snapshot.graph.elements)?;
        info!(elements = snapshot.graph.elements.len(), "graph loaded");
        *self.graph.lock() = snapshot;
        Ok(())
    }

    /// Poll the usage endpoint and mirror the snapshot
    ///
    /// # Errors
    /// `NarratorError::Backend` if the request fails.
    pub async fn refresh_usage(&self) -> Result<UsageStats, NarratorError> {
        let stats = self.backend.usage().await?;
        self.usage.lock().mirror(stats.clone());
        Ok(stats)
    }

    /// Submit a user message and narrate the reply
    ///
    /// Resolves when the turn is over. Chat failures are reported in the
    /// transcript, not as `Err`.
    ///
    /// # Errors
    /// - `NarratorError::EmptyMessage` for blank input
    /// - `NarratorError::TurnInFlight` while another turn runs; a turn that
    ///   is only stopping is waited out instead
    pub async fn send(&self, text: impl Into<String>) -> Result<TurnReport, NarratorError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(NarratorError::EmptyMessage);
        }

        self.session.settled().await;
        self.session.begin_turn()?;
        let turn = TurnId::new();
        let token = CancellationToken::new();
        *self.turn.lock() = Some((turn, token.clone()));
        let _guard = TurnGuard { narrator: self };

        let span = tracing::info_span!("turn", %turn);
        let report = self.run_turn(turn, text, &token).instrument(span).await;

        info!(%turn, outcome = ?report.outcome, stages = report.stages_played, "turn finished");
        self.emit(NarratorEvent::TurnFinished {
            turn,
            outcome: report.outcome,
        });
        Ok(report)
    }

    /// Interrupt the running turn
    ///
    /// Stops audio and fallback speech immediately; the turn returns to
    /// `Idle` at its next await, and a `send` issued before then waits for
    /// it. Returns `false` when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let Some((turn, token)) = self.turn.lock().clone() else {
            debug!("cancel ignored, no turn in flight");
            return false;
        };
        if token.is_cancelled() {
            return false;
        }

        info!(%turn, "cancelling turn");
        if let Err(e) = self.session.transition(NarratorState::Stopping) {
            debug!(error = %e, "stopping transition skipped");
        }
        token.cancel();
        self.audio.stop();
        self.fallback.cancel();
        self.emit(NarratorEvent::Cancelled { turn });
        true
    }

    async fn run_turn(&self, turn: TurnId, text: String, token: &CancellationToken) -> TurnReport {
        let voice = self.voice_mode();
        self.transcript.lock().push(ChatMessage::user(text));
        self.emit(NarratorEvent::TurnStarted { turn });
        info!(%voice, "turn started");

        let request = self.chat_request(voice);
        let reply = tokio::select! {
            biased;
            () = token.cancelled() => None,
            reply = self.backend.chat(&request) => Some(reply),
        };

        let response = match reply {
            None => return report(turn, TurnOutcome::Cancelled, 0),
            Some(Err(e)) => {
                error!(error = %e, "chat request failed");
                let message = format!("Sorry, I could not answer that right now ({e}).");
                self.transcript
                    .lock()
                    .push(ChatMessage::assistant(message.clone()));
                self.emit(NarratorEvent::TurnFailed { turn, message });
                return report(turn, TurnOutcome::Failed, 0);
            }
            Some(Ok(response)) => response,
        };

        if let Some(warning) = &response.warning {
            warn!(%warning, "narrator service warning");
        }
        self.usage.lock().record_turn(response.cost_usd);

        let entities = self.graph.lock().graph.elements.entity_labels();
        let script = self.compiler.compile(&response.answer, &entities);
        self.transcript
            .lock()
            .push(ChatMessage::assistant(response.answer.clone()));

        let policy = AudioArbiter::select(&response, voice);
        info!(
            stages = script.stages.len(),
            policy = %policy.kind(),
            model = response.model_used.as_deref().unwrap_or("unknown"),
            "reply received"
        );
        self.emit(NarratorEvent::ReplyReceived {
            turn,
            display: script.display.clone(),
            stages: script.stages.len(),
            policy: policy.kind(),
        });

        let played = match policy {
            PlaybackPolicy::Premium { encoded } => {
                self.play_premium(turn, &script.stages, &encoded, token)
                    .await
            }
            PlaybackPolicy::Incremental => {
                self.play_incremental(turn, &script.stages, voice, token)
                    .await
            }
            PlaybackPolicy::Silent => {
                self.enter(NarratorState::Acting);
                self.walk_paced(turn, &script.stages, self.playback.silent_delay(), token)
                    .await
            }
        };

        let outcome = if token.is_cancelled() {
            TurnOutcome::Cancelled
        } else {
            TurnOutcome::Completed
        };
        report(turn, outcome, played)
    }

    fn chat_request(&self, voice: VoiceMode) -> ChatRequest {
        let messages = self.transcript.lock().clone();
        let graph = self.graph.lock();
        ChatRequest {
            job_id: self.job_id.clone(),
            messages,
            cytoscape: (!graph.graph.elements.is_empty()).then(|| graph.graph.clone()),
            stats: (!graph.stats.is_null()).then(|| graph.stats.clone()),
            voice_mode: voice,
        }
    }

    /// Command first, then synthesize and play the stage's speech
    async fn play_incremental(
        &self,
        turn: TurnId,
        stages: &[Stage],
        voice: VoiceMode,
        token: &CancellationToken,
    ) -> usize {
        let mut played = 0;

        for (index, stage) in stages.iter().enumerate() {
            if token.is_cancelled() {
                break;
            }
            self.begin_stage(turn, index, stage);
            played += 1;

            if let Some(command) = &stage.command {
                self.act(turn, index, command);
            }

            let speech = speech_text(&stage.text);
            if speech.is_empty() {
                if stage.command.is_some() && !pause(self.playback.command_dwell(), token).await {
                    break;
                }
                continue;
            }

            self.enter(NarratorState::Speaking);
            if !self.speak_stage(turn, index, speech, voice, token).await {
                break;
            }
        }

        played
    }

    /// Returns `false` when cancelled
    async fn speak_stage(
        &self,
        turn: TurnId,
        index: usize,
        speech: String,
        voice: VoiceMode,
        token: &CancellationToken,
    ) -> bool {
        let request = SynthesisRequest {
            text: speech,
            voice_mode: voice,
        };

        let clip = tokio::select! {
            biased;
            () = token.cancelled() => return false,
            clip = self.backend.synthesize(&request) => clip,
        };

        let failure = match clip {
            Ok(clip) => match self.audio.play(clip, token).await {
                Ok(PlaybackEnd::Finished) => return true,
                Ok(PlaybackEnd::Stopped) => return !token.is_cancelled(),
                Err(e) => e,
            },
            Err(e) => AudioError::Synthesis(e),
        };

        warn!(index, error = %failure, "stage audio failed, using fallback voice");
        self.emit(NarratorEvent::SpeechFallback {
            turn,
            index,
            reason: failure.to_string(),
        });

        tokio::select! {
            biased;
            () = token.cancelled() => {
                self.fallback.cancel();
                false
            }
            spoken = self.fallback.speak(&request.text) => {
                if let Err(e) = spoken {
                    warn!(index, error = %e, "fallback narration failed");
                }
                true
            }
        }
    }

    /// One clip for the whole reply, commands on a fixed timer alongside it
    async fn play_premium(
        &self,
        turn: TurnId,
        stages: &[Stage],
        encoded: &str,
        token: &CancellationToken,
    ) -> usize {
        self.enter(NarratorState::Speaking);

        let clip = async {
            let clip = match AudioClip::from_base64(encoded) {
                Ok(clip) => clip,
                Err(e) => {
                    warn!(error = %e, "premium clip unusable, commands continue");
                    return;
                }
            };
            match self.audio.play(clip, token).await {
                Ok(end) => debug!(?end, "premium clip ended"),
                Err(e) => warn!(error = %e, "premium playback failed, commands continue"),
            }
        };
        let walk = self.walk_paced(turn, stages, self.playback.premium_interval(), token);

        let ((), played) = tokio::join!(clip, walk);
        played
    }

    /// Commands only, `interval` between consecutive stages
    async fn walk_paced(
        &self,
        turn: TurnId,
        stages: &[Stage],
        interval: Duration,
        token: &CancellationToken,
    ) -> usize {
        let mut played = 0;

        for (index, stage) in stages.iter().enumerate() {
            if index > 0 && !pause(interval, token).await {
                break;
            }
            if token.is_cancelled() {
                break;
            }
            self.begin_stage(turn, index, stage);
            played += 1;

            if let Some(command) = &stage.command {
                self.act(turn, index, command);
                if self.audio.is_active() {
                    self.enter(NarratorState::Speaking);
                }
            }
        }

        played
    }

    fn begin_stage(&self, turn: TurnId, index: usize, stage: &Stage) {
        debug!(index, text = %stage.text, command = ?stage.command, "stage");
        self.emit(NarratorEvent::StageStarted {
            turn,
            index,
            text: stage.text.clone(),
        });
    }

    fn act(&self, turn: TurnId, index: usize, command: &Directive) {
        self.enter(NarratorState::Acting);
        let applied = self.commander.apply(command).is_applied();
        self.emit(NarratorEvent::FocusApplied {
            turn,
            index,
            directive: command.clone(),
            applied,
        });
    }

    fn enter(&self, state: NarratorState) {
        if let Err(e) = self.session.transition(state) {
            debug!(error = %e, "state change skipped");
        }
    }

    fn emit(&self, event: NarratorEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Sleep unless cancelled first; `false` means cancelled
async fn pause(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

fn report(turn: TurnId, outcome: TurnOutcome, stages_played: usize) -> TurnReport {
    TurnReport {
        turn,
        outcome,
        stages_played,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatResponse, MockNarratorBackend, Role};
    use crate::error::BackendError;
    use narr_graph::InMemoryGraphView;

    fn narrator(backend: MockNarratorBackend) -> Narrator {
        Narrator::new(
            Arc::new(backend),
            GraphController::new(InMemoryGraphView::default()),
            &NarratorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn chat_failure_becomes_assistant_message() {
        let mut backend = MockNarratorBackend::new();
        backend.expect_chat().times(1).returning(|_| {
            Err(BackendError::Status {
                status: 502,
                message: "upstream down".into(),
            })
        });
        let narrator = narrator(backend);

        let report = narrator.send("Como está o PIB?").await.unwrap();

        assert_eq!(report.outcome, TurnOutcome::Failed);
        assert_eq!(narrator.state(), NarratorState::Idle);
        let transcript = narrator.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role, Role::Assistant);
        assert!(transcript[1].content.contains("upstream down"));
    }

    #[tokio::test(start_paused = true)]
    async fn request_carries_transcript_and_voice() {
        let mut backend = MockNarratorBackend::new();
        backend
            .expect_chat()
            .withf(|req| {
                req.messages.len() == 1
                    && req.voice_mode == VoiceMode::None
                    && req.cytoscape.is_none()
            })
            .times(1)
            .returning(|_| Ok(ChatResponse::text("Tudo certo.").with_cost(0.01)));
        let narrator = narrator(backend);

        let report = narrator.send("Oi").await.unwrap();

        assert_eq!(report.outcome, TurnOutcome::Completed);
        assert_eq!(report.stages_played, 1);
        assert_eq!(narrator.usage().turns, 1);
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let narrator = narrator(MockNarratorBackend::new());
        assert!(matches!(
            narrator.send("   ").await,
            Err(NarratorError::EmptyMessage)
        ));
        assert!(narrator.transcript().is_empty());
    }

    #[test]
    fn connect_validates_config() {
        let graph = GraphController::new(InMemoryGraphView::default());
        let config = NarratorConfig::default()
            .with_backend(crate::config::BackendConfig::default().with_base_url(""));

        assert!(matches!(
            Narrator::connect(graph.clone(), &config),
            Err(NarratorError::Config(_))
        ));
        assert!(Narrator::connect(graph, &NarratorConfig::default()).is_ok());
    }

    #[test]
    fn cancel_when_idle_is_noop() {
        let narrator = narrator(MockNarratorBackend::new());
        assert!(!narrator.cancel());
        assert_eq!(narrator.state(), NarratorState::Idle);
    }

    #[tokio::test]
    async fn usage_refresh_is_mirrored() {
        let mut backend = MockNarratorBackend::new();
        backend.expect_usage().returning(|| {
            Ok(UsageStats {
                total_usd: 2.0,
                messages_count: 4,
                ..UsageStats::default()
            })
        });
        let narrator = narrator(backend);

        let stats = narrator.refresh_usage().await.unwrap();
        assert_eq!(stats.messages_count, 4);
        assert_eq!(narrator.usage().total_usd(), Some(2.0));
    }
}
