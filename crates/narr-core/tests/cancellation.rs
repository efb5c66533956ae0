//! Cancellation and Session Tests
//!
//! Stopping a turn at each suspension point, busy rejection and the voice
//! mode snapshot.
//!
use narr_core::{
    ChatResponse, NarratorConfig, NarratorError, NarratorEvent, NarratorState, PlaybackConfig,
    Role, TurnOutcome, VoiceMode,
};
use narr_test_utils::{Harness, RecordingAudioSink, ScriptedBackend, REFERENCE_ANSWER};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn config(voice: VoiceMode) -> NarratorConfig {
    NarratorConfig::default().with_playback(PlaybackConfig::default().with_voice_mode(voice))
}

#[tokio::test(start_paused = true)]
async fn cancel_while_speaking_stops_audio_and_returns_to_idle() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text(REFERENCE_ANSWER))
        .reply(ChatResponse::text("Tudo bem."));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(10)),
        &config(VoiceMode::Local),
    );

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Como está o PIB?").await });

    sleep(Duration::from_millis(500)).await;
    assert_eq!(h.narrator.state(), NarratorState::Speaking);
    assert!(h.narrator.flags().is_speaking);
    assert!(h.sink.is_playing());

    assert!(h.narrator.cancel());
    assert!(!h.sink.is_playing());
    assert!(!h.narrator.cancel(), "second cancel is a no-op");

    let report = turn.await.unwrap().unwrap();
    assert_eq!(report.outcome, TurnOutcome::Cancelled);
    assert_eq!(report.stages_played, 1);
    assert_eq!(h.narrator.state(), NarratorState::Idle);
    assert_eq!(h.sink.played(), ["O PIB cresceu."]);
    assert!(h.entries(&["focus:"]).is_empty());

    // the transcript survives and the next turn is accepted
    assert_eq!(h.narrator.transcript().len(), 2);
    let next = h.narrator.send("E agora?").await.unwrap();
    assert_eq!(next.outcome, TurnOutcome::Completed);
    assert_eq!(h.narrator.transcript().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn send_right_after_cancel_is_accepted() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text(REFERENCE_ANSWER))
        .reply(ChatResponse::text("Tudo bem."));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(10)),
        &config(VoiceMode::Local),
    );

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Como está o PIB?").await });
    sleep(Duration::from_millis(500)).await;

    assert!(h.narrator.cancel());
    assert_eq!(h.narrator.state(), NarratorState::Stopping);
    tokio::task::yield_now().await;

    let next = h.narrator.send("E agora?").await.unwrap();
    assert_eq!(next.outcome, TurnOutcome::Completed);
    assert_eq!(turn.await.unwrap().unwrap().outcome, TurnOutcome::Cancelled);
    assert_eq!(h.narrator.state(), NarratorState::Idle);
    assert_eq!(h.sink.played(), ["O PIB cresceu.", "Tudo bem."]);
}

#[tokio::test(start_paused = true)]
async fn send_without_yield_waits_for_the_stopping_turn() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text("Resposta."))
        .with_chat_delay(Duration::from_secs(5));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::None),
    );

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Um").await });
    sleep(Duration::from_secs(1)).await;

    assert!(h.narrator.cancel());
    let next = h.narrator.send("Dois").await.unwrap();
    assert_eq!(next.outcome, TurnOutcome::Completed);
    assert_eq!(turn.await.unwrap().unwrap().outcome, TurnOutcome::Cancelled);

    // the cancelled turn keeps only its user message
    let transcript = h.narrator.transcript();
    let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["Um", "Dois", "Resposta."]);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_thinking_discards_the_reply() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text(REFERENCE_ANSWER))
        .with_chat_delay(Duration::from_secs(5));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::Local),
    );
    let mut events = h.narrator.subscribe();

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Como está o PIB?").await });

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.narrator.state(), NarratorState::Thinking);
    assert!(h.narrator.flags().is_thinking);
    assert!(h.narrator.cancel());
    assert_eq!(h.narrator.state(), NarratorState::Stopping);

    let report = turn.await.unwrap().unwrap();
    assert_eq!(report.outcome, TurnOutcome::Cancelled);
    assert_eq!(report.stages_played, 0);
    assert_eq!(h.narrator.state(), NarratorState::Idle);

    let transcript = h.narrator.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].role, Role::User);
    assert!(h.backend.synth_texts().is_empty());
    assert!(h.entries(&["focus:"]).is_empty());

    let mut cancelled = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, NarratorEvent::Cancelled { .. }) {
            cancelled += 1;
        }
    }
    assert_eq!(cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_silent_pacing_skips_remaining_commands() {
    let h = Harness::new(
        ScriptedBackend::new().reply(ChatResponse::text(REFERENCE_ANSWER)),
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::None),
    );

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Como está o PIB?").await });

    // first command lands at 2.5s, second would at 5s
    sleep(Duration::from_secs(3)).await;
    assert!(h.narrator.cancel());

    let report = turn.await.unwrap().unwrap();
    assert_eq!(report.outcome, TurnOutcome::Cancelled);
    assert_eq!(report.stages_played, 2);
    assert_eq!(h.entries(&["focus:"]), ["focus:n1"]);
}

#[tokio::test]
async fn cancel_when_idle_is_a_noop() {
    let h = Harness::new(
        ScriptedBackend::new(),
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::Local),
    );

    assert!(!h.narrator.cancel());
    assert_eq!(h.narrator.state(), NarratorState::Idle);
    assert_eq!(h.voice.cancels(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_send_is_rejected_while_thinking() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text("Resposta."))
        .with_chat_delay(Duration::from_secs(5));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::None),
    );

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Primeira").await });
    sleep(Duration::from_millis(100)).await;

    let err = h.narrator.send("Segunda").await.unwrap_err();
    assert!(matches!(err, NarratorError::TurnInFlight));
    assert!(err.is_recoverable());

    turn.await.unwrap().unwrap();
    let transcript = h.narrator.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].content, "Primeira");
    assert_eq!(h.backend.chat_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn voice_change_applies_to_the_next_turn() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text("Primeira resposta."))
        .reply(ChatResponse::text("Segunda resposta."))
        .with_chat_delay(Duration::from_secs(2));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::Local),
    );

    let narrator = Arc::clone(&h.narrator);
    let turn = tokio::spawn(async move { narrator.send("Um").await });
    sleep(Duration::from_secs(1)).await;
    h.narrator.set_voice_mode(VoiceMode::None);
    turn.await.unwrap().unwrap();

    assert_eq!(h.backend.synth_texts(), ["Primeira resposta."]);

    h.narrator.send("Dois").await.unwrap();
    assert_eq!(h.backend.synth_texts(), ["Primeira resposta."]);

    let voices: Vec<_> = h
        .backend
        .chat_requests()
        .iter()
        .map(|r| r.voice_mode)
        .collect();
    assert_eq!(voices, [VoiceMode::Local, VoiceMode::None]);
}

#[tokio::test(start_paused = true)]
async fn dropped_turn_still_releases_the_session() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text("Resposta."))
        .with_chat_delay(Duration::from_secs(5));
    let h = Harness::new(
        backend,
        RecordingAudioSink::new(Duration::from_secs(1)),
        &config(VoiceMode::None),
    );

    let result = tokio::time::timeout(Duration::from_secs(1), h.narrator.send("Oi")).await;
    assert!(result.is_err());
    assert_eq!(h.narrator.state(), NarratorState::Idle);
    assert!(!h.narrator.cancel());
}
