//! Playback Policy Tests
//!
//! Full turns through the scheduler with recording fakes, one test per
//! policy plus the ordering and fallback guarantees.
//!
use base64::Engine;
use narr_core::{
    ChatResponse, NarratorConfig, NarratorEvent, NarratorState, PlaybackConfig, PolicyKind,
    TurnOutcome, VoiceMode,
};
use narr_test_utils::{Harness, RecordingAudioSink, ScriptedBackend, REFERENCE_ANSWER};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::Instant;

const PLAY: Duration = Duration::from_secs(1);

fn config(voice: VoiceMode) -> NarratorConfig {
    NarratorConfig::default().with_playback(PlaybackConfig::default().with_voice_mode(voice))
}

fn harness(answer: ChatResponse, sink: RecordingAudioSink, voice: VoiceMode) -> Harness {
    Harness::new(ScriptedBackend::new().reply(answer), sink, &config(voice))
}

fn event_names(events: &[NarratorEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["event"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn incremental_focuses_before_synthesizing() {
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER),
        RecordingAudioSink::new(PLAY),
        VoiceMode::Local,
    );

    let report = h.narrator.send("Como está o PIB?").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(report.stages_played, 3);
    assert_eq!(
        h.entries(&["focus:", "synth:", "play:"]),
        [
            "synth:O PIB cresceu.",
            "play:O PIB cresceu.",
            "focus:n1",
            "focus:org_x",
            "synth:Isso impactou a Organização X.",
            "play:Isso impactou a Organização X.",
        ]
    );
    assert_eq!(h.sink.overlaps(), 0);
    assert_eq!(h.selected().as_deref(), Some("org_x"));
    assert_eq!(h.narrator.state(), NarratorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn incremental_waits_for_each_clip() {
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER),
        RecordingAudioSink::new(PLAY),
        VoiceMode::Local,
    );
    let start = Instant::now();

    h.narrator.send("Como está o PIB?").await.unwrap();

    // two clips plus the dwell on the command-only stage
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3300), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn synthesis_failure_falls_back_for_that_stage_only() {
    let backend = ScriptedBackend::new()
        .reply(ChatResponse::text(REFERENCE_ANSWER))
        .fail_speech_containing("PIB");
    let h = Harness::new(backend, RecordingAudioSink::new(PLAY), &config(VoiceMode::Local));
    let mut events = h.narrator.subscribe();

    let report = h.narrator.send("Como está o PIB?").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(h.voice.spoken(), ["O PIB cresceu."]);
    assert_eq!(h.sink.played(), ["Isso impactou a Organização X."]);

    let mut fallbacks = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let NarratorEvent::SpeechFallback { index, .. } = event {
            fallbacks.push(index);
        }
    }
    assert_eq!(fallbacks, [0]);
}

#[tokio::test(start_paused = true)]
async fn playback_failure_also_falls_back() {
    let h = harness(
        ChatResponse::text("Primeira frase. Segunda frase."),
        RecordingAudioSink::new(PLAY).failing(),
        VoiceMode::Local,
    );

    let report = h.narrator.send("Resuma").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(h.voice.spoken(), ["Primeira frase.", "Segunda frase."]);
}

#[tokio::test(start_paused = true)]
async fn premium_plays_one_clip_and_paces_commands() {
    let clip = base64::engine::general_purpose::STANDARD.encode("premium narration");
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER).with_audio(clip),
        RecordingAudioSink::new(Duration::from_secs(10)),
        VoiceMode::Premium,
    );
    let start = Instant::now();

    let report = h.narrator.send("Como está o PIB?").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(report.stages_played, 3);
    assert_eq!(h.sink.played(), ["premium narration"]);
    assert!(h.backend.synth_texts().is_empty());
    assert_eq!(h.sink.overlaps(), 0);
    assert_eq!(h.entries(&["focus:"]), ["focus:n1", "focus:org_x"]);

    // the turn lasts as long as the clip, not the pacing timer
    assert!(start.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn premium_failure_keeps_commands_and_never_synthesizes() {
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER).with_audio("%%% not base64 %%%"),
        RecordingAudioSink::new(PLAY),
        VoiceMode::Premium,
    );
    let start = Instant::now();

    let report = h.narrator.send("Como está o PIB?").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert!(h.sink.played().is_empty());
    assert!(h.backend.synth_texts().is_empty());
    assert!(h.voice.spoken().is_empty());
    assert_eq!(h.entries(&["focus:"]), ["focus:n1", "focus:org_x"]);
    assert!(start.elapsed() >= Duration::from_millis(8000));
}

#[tokio::test(start_paused = true)]
async fn silent_paces_commands_without_audio() {
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER),
        RecordingAudioSink::new(PLAY),
        VoiceMode::None,
    );
    let start = Instant::now();

    let report = h.narrator.send("Como está o PIB?").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert!(h.backend.synth_texts().is_empty());
    assert!(h.sink.played().is_empty());
    assert_eq!(h.entries(&["focus:"]), ["focus:n1", "focus:org_x"]);

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(5000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(5100), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn events_follow_stage_order() {
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER),
        RecordingAudioSink::new(PLAY),
        VoiceMode::None,
    );
    let mut rx = h.narrator.subscribe();

    h.narrator.send("Como está o PIB?").await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        event_names(&events),
        [
            "turn_started",
            "reply_received",
            "stage_started",
            "stage_started",
            "focus_applied",
            "stage_started",
            "focus_applied",
            "turn_finished",
        ]
    );
    assert!(matches!(
        &events[1],
        NarratorEvent::ReplyReceived { stages: 3, policy: PolicyKind::Silent, .. }
    ));
    let turn = events[0].turn();
    assert!(events.iter().all(|e| e.turn() == turn));
}

#[tokio::test(start_paused = true)]
async fn unresolved_directive_does_not_abort() {
    let h = harness(
        ChatResponse::text(r#"Veja {"action": "focus_node", "node_id": "ghost"} agora. Fim."#),
        RecordingAudioSink::new(PLAY),
        VoiceMode::None,
    );
    let mut rx = h.narrator.subscribe();

    let report = h.narrator.send("Mostre").await.unwrap();

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(report.stages_played, 3);
    let mut applied = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let NarratorEvent::FocusApplied { applied: a, .. } = event {
            applied.push(a);
        }
    }
    assert_eq!(applied, [false]);
    assert!(h.selected().is_none());
}

#[tokio::test(start_paused = true)]
async fn transcript_keeps_raw_reply_and_request_carries_graph() {
    let h = harness(
        ChatResponse::text(REFERENCE_ANSWER).with_cost(0.002),
        RecordingAudioSink::new(PLAY),
        VoiceMode::None,
    );

    h.narrator.send("Como está o PIB?").await.unwrap();

    let transcript = h.narrator.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, REFERENCE_ANSWER);
    assert_eq!(
        transcript[1].display_content(),
        "O PIB cresceu. Isso impactou a Organização X."
    );

    let requests = h.backend.chat_requests();
    assert_eq!(requests.len(), 1);
    let graph = requests[0].cytoscape.as_ref().unwrap();
    assert_eq!(graph.elements.nodes.len(), 3);
    assert!(requests[0].stats.is_some());
    assert_eq!(h.narrator.usage().session_cost_usd, 0.002);
}
