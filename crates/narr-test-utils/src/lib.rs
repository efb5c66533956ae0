//! Testing utilities for the narrator workspace
//!
//! Shared fakes and fixtures. Every fake can append to a shared [`Timeline`]
//! so tests can assert the interleaving of focus, synthesis and playback.

#![allow(missing_docs)]

use async_trait::async_trait;
use narr_core::{
    AudioClip, AudioError, BackendError, ChatRequest, ChatResponse, FallbackVoice, Narrator,
    NarratorBackend, NarratorConfig, SynthesisRequest, UsageStats,
};
use narr_graph::{
    CameraMove, GraphController, GraphElementRef, GraphElements, GraphSnapshot, GraphView,
    GraphViewError, InMemoryGraphView, ResolvedTarget, StyleClass,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Reply used in the reference narration example
pub const REFERENCE_ANSWER: &str = r#"O PIB cresceu. {"action": "focus_node", "node_id": "n1"} Isso impactou a Organização X."#;

/// Ordered log shared by the fakes
pub type Timeline = Arc<Mutex<Vec<String>>>;

pub fn timeline() -> Timeline {
    Arc::new(Mutex::new(Vec::new()))
}

fn log(timeline: &Option<Timeline>, entry: String) {
    if let Some(timeline) = timeline {
        timeline.lock().push(entry);
    }
}

/// Small economics graph: `n1` PIB, `org_x` Organização X, `n3` Inflação
pub fn sample_graph() -> GraphSnapshot {
    serde_json::from_value(serde_json::json!({
        "graph": {"elements": {
            "nodes": [
                {"data": {"id": "n1", "label": "PIB", "type": "INDICADOR"}},
                {"data": {"id": "org_x", "label": "Organização X", "type": "ORGANIZACAO"}},
                {"data": {"id": "n3", "label": "Inflação", "type": "INDICADOR"}}
            ],
            "edges": [
                {"data": {"id": "e1", "source": "n1", "target": "org_x", "label": "afeta"}}
            ]
        }},
        "stats": {"total_nodes": 3, "total_edges": 1}
    }))
    .unwrap()
}

/// Backend replaying queued replies
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ChatResponse, BackendError>>>,
    chat_delay: Duration,
    synth_delay: Duration,
    failing_speech: Vec<String>,
    usage: UsageStats,
    chat_requests: Mutex<Vec<ChatRequest>>,
    synth_requests: Mutex<Vec<SynthesisRequest>>,
    timeline: Option<Timeline>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, response: ChatResponse) -> Self {
        self.replies.lock().push_back(Ok(response));
        self
    }

    pub fn fail(self, error: BackendError) -> Self {
        self.replies.lock().push_back(Err(error));
        self
    }

    pub fn with_chat_delay(mut self, delay: Duration) -> Self {
        self.chat_delay = delay;
        self
    }

    pub fn with_synth_delay(mut self, delay: Duration) -> Self {
        self.synth_delay = delay;
        self
    }

    /// Synthesis fails for text containing `needle`
    pub fn fail_speech_containing(mut self, needle: &str) -> Self {
        self.failing_speech.push(needle.to_string());
        self
    }

    pub fn with_usage(mut self, usage: UsageStats) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().clone()
    }

    pub fn synth_texts(&self) -> Vec<String> {
        self.synth_requests
            .lock()
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }
}

#[async_trait]
impl NarratorBackend for ScriptedBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        self.chat_requests.lock().push(request.clone());
        log(&self.timeline, "chat".to_string());
        tokio::time::sleep(self.chat_delay).await;

        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| Ok(ChatResponse::text("Sem mais respostas.")))
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioClip, BackendError> {
        self.synth_requests.lock().push(request.clone());
        log(&self.timeline, format!("synth:{}", request.text));
        tokio::time::sleep(self.synth_delay).await;

        if self.failing_speech.iter().any(|n| request.text.contains(n)) {
            return Err(BackendError::Status {
                status: 500,
                message: "tts offline".to_string(),
            });
        }
        Ok(AudioClip::new(request.text.as_bytes().to_vec()))
    }

    async fn usage(&self) -> Result<UsageStats, BackendError> {
        Ok(self.usage.clone())
    }
}

/// Sink that "plays" for a fixed duration and records overlaps
pub struct RecordingAudioSink {
    play_duration: Duration,
    fail: bool,
    played: Mutex<Vec<String>>,
    current: Mutex<Option<u64>>,
    next: AtomicU64,
    overlaps: AtomicUsize,
    stops: AtomicUsize,
    stopped: Notify,
    timeline: Option<Timeline>,
}

impl RecordingAudioSink {
    pub fn new(play_duration: Duration) -> Self {
        Self {
            play_duration,
            fail: false,
            played: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            next: AtomicU64::new(0),
            overlaps: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            stopped: Notify::new(),
            timeline: None,
        }
    }

    /// Every play fails
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Clip payloads as text, in play order
    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    /// Plays started while another was still playing
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.current.lock().is_some()
    }
}

#[async_trait]
impl narr_core::AudioSink for RecordingAudioSink {
    async fn play(&self, clip: AudioClip) -> Result<(), AudioError> {
        let text = String::from_utf8_lossy(&clip.bytes).into_owned();
        log(&self.timeline, format!("play:{text}"));
        if self.fail {
            return Err(AudioError::Playback("device lost".to_string()));
        }

        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if self.current.lock().replace(id).is_some() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.played.lock().push(text);

        tokio::select! {
            () = tokio::time::sleep(self.play_duration) => {}
            () = self.stopped.notified() => {}
        }

        let mut current = self.current.lock();
        if *current == Some(id) {
            *current = None;
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.current.lock().take();
        self.stopped.notify_waiters();
    }
}

/// Fallback voice that records what it was asked to say
#[derive(Default)]
pub struct RecordingFallbackVoice {
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
    timeline: Option<Timeline>,
}

impl RecordingFallbackVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackVoice for RecordingFallbackVoice {
    async fn speak(&self, text: &str) -> Result<(), AudioError> {
        log(&self.timeline, format!("fallback:{text}"));
        self.spoken.lock().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory view that logs camera framing and selection
#[derive(Debug, Default)]
pub struct RecordingGraphView {
    inner: InMemoryGraphView,
    timeline: Option<Timeline>,
}

impl RecordingGraphView {
    pub fn new(timeline: Option<Timeline>) -> Self {
        Self {
            inner: InMemoryGraphView::default(),
            timeline,
        }
    }

    pub fn view(&self) -> &InMemoryGraphView {
        &self.inner
    }
}

impl GraphView for RecordingGraphView {
    fn load(&mut self, elements: &GraphElements) -> Result<(), GraphViewError> {
        self.inner.load(elements)
    }

    fn resolve(&self, target: &GraphElementRef) -> Option<ResolvedTarget> {
        self.inner.resolve(target)
    }

    fn add_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError> {
        self.inner.add_class(ids, class)
    }

    fn remove_class(&mut self, ids: &[String], class: StyleClass) -> Result<(), GraphViewError> {
        self.inner.remove_class(ids, class)
    }

    fn add_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError> {
        self.inner.add_class_all(class)
    }

    fn remove_class_all(&mut self, class: StyleClass) -> Result<(), GraphViewError> {
        self.inner.remove_class_all(class)
    }

    fn animate_camera(
        &mut self,
        ids: &[String],
        camera: &CameraMove,
    ) -> Result<(), GraphViewError> {
        if let Some(first) = ids.first() {
            log(&self.timeline, format!("focus:{first}"));
        }
        self.inner.animate_camera(ids, camera)
    }

    fn select(&mut self, id: &str) -> Result<(), GraphViewError> {
        self.inner.select(id)
    }
}

/// A narrator wired to recording fakes over [`sample_graph`]
pub struct Harness {
    pub narrator: Arc<Narrator>,
    pub backend: Arc<ScriptedBackend>,
    pub sink: Arc<RecordingAudioSink>,
    pub voice: Arc<RecordingFallbackVoice>,
    pub view: Arc<Mutex<RecordingGraphView>>,
    pub timeline: Timeline,
}

impl Harness {
    pub fn new(backend: ScriptedBackend, sink: RecordingAudioSink, config: &NarratorConfig) -> Self {
        let timeline = timeline();
        let backend = Arc::new(backend.with_timeline(timeline.clone()));
        let sink = Arc::new(sink.with_timeline(timeline.clone()));
        let voice = Arc::new(RecordingFallbackVoice::new().with_timeline(timeline.clone()));
        let view = Arc::new(Mutex::new(RecordingGraphView::new(Some(timeline.clone()))));

        let narrator = Narrator::new(
            backend.clone(),
            GraphController::new(Arc::clone(&view)),
            config,
        )
        .with_audio_sink(sink.clone())
        .with_fallback_voice(voice.clone());
        narrator.load_graph(sample_graph()).unwrap();

        Self {
            narrator: Arc::new(narrator),
            backend,
            sink,
            voice,
            view,
            timeline,
        }
    }

    /// Timeline entries starting with any of `prefixes`
    pub fn entries(&self, prefixes: &[&str]) -> Vec<String> {
        self.timeline
            .lock()
            .iter()
            .filter(|e| prefixes.iter().any(|p| e.starts_with(p)))
            .cloned()
            .collect()
    }

    /// Currently selected element
    pub fn selected(&self) -> Option<String> {
        self.view.lock().view().selected().map(str::to_string)
    }
}
