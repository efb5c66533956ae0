//! Audio output
//!
//! - [`AudioSink`]: plays one clip to completion, can be stopped at any time
//! - [`FallbackVoice`]: best-effort narration when a stage's clip fails
//! - [`AudioChannel`]: the single active audio handle; starting a clip stops
//!   the previous one first

use crate::error::AudioError;
use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Encoded audio payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Encoded bytes (mp3, wav, ...)
    pub bytes: Vec<u8>,
    /// Content type, when known
    pub mime: Option<String>,
}

impl AudioClip {
    /// Create clip from bytes
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: None,
        }
    }

    /// Set content type
    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Decode a base64 payload, with or without a `data:` URL prefix
    ///
    /// # Errors
    /// `AudioError::Decode` on invalid base64 or an empty payload.
    pub fn from_base64(encoded: &str) -> Result<Self, AudioError> {
        let (mime, data) = match encoded.trim().split_once(";base64,") {
            Some((head, data)) => (head.strip_prefix("data:").map(str::to_string), data),
            None => (None, encoded.trim()),
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AudioError::Decode("empty payload".to_string()));
        }

        Ok(Self { bytes, mime })
    }

    /// File extension matching the content type
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime.as_deref() {
            Some(m) if m.contains("wav") => "wav",
            Some(m) if m.contains("ogg") => "ogg",
            _ => "mp3",
        }
    }
}

/// Plays clips
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play a clip, resolving when playback ends or is stopped
    async fn play(&self, clip: AudioClip) -> Result<(), AudioError>;

    /// Stop current playback immediately
    fn stop(&self);
}

/// Alternate narration path (local speech engine, captions, ...)
#[async_trait]
pub trait FallbackVoice: Send + Sync {
    /// Speak text, resolving when done
    async fn speak(&self, text: &str) -> Result<(), AudioError>;

    /// Abort in-flight speech
    fn cancel(&self);
}

/// How a playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Clip played to the end
    Finished,
    /// Stopped by cancellation or a newer clip
    Stopped,
}

/// The one audio handle a session may hold
pub struct AudioChannel {
    sink: Arc<dyn AudioSink>,
    active: Mutex<Option<u64>>,
    next_handle: AtomicU64,
}

impl std::fmt::Debug for AudioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChannel")
            .field("active", &*self.active.lock())
            .finish_non_exhaustive()
    }
}

impl AudioChannel {
    /// Wrap a sink
    #[must_use]
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            active: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Whether a clip currently holds the handle
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Play a clip, stopping whatever held the handle before
    ///
    /// # Errors
    /// Whatever the sink reports.
    pub async fn play(
        &self,
        clip: AudioClip,
        cancel: &CancellationToken,
    ) -> Result<PlaybackEnd, AudioError> {
        if cancel.is_cancelled() {
            return Ok(PlaybackEnd::Stopped);
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.active.lock().replace(handle) {
            debug!(previous, "stopping previous clip");
            self.sink.stop();
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.sink.stop();
                Ok(PlaybackEnd::Stopped)
            }
            played = self.sink.play(clip) => played.map(|()| PlaybackEnd::Finished),
        };

        let mut active = self.active.lock();
        match *active {
            Some(current) if current == handle => *active = None,
            // superseded while playing
            Some(_) => return result.map(|_| PlaybackEnd::Stopped),
            None => {}
        }
        result
    }

    /// Stop and discard the active clip
    pub fn stop(&self) {
        if self.active.lock().take().is_some() {
            self.sink.stop();
        }
    }
}

/// Sink that discards audio instantly
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioSink;

#[async_trait]
impl AudioSink for NullAudioSink {
    async fn play(&self, _clip: AudioClip) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Sink that writes each clip to a directory
#[derive(Debug)]
pub struct FileAudioSink {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileAudioSink {
    /// Write clips under `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AudioSink for FileAudioSink {
    async fn play(&self, clip: AudioClip) -> Result<(), AudioError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("clip-{n:04}.{}", clip.extension()));
        tokio::fs::write(&path, &clip.bytes).await?;
        info!(path = %path.display(), bytes = clip.bytes.len(), "audio clip written");
        Ok(())
    }

    fn stop(&self) {}
}

/// Fallback that only logs the text
#[derive(Debug, Clone, Copy, Default)]
pub struct LogVoice;

#[async_trait]
impl FallbackVoice for LogVoice {
    async fn speak(&self, text: &str) -> Result<(), AudioError> {
        info!(text, "fallback narration");
        Ok(())
    }

    fn cancel(&self) {}
}
