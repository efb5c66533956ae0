//! reqwest client for the narrator service

use crate::audio::AudioClip;
use crate::backend::{ChatRequest, ChatResponse, NarratorBackend, SynthesisRequest, UsageStats};
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// `{"error": "..."}` body returned on failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create client from configuration
    ///
    /// # Errors
    /// `BackendError::Request` if the TLS backend cannot initialise.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Backend configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn failure(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        warn!(status, %message, "narrator service error");
        BackendError::Status { status, message }
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl NarratorBackend for HttpBackend {
    #[instrument(skip_all, fields(messages = request.messages.len()))]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let url = self.config.endpoint(&self.config.chat_path);
        debug!("POST {}", url);

        let response = self.http_client.post(&url).json(request).send().await?;
        Self::json(response).await
    }

    #[instrument(skip_all, fields(chars = request.text.len()))]
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioClip, BackendError> {
        let url = self.config.endpoint(&self.config.audio_path);
        debug!("POST {}", url);

        let response = self.http_client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(BackendError::InvalidResponse("empty audio body".to_string()));
        }

        let clip = AudioClip::new(bytes.to_vec());
        Ok(match mime {
            Some(mime) => clip.with_mime(mime),
            None => clip,
        })
    }

    async fn usage(&self) -> Result<UsageStats, BackendError> {
        let url = self.config.endpoint(&self.config.usage_path);
        debug!("GET {}", url);

        let response = self.http_client.get(&url).send().await?;
        Self::json(response).await
    }
}
