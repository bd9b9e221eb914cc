//! Speech-to-text client for OpenAI-compatible `/audio/transcriptions` APIs.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::TranscriptionConfig;
use crate::error::TranscriptionError;

/// Name the upload is sent under. Providers sniff the format from it.
pub const AUDIO_FILE_NAME: &str = "audio.webm";

/// Content type used when the caller did not send one.
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// Raw audio received from a client.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl AudioUpload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn mime(&self) -> &str {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_AUDIO_MIME)
    }
}

/// Turns audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, TranscriptionError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Pull a readable message out of a provider error body.
///
/// Handles `{"error": {"message": ...}}`, `{"error": "..."}` and plain text.
fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &value["error"];
        if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
        if let Some(message) = error.as_str() {
            return message.to_string();
        }
    }
    body.trim().to_string()
}

/// Multipart HTTP client, Groq by default.
pub struct HttpTranscriber {
    config: TranscriptionConfig,
    client: reqwest::Client,
}

impl HttpTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, TranscriptionError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(TranscriptionError::MissingApiKey)?;

        let mime = audio.mime().to_string();
        let size = audio.bytes.len();
        let part = Part::bytes(audio.bytes)
            .file_name(AUDIO_FILE_NAME)
            .mime_str(&mime)
            .map_err(|e| TranscriptionError::Request(format!("invalid content type {mime}: {e}")))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("temperature", self.config.temperature.to_string())
            .text("response_format", "json");

        debug!(bytes = size, mime = %mime, model = %self.config.model, "Submitting audio for transcription");

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(TranscriptionError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        info!(bytes = size, chars = parsed.text.len(), "Audio transcribed");
        Ok(parsed.text)
    }
}
