//! `POST /api/whisper/audio` forwards raw audio to the transcriber.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::error;

use super::client::{AudioUpload, Transcriber};

/// Prefix of every failure message returned to the client.
pub const ERROR_PREFIX: &str = "Failed to transcribe audio. ";

/// Provider upload limit.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for the transcription route.
#[derive(Clone)]
pub struct TranscriptionRouteState {
    pub transcriber: Arc<dyn Transcriber>,
}

async fn transcribe_audio(
    State(state): State<TranscriptionRouteState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let mut upload = AudioUpload::new(body.to_vec());
    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        upload = upload.with_content_type(content_type);
    }

    match state.transcriber.transcribe(upload).await {
        Ok(text) => (
            StatusCode::OK,
            Json(serde_json::json!({"success": true, "text": text})),
        ),
        Err(e) => {
            error!(error = %e, "Failed to process transcription request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("{ERROR_PREFIX}{e}")})),
            )
        }
    }
}

/// Build the transcription route.
pub fn transcription_routes(state: TranscriptionRouteState) -> Router {
    Router::new()
        .route("/api/whisper/audio", post(transcribe_audio))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .with_state(state)
}
