//! Audio transcription proxy.

pub mod client;
pub mod routes;

pub use client::{AudioUpload, HttpTranscriber, Transcriber};
pub use routes::{TranscriptionRouteState, transcription_routes};
