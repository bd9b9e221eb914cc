//! Configuration types, read from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Groq OpenAI-compatible endpoint.
pub const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1";

/// English-only distilled Whisper model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "distil-whisper-large-v3-en";

/// Which medium backs the assistant slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// libSQL database file, one row of the `slots` table.
    Sqlite { path: PathBuf },
    /// Plain JSON file.
    File { path: PathBuf },
    /// In-process only; lost on exit.
    Memory,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP/WebSocket server.
    pub port: u16,
    /// Assistant store backend.
    pub store: StoreBackend,
    /// Directory for daily rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
    pub transcription: TranscriptionConfig,
}

impl ServerConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("CANVAS_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "CANVAS_PORT".into(),
                message: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        let backend = std::env::var("CANVAS_STORE").unwrap_or_else(|_| "sqlite".to_string());
        let store = parse_store_backend(&backend)?;

        let log_dir = std::env::var("CANVAS_LOG_DIR").ok().map(PathBuf::from);

        Ok(Self {
            port,
            store,
            log_dir,
            transcription: TranscriptionConfig::from_env(),
        })
    }
}

fn parse_store_backend(value: &str) -> Result<StoreBackend, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sqlite" | "libsql" => {
            let path = std::env::var("CANVAS_DB_PATH")
                .unwrap_or_else(|_| "./data/canvas-assist.db".to_string());
            Ok(StoreBackend::Sqlite { path: path.into() })
        }
        "file" | "json" => {
            let path = std::env::var("CANVAS_STORE_FILE")
                .unwrap_or_else(|_| "./data/assistants.json".to_string());
            Ok(StoreBackend::File { path: path.into() })
        }
        "memory" => Ok(StoreBackend::Memory),
        other => Err(ConfigError::InvalidValue {
            key: "CANVAS_STORE".into(),
            message: format!("unknown backend '{other}' (expected sqlite, file or memory)"),
        }),
    }
}

/// Speech-to-text upstream configuration.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Bearer key. Requests fail with `MissingApiKey` when absent.
    pub api_key: Option<SecretString>,
    /// Base URL of an OpenAI-compatible API (no trailing slash).
    pub base_url: String,
    pub model: String,
    pub language: String,
    pub temperature: f32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_TRANSCRIPTION_URL.to_string(),
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            language: "en".to_string(),
            temperature: 0.0,
        }
    }
}

impl TranscriptionConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let base_url = std::env::var("CANVAS_TRANSCRIPTION_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_TRANSCRIPTION_URL.to_string());

        let model = std::env::var("CANVAS_TRANSCRIPTION_MODEL")
            .unwrap_or_else(|_| DEFAULT_TRANSCRIPTION_MODEL.to_string());

        Self {
            api_key,
            base_url,
            model,
            ..Self::default()
        }
    }
}
