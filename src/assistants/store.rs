//! Assistant repository. The whole list lives in one named slot.
//!
//! Every backend reads and writes the complete list; there are no row-level
//! updates. An absent slot is an empty list, and so is one that is not a JSON
//! array (logged at `warn`). Inside an array, entries are decoded one by one
//! and only the undecodable ones are skipped.

// TODO: keep undecodable entries as raw JSON so the next save writes them back
// instead of dropping them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::model::{Assistant, DEFAULT_USER_ID};
use crate::error::DatabaseError;
use crate::store::Database;

/// Name of the slot holding the assistant list.
pub const ASSISTANTS_SLOT: &str = "assistants";

/// Load/save interface over the persisted assistant list.
#[async_trait]
pub trait AssistantStore: Send + Sync {
    /// Read the full list, in insertion order.
    async fn load(&self) -> Result<Vec<Assistant>, DatabaseError>;

    /// Replace the full list.
    async fn save(&self, assistants: &[Assistant]) -> Result<(), DatabaseError>;
}

/// Decode a slot value. `null` and non-arrays are empty; bad entries are
/// skipped so one odd record never hides the rest.
fn decode_slot(slot: &str, value: serde_json::Value) -> Vec<Assistant> {
    let entries = match value {
        serde_json::Value::Null => return Vec::new(),
        serde_json::Value::Array(entries) => entries,
        other => {
            warn!(slot, kind = json_kind(&other), "Assistant slot is not a list, treating as empty");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let id = entry
                .get("assistant_id")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            match serde_json::from_value::<Assistant>(entry) {
                Ok(assistant) => Some(assistant),
                Err(e) => {
                    warn!(slot, index, assistant_id = ?id, error = %e, "Skipping undecodable assistant");
                    None
                }
            }
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn encode_slot(assistants: &[Assistant]) -> Result<serde_json::Value, DatabaseError> {
    serde_json::to_value(assistants).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

// ── Database ────────────────────────────────────────────────────────

/// Slot stored as a database row owned by the anonymous user.
pub struct DatabaseAssistantStore {
    db: Arc<dyn Database>,
    owner: String,
}

impl DatabaseAssistantStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            owner: DEFAULT_USER_ID.to_string(),
        }
    }
}

#[async_trait]
impl AssistantStore for DatabaseAssistantStore {
    async fn load(&self) -> Result<Vec<Assistant>, DatabaseError> {
        match self.db.read_slot(&self.owner, ASSISTANTS_SLOT).await? {
            Some(slot) => {
                let assistants = decode_slot(ASSISTANTS_SLOT, slot.value);
                debug!(
                    revision = slot.revision,
                    updated_at = %slot.updated_at,
                    count = assistants.len(),
                    "Assistant slot loaded"
                );
                Ok(assistants)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, assistants: &[Assistant]) -> Result<(), DatabaseError> {
        let value = encode_slot(assistants)?;
        let revision = self.db.write_slot(&self.owner, ASSISTANTS_SLOT, &value).await?;
        debug!(count = assistants.len(), revision, "Assistant slot saved");
        Ok(())
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// Slot stored as a JSON file, replaced atomically on save.
pub struct FileAssistantStore {
    path: PathBuf,
}

impl FileAssistantStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ASSISTANTS_SLOT.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl AssistantStore for FileAssistantStore {
    async fn load(&self) -> Result<Vec<Assistant>, DatabaseError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value = serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Assistant file is not valid JSON");
            serde_json::Value::Null
        });
        Ok(decode_slot(ASSISTANTS_SLOT, value))
    }

    async fn save(&self, assistants: &[Assistant]) -> Result<(), DatabaseError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(assistants)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let tmp = self.temp_path();
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = assistants.len(), "Assistant file saved");
        Ok(())
    }
}

// ── In-memory ───────────────────────────────────────────────────────

/// Slot kept in process memory as a JSON document.
#[derive(Default)]
pub struct MemoryAssistantStore {
    slot: RwLock<Option<serde_json::Value>>,
}

impl MemoryAssistantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a raw slot value, as if another writer had left it there.
    pub fn with_raw(value: serde_json::Value) -> Self {
        Self {
            slot: RwLock::new(Some(value)),
        }
    }
}

#[async_trait]
impl AssistantStore for MemoryAssistantStore {
    async fn load(&self) -> Result<Vec<Assistant>, DatabaseError> {
        let slot = self.slot.read().await;
        Ok(slot
            .clone()
            .map(|value| decode_slot(ASSISTANTS_SLOT, value))
            .unwrap_or_default())
    }

    async fn save(&self, assistants: &[Assistant]) -> Result<(), DatabaseError> {
        let value = encode_slot(assistants)?;
        *self.slot.write().await = Some(value);
        Ok(())
    }
}
