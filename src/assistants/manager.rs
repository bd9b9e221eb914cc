//! AssistantManager owns the in-memory assistant list and the selection,
//! mirroring every mutation to the `AssistantStore`.
//!
//! The in-memory list is canonical once loaded; the store is a durability
//! mirror. Memory is only touched after the store write succeeded, so a failed
//! operation leaves both sides as they were.
//!
//! Mutations are serialized through a single writer lock. Each one reads the
//! whole slot, changes it and writes it back, so without the lock two
//! concurrent calls would lose one of the writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, error, info, warn};

use super::model::{
    Assistant, AssistantEvent, AssistantSnapshot, CreateAssistantFields, new_assistant_id,
    now_timestamp,
};
use super::store::AssistantStore;
use crate::error::AssistantError;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Advisory in-flight flag. Counts callers so overlapping calls of the same
/// class keep the flag raised until the last one finishes.
#[derive(Debug, Default)]
struct BusyFlag(AtomicUsize);

impl BusyFlag {
    fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }

    fn enter(&self) -> BusyGuard<'_> {
        self.0.fetch_add(1, Ordering::SeqCst);
        BusyGuard(self)
    }
}

/// Lowers the flag on drop, including when the future is cancelled.
struct BusyGuard<'a>(&'a BusyFlag);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct BusyFlags {
    loading_all: BusyFlag,
    deleting: BusyFlag,
    creating: BusyFlag,
    editing: BusyFlag,
}

#[derive(Debug, Default)]
struct SessionState {
    assistants: Vec<Assistant>,
    /// Resolved against `assistants` on read, so edits show up immediately.
    selected: Option<String>,
}

impl SessionState {
    fn selected_assistant(&self) -> Option<Assistant> {
        let id = self.selected.as_deref()?;
        self.assistants
            .iter()
            .find(|a| a.assistant_id == id)
            .cloned()
    }
}

/// Clear `is_default` on every record except `keep_id`. Returns the records
/// that were demoted.
fn demote_others(assistants: &mut [Assistant], keep_id: &str) -> Vec<Assistant> {
    let mut demoted = Vec::new();
    for assistant in assistants.iter_mut() {
        if assistant.assistant_id != keep_id && assistant.metadata.is_default {
            assistant.metadata.is_default = false;
            demoted.push(assistant.clone());
        }
    }
    demoted
}

/// Replace the record with the same id. Returns whether one matched.
fn replace_by_id(assistants: &mut [Assistant], updated: &Assistant) -> bool {
    match assistants
        .iter_mut()
        .find(|a| a.assistant_id == updated.assistant_id)
    {
        Some(slot) => {
            *slot = updated.clone();
            true
        }
        None => false,
    }
}

/// Session-scoped assistant service.
///
/// Construct one per session, call [`get_or_create_assistant`] to bootstrap
/// and [`end_session`] on teardown.
///
/// [`get_or_create_assistant`]: AssistantManager::get_or_create_assistant
/// [`end_session`]: AssistantManager::end_session
pub struct AssistantManager {
    store: Arc<dyn AssistantStore>,
    state: RwLock<SessionState>,
    write_lock: Mutex<()>,
    busy: BusyFlags,
    tx: broadcast::Sender<AssistantEvent>,
}

impl AssistantManager {
    pub fn new(store: Arc<dyn AssistantStore>) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            store,
            state: RwLock::new(SessionState::default()),
            write_lock: Mutex::new(()),
            busy: BusyFlags::default(),
            tx,
        })
    }

    /// Subscribe to manager events. Each WS client calls this.
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.tx.subscribe()
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub async fn assistants(&self) -> Vec<Assistant> {
        self.state.read().await.assistants.clone()
    }

    pub async fn selected_assistant(&self) -> Option<Assistant> {
        self.state.read().await.selected_assistant()
    }

    pub fn is_loading_all_assistants(&self) -> bool {
        self.busy.loading_all.is_set()
    }

    pub fn is_deleting_assistant(&self) -> bool {
        self.busy.deleting.is_set()
    }

    pub fn is_creating_assistant(&self) -> bool {
        self.busy.creating.is_set()
    }

    pub fn is_editing_assistant(&self) -> bool {
        self.busy.editing.is_set()
    }

    pub async fn snapshot(&self) -> AssistantSnapshot {
        let state = self.state.read().await;
        AssistantSnapshot {
            assistants: state.assistants.clone(),
            selected_assistant: state.selected_assistant(),
            is_loading_all_assistants: self.is_loading_all_assistants(),
            is_deleting_assistant: self.is_deleting_assistant(),
            is_creating_assistant: self.is_creating_assistant(),
            is_editing_assistant: self.is_editing_assistant(),
        }
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    /// Make sure an assistant is selected, creating or promoting a default
    /// assistant when needed. A no-op once something is selected.
    pub async fn get_or_create_assistant(&self) -> Result<Assistant, AssistantError> {
        if let Some(selected) = self.selected_assistant().await {
            return Ok(selected);
        }

        let _busy = self.busy.loading_all.enter();
        let _write = self.write_lock.lock().await;

        // Another bootstrap may have finished while we waited for the lock.
        if let Some(selected) = self.selected_assistant().await {
            return Ok(selected);
        }

        let result = self.bootstrap_locked().await;
        if let Err(e) = &result {
            self.report_failure("Failed to load assistants", e);
        }
        result
    }

    async fn bootstrap_locked(&self) -> Result<Assistant, AssistantError> {
        let mut stored = self.store.load().await?;

        if stored.is_empty() {
            info!("No assistants found, creating the default assistant");
            let _busy = self.busy.creating.enter();
            return self
                .create_locked(CreateAssistantFields::default_assistant())
                .await;
        }

        self.state.write().await.assistants = stored.clone();
        let _ = self.tx.send(AssistantEvent::AssistantsSync {
            snapshot: self.snapshot().await,
        });

        if let Some(first) = stored.iter().position(Assistant::is_default) {
            let keep_id = stored[first].assistant_id.clone();
            let demoted = demote_others(&mut stored, &keep_id);
            if !demoted.is_empty() {
                warn!(
                    count = demoted.len() + 1,
                    kept = %keep_id,
                    "Multiple default assistants found, keeping the first"
                );
                self.store.save(&stored).await?;
                self.state.write().await.assistants = stored.clone();
                for assistant in demoted {
                    let _ = self.tx.send(AssistantEvent::AssistantUpdated { assistant });
                }
            }

            let chosen = stored[first].clone();
            debug!(assistant_id = %chosen.assistant_id, "Selecting default assistant");
            self.set_selected(Some(chosen.assistant_id.clone())).await;
            return Ok(chosen);
        }

        // No default: promote the oldest record. Timestamps compare as strings;
        // min_by keeps the first of equal keys, so ties go to insertion order.
        let Some(earliest) = stored
            .iter()
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned()
        else {
            return Err(AssistantError::NotFound {
                id: "default".to_string(),
            });
        };
        info!(
            assistant_id = %earliest.assistant_id,
            name = %earliest.name,
            "No default assistant found, promoting the oldest"
        );

        let promoted = {
            let _busy = self.busy.editing.enter();
            self.edit_locked(earliest.promotion_fields(), &earliest.assistant_id)
                .await?
        };
        self.set_selected(Some(promoted.assistant_id.clone())).await;
        Ok(promoted)
    }

    // ── Create ──────────────────────────────────────────────────────

    /// Create an assistant and select it.
    pub async fn create_custom_assistant(
        &self,
        fields: CreateAssistantFields,
    ) -> Result<Assistant, AssistantError> {
        let _busy = self.busy.creating.enter();
        let _write = self.write_lock.lock().await;

        let result = self.create_locked(fields).await;
        if let Err(e) = &result {
            self.report_failure("Failed to create assistant", e);
        }
        result
    }

    /// Like [`create_custom_assistant`](Self::create_custom_assistant), then
    /// call `on_success` with the new id.
    pub async fn create_custom_assistant_with<F>(
        &self,
        fields: CreateAssistantFields,
        on_success: F,
    ) -> Result<Assistant, AssistantError>
    where
        F: FnOnce(&str) + Send,
    {
        let created = self.create_custom_assistant(fields).await?;
        on_success(&created.assistant_id);
        Ok(created)
    }

    async fn create_locked(
        &self,
        fields: CreateAssistantFields,
    ) -> Result<Assistant, AssistantError> {
        fields.validate().map_err(AssistantError::InvalidFields)?;

        let now = now_timestamp();
        let assistant = Assistant::from_fields(new_assistant_id(), fields, now.clone(), now);
        let id = assistant.assistant_id.clone();

        let mut stored = self.store.load().await?;
        if assistant.is_default() {
            demote_others(&mut stored, &id);
        }
        stored.push(assistant.clone());
        self.store.save(&stored).await?;

        let demoted = {
            let mut state = self.state.write().await;
            let demoted = if assistant.is_default() {
                demote_others(&mut state.assistants, &id)
            } else {
                Vec::new()
            };
            state.assistants.push(assistant.clone());
            state.selected = Some(id.clone());
            demoted
        };

        info!(assistant_id = %id, name = %assistant.name, "Assistant created");

        for demoted in demoted {
            let _ = self.tx.send(AssistantEvent::AssistantUpdated { assistant: demoted });
        }
        let _ = self.tx.send(AssistantEvent::AssistantCreated {
            assistant: assistant.clone(),
        });
        let _ = self.tx.send(AssistantEvent::SelectionChanged {
            assistant_id: Some(id),
        });

        Ok(assistant)
    }

    // ── Edit ────────────────────────────────────────────────────────

    /// Replace every mutable field of an assistant. Omitted optional fields
    /// end up absent.
    ///
    /// An unknown id is not an error: the store is rewritten unchanged and the
    /// rebuilt record is returned.
    pub async fn edit_custom_assistant(
        &self,
        fields: CreateAssistantFields,
        assistant_id: &str,
    ) -> Result<Assistant, AssistantError> {
        let _busy = self.busy.editing.enter();
        let _write = self.write_lock.lock().await;

        let result = self.edit_locked(fields, assistant_id).await;
        if let Err(e) = &result {
            self.report_failure("Failed to edit assistant", e);
        }
        result
    }

    async fn edit_locked(
        &self,
        fields: CreateAssistantFields,
        assistant_id: &str,
    ) -> Result<Assistant, AssistantError> {
        fields.validate().map_err(AssistantError::InvalidFields)?;

        let now = now_timestamp();
        let mut stored = self.store.load().await?;
        let created_at = stored
            .iter()
            .find(|a| a.assistant_id == assistant_id)
            .map(|a| a.created_at.clone())
            .unwrap_or_else(|| now.clone());
        let updated = Assistant::from_fields(assistant_id, fields, created_at, now);

        let found = replace_by_id(&mut stored, &updated);
        if !found {
            warn!(assistant_id, "Edit target not found, store left unchanged");
        } else if updated.is_default() {
            demote_others(&mut stored, assistant_id);
        }
        self.store.save(&stored).await?;

        let (in_memory, demoted) = {
            let mut state = self.state.write().await;
            let in_memory = replace_by_id(&mut state.assistants, &updated);
            let demoted = if in_memory && updated.is_default() {
                demote_others(&mut state.assistants, assistant_id)
            } else {
                Vec::new()
            };
            (in_memory, demoted)
        };

        if in_memory {
            info!(assistant_id, name = %updated.name, "Assistant edited");
            for demoted in demoted {
                let _ = self.tx.send(AssistantEvent::AssistantUpdated { assistant: demoted });
            }
            let _ = self.tx.send(AssistantEvent::AssistantUpdated {
                assistant: updated.clone(),
            });
        }

        Ok(updated)
    }

    // ── Delete ──────────────────────────────────────────────────────

    /// Delete an assistant. Returns whether a record was removed.
    ///
    /// Deleting the selected assistant selects the remaining default, else the
    /// first remaining assistant, else nothing.
    pub async fn delete_assistant(&self, assistant_id: &str) -> Result<bool, AssistantError> {
        let _busy = self.busy.deleting.enter();
        let _write = self.write_lock.lock().await;

        let result = self.delete_locked(assistant_id).await;
        if let Err(e) = &result {
            self.report_failure("Failed to delete assistant", e);
        }
        result
    }

    async fn delete_locked(&self, assistant_id: &str) -> Result<bool, AssistantError> {
        let mut stored = self.store.load().await?;
        let before = stored.len();
        stored.retain(|a| a.assistant_id != assistant_id);
        let removed_from_store = stored.len() != before;
        self.store.save(&stored).await?;

        let (removed_from_memory, reselected) = {
            let mut state = self.state.write().await;
            let before = state.assistants.len();
            state.assistants.retain(|a| a.assistant_id != assistant_id);
            let removed = state.assistants.len() != before;

            let reselected = if state.selected.as_deref() == Some(assistant_id) {
                let next = state
                    .assistants
                    .iter()
                    .find(|a| a.is_default())
                    .or_else(|| state.assistants.first())
                    .map(|a| a.assistant_id.clone());
                state.selected = next.clone();
                Some(next)
            } else {
                None
            };
            (removed, reselected)
        };

        let removed = removed_from_store || removed_from_memory;
        if removed {
            info!(assistant_id, "Assistant deleted");
            let _ = self.tx.send(AssistantEvent::AssistantDeleted {
                assistant_id: assistant_id.to_string(),
            });
        } else {
            debug!(assistant_id, "Delete target not found");
        }

        if let Some(next) = reselected {
            debug!(next = ?next, "Deleted assistant was selected, reselecting");
            let _ = self
                .tx
                .send(AssistantEvent::SelectionChanged { assistant_id: next });
        }

        Ok(removed)
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Select an assistant already held in memory.
    pub async fn select_assistant(&self, assistant_id: &str) -> Result<Assistant, AssistantError> {
        let selected = {
            let mut state = self.state.write().await;
            let Some(found) = state
                .assistants
                .iter()
                .find(|a| a.assistant_id == assistant_id)
                .cloned()
            else {
                return Err(AssistantError::NotFound {
                    id: assistant_id.to_string(),
                });
            };
            state.selected = Some(found.assistant_id.clone());
            found
        };

        let _ = self.tx.send(AssistantEvent::SelectionChanged {
            assistant_id: Some(selected.assistant_id.clone()),
        });
        Ok(selected)
    }

    async fn set_selected(&self, assistant_id: Option<String>) {
        self.state.write().await.selected = assistant_id.clone();
        let _ = self.tx.send(AssistantEvent::SelectionChanged { assistant_id });
    }

    // ── Teardown ────────────────────────────────────────────────────

    /// Drop the in-memory list and the selection. The store is untouched, so
    /// the next bootstrap starts from what was persisted.
    pub async fn end_session(&self) {
        let _write = self.write_lock.lock().await;
        let mut state = self.state.write().await;
        let count = state.assistants.len();
        *state = SessionState::default();
        info!(count, "Assistant session ended");
    }

    /// Log a failed operation and publish a notice for the UI.
    fn report_failure(&self, title: &str, error: &AssistantError) {
        error!(error = %error, "{title}");
        let description = match error {
            AssistantError::InvalidFields(reason) => reason.clone(),
            _ => "Please try again later.".to_string(),
        };
        let _ = self.tx.send(AssistantEvent::Notice {
            title: title.to_string(),
            description,
        });
    }
}
