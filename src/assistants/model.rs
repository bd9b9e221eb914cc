//! Assistant records and the fields used to build them.
//!
//! The JSON layout matches what the browser client has always persisted, so
//! a slot exported from local storage can be loaded as-is.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Owner of every record. There is no multi-user support.
pub const DEFAULT_USER_ID: &str = "anonymous";
pub const DEFAULT_ASSISTANT_NAME: &str = "Default assistant";
pub const DEFAULT_ASSISTANT_DESCRIPTION: &str = "Your default assistant.";
/// Lucide icon name.
pub const DEFAULT_ICON_NAME: &str = "User";
pub const DEFAULT_ICON_COLOR: &str = "#000000";

/// A tool the assistant may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantTool {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// A document included in the model's context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub name: String,
    /// MIME type of `data`.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Text content, or base64 for binary documents.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconData {
    pub icon_name: String,
    /// Hex color code.
    pub icon_color: String,
}

impl Default for IconData {
    fn default() -> Self {
        Self {
            icon_name: DEFAULT_ICON_NAME.to_string(),
            icon_color: DEFAULT_ICON_COLOR.to_string(),
        }
    }
}

/// Free-form metadata. Known keys are typed; anything else is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMetadata {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "iconData", default, skip_serializing_if = "Option::is_none")]
    pub icon_data: Option<IconData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

impl Default for AssistantMetadata {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            is_default: false,
            description: None,
            icon_data: None,
            extra: Map::new(),
        }
    }
}

impl AssistantMetadata {
    /// Icon for this assistant, also accepting flat `iconName`/`iconColor`
    /// keys written by older clients.
    pub fn icon(&self) -> Option<IconData> {
        if let Some(icon) = &self.icon_data {
            return Some(icon.clone());
        }
        let name = self.extra.get("iconName").and_then(Value::as_str)?;
        let color = self
            .extra
            .get("iconColor")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ICON_COLOR);
        Some(IconData {
            icon_name: name.to_string(),
            icon_color: color.to_string(),
        })
    }
}

/// Values handed to the graph on every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configurable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AssistantTool>>,
    /// Prefixed to every generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<ContextDocument>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub configurable: Configurable,
}

/// A named, persisted configuration bundle for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub assistant_id: String,
    pub name: String,
    #[serde(default)]
    pub metadata: AssistantMetadata,
    #[serde(default)]
    pub config: AssistantConfig,
    /// ISO-8601, as written by whichever client created the record. Not
    /// validated; records from older clients may lack a zone or the field.
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Assistant {
    /// Build a record from scratch. Nothing from a previous version of the
    /// record survives except what the caller passes in.
    pub fn from_fields(
        assistant_id: impl Into<String>,
        fields: CreateAssistantFields,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        let CreateAssistantFields {
            name,
            description,
            icon_data,
            tools,
            system_prompt,
            is_default,
            documents,
        } = fields;

        Self {
            assistant_id: assistant_id.into(),
            name,
            metadata: AssistantMetadata {
                is_default,
                description,
                icon_data,
                ..AssistantMetadata::default()
            },
            config: AssistantConfig {
                configurable: Configurable {
                    tools,
                    system_prompt,
                    documents,
                },
            },
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.metadata.is_default
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.config.configurable.system_prompt.as_deref()
    }

    pub fn tools(&self) -> Option<&[AssistantTool]> {
        self.config.configurable.tools.as_deref()
    }

    pub fn documents(&self) -> Option<&[ContextDocument]> {
        self.config.configurable.documents.as_deref()
    }

    /// Fields for promoting this record to the default assistant.
    ///
    /// Carries over icon, description, tools, system prompt and documents,
    /// falling back to the stock default values. A record named "untitled"
    /// (any case) is renamed to the default name; the browser client meant to
    /// do this but its comparison never matched, so it always kept the name.
    pub fn promotion_fields(&self) -> CreateAssistantFields {
        let name = if self.name.trim().eq_ignore_ascii_case("untitled") {
            DEFAULT_ASSISTANT_NAME.to_string()
        } else {
            self.name.clone()
        };

        CreateAssistantFields {
            name,
            description: Some(
                self.metadata
                    .description
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| DEFAULT_ASSISTANT_DESCRIPTION.to_string()),
            ),
            icon_data: Some(self.metadata.icon().unwrap_or_default()),
            tools: self.config.configurable.tools.clone(),
            system_prompt: self
                .config
                .configurable
                .system_prompt
                .clone()
                .filter(|p| !p.is_empty()),
            is_default: true,
            documents: self.config.configurable.documents.clone(),
        }
    }
}

/// Current time in the `toISOString()` form the browser client writes,
/// e.g. `2024-11-02T10:15:00.000Z`. Same-format strings sort chronologically.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generate a fresh opaque assistant id.
pub fn new_assistant_id() -> String {
    format!("asst_{}", Uuid::new_v4().simple())
}

/// Input for create and edit. Edit is a full overwrite, so callers must pass
/// forward every field they want to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssistantFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_data: Option<IconData>,
    #[serde(default)]
    pub tools: Option<Vec<AssistantTool>>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(rename = "is_default", default)]
    pub is_default: bool,
    #[serde(default)]
    pub documents: Option<Vec<ContextDocument>>,
}

impl CreateAssistantFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The assistant synthesized when the store is empty.
    pub fn default_assistant() -> Self {
        Self::new(DEFAULT_ASSISTANT_NAME)
            .with_description(DEFAULT_ASSISTANT_DESCRIPTION)
            .with_icon(IconData::default())
            .as_default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: IconData) -> Self {
        self.icon_data = Some(icon);
        self
    }

    pub fn with_tools(mut self, tools: Vec<AssistantTool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_documents(mut self, documents: Vec<ContextDocument>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Check the fields can be turned into a record.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Read model of the manager, as served to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSnapshot {
    pub assistants: Vec<Assistant>,
    pub selected_assistant: Option<Assistant>,
    pub is_loading_all_assistants: bool,
    pub is_deleting_assistant: bool,
    pub is_creating_assistant: bool,
    pub is_editing_assistant: bool,
}

/// Events published by the manager (server → client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// Full state (sent on connect and after a lag).
    AssistantsSync { snapshot: AssistantSnapshot },
    AssistantCreated { assistant: Assistant },
    AssistantUpdated { assistant: Assistant },
    AssistantDeleted { assistant_id: String },
    SelectionChanged { assistant_id: Option<String> },
    /// Transient user-facing notification for a failed operation.
    Notice { title: String, description: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> String {
        Utc.timestamp_opt(secs, 0)
            .unwrap()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[test]
    fn parses_browser_layout() {
        let raw = r##"{
            "assistant_id": "asst_k3j2h1",
            "name": "Writer",
            "metadata": {
                "user_id": "anonymous",
                "is_default": true,
                "description": "Drafts blog posts",
                "iconData": {"iconName": "Pen", "iconColor": "#ff0000"},
                "pinned": 1
            },
            "config": {
                "configurable": {
                    "systemPrompt": "Be concise.",
                    "tools": [{"name": "search", "description": "Web search",
                               "parameters": {"type": "object"}}]
                }
            },
            "created_at": "2024-11-02T10:15:00.000Z",
            "updated_at": "2024-11-02T10:15:00.000Z"
        }"##;

        let assistant: Assistant = serde_json::from_str(raw).unwrap();
        assert!(assistant.is_default());
        assert_eq!(assistant.system_prompt(), Some("Be concise."));
        assert_eq!(assistant.tools().unwrap()[0].name, "search");
        assert!(assistant.documents().is_none());
        assert_eq!(assistant.metadata.icon().unwrap().icon_name, "Pen");
        assert_eq!(assistant.metadata.extra["pinned"], 1);

        let back = serde_json::to_value(&assistant).unwrap();
        assert_eq!(back["metadata"]["iconData"]["iconColor"], "#ff0000");
        assert_eq!(back["metadata"]["pinned"], 1);
        assert_eq!(back["config"]["configurable"]["systemPrompt"], "Be concise.");
        assert!(back["config"]["configurable"].get("documents").is_none());
    }

    #[test]
    fn timestamps_are_kept_verbatim() {
        let assistant: Assistant = serde_json::from_value(serde_json::json!({
            "assistant_id": "asst_old",
            "name": "Legacy",
            "created_at": "2024-11-03T10:15:00"
        }))
        .unwrap();
        assert_eq!(assistant.created_at, "2024-11-03T10:15:00");
        assert_eq!(assistant.updated_at, "");

        let back = serde_json::to_value(&assistant).unwrap();
        assert_eq!(back["created_at"], "2024-11-03T10:15:00");
    }

    #[test]
    fn now_timestamp_matches_browser_format() {
        let now = now_timestamp();
        assert_eq!(now.len(), "2024-11-02T10:15:00.000Z".len());
        assert!(now.ends_with('Z'));
        assert!(ts(100) < ts(200));
    }

    #[test]
    fn from_fields_is_a_full_rebuild() {
        let fields = CreateAssistantFields::new("Reviewer").with_system_prompt("Review code.");
        let assistant = Assistant::from_fields("asst_1", fields, ts(10), ts(20));

        assert_eq!(assistant.assistant_id, "asst_1");
        assert_eq!(assistant.metadata.user_id, DEFAULT_USER_ID);
        assert!(!assistant.is_default());
        assert!(assistant.tools().is_none());
        assert!(assistant.metadata.extra.is_empty());
        assert_eq!(assistant.created_at, ts(10));
        assert_eq!(assistant.updated_at, ts(20));
    }

    #[test]
    fn icon_falls_back_to_flat_keys() {
        let mut metadata = AssistantMetadata::default();
        assert!(metadata.icon().is_none());

        metadata.extra.insert("iconName".into(), "Bot".into());
        let icon = metadata.icon().unwrap();
        assert_eq!(icon.icon_name, "Bot");
        assert_eq!(icon.icon_color, DEFAULT_ICON_COLOR);
    }

    #[test]
    fn promotion_fields_carry_over_configuration() {
        let doc = ContextDocument {
            name: "notes.txt".into(),
            doc_type: "text/plain".into(),
            data: "hello".into(),
            metadata: None,
        };
        let fields = CreateAssistantFields::new("Untitled")
            .with_system_prompt("Stay on topic.")
            .with_documents(vec![doc.clone()]);
        let assistant = Assistant::from_fields("asst_2", fields, ts(1), ts(1));

        let promoted = assistant.promotion_fields();
        assert!(promoted.is_default);
        assert_eq!(promoted.name, DEFAULT_ASSISTANT_NAME);
        assert_eq!(promoted.description.as_deref(), Some(DEFAULT_ASSISTANT_DESCRIPTION));
        assert_eq!(promoted.icon_data, Some(IconData::default()));
        assert_eq!(promoted.system_prompt.as_deref(), Some("Stay on topic."));
        assert_eq!(promoted.documents, Some(vec![doc]));
    }

    #[test]
    fn promotion_keeps_custom_name() {
        let assistant =
            Assistant::from_fields("asst_3", CreateAssistantFields::new("Poet"), ts(1), ts(1));
        assert_eq!(assistant.promotion_fields().name, "Poet");
    }

    #[test]
    fn validate_rejects_blank_name() {
        assert!(CreateAssistantFields::new("   ").validate().is_err());
        assert!(CreateAssistantFields::new("Ok").validate().is_ok());
    }

    #[test]
    fn fields_accept_client_json() {
        let fields: CreateAssistantFields = serde_json::from_value(serde_json::json!({
            "name": "Coder",
            "iconData": {"iconName": "Code", "iconColor": "#00ff00"},
            "systemPrompt": "Write Rust.",
            "is_default": true
        }))
        .unwrap();
        assert!(fields.is_default);
        assert_eq!(fields.system_prompt.as_deref(), Some("Write Rust."));
        assert_eq!(fields.icon_data.unwrap().icon_name, "Code");
    }

    #[test]
    fn ids_are_prefixed_and_unique() {
        let a = new_assistant_id();
        let b = new_assistant_id();
        assert!(a.starts_with("asst_"));
        assert_ne!(a, b);
    }

    #[test]
    fn event_tags_are_snake_case() {
        let event = AssistantEvent::SelectionChanged {
            assistant_id: Some("asst_1".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "selection_changed");
        assert_eq!(json["assistant_id"], "asst_1");
    }
}
