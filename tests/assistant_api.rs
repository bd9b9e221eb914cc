//! Integration tests for the assistant REST + WebSocket surface.
//!
//! Each test spins up an Axum server on a random port and exercises the real
//! HTTP / WS contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use canvas_assist::assistants::{AssistantManager, MemoryAssistantStore};
use canvas_assist::error::TranscriptionError;
use canvas_assist::server::app_router;
use canvas_assist::transcription::{AudioUpload, Transcriber};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Transcriber that is never reached by these tests.
struct UnusedTranscriber;

#[async_trait]
impl Transcriber for UnusedTranscriber {
    async fn transcribe(&self, _audio: AudioUpload) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::Request("not used in assistant tests".into()))
    }
}

/// Start an Axum server on a random port, return (base url, manager).
async fn start_server() -> (String, Arc<AssistantManager>) {
    let manager = AssistantManager::new(Arc::new(MemoryAssistantStore::new()));
    let app = app_router(Arc::clone(&manager), Arc::new(UnusedTranscriber));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("127.0.0.1:{port}"), manager)
}

fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt.as_str()).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── REST ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_then_snapshot() {
    timeout(TEST_TIMEOUT, async {
        let (addr, _manager) = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{addr}/api/assistants/bootstrap"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let default: Value = resp.json().await.unwrap();
        assert_eq!(default["name"], "Default assistant");
        assert_eq!(default["metadata"]["is_default"], true);
        assert_eq!(default["metadata"]["iconData"]["iconName"], "User");

        // Second bootstrap is a no-op.
        let again: Value = client
            .post(format!("http://{addr}/api/assistants/bootstrap"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(again["assistant_id"], default["assistant_id"]);

        let snapshot: Value = client
            .get(format!("http://{addr}/api/assistants"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["assistants"].as_array().unwrap().len(), 1);
        assert_eq!(
            snapshot["selectedAssistant"]["assistant_id"],
            default["assistant_id"]
        );
        assert_eq!(snapshot["isLoadingAllAssistants"], false);
        assert_eq!(snapshot["isCreatingAssistant"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_edit_delete_roundtrip() {
    timeout(TEST_TIMEOUT, async {
        let (addr, manager) = start_server().await;
        let client = reqwest::Client::new();
        let default = manager.get_or_create_assistant().await.unwrap();

        let resp = client
            .post(format!("http://{addr}/api/assistants"))
            .json(&json!({
                "name": "Writer",
                "description": "Drafts posts",
                "systemPrompt": "Write clearly.",
                "tools": [{"name": "search", "description": "Web search",
                           "parameters": {"type": "object"}}]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let created: Value = resp.json().await.unwrap();
        let id = created["assistant_id"].as_str().unwrap().to_string();
        assert_eq!(created["config"]["configurable"]["tools"][0]["name"], "search");

        // Full overwrite: tools and prompt are dropped when not resent.
        let resp = client
            .put(format!("http://{addr}/api/assistants/{id}"))
            .json(&json!({"name": "Writer v2"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let edited: Value = resp.json().await.unwrap();
        assert_eq!(edited["name"], "Writer v2");
        assert!(edited["config"]["configurable"].get("tools").is_none());
        assert!(edited["config"]["configurable"].get("systemPrompt").is_none());
        assert_eq!(edited["created_at"], created["created_at"]);

        let resp = client
            .delete(format!("http://{addr}/api/assistants/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"success": true, "removed": true}));

        let selected = manager.selected_assistant().await.unwrap();
        assert_eq!(selected.assistant_id, default.assistant_id);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blank_name_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (addr, manager) = start_server().await;
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/assistants"))
            .json(&json!({"name": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("name"));
        assert!(manager.assistants().await.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn select_switches_and_unknown_is_404() {
    timeout(TEST_TIMEOUT, async {
        let (addr, manager) = start_server().await;
        let client = reqwest::Client::new();
        let default = manager.get_or_create_assistant().await.unwrap();
        manager
            .create_custom_assistant(canvas_assist::assistants::CreateAssistantFields::new("Other"))
            .await
            .unwrap();

        let resp = client
            .post(format!(
                "http://{addr}/api/assistants/{}/select",
                default.assistant_id
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            manager.selected_assistant().await.unwrap().assistant_id,
            default.assistant_id
        );

        let resp = client
            .post(format!("http://{addr}/api/assistants/asst_missing/select"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn debug_page_marks_selected() {
    timeout(TEST_TIMEOUT, async {
        let (addr, manager) = start_server().await;

        let body = reqwest::get(format!("http://{addr}/debug"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        // The page bootstraps on first view.
        assert!(body.starts_with("Debug Page\n\nAssistants\n"), "{body}");
        assert!(body.contains("- Default assistant (selected)"), "{body}");

        manager
            .create_custom_assistant(canvas_assist::assistants::CreateAssistantFields::new("Poet"))
            .await
            .unwrap();
        let body = reqwest::get(format!("http://{addr}/debug"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("- Default assistant\n"), "{body}");
        assert!(body.contains("- Poet (selected)"), "{body}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let (addr, _manager) = start_server().await;
        let body: Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

// ── WebSocket ────────────────────────────────────────────────────────

#[tokio::test]
async fn ws_connect_receives_sync() {
    timeout(TEST_TIMEOUT, async {
        let (addr, manager) = start_server().await;
        let default = manager.get_or_create_assistant().await.unwrap();

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws/assistants"))
            .await
            .expect("WS connect failed");

        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["type"], "assistants_sync");
        assert_eq!(
            json["snapshot"]["selectedAssistant"]["assistant_id"],
            default.assistant_id.as_str()
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_ping_gets_pong() {
    timeout(TEST_TIMEOUT, async {
        let (addr, _manager) = start_server().await;

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws/assistants"))
            .await
            .unwrap();
        let sync = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(sync["type"], "assistants_sync");

        ws.send(Message::Ping(vec![1, 2, 3].into())).await.unwrap();
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Pong(payload) => {
                    assert_eq!(payload.as_ref(), &[1u8, 2, 3][..]);
                    break;
                }
                Message::Close(frame) => panic!("socket closed before pong: {frame:?}"),
                _ => {}
            }
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_broadcasts_create_and_selection() {
    timeout(TEST_TIMEOUT, async {
        let (addr, manager) = start_server().await;
        manager.get_or_create_assistant().await.unwrap();

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws/assistants"))
            .await
            .unwrap();
        let sync = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(sync["type"], "assistants_sync");

        let created: Value = reqwest::Client::new()
            .post(format!("http://{addr}/api/assistants"))
            .json(&json!({"name": "Live"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let event = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(event["type"], "assistant_created");
        assert_eq!(event["assistant"]["name"], "Live");

        let event = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(event["type"], "selection_changed");
        assert_eq!(event["assistant_id"], created["assistant_id"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_receives_notice_on_failure() {
    timeout(TEST_TIMEOUT, async {
        let (addr, _manager) = start_server().await;

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws/assistants"))
            .await
            .unwrap();
        let _sync = ws.next().await.unwrap().unwrap();

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/assistants"))
            .json(&json!({"name": ""}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let event = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(event["type"], "notice");
        assert_eq!(event["title"], "Failed to create assistant");
    })
    .await
    .expect("test timed out");
}
