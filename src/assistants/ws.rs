//! WebSocket feed of assistant state for UI clients.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::manager::AssistantManager;
use super::model::AssistantEvent;

/// Build the Axum router for `/ws/assistants`.
pub fn assistant_ws_routes(manager: Arc<AssistantManager>) -> Router {
    Router::new()
        .route("/ws/assistants", get(ws_handler))
        .with_state(manager)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(manager): State<Arc<AssistantManager>>,
) -> impl IntoResponse {
    info!("Assistant WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, manager))
}

async fn send_event(socket: &mut WebSocket, event: &AssistantEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize assistant event");
            true
        }
    }
}

async fn send_sync(socket: &mut WebSocket, manager: &AssistantManager) -> bool {
    let sync = AssistantEvent::AssistantsSync {
        snapshot: manager.snapshot().await,
    };
    send_event(socket, &sync).await
}

/// Next event to forward. A lagged receiver gets a fresh full sync in place of
/// the events it missed; `None` once the channel is closed.
async fn next_outgoing(
    rx: &mut broadcast::Receiver<AssistantEvent>,
    manager: &AssistantManager,
) -> Option<AssistantEvent> {
    match rx.recv().await {
        Ok(event) => Some(event),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            warn!(missed = n, "Assistant WS client lagged behind broadcast");
            Some(AssistantEvent::AssistantsSync {
                snapshot: manager.snapshot().await,
            })
        }
        Err(broadcast::error::RecvError::Closed) => {
            debug!("Assistant broadcast channel closed");
            None
        }
    }
}

async fn handle_socket(mut socket: WebSocket, manager: Arc<AssistantManager>) {
    // Subscribe before the initial sync so no event falls in between.
    let mut rx = manager.subscribe();

    if !send_sync(&mut socket, &manager).await {
        warn!("Failed to send initial assistant sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            outgoing = next_outgoing(&mut rx, &manager) => {
                let Some(event) = outgoing else { break };
                if !send_event(&mut socket, &event).await {
                    debug!("Assistant WS client disconnected during send");
                    break;
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Assistant WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Assistant WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Assistant WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistants::MemoryAssistantStore;

    #[tokio::test]
    async fn lagged_receiver_gets_full_sync() {
        let manager = AssistantManager::new(Arc::new(MemoryAssistantStore::new()));
        let id = manager.get_or_create_assistant().await.unwrap().assistant_id;
        let mut rx = manager.subscribe();

        for _ in 0..300 {
            manager.select_assistant(&id).await.unwrap();
        }

        match next_outgoing(&mut rx, &manager).await {
            Some(AssistantEvent::AssistantsSync { snapshot }) => {
                assert_eq!(snapshot.assistants.len(), 1);
                let selected = snapshot.selected_assistant.unwrap();
                assert_eq!(selected.assistant_id, id);
            }
            other => panic!("expected a sync after lagging, got {other:?}"),
        }
        // Delivery resumes with the events still buffered.
        assert!(matches!(
            next_outgoing(&mut rx, &manager).await,
            Some(AssistantEvent::SelectionChanged { .. })
        ));
    }

    #[tokio::test]
    async fn closed_channel_ends_the_feed() {
        let manager = AssistantManager::new(Arc::new(MemoryAssistantStore::new()));
        let (tx, mut rx) = broadcast::channel::<AssistantEvent>(4);
        drop(tx);
        assert!(next_outgoing(&mut rx, &manager).await.is_none());
    }
}
