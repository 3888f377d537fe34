use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use shared::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    // Channel for events destined for this client
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(32);
    state.rooms.register(connection_id, tx);

    // Task to forward events from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming events
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::JoinClassroom { code }) => {
                    state.rooms.join(connection_id, &code);
                }
                Ok(ClientEvent::SendMessage {
                    classroom_id,
                    author,
                    content,
                }) => {
                    handle_send_message(&state, connection_id, classroom_id, author, content)
                        .await;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse chat event: {}", e);
                }
            }
        }
    }

    // Cleanup
    state.rooms.unregister(&connection_id);
    send_task.abort();
}

/// Persist the message, then fan the stored record out to the room. The two
/// steps are not atomic: if the broadcast never happens the message is
/// still recoverable from the log endpoint. A persistence failure drops the
/// event and only the sender is told.
async fn handle_send_message(
    state: &AppState,
    connection_id: Uuid,
    classroom_id: String,
    author: String,
    content: String,
) {
    let message = crate::db::Message {
        id: Uuid::new_v4().to_string(),
        classroom_id: classroom_id.clone(),
        author,
        content,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    match state.db.insert_message(&message).await {
        Ok(()) => {
            let delivered = state
                .rooms
                .broadcast(
                    &classroom_id,
                    ServerEvent::NewMessage {
                        message: message.into(),
                    },
                )
                .await;
            tracing::debug!(
                "Message in {} delivered to {} connection(s)",
                classroom_id,
                delivered
            );
        }
        Err(e) => {
            tracing::error!("Failed to persist chat message: {}", e);
            state
                .rooms
                .send_to(&connection_id, ServerEvent::error("Failed to save message"))
                .await;
        }
    }
}
