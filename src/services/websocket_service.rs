use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::InboundMessage,
    services::room_service::RoomCommand,
    state::SharedState,
};

/// Error returned when a message cannot be queued for a connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// Writer channel closed; the connection is going away.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle of a player WebSocket connection attached to `room_id`.
pub async fn handle_socket(state: SharedState, room_id: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4().to_string();
    let room = state.join_room(&room_id);

    if !room.send(RoomCommand::Connect {
        connection_id: connection_id.clone(),
        outbound: outbound_tx.clone(),
    }) {
        warn!(room_id = %room_id, conn_id = %connection_id, "room stopped before connection attached");
        state.leave_room(&room);
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    info!(room_id = %room_id, conn_id = %connection_id, "player connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match InboundMessage::from_json_str(text.as_str()) {
                Ok(inbound) => {
                    debug!(room_id = %room_id, conn_id = %connection_id, kind = inbound.kind(), "received message");
                    if !room.send(RoomCommand::Inbound {
                        connection_id: connection_id.clone(),
                        message: inbound,
                    }) {
                        warn!(room_id = %room_id, conn_id = %connection_id, "room stopped; closing connection");
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        room_id = %room_id,
                        conn_id = %connection_id,
                        error = %err,
                        "dropping invalid message"
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(room_id = %room_id, conn_id = %connection_id, "player closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room_id = %room_id, conn_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    // Detach before the close is processed so the room sees the final count.
    state.leave_room(&room);
    room.send(RoomCommand::Close {
        connection_id: connection_id.clone(),
    });
    info!(room_id = %room_id, conn_id = %connection_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Serialize a payload into a text frame.
///
/// Serialization failures are permanent (a bug in the payload type): they are logged and
/// `None` is returned so the caller simply skips the send.
pub fn encode_message<T>(value: &T) -> Option<Message>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    match serde_json::to_string(value) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            None
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Returns `Err(SendError::ConnectionClosed)` if the writer channel is closed.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), SendError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let Some(message) = encode_message(value) else {
        return Ok(());
    };

    tx.send(message).map_err(|_| SendError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
