use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{dto::ws::RoomInbound, state::SharedState};

/// Handle the full lifecycle of one room WebSocket connection.
///
/// Outbound frames are produced by the room coordinator and drained by a
/// writer task; inbound text frames are parsed and forwarded to the coordinator.
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

    let connection_id = Uuid::new_v4();
    let room = state.room(&room_id);
    if let Err(err) = room.connect(connection_id, outbound_tx.clone()).await {
        warn!(%room_id, %connection_id, error = %err, "room coordinator unreachable");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(%room_id, %connection_id, "room socket opened");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match RoomInbound::from_json_str(&text) {
                Ok(inbound) => {
                    if let Err(err) = room.inbound(connection_id, inbound).await {
                        warn!(%room_id, %connection_id, error = %err, "room coordinator unreachable");
                        break;
                    }
                }
                Err(err) => {
                    debug!(%room_id, %connection_id, error = %err, "dropping malformed room message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(%room_id, %connection_id, "room socket closed by client");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%room_id, %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Err(err) = room.disconnect(connection_id).await {
        warn!(%room_id, %connection_id, error = %err, "failed to report socket close");
    }
    info!(%room_id, %connection_id, "room socket closed");

    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
///
/// The coordinator drops its sender clone when it processes the disconnect.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
