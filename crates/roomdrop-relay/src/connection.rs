//! Per-socket task: join the room, pump frames both ways, leave on exit.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use roomdrop_common::{ClientId, RoomId};
use tracing::{debug, info, warn};

use crate::manager::RoomManager;
use crate::room::{CloseReason, Link};

/// Serve one signaling socket until either side closes it.
pub async fn handle_socket(
    socket: WebSocket,
    room_id: RoomId,
    client_id: ClientId,
    manager: RoomManager,
    outbox_capacity: usize,
) {
    let (mut sink, mut stream) = socket.split();
    let (link, mut outbox, mut close) = Link::new(outbox_capacity);

    let (room, membership) = manager.enter(&room_id).await;
    let Some(handle) = room.join(client_id.clone(), link).await else {
        warn!(room = %room_id, cid = %client_id, "Room actor unavailable");
        return;
    };
    info!(room = %room_id, cid = %client_id, conn = %handle, "Client connected");

    let reason = loop {
        tokio::select! {
            changed = close.changed() => {
                if changed.is_err() {
                    break None;
                }
                if let Some(reason) = *close.borrow_and_update() {
                    break Some(reason);
                }
            }

            // Room → this client.
            Some(json) = outbox.recv() => {
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break None;
                }
            }

            // This client → room.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !room.message(handle, text.as_str().to_owned()) {
                            break None;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(room = %room_id, cid = %client_id, len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break None,
                    Some(Err(e)) => {
                        debug!(room = %room_id, cid = %client_id, error = %e, "WS error");
                        break None;
                    }
                    _ => {}
                }
            }
        }
    };

    room.leave(handle);
    drop(membership);

    if let Some(reason) = reason {
        if reason == CloseReason::Replaced {
            // Deliver what the room queued before the replacement.
            while let Ok(json) = outbox.try_recv() {
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
        let (code, text) = reason.frame();
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: text.into(),
            })))
            .await;
        info!(room = %room_id, cid = %client_id, conn = %handle, reason = text, "Client closed by relay");
    } else {
        info!(room = %room_id, cid = %client_id, conn = %handle, "Client disconnected");
    }
}
