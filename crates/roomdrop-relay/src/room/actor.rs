//! One task per room, fed by an unbounded event queue.

use roomdrop_common::ClientId;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::coordinator::Room;
use super::link::Link;
use super::registry::ConnHandle;

enum RoomEvent {
    Join {
        client_id: ClientId,
        link: Link,
        reply: oneshot::Sender<ConnHandle>,
    },
    Message {
        handle: ConnHandle,
        text: String,
    },
    Leave {
        handle: ConnHandle,
    },
}

/// Cheap handle for submitting events to a room actor. The actor stops
/// once every handle is dropped.
#[derive(Clone)]
pub struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomHandle {
    /// Admit a socket. `None` if the actor is gone.
    pub async fn join(&self, client_id: ClientId, link: Link) -> Option<ConnHandle> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomEvent::Join {
                client_id,
                link,
                reply,
            })
            .ok()?;
        rx.await.ok()
    }

    /// Queue a text frame. Returns false if the actor is gone.
    pub fn message(&self, handle: ConnHandle, text: String) -> bool {
        self.tx.send(RoomEvent::Message { handle, text }).is_ok()
    }

    pub fn leave(&self, handle: ConnHandle) {
        let _ = self.tx.send(RoomEvent::Leave { handle });
    }
}

/// Start the actor for `room`.
pub fn spawn(room: Room) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(room, rx));
    RoomHandle { tx }
}

async fn run(mut room: Room, mut events: mpsc::UnboundedReceiver<RoomEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::Join {
                client_id,
                link,
                reply,
            } => {
                let handle = room.join(client_id, link);
                if reply.send(handle).is_err() {
                    // Socket task gave up before admission completed.
                    room.leave(handle);
                }
            }
            RoomEvent::Message { handle, text } => room.message(handle, &text),
            RoomEvent::Leave { handle } => room.leave(handle),
        }
    }
    debug!(room = %room.id(), "Room actor stopped");
}
