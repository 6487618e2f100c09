//! Real-time relay of UI refresh notifications over WebSocket.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// EventKind
///
/// What changed. Clients refetch the affected listing on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum EventKind {
    NewDocument,
    DocumentDeleted,
    DocumentUpdated,
    NewUser,
    CollectionDeleted,
    CollectionUpdated,
    UserUpdated,
    UserDeleted,
}

/// Event
///
/// Wire form: `{"event": "newDocument", "id": "..."}`. `id` names the affected
/// record when the server publishes; client-relayed events may omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Event {
    pub event: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl Event {
    pub fn new(event: EventKind, id: Uuid) -> Self {
        Self {
            event,
            id: Some(id),
        }
    }
}

/// EventBus
///
/// Process-wide broadcast channel. Publishing never blocks and never fails the
/// caller; with no subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: Event) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "event published"),
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(?event, "event dropped, no subscribers")
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

/// events_handler
///
/// Upgrades to a WebSocket that streams every published event.
#[utoipa::path(
    get,
    path = "/events",
    responses(
        (status = 101, description = "Switching to the event stream"),
    ),
    tag = "Events"
)]
pub async fn events_handler(ws: WebSocketUpgrade, State(bus): State<EventBus>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, bus))
}

async fn relay(mut socket: WebSocket, bus: EventBus) {
    let mut events = bus.subscribe();
    tracing::debug!("event subscriber connected");

    loop {
        tokio::select! {
            update = events.recv() => match update {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Event>(&text) {
                    // Clients announce their own writes; everyone gets told.
                    Ok(event) => bus.publish(event),
                    Err(e) => tracing::debug!(error = %e, "ignoring malformed client event"),
                },
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "event socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("event subscriber disconnected");
}
