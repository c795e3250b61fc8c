use async_trait::async_trait;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use strum::IntoEnumIterator;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::forwarder::ConnectionForwarder;
use super::messages::{
    AckType, ClientMessage, CreateRoomPayload, HistoryPayload, IntentType, RoomPayload,
    SendMessagePayload, ServerMessage,
};
use super::socket::{Connection, MessageHandler};
use crate::coordinator::Coordinator;
use crate::event::{ChatEvent, EventKind, Handle};
use crate::session::Session;
use crate::shared::{AppError, AppState};

#[derive(Debug, Error)]
enum IntentError {
    #[error(transparent)]
    Rejected(#[from] AppError),
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl IntentError {
    fn into_reply(self) -> ServerMessage {
        match self {
            IntentError::Rejected(e) => ServerMessage::error(&e),
            IntentError::Payload(e) => ServerMessage::invalid(&e.to_string()),
        }
    }
}

fn payload<T: DeserializeOwned>(value: Value) -> Result<T, IntentError> {
    Ok(serde_json::from_value(value)?)
}

/// Routes client intents to the coordinator and queues the reply
pub struct WebsocketReceiveHandler {
    coordinator: Arc<Coordinator>,
    outbound: mpsc::UnboundedSender<String>,
}

impl WebsocketReceiveHandler {
    pub fn new(coordinator: Arc<Coordinator>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            coordinator,
            outbound,
        }
    }

    async fn route(
        &self,
        session: &Session,
        message: ClientMessage,
    ) -> Result<ServerMessage, IntentError> {
        let coordinator = &self.coordinator;
        let session_id = &session.id;

        let reply = match message.intent {
            IntentType::JoinRoom => {
                let RoomPayload { room_id } = payload(message.payload)?;
                let outcome = coordinator.join_room(session_id, &room_id).await?;
                ServerMessage::ack(
                    AckType::Joined,
                    json!({ "room": outcome.room, "left": outcome.left }),
                )?
            }
            IntentType::LeaveRoom => {
                let RoomPayload { room_id } = payload(message.payload)?;
                let left = coordinator.leave_room(session_id, &room_id).await?;
                ServerMessage::ack(AckType::Left, json!({ "roomId": room_id, "left": left }))?
            }
            IntentType::SendMessage => {
                let SendMessagePayload { room_id, text } = payload(message.payload)?;
                let sent = coordinator.send_message(session_id, &room_id, &text).await?;
                ServerMessage::ack(AckType::Sent, sent)?
            }
            IntentType::CreateRoom => {
                let CreateRoomPayload { name } = payload(message.payload)?;
                let room = coordinator.create_room(session_id, &name).await?;
                ServerMessage::ack(AckType::Created, room)?
            }
            IntentType::ListRooms => {
                ServerMessage::ack(AckType::RoomList, coordinator.list_rooms().await)?
            }
            IntentType::RoomMembers => {
                let RoomPayload { room_id } = payload(message.payload)?;
                let members = coordinator.members(&room_id).await?;
                ServerMessage::ack(
                    AckType::Members,
                    json!({ "roomId": room_id, "members": members }),
                )?
            }
            IntentType::History => {
                let HistoryPayload {
                    room_id,
                    after,
                    limit,
                } = payload(message.payload)?;
                let messages = coordinator
                    .history(session_id, &room_id, after, limit)
                    .await?;
                ServerMessage::ack(
                    AckType::History,
                    json!({ "roomId": room_id, "messages": messages }),
                )?
            }
        };

        Ok(reply)
    }

    fn reply(&self, session: &Session, reply: ServerMessage) {
        match serde_json::to_string(&reply) {
            Ok(frame) => {
                if self.outbound.send(frame).is_err() {
                    debug!(session_id = %session.id, "Reply dropped, connection gone");
                }
            }
            Err(e) => warn!(session_id = %session.id, error = %e, "Failed to encode reply"),
        }
    }
}

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(&self, session: &Session, message: String) {
        debug!(session_id = %session.id, message = %message, "Received message");

        let reply = match serde_json::from_str::<ClientMessage>(&message) {
            Ok(client_message) => {
                let intent = client_message.intent;
                self.route(session, client_message)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(
                            session_id = %session.id,
                            intent = ?intent,
                            error = %e,
                            "Client intent rejected"
                        );
                        e.into_reply()
                    })
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Failed to parse WebSocket message");
                ServerMessage::invalid(&e.to_string())
            }
        };

        self.reply(session, reply);
    }
}

/// Core-side plumbing of one connected client: its session, its event
/// subscription and the queue its frames are written to.
pub struct ClientLink {
    pub session: Session,
    pub handle: Handle,
    pub receive_handler: Arc<WebsocketReceiveHandler>,
    pub outbound_receiver: mpsc::UnboundedReceiver<String>,
}

impl ClientLink {
    /// Connects a session and subscribes its forwarder to every event kind
    pub async fn open(coordinator: Arc<Coordinator>, display_name: &str) -> Result<Self, AppError> {
        let (outbound, outbound_receiver) = mpsc::unbounded_channel::<String>();
        let session = coordinator.connect(display_name).await?;

        // Connect and the first room list went out before the forwarder existed
        let connected = ServerMessage::event(&ChatEvent::Connect(session.clone()));
        queue(&outbound, connected);

        let forwarder = ConnectionForwarder::new(session.id.clone(), outbound.clone());
        let dispatcher = coordinator.dispatcher();
        let handle = dispatcher.attach(Arc::new(forwarder));
        dispatcher.subscribe_all(EventKind::iter(), &handle).await;

        let rooms = ServerMessage::ack(AckType::RoomList, coordinator.list_rooms().await);
        queue(&outbound, rooms);

        let receive_handler = Arc::new(WebsocketReceiveHandler::new(coordinator, outbound));

        Ok(Self {
            session,
            handle,
            receive_handler,
            outbound_receiver,
        })
    }

    /// Disconnects the session, then detaches its forwarder
    pub async fn close(coordinator: &Coordinator, session: &Session, handle: &Handle) {
        coordinator.disconnect(&session.id).await;
        coordinator.dispatcher().detach(handle).await;
    }
}

fn queue(outbound: &mpsc::UnboundedSender<String>, message: Result<ServerMessage, serde_json::Error>) {
    match message.and_then(|message| serde_json::to_string(&message)) {
        Ok(frame) => {
            let _ = outbound.send(frame);
        }
        Err(e) => warn!(error = %e, "Failed to encode frame"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub name: String,
}

/// WebSocket endpoint; the display name comes from the query string
/// GET /ws?name=alice
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    if query.name.trim().is_empty() {
        warn!("Rejecting WebSocket connection without a display name");
        return Err(AppError::InvalidName(query.name));
    }

    info!(display_name = %query.name, "WebSocket connection requested");

    Ok(ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, query.name, app_state.coordinator)
    }))
}

async fn handle_websocket_connection(
    socket: axum::extract::ws::WebSocket,
    display_name: String,
    coordinator: Arc<Coordinator>,
) {
    let link = match ClientLink::open(Arc::clone(&coordinator), &display_name).await {
        Ok(link) => link,
        Err(e) => {
            warn!(display_name = %display_name, error = %e, "Failed to connect session");
            return;
        }
    };

    info!(
        session_id = %link.session.id,
        display_name = %link.session.display_name,
        "WebSocket connection established"
    );

    let connection = Connection::new(
        link.session.clone(),
        Box::new(socket),
        link.outbound_receiver,
        link.receive_handler,
    );

    match connection.run().await {
        Ok(()) => info!(session_id = %link.session.id, "WebSocket connection closed cleanly"),
        Err(e) => warn!(session_id = %link.session.id, error = %e, "WebSocket connection error"),
    }

    ClientLink::close(&coordinator, &link.session, &link.handle).await;
}
