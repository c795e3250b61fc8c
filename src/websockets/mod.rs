// Public API
pub use forwarder::ConnectionForwarder;
pub use handler::{websocket_handler, ClientLink, ConnectQuery, WebsocketReceiveHandler};
pub use messages::{AckType, ClientMessage, IntentType, ServerMessage};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod forwarder;
mod handler;
mod messages;
mod socket;
