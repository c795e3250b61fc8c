// Event-driven notification components
//
// Room, message and session state owners publish ChatEvents here; transport
// connections and other collaborators attach handlers and subscribe per kind.

// Public API - what other modules can use
pub use dispatcher::{DispatcherConfig, EventDispatcher, Handle, HandleId};
pub use events::{ChatEvent, EventKind, RoomCreated, UserJoined, UserLeft};
pub use handler::{ChannelHandler, EventError, EventHandler};

// Internal modules
mod dispatcher;
mod events;
mod handler;
