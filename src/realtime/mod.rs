mod events;
mod registry;
mod ws;

pub use events::{ChildSnapshot, Coordinates, OutboundEvent};
pub use registry::{ConnectionId, ConnectionRole, ConnectionState, SessionRegistry};
pub use ws::ws_handler;
