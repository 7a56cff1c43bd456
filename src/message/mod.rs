//! Message types, the wire packet, and per-message handlers.
mod packet;
pub use packet::Packet;

pub mod types;
pub use types::*;

pub mod handlers;
pub use handlers::HandleMsg;
