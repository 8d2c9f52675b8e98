//! WebSocket transport.
//!
//! Provides connection management, heartbeat monitoring, the outbound pump
//! that drains the outbound queue to connected peers, and the HTTP upgrade
//! handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;
mod outbound;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, DEFAULT_HEARTBEAT_INTERVAL};
pub use manager::WsManager;
pub use outbound::start_outbound_pump;
