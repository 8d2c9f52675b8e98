use std::sync::Arc;

use reflex_core::scripting::{ActiveSet, ScriptRegistry};
use reflex_events::EventBus;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (transport peers).
    pub ws_manager: Arc<WsManager>,
    /// Producer side of the inbound/outbound queues.
    pub bus: EventBus,
    /// Scripts loaded at startup.
    pub registry: Arc<ScriptRegistry>,
    /// Single-flight flags, one per registered script.
    pub active: Arc<ActiveSet>,
}
