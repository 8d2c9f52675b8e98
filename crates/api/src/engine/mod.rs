//! Event engine: the dispatcher plus the background tasks around it.

pub mod dispatcher;

use std::sync::Arc;
use std::time::Duration;

use reflex_core::scripting::{ActiveSet, Sandbox, SandboxConfig, ScriptRegistry};
use reflex_events::EventBus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::ws::{self, WsManager};

pub use dispatcher::Dispatcher;

/// How long shutdown waits for the dispatcher loop to exit.
const DISPATCHER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running engine: the dispatcher loop, the outbound pump and the
/// heartbeat, sharing one [`AppState`].
pub struct Engine {
    state: AppState,
    cancel: CancellationToken,
    dispatcher_handle: JoinHandle<()>,
    outbound_handle: JoinHandle<()>,
    heartbeat_handle: JoinHandle<()>,
}

impl Engine {
    /// Wire the queues, seed the single-flight flags from `registry` and
    /// spawn the background tasks. Must be called inside a Tokio runtime.
    pub fn start(config: ServerConfig, registry: ScriptRegistry) -> Self {
        let registry = Arc::new(registry);
        let active = Arc::new(ActiveSet::seeded(registry.keys()));

        let (bus, receivers) = EventBus::new(config.queue_capacity);
        tracing::info!(capacity = config.queue_capacity, "Event bus created");

        let sandbox = Arc::new(Sandbox::new(
            SandboxConfig::new(config.execution_timeout()),
            Arc::new(bus.clone()),
        ));

        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&active), sandbox);
        let cancel = CancellationToken::new();
        let dispatcher_cancel = cancel.clone();
        let dispatcher_handle = tokio::spawn(async move {
            dispatcher.run(receivers.inbound, dispatcher_cancel).await;
        });

        let ws_manager = Arc::new(WsManager::new());
        let outbound_handle = ws::start_outbound_pump(Arc::clone(&ws_manager), receivers.outbound);
        let heartbeat_handle =
            ws::start_heartbeat(Arc::clone(&ws_manager), ws::DEFAULT_HEARTBEAT_INTERVAL);

        let state = AppState {
            config: Arc::new(config),
            ws_manager,
            bus,
            registry,
            active,
        };

        Self {
            state,
            cancel,
            dispatcher_handle,
            outbound_handle,
            heartbeat_handle,
        }
    }

    /// Shared state for the HTTP router.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop the dispatcher, close every peer connection and stop the
    /// background tasks. Units already running are left to finish or time
    /// out on their own.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if tokio::time::timeout(DISPATCHER_SHUTDOWN_TIMEOUT, self.dispatcher_handle)
            .await
            .is_err()
        {
            tracing::warn!("Dispatcher did not stop in time");
        }

        let ws_count = self.state.ws_manager.connection_count().await;
        tracing::info!(ws_count, "Closing remaining WebSocket connections");
        self.state.ws_manager.shutdown_all().await;

        self.outbound_handle.abort();
        self.heartbeat_handle.abort();
        tracing::info!("Engine stopped");
    }
}
