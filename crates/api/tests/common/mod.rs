use std::sync::Arc;
use std::time::Duration;

use reflex_api::config::{LogOutput, ServerConfig};
use reflex_api::engine::Dispatcher;
use reflex_core::scripting::{ActiveSet, Sandbox, SandboxConfig, ScriptRegistry};
use reflex_core::types::ScriptKey;
use reflex_events::{BusReceivers, EventBus};
use tokio::sync::mpsc;

/// `(channel, topic, name, source)`
pub type ScriptDef<'a> = (&'a str, &'a str, &'a str, &'a str);

/// Build a test `ServerConfig`: loopback, ephemeral port, console logging
/// and a one-second execution limit.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        script_root: "./scripts".into(),
        execution_timeout_secs: 1,
        queue_capacity: 64,
        log_level: "debug".to_string(),
        log_output: LogOutput::Console,
    }
}

/// Build an in-memory registry from script definitions.
pub fn registry_with(scripts: &[ScriptDef<'_>]) -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    for (channel, topic, name, source) in scripts {
        registry.insert(ScriptKey::new(*channel, *topic, *name), *source);
    }
    registry
}

/// A dispatcher wired to a real event bus, without the transport.
pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub active: Arc<ActiveSet>,
    pub bus: EventBus,
    pub receivers: BusReceivers,
}

pub fn harness(scripts: &[ScriptDef<'_>], timeout: Duration) -> Harness {
    let registry = Arc::new(registry_with(scripts));
    let active = Arc::new(ActiveSet::seeded(registry.keys()));
    let (bus, receivers) = EventBus::new(64);
    let sandbox = Arc::new(Sandbox::new(
        SandboxConfig::new(timeout),
        Arc::new(bus.clone()),
    ));
    let dispatcher = Arc::new(Dispatcher::new(registry, Arc::clone(&active), sandbox));

    Harness {
        dispatcher,
        active,
        bus,
        receivers,
    }
}

/// Wait for the next outbound message and parse it as JSON.
pub async fn next_outbound(outbound: &mut mpsc::Receiver<String>) -> serde_json::Value {
    let message = tokio::time::timeout(Duration::from_secs(5), outbound.recv())
        .await
        .expect("timed out waiting for an outbound message")
        .expect("outbound queue closed");
    serde_json::from_str(&message).expect("outbound message should be JSON")
}

/// Send a GET request through the router and return the response.
pub async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    use tower::ServiceExt;

    let request = axum::http::Request::builder()
        .method(axum::http::Method::GET)
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request");
    app.oneshot(request).await.expect("router response")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    use http_body_util::BodyExt;

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
