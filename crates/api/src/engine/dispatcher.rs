//! Inbound event dispatcher.
//!
//! Drains the inbound queue one message at a time. Each message is parsed
//! into an [`Event`], matched against the registry by channel and topic, and
//! every matching script that is not already running gets its own execution
//! unit on a separate task. The loop never waits on a unit, so a slow or
//! stuck script cannot hold up delivery to other scripts.

use std::sync::Arc;

use reflex_core::event::Event;
use reflex_core::scripting::{ActiveSet, ExecutionUnit, Outcome, Sandbox, ScriptRegistry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Routes inbound events to execution units.
pub struct Dispatcher {
    registry: Arc<ScriptRegistry>,
    active: Arc<ActiveSet>,
    sandbox: Arc<Sandbox>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ScriptRegistry>, active: Arc<ActiveSet>, sandbox: Arc<Sandbox>) -> Self {
        Self {
            registry,
            active,
            sandbox,
        }
    }

    /// Run the dispatch loop until the token is cancelled or every inbound
    /// producer is gone.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Vec<u8>>, cancel: CancellationToken) {
        tracing::info!(scripts = self.registry.len(), "Dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                message = inbound.recv() => {
                    let Some(raw) = message else {
                        tracing::info!("Inbound queue closed, dispatcher stopped");
                        break;
                    };
                    self.handle_message(&raw);
                }
            }
        }
    }

    /// Parse one raw message and dispatch it.
    ///
    /// Returns the number of units started. Messages that are not a JSON
    /// object with string `channel` and `topic` fields are logged and
    /// dropped.
    pub fn handle_message(&self, raw: &[u8]) -> usize {
        match Event::from_slice(raw) {
            Ok(event) => self.dispatch(Arc::new(event)).len(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    message = %String::from_utf8_lossy(raw),
                    "Unable to parse incoming message, dropped",
                );
                0
            }
        }
    }

    /// Start a unit for every matching script that is not already running.
    ///
    /// A script that is still running when its event arrives is skipped;
    /// the event is not queued for it.
    pub fn dispatch(&self, event: Arc<Event>) -> Vec<JoinHandle<Outcome>> {
        let scripts = self.registry.scripts_for(&event.channel, &event.topic);
        if scripts.is_empty() {
            tracing::debug!(
                channel = %event.channel,
                topic = %event.topic,
                "No scripts registered for event",
            );
            return Vec::new();
        }

        scripts
            .into_iter()
            .filter_map(|(key, source)| {
                let Some(guard) = self.active.try_acquire(&key) else {
                    tracing::debug!(
                        channel = %key.channel,
                        topic = %key.topic,
                        script = %key.name,
                        "Script already running, event skipped",
                    );
                    return None;
                };
                let unit = ExecutionUnit::new(
                    guard,
                    source,
                    Arc::clone(&event),
                    Arc::clone(&self.sandbox),
                );
                Some(tokio::spawn(unit.run()))
            })
            .collect()
    }
}
