//! Seam between execution units and the event queues.
//!
//! The sandbox only knows how to hand a serialized message to an
//! [`EventSink`]; the queue implementation lives in the events crate.

use std::fmt;

use async_trait::async_trait;

/// Where a script-emitted message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Outbound queue, drained by the transport (`send.ws`).
    Transport,
    /// Inbound queue, re-entering the dispatcher (`send.internal`).
    Engine,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("outbound"),
            Self::Engine => f.write_str("inbound"),
        }
    }
}

/// The destination queue has no consumer left.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0} queue is closed")]
pub struct SinkError(pub Destination);

/// Accepts serialized messages from running scripts.
///
/// Implementations may suspend the caller while the destination queue is
/// full; that wait is the backpressure point for scripts.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, destination: Destination, payload: String) -> Result<(), SinkError>;
}
