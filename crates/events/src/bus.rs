//! Bounded inbound/outbound queues backed by `tokio::sync::mpsc`.
//!
//! Writers wait while a queue is full. That wait is the engine's only
//! backpressure mechanism: the transport stops reading its socket and a
//! script blocks inside `send.*` (where its watchdog can still stop it).

use async_trait::async_trait;
use reflex_core::scripting::{Destination, EventSink, SinkError};
use tokio::sync::mpsc;

/// Default buffer capacity for each queue.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Producer side of both queues.
///
/// Cheap to clone; every clone feeds the same queues.
#[derive(Debug, Clone)]
pub struct EventBus {
    inbound: mpsc::Sender<Vec<u8>>,
    outbound: mpsc::Sender<String>,
}

/// Consumer side of both queues.
#[derive(Debug)]
pub struct BusReceivers {
    /// Raw messages for the dispatcher.
    pub inbound: mpsc::Receiver<Vec<u8>>,
    /// Serialized messages for the transport.
    pub outbound: mpsc::Receiver<String>,
}

impl EventBus {
    /// Create a bus whose queues each hold up to `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> (Self, BusReceivers) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        (
            Self {
                inbound: inbound_tx,
                outbound: outbound_tx,
            },
            BusReceivers {
                inbound: inbound_rx,
                outbound: outbound_rx,
            },
        )
    }

    /// Create a bus with [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity() -> (Self, BusReceivers) {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Enqueue a raw message for the dispatcher, waiting for space.
    pub async fn publish_inbound(&self, raw: Vec<u8>) -> Result<(), SinkError> {
        self.inbound
            .send(raw)
            .await
            .map_err(|_| SinkError(Destination::Engine))
    }

    /// Enqueue a serialized message for the transport, waiting for space.
    pub async fn publish_outbound(&self, message: String) -> Result<(), SinkError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| SinkError(Destination::Transport))
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn send(&self, destination: Destination, payload: String) -> Result<(), SinkError> {
        match destination {
            Destination::Transport => self.publish_outbound(payload).await,
            Destination::Engine => self.publish_inbound(payload.into_bytes()).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn inbound_is_fifo() {
        let (bus, mut rx) = EventBus::with_default_capacity();

        bus.publish_inbound(b"one".to_vec()).await.expect("send");
        bus.publish_inbound(b"two".to_vec()).await.expect("send");

        assert_eq!(rx.inbound.recv().await.as_deref(), Some(&b"one"[..]));
        assert_eq!(rx.inbound.recv().await.as_deref(), Some(&b"two"[..]));
    }

    #[tokio::test]
    async fn sink_routes_by_destination() {
        let (bus, mut rx) = EventBus::with_default_capacity();
        let sink: &dyn EventSink = &bus;

        sink.send(Destination::Transport, "{\"out\":1}".into())
            .await
            .expect("send outbound");
        sink.send(Destination::Engine, "{\"in\":1}".into())
            .await
            .expect("send inbound");

        assert_eq!(rx.outbound.recv().await.as_deref(), Some("{\"out\":1}"));
        assert_eq!(
            rx.inbound.recv().await.as_deref(),
            Some(&b"{\"in\":1}"[..])
        );
    }

    #[tokio::test]
    async fn clones_share_queues() {
        let (bus, mut rx) = EventBus::with_default_capacity();
        let other = bus.clone();

        other.publish_outbound("hello".into()).await.expect("send");
        assert_eq!(rx.outbound.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn full_queue_blocks_writer_until_drained() {
        let (bus, mut rx) = EventBus::new(1);
        bus.publish_outbound("first".into()).await.expect("send");

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            bus.publish_outbound("second".into()),
        )
        .await;
        assert!(blocked.is_err(), "writer must wait while the queue is full");

        assert_eq!(rx.outbound.recv().await.as_deref(), Some("first"));
        bus.publish_outbound("third".into()).await.expect("send");
        assert_eq!(rx.outbound.recv().await.as_deref(), Some("third"));
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed() {
        let (bus, rx) = EventBus::with_default_capacity();
        drop(rx);

        let err = bus.publish_outbound("x".into()).await.expect_err("closed");
        assert_eq!(err.0, Destination::Transport);
        let err = bus.publish_inbound(vec![1]).await.expect_err("closed");
        assert_eq!(err.0, Destination::Engine);
    }
}
