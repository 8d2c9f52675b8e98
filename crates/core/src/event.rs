//! Routable event envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An event routed by `(channel, topic)` to the scripts registered there.
///
/// On the wire an event is a flat JSON object: `channel` and `topic` are
/// required strings and every other top-level field is payload.
///
/// ```rust
/// use reflex_core::event::Event;
///
/// let event = Event::from_slice(br#"{"channel":"home","topic":"door","open":true}"#).unwrap();
/// assert_eq!(event.channel, "home");
/// assert_eq!(event.payload["open"], true);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub channel: String,
    pub topic: String,
    /// All remaining top-level fields of the message.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(channel: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
            payload: Map::new(),
        }
    }

    /// Add a single payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Deserialize an event from a raw inbound message.
    pub fn from_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}
