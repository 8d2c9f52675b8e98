//! Reflex event bus.
//!
//! The two queues connecting the transport, the dispatcher and running
//! scripts:
//!
//! - Inbound: raw messages from the transport and from `send.internal`,
//!   consumed by the dispatcher.
//! - Outbound: serialized messages from `send.ws`, consumed by the
//!   transport.
//!
//! [`EventBus`] is the cloneable producer side and implements
//! [`reflex_core::scripting::EventSink`]; [`BusReceivers`] is the consumer
//! side, handed out once at construction.

pub mod bus;

pub use bus::{BusReceivers, EventBus};
