//! Reflex core domain.
//!
//! Pure building blocks of the automation engine, free of any transport or
//! server concerns:
//!
//! - [`types::ScriptKey`]: the `(channel, topic, name)` identity of a script.
//! - [`event::Event`]: the routable event envelope.
//! - [`scripting`]: script registry, single-flight active set, and the
//!   sandboxed execution unit with its host bindings.

pub mod error;
pub mod event;
pub mod scripting;
pub mod types;
