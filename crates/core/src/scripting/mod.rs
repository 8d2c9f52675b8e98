//! Script registry, single-flight tracking, and sandboxed execution.
//!
//! - [`registry`]: load-time `(channel, topic, name) -> source` map.
//! - [`active`]: the per-key "currently running" guard.
//! - [`sandbox`]: fresh interpreter per execution, watchdog, fault boundary.
//! - [`unit`]: one triggered invocation, releasing its key on exit.
//! - [`bindings`]: the host capabilities visible to scripts.
//! - [`sink`]: the seam through which scripts emit events.

pub mod active;
mod bindings;
pub mod outcome;
pub mod registry;
pub mod sandbox;
pub mod sink;
pub mod unit;

pub use active::{ActiveGuard, ActiveSet};
pub use outcome::Outcome;
pub use registry::{ScriptRegistry, SCRIPT_EXTENSION};
pub use sandbox::{Sandbox, SandboxConfig};
pub use sink::{Destination, EventSink, SinkError};
pub use unit::ExecutionUnit;
