//! Isolated, time-bounded script evaluation.
//!
//! Every call to [`Sandbox::execute`] builds a fresh Lua state, installs the
//! host bindings, binds the triggering event and evaluates the script under
//! a watchdog.
//!
//! # Cancellation
//!
//! Stopping a script is cooperative. The watchdog cancels a token when the
//! timeout elapses; the interpreter observes it at two kinds of checkpoint:
//!
//! - an instruction-count hook, run every
//!   [`SandboxConfig::instruction_interval`] VM instructions, which also
//!   compares against the absolute deadline so a unit that starves the
//!   watchdog task is still stopped;
//! - every suspending host binding (`wait`, `send.*`).
//!
//! Once tripped, the token stays cancelled and the protected-call wrappers
//! installed by the bindings raise the signal again, so a script cannot catch
//! it and carry on. A long native call between checkpoints still overruns
//! the deadline; once [`FORCE_STOP_GRACE`] has passed after the deadline the
//! evaluation task is abandoned at its next yield.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua, LuaOptions, StdLib, VmState};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use super::bindings::{self, HostContext};
use super::outcome::Outcome;
use super::sink::EventSink;
use crate::event::Event;
use crate::types::ScriptKey;

/// Default number of VM instructions between cancellation checks.
pub const DEFAULT_INSTRUCTION_INTERVAL: u32 = 1_000;

/// How long after the deadline a non-yielding evaluation is waited for
/// before the unit gives up on it.
pub const FORCE_STOP_GRACE: Duration = Duration::from_secs(1);

/// Standard libraries available to scripts. No `io`, `os`, `package` or
/// `debug`.
fn sandbox_libs() -> StdLib {
    StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE
}

/// Execution limits applied to every unit.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget per execution.
    pub timeout: Duration,
    /// VM instructions between cancellation checks.
    pub instruction_interval: u32,
}

impl SandboxConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            instruction_interval: DEFAULT_INSTRUCTION_INTERVAL,
        }
    }
}

/// Factory for isolated script executions.
///
/// Holds only immutable configuration and the event sink, so a single
/// `Arc<Sandbox>` is shared by every concurrently running unit.
pub struct Sandbox {
    config: SandboxConfig,
    sink: Arc<dyn EventSink>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig, sink: Arc<dyn EventSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Evaluate `source` for `event` and return its terminal outcome.
    ///
    /// Never returns an error and never panics: faults, panics inside host
    /// bindings and forced stops are all folded into the [`Outcome`].
    pub async fn execute(&self, key: &ScriptKey, source: Arc<str>, event: Arc<Event>) -> Outcome {
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + self.config.timeout;

        let watchdog = AbortOnDropHandle::new(tokio::spawn({
            let cancel = cancel.clone();
            let timeout = self.config.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            }
        }));

        let host = HostContext {
            key: Arc::new(key.clone()),
            sink: Arc::clone(&self.sink),
            cancel: cancel.clone(),
        };

        // The evaluation runs in its own task so a panic is caught at the
        // join boundary instead of unwinding through the caller. Both tasks
        // are aborted if this future is dropped.
        let mut evaluation = AbortOnDropHandle::new(tokio::spawn(evaluate(
            host,
            source,
            event,
            deadline,
            self.config.instruction_interval,
        )));

        let joined = tokio::select! {
            joined = &mut evaluation => Some(joined),
            () = async {
                cancel.cancelled().await;
                tokio::time::sleep(FORCE_STOP_GRACE).await;
            } => None,
        };
        watchdog.abort();

        match joined {
            None => {
                evaluation.abort();
                Outcome::TimedOut
            }
            Some(Ok(Ok(()))) => Outcome::Completed,
            Some(Ok(Err(err))) if bindings::is_force_stop(&err) => Outcome::TimedOut,
            Some(Ok(Err(err))) => Outcome::Faulted(err.to_string()),
            Some(Err(join_err)) if join_err.is_panic() => {
                let payload = join_err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Outcome::Faulted(format!("host binding panicked: {message}"))
            }
            Some(Err(join_err)) => Outcome::Faulted(join_err.to_string()),
        }
    }
}

async fn evaluate(
    host: HostContext,
    source: Arc<str>,
    event: Arc<Event>,
    deadline: Instant,
    instruction_interval: u32,
) -> mlua::Result<()> {
    let lua = Lua::new_with(sandbox_libs(), LuaOptions::default())?;
    bindings::install(&lua, &host, event)?;

    let cancel = host.cancel.clone();
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(instruction_interval.max(1)),
        move |_lua, _debug| {
            if Instant::now() >= deadline {
                cancel.cancel();
            }
            if cancel.is_cancelled() {
                return Err(bindings::force_stop());
            }
            Ok(VmState::Continue)
        },
    );

    lua.load(&*source)
        .set_name(format!("={}", host.key))
        .exec_async()
        .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
