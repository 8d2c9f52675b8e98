//! Host capabilities installed into every script interpreter.
//!
//! The complete surface visible to a script:
//!
//! | Global          | Behaviour                                             |
//! |-----------------|-------------------------------------------------------|
//! | `console.log(v)`| log `v` tagged with the script identity               |
//! | `print(...)`    | same as `console.log` of the tab-joined arguments     |
//! | `wait(ms)`      | suspend this unit only                                |
//! | `send.ws(v)`    | serialize `v` and enqueue it for the transport        |
//! | `send.internal(v)` | serialize `v` and enqueue it for the dispatcher    |
//! | `e`             | read-only view of the triggering event                |
//!
//! Serialization failures and closed queues are logged and the call becomes
//! a no-op; they never raise into the script. The only error a binding
//! raises on its own is the force-stop signal once the unit is cancelled.
//!
//! `pcall`, `xpcall`, `coroutine.resume` and `coroutine.close` are wrapped so
//! that a failure observed after cancellation is raised again as the
//! force-stop signal. A script cannot swallow it and keep running.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mlua::{
    Function, Lua, LuaSerdeExt, MetaMethod, MultiValue, UserData, UserDataMethods, Value,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::sink::{Destination, EventSink};
use crate::event::Event;
use crate::types::ScriptKey;

/// Base-library globals removed from every interpreter.
const REMOVED_GLOBALS: [&str; 4] = ["dofile", "loadfile", "load", "require"];

/// Raised inside the interpreter when a unit exceeds its deadline.
#[derive(Debug)]
pub(crate) struct ForceStop;

impl fmt::Display for ForceStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("execution time exceeded, runtime force stopped")
    }
}

impl std::error::Error for ForceStop {}

pub(crate) fn force_stop() -> mlua::Error {
    mlua::Error::external(ForceStop)
}

/// Whether `err` is, or wraps, the force-stop signal.
pub(crate) fn is_force_stop(err: &mlua::Error) -> bool {
    match err {
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<ForceStop>().is_some(),
        mlua::Error::CallbackError { cause, .. } => is_force_stop(cause),
        mlua::Error::WithContext { cause, .. } => is_force_stop(cause),
        _ => false,
    }
}

/// Per-unit state shared by the binding closures.
#[derive(Clone)]
pub(crate) struct HostContext {
    pub key: Arc<ScriptKey>,
    pub sink: Arc<dyn EventSink>,
    pub cancel: CancellationToken,
}

/// Rebinds the protected-call entry points. Runs with the original functions
/// captured as upvalues, out of reach of the script.
const PROTECTED_CALL_GUARD: &str = r#"
local stopped, raise_stop = ...
local raw_pcall, raw_xpcall = pcall, xpcall
local raw_resume, raw_close = coroutine.resume, coroutine.close

local function checked(ok, ...)
    if not ok and stopped() then
        raise_stop()
    end
    return ok, ...
end

pcall = function(...) return checked(raw_pcall(...)) end
xpcall = function(...) return checked(raw_xpcall(...)) end
coroutine.resume = function(...) return checked(raw_resume(...)) end
coroutine.close = function(...) return checked(raw_close(...)) end
"#;

/// Install the full binding set and the event into a fresh interpreter.
pub(crate) fn install(lua: &Lua, host: &HostContext, event: Arc<Event>) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(name, Value::Nil)?;
    }

    let console = lua.create_table()?;
    console.set("log", console_log(lua, host)?)?;
    globals.set("console", console)?;
    globals.set("print", print(lua, host)?)?;

    globals.set("wait", wait(lua, host)?)?;

    let send = lua.create_table()?;
    send.set("ws", send_fn(lua, host, Destination::Transport)?)?;
    send.set("internal", send_fn(lua, host, Destination::Engine)?)?;
    globals.set("send", send)?;

    globals.set("e", lua.create_ser_userdata(EventView(event))?)?;

    guard_protected_calls(lua, host)
}

fn guard_protected_calls(lua: &Lua, host: &HostContext) -> mlua::Result<()> {
    let cancel = host.cancel.clone();
    let stopped = lua.create_function(move |_, ()| Ok(cancel.is_cancelled()))?;
    let raise_stop = lua.create_function(|_, ()| -> mlua::Result<()> { Err(force_stop()) })?;

    lua.load(PROTECTED_CALL_GUARD)
        .set_name("=protected_call_guard")
        .call::<()>((stopped, raise_stop))
}

fn console_log(lua: &Lua, host: &HostContext) -> mlua::Result<Function> {
    let key = Arc::clone(&host.key);
    lua.create_function(move |_, value: Value| {
        match render(&value) {
            Ok(text) => log_line(&key, &text),
            Err(e) => tracing::error!(
                channel = %key.channel,
                topic = %key.topic,
                script = %key.name,
                function = "console.log",
                error = %e,
                "Unable to serialize value",
            ),
        }
        Ok(())
    })
}

fn print(lua: &Lua, host: &HostContext) -> mlua::Result<Function> {
    let key = Arc::clone(&host.key);
    lua.create_function(move |_, args: MultiValue| {
        let parts: Vec<String> = args
            .iter()
            .map(|value| render(value).unwrap_or_else(|_| format!("<{}>", value.type_name())))
            .collect();
        log_line(&key, &parts.join("\t"));
        Ok(())
    })
}

fn wait(lua: &Lua, host: &HostContext) -> mlua::Result<Function> {
    let key = Arc::clone(&host.key);
    let cancel = host.cancel.clone();
    lua.create_async_function(move |_, millis: Value| {
        let delay = millis_from(&millis);
        if delay.is_none() {
            tracing::error!(
                channel = %key.channel,
                topic = %key.topic,
                script = %key.name,
                function = "wait",
                argument = millis.type_name(),
                "Unable to parse argument to integer",
            );
        }
        let cancel = cancel.clone();
        async move {
            let Some(delay) = delay else {
                return Ok(());
            };
            tokio::select! {
                () = tokio::time::sleep(delay) => Ok(()),
                () = cancel.cancelled() => Err(force_stop()),
            }
        }
    })
}

fn send_fn(lua: &Lua, host: &HostContext, destination: Destination) -> mlua::Result<Function> {
    let key = Arc::clone(&host.key);
    let sink = Arc::clone(&host.sink);
    let cancel = host.cancel.clone();
    let function = match destination {
        Destination::Transport => "send.ws",
        Destination::Engine => "send.internal",
    };

    lua.create_async_function(move |_, value: Value| {
        let payload = serde_json::to_string(&value);
        let key = Arc::clone(&key);
        let sink = Arc::clone(&sink);
        let cancel = cancel.clone();
        async move {
            let payload = match payload {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(
                        channel = %key.channel,
                        topic = %key.topic,
                        script = %key.name,
                        function,
                        error = %e,
                        "Unable to serialize value",
                    );
                    return Ok(());
                }
            };

            tokio::select! {
                sent = sink.send(destination, payload.clone()) => {
                    match sent {
                        Ok(()) => tracing::debug!(
                            channel = %key.channel,
                            topic = %key.topic,
                            script = %key.name,
                            function,
                            payload = %payload,
                            "Message sent",
                        ),
                        Err(e) => tracing::error!(
                            channel = %key.channel,
                            topic = %key.topic,
                            script = %key.name,
                            function,
                            error = %e,
                            "Unable to send message",
                        ),
                    }
                    Ok(())
                }
                () = cancel.cancelled() => Err(force_stop()),
            }
        }
    })
}

/// The triggering event as seen by a script.
///
/// Field reads convert from the Rust value on every access, so a nested
/// table handed to the script is a copy and writing to it never changes
/// `e`. Serializing `e` (`send.*`, `console.log`) yields the whole event.
struct EventView(Arc<Event>);

impl Serialize for EventView {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl UserData for EventView {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| {
            let Value::String(key) = key else {
                return Ok(Value::Nil);
            };
            let key = key.to_str()?;
            match &*key {
                "channel" => lua.to_value(&this.0.channel),
                "topic" => lua.to_value(&this.0.topic),
                field => match this.0.payload.get(field) {
                    Some(value) => lua.to_value(value),
                    None => Ok(Value::Nil),
                },
            }
        });

        methods.add_meta_method(
            MetaMethod::NewIndex,
            |_, _, (key, _): (Value, Value)| -> mlua::Result<()> {
                let key = match &key {
                    Value::String(s) => s.to_string_lossy().to_string(),
                    other => other.type_name().to_string(),
                };
                Err(mlua::Error::RuntimeError(format!(
                    "event is read-only (attempted to set '{key}')"
                )))
            },
        );

        methods.add_meta_method(MetaMethod::Pairs, |lua, this, ()| {
            let data = lua.to_value(&*this.0)?;
            let next: Function = lua.globals().get("next")?;
            Ok((next, data, Value::Nil))
        });
    }
}

/// Strings are logged verbatim, everything else as compact JSON.
fn render(value: &Value) -> Result<String, serde_json::Error> {
    match value {
        Value::String(s) => Ok(s.to_string_lossy().to_string()),
        other => serde_json::to_string(other),
    }
}

fn millis_from(value: &Value) -> Option<Duration> {
    let millis = match value {
        Value::Integer(i) => *i,
        Value::Number(n) if n.is_finite() => *n as i64,
        _ => return None,
    };
    Some(Duration::from_millis(millis.max(0) as u64))
}

fn log_line(key: &ScriptKey, line: &str) {
    tracing::info!(
        channel = %key.channel,
        topic = %key.topic,
        script = %key.name,
        "{line}",
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
