//! One triggered invocation of one script.

use std::sync::Arc;
use std::time::Instant;

use super::active::ActiveGuard;
use super::outcome::Outcome;
use super::sandbox::Sandbox;
use crate::event::Event;

/// An execution unit: a script key held active, its source, and the event
/// that triggered it.
///
/// Created by the dispatcher right after it wins the key's active flag and
/// consumed by [`ExecutionUnit::run`], which releases the flag and emits the
/// terminal log record.
pub struct ExecutionUnit {
    guard: ActiveGuard,
    source: Arc<str>,
    event: Arc<Event>,
    sandbox: Arc<Sandbox>,
}

impl ExecutionUnit {
    pub fn new(
        guard: ActiveGuard,
        source: Arc<str>,
        event: Arc<Event>,
        sandbox: Arc<Sandbox>,
    ) -> Self {
        Self {
            guard,
            source,
            event,
            sandbox,
        }
    }

    /// Run the script to its terminal outcome.
    ///
    /// The active flag is cleared before the terminal record is logged. If
    /// the future is dropped early the guard still clears it.
    pub async fn run(self) -> Outcome {
        let key = self.guard.key().clone();
        tracing::info!(
            channel = %key.channel,
            topic = %key.topic,
            script = %key.name,
            "Script started",
        );

        let started = Instant::now();
        let outcome = self
            .sandbox
            .execute(&key, self.source, self.event)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        drop(self.guard);

        match &outcome {
            Outcome::Completed => tracing::info!(
                channel = %key.channel,
                topic = %key.topic,
                script = %key.name,
                outcome = outcome.label(),
                duration_ms,
                "Script finished",
            ),
            Outcome::Faulted(error) => tracing::error!(
                channel = %key.channel,
                topic = %key.topic,
                script = %key.name,
                outcome = outcome.label(),
                duration_ms,
                error = %error,
                "Script faulted",
            ),
            Outcome::TimedOut => tracing::warn!(
                channel = %key.channel,
                topic = %key.topic,
                script = %key.name,
                outcome = outcome.label(),
                duration_ms,
                "Script timed out, runtime force stopped",
            ),
        }

        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
