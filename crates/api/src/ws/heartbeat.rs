use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings in production.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the heartbeat task: every `period`, ping each connected peer so
/// idle connections stay open and dead ones surface as write errors in
/// their sender task.
///
/// The first ping goes out one full period after start. Ticks with no peer
/// connected are skipped. Runs until the handle is aborted.
pub fn start_heartbeat(ws_manager: Arc<WsManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            let peers = ws_manager.connection_count().await;
            if peers == 0 {
                continue;
            }
            ws_manager.ping_all().await;
            tracing::trace!(peers, "Heartbeat sent");
        }
    })
}
