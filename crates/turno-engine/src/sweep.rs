//! Periodic background tasks.
//!
//! [`run_every`] is the one scheduling primitive the engine owns: a named
//! loop that runs a task on a fixed period until its token cancels. The
//! expiry sweep built on top of it is a safety net — per-session timers are
//! the primary expiry mechanism, the sweep catches whatever a crash or
//! missed wakeup left behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::service::QueueService;

/// Run `task` every `period` until `token` cancels.
///
/// The first run happens one full period after the call, not immediately;
/// boot paths that want an immediate pass (timer re-arm, initial sweep) do
/// it explicitly before spawning this loop. Missed ticks are delayed, not
/// bursted.
pub async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    mut task: F,
) where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval's first tick completes immediately; consume it.
    let _ = ticker.tick().await;

    debug!(task = name, period_secs = period.as_secs(), "periodic task started");
    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!(task = name, "periodic task stopped");
                break;
            }
            _ = ticker.tick() => task().await,
        }
    }
}

/// Spawn the background expiry sweep over all offices.
pub fn spawn_sweep(
    service: Arc<QueueService>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_every("expiry_sweep", period, token, move || {
        let service = Arc::clone(&service);
        async move {
            match service.sweep_expired(None).await {
                Ok(0) => {}
                Ok(count) => info!(count, "swept overdue sessions"),
                Err(error) => warn!(%error, "expiry sweep failed"),
            }
        }
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
