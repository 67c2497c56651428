//! Periodic background tasks

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Run `job` every `period` until `cancel` fires.
///
/// The first run happens one period after spawning. Every run is a task of
/// its own, so a failing or panicking run is logged and the next tick still
/// fires. A run that outlasts its period delays the following tick.
pub(crate) fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            run_isolated(name, job()).await;
        }

        debug!(task = name, "Periodic task stopped");
    })
}

async fn run_isolated<Fut>(name: &'static str, run: Fut)
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(task = name, "Periodic task failed: {}", e),
        Err(e) if e.is_panic() => error!(task = name, "Periodic task panicked"),
        Err(e) => warn!(task = name, "Periodic task aborted: {}", e),
    }
}
