//! Background loop handle and the shared tick/shutdown driver.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle over the spawned background loops.
/// - `request_shutdown()` でループ全体に停止を通知
/// - `shutdown_and_join()` で全ループの終了を待つ
pub struct BackgroundGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl BackgroundGroup {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            joins: Vec::new(),
        }
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn push(&mut self, join: JoinHandle<()>) {
        self.joins.push(join);
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every loop to stop. A cycle already running finishes first.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "background loop panicked");
            }
        }
    }
}

impl Default for BackgroundGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Call `cycle` every `period` until shutdown is signalled.
///
/// The first cycle runs one full period after start, not immediately.
pub(crate) async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(loop_name = name, period_secs = period.as_secs(), "background loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                // Sender gone means nobody can stop us later; stop now.
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => cycle().await,
        }
    }
    tracing::debug!(loop_name = name, "background loop stopped");
}
