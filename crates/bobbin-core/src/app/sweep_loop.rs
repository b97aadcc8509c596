//! LeaseSweepLoop - 期限切れ lease の定期回収
//!
//! `LeaseManager` itself has no timer; this loop is the external driver that
//! calls `cleanup_expired_leases` every `interval`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::background::run_periodic;
use super::lease_manager::LeaseManager;

pub struct LeaseSweepLoop {
    leases: Arc<LeaseManager>,
    interval: Duration,
}

impl LeaseSweepLoop {
    pub fn new(leases: Arc<LeaseManager>, interval: Duration) -> Self {
        Self { leases, interval }
    }

    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let leases = self.leases;
        run_periodic("lease-sweep", self.interval, shutdown, move || {
            let leases = Arc::clone(&leases);
            async move {
                match leases.cleanup_expired_leases().await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "expired leases swept");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "lease sweep failed"),
                }
            }
        })
        .await;
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
