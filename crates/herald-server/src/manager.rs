use crate::service::NotificationService;
use crate::shutdown::ShutdownSignal;
use herald_pubsub::PruneStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Result of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub visitors_evicted: usize,
    pub pruned: PruneStats,
}

/// Periodic maintenance: evicts idle visitors, prunes expired messages and
/// drops unused topics
#[derive(Debug, Clone)]
pub struct Manager {
    service: Arc<NotificationService>,
    interval: Duration,
}

impl Manager {
    pub fn new(service: Arc<NotificationService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run a single maintenance pass
    pub async fn run_once(&self) -> ManagerStats {
        let visitors_evicted = self.service.tracker().evict_idle().await;
        let pruned = self
            .service
            .registry()
            .prune(chrono::Utc::now().timestamp())
            .await;

        let stats = ManagerStats {
            visitors_evicted,
            pruned,
        };
        debug!(
            visitors_evicted,
            messages = pruned.messages,
            topics = pruned.topics,
            "Manager pass complete"
        );
        stats
    }

    /// Run passes every interval until a shutdown signal arrives
    pub fn spawn(self, mut shutdown: broadcast::Receiver<ShutdownSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?self.interval, "Manager started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = shutdown.recv() => break,
                }
            }

            info!("Manager stopped");
        })
    }
}
