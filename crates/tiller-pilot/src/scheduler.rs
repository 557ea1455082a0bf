use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::reconcile::{Reconciler, Refresh};

/// Drives the reconciler: one cycle per interval tick, plus one per refresh
/// request, until shut down.
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    refresh_rx: mpsc::UnboundedReceiver<Refresh>,
}

impl Scheduler {
    /// Fails for a zero interval, which would leave nothing to pace the loop.
    pub fn new(
        reconciler: Arc<Reconciler>,
        interval: Duration,
        refresh_rx: mpsc::UnboundedReceiver<Refresh>,
    ) -> Result<Self> {
        anyhow::ensure!(!interval.is_zero(), "poll interval must be non-zero");
        Ok(Self { reconciler, interval, refresh_rx })
    }

    /// Loads gains and biases once, then cycles until `shutdown` fires.
    ///
    /// Each cycle runs as its own task, so a slow response never delays the
    /// next tick. Cycles still in flight at shutdown are left to finish.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("scheduler: starting, interval {}ms", self.interval.as_millis());
        if let Err(e) = self.reconciler.refresh_gains().await {
            warn!("scheduler: initial gains read failed: {}", e);
        }
        if let Err(e) = self.reconciler.refresh_biases().await {
            warn!("scheduler: initial biases read failed: {}", e);
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.spawn_cycle(Refresh::Telemetry),
                Some(request) = self.refresh_rx.recv() => {
                    debug!("scheduler: out-of-band {:?}", request);
                    self.spawn_cycle(request);
                }
            }
        }
        info!("scheduler: stopped");
    }

    fn spawn_cycle(&self, request: Refresh) {
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move {
            reconciler.refresh(request).await;
        });
    }
}
