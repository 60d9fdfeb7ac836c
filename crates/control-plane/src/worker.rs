// Tier reconciliation worker
//
// Runs `PendingTierService::reconcile_due` on a fixed interval. A failed pass
// is logged and the next tick tries again.

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::services::{PendingTierService, ReconcileReport};

pub struct ReconcileWorker {
    tiers: PendingTierService,
    interval: Duration,
}

impl ReconcileWorker {
    pub fn new(tiers: PendingTierService, interval: Duration) -> Self {
        Self { tiers, interval }
    }

    /// Run one reconciliation pass now
    pub async fn run_once(&self) -> Option<ReconcileReport> {
        match self.tiers.reconcile_due(Utc::now()).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Tier reconciliation pass failed");
                None
            }
        }
    }

    /// Run until the future is dropped
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting tier reconciliation worker"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}
