// Minimum-interval scheduler: forced heartbeat writes for quiet entities

mod tracker;

pub use tracker::StalenessTracker;

use crate::entity::EntityKind;
use crate::forwarder::Forwarder;
use crate::pipeline::WriteOutcome;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};


/// What one scheduler cycle did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entities seen for the first time (tracker seeded, nothing written)
    pub seeded: usize,
    /// Entities that got a forced full write
    pub forced: usize,
    /// Entities written recently enough to be left alone
    pub skipped: usize,
}

/// Wakes periodically and forces a full write for every entity that has
/// not been written within the minimum update frequency
pub struct HeartbeatScheduler {
    forwarder: Arc<Forwarder>,
}

impl HeartbeatScheduler {
    pub fn new(forwarder: Arc<Forwarder>) -> Self {
        Self { forwarder }
    }

    /// Run the scheduler loop until `shutdown` turns true or its sender is
    /// dropped. A cycle in progress always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let settings = self.forwarder.settings().await;
        let wake_seconds = settings.scheduler.wake_interval_seconds.max(1);

        info!(
            wake_interval_seconds = wake_seconds,
            minimum_update_frequency_seconds = settings.scheduler.minimum_update_frequency_seconds,
            "Starting heartbeat scheduler"
        );

        let mut timer = interval(Duration::from_secs(wake_seconds));

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let report = self.run_cycle(Utc::now()).await;
                    debug!(
                        seeded = report.seeded,
                        forced = report.forced,
                        skipped = report.skipped,
                        "Scheduler cycle complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Heartbeat scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over every known entity as of `now`.
    ///
    /// An entity is due once its last write is at least the minimum update
    /// frequency ago, less half a wake interval.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let settings = self.forwarder.settings().await;
        let minimum = chrono::Duration::seconds(
            settings
                .scheduler
                .minimum_update_frequency_seconds
                .min(u64::from(u32::MAX)) as i64,
        );
        // Wakes land a little late or early; an entity due within half a
        // wake is written now rather than a whole wake later
        let slack = chrono::Duration::milliseconds(
            (settings.scheduler.wake_interval_seconds.max(1).min(u64::from(u32::MAX)) * 500) as i64,
        );
        let tracker = self.forwarder.tracker();
        let mut report = CycleReport::default();

        for entity in self.forwarder.registry().all() {
            let key = entity.key();

            let Some(last) = tracker.get(&key) else {
                let seen = match entity.kind {
                    EntityKind::Device => entity.last_changed.unwrap_or(now),
                    EntityKind::Variable => now,
                };
                tracker.seed(key, seen);
                report.seeded += 1;
                continue;
            };

            if now - last + slack < minimum {
                report.skipped += 1;
                continue;
            }

            match self.forwarder.forward(&entity, &entity.attributes, true).await {
                Some(WriteOutcome::Sent) | None => {}
                Some(outcome) => warn!(
                    entity = %key,
                    outcome = ?outcome,
                    "Heartbeat write not sent"
                ),
            }
            tracker.touch(key, now);
            report.forced += 1;
        }

        report
    }
}
