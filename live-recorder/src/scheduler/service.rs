//! The monitoring loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::resource::{DiskMonitor, DiskSpaceStatus, bytes_to_gib};
use crate::monitor::{RecordingEvent, RecordingOrchestrator};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub recording_enabled: bool,
    pub pruned: usize,
    pub dispatched: Vec<String>,
}

/// Drives the orchestrator at a fixed interval until cancelled.
///
/// Each tick gates recording on free disk space, prunes captures whose
/// process vanished and dispatches the checks that are due. Checks run as
/// their own tasks; a slow platform never delays the tick.
pub struct Scheduler {
    orchestrator: Arc<RecordingOrchestrator>,
    disk: DiskMonitor,
    save_dir: PathBuf,
    interval: Duration,
    reconcile: bool,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<RecordingOrchestrator>) -> Self {
        let config = orchestrator.config();
        let disk = DiskMonitor::new(config.scheduler.disk_threshold_gib);
        let save_dir = config.paths.save_dir.clone();
        let interval = config.scheduler.interval();
        let reconcile = config.scheduler.reconcile;
        Self {
            orchestrator,
            disk,
            save_dir,
            interval,
            reconcile,
        }
    }

    pub fn with_disk_monitor(mut self, disk: DiskMonitor) -> Self {
        self.disk = disk;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler received cancellation signal");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    debug!(
                        dispatched = report.dispatched.len(),
                        pruned = report.pruned,
                        recording_enabled = report.recording_enabled,
                        "scheduler tick"
                    );
                }
            }
        }
    }

    pub async fn tick(&mut self) -> TickReport {
        let recording_enabled = self.update_disk_gate().await;

        let pruned = if self.reconcile {
            self.orchestrator.reconcile()
        } else {
            0
        };

        // a check dispatched on the previous tick started slightly after it;
        // round to the nearest tick so it is not skipped
        let dispatched = self.orchestrator.due_for_check(
            Instant::now(),
            Local::now().time(),
            self.interval / 2,
        );
        self.orchestrator.dispatch_checks(&dispatched);

        TickReport {
            recording_enabled,
            pruned,
            dispatched,
        }
    }

    async fn update_disk_gate(&self) -> bool {
        let disk = self.disk.clone();
        let save_dir = self.save_dir.clone();
        let status = tokio::task::spawn_blocking(move || disk.check(&save_dir))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "disk space check panicked");
                DiskSpaceStatus::Unknown
            });

        let allowed = status.allows_recording();
        let was_allowed = self.orchestrator.set_recording_enabled(allowed);
        let available_gib = status.available_bytes().map(bytes_to_gib).unwrap_or_default();

        if was_allowed && !allowed {
            if let Some(err) = status.to_error() {
                warn!(error = %err, "pausing new captures");
            }
            self.orchestrator.events().publish(RecordingEvent::DiskSpaceLow {
                available_gib,
                threshold_gib: self.disk.threshold_gib(),
            });
        } else if !was_allowed && allowed {
            info!(available_gib, "free disk space recovered, captures resume");
            self.orchestrator
                .events()
                .publish(RecordingEvent::DiskSpaceRecovered { available_gib });
        }
        allowed
    }
}
