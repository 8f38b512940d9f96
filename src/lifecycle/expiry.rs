//! Active backup sweep for the temporary tier.
//!
//! Passive expiry is the primary mechanism, but it can be missing, late, or
//! (being store-side) unaware of follow-up sessions. The coordinator runs on
//! its own interval, deletes temporary records older than the backup
//! threshold together with every session that references them, and purges
//! pending sessions whose record passive expiry already took.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::ExpirySection;
use crate::errors::LifecycleResult;
use crate::store::{StoreHandle, TEMP_TABLE};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub passive_expiry_active: bool,
    pub removed_temp: usize,
    pub removed_sessions: usize,
}

#[derive(Debug, Default)]
struct ExpiryCounters {
    iterations: AtomicU64,
    records_removed: AtomicU64,
    sessions_cascaded: AtomicU64,
    failed_iterations: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryStats {
    pub iterations: u64,
    pub records_removed: u64,
    pub sessions_cascaded: u64,
    pub failed_iterations: u64,
}

impl ExpiryCounters {
    fn snapshot(&self) -> ExpiryStats {
        ExpiryStats {
            iterations: self.iterations.load(Ordering::Relaxed),
            records_removed: self.records_removed.load(Ordering::Relaxed),
            sessions_cascaded: self.sessions_cascaded.load(Ordering::Relaxed),
            failed_iterations: self.failed_iterations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
pub struct ExpiryCoordinator {
    store: StoreHandle,
    backup_threshold: Duration,
    interval: Duration,
    counters: Arc<ExpiryCounters>,
}

impl ExpiryCoordinator {
    pub fn new(store: StoreHandle, expiry: &ExpirySection) -> Self {
        Self::with_timing(store, expiry.backup_threshold(), expiry.sweep_interval())
    }

    pub fn with_timing(store: StoreHandle, backup_threshold: Duration, interval: Duration) -> Self {
        Self {
            store,
            backup_threshold,
            interval,
            counters: Arc::new(ExpiryCounters::default()),
        }
    }

    pub fn stats(&self) -> ExpiryStats {
        self.counters.snapshot()
    }

    /// One sweep. Counters are updated whether it succeeds or not.
    pub async fn run_once(&self) -> LifecycleResult<SweepReport> {
        self.counters.iterations.fetch_add(1, Ordering::Relaxed);
        match self.sweep().await {
            Ok(report) => {
                self.counters
                    .records_removed
                    .fetch_add(report.removed_temp as u64, Ordering::Relaxed);
                self.counters
                    .sessions_cascaded
                    .fetch_add(report.removed_sessions as u64, Ordering::Relaxed);
                Ok(report)
            }
            Err(e) => {
                self.counters.failed_iterations.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn sweep(&self) -> LifecycleResult<SweepReport> {
        let threshold = chrono::Duration::from_std(self.backup_threshold)
            .map_err(|e| anyhow::anyhow!("Backup threshold out of range: {}", e))?;
        let cutoff = Utc::now() - threshold;

        let report = self
            .store
            .call(move |s| {
                let passive_expiry_active =
                    s.verify_ttl_index(TEMP_TABLE, "submitted_at")?.is_some();
                let mut report = SweepReport {
                    passive_expiry_active,
                    ..SweepReport::default()
                };
                for temp_id in s.stale_temp_record_ids(cutoff)? {
                    let cascade = s.cascade_delete_temp_record(&temp_id)?;
                    if cascade.temp_deleted {
                        report.removed_temp += 1;
                    }
                    report.removed_sessions += cascade.sessions_deleted;
                }
                report.removed_sessions += s.delete_orphaned_sessions()?;
                Ok(report)
            })
            .await?;

        if !report.passive_expiry_active {
            tracing::warn!("Passive expiry is not configured; the sweep is the only cleanup");
        }
        if report.removed_temp > 0 || report.removed_sessions > 0 {
            tracing::info!(
                removed_temp = report.removed_temp,
                removed_sessions = report.removed_sessions,
                "Expiry sweep removed stale records"
            );
        } else {
            tracing::debug!("Expiry sweep found nothing to remove");
        }
        Ok(report)
    }

    /// Run on the current runtime until [`ExpiryHandle::stop`].
    pub fn start(self) -> ExpiryHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let counters = self.counters.clone();
        let join = tokio::spawn(self.run(shutdown_rx));
        ExpiryHandle {
            shutdown_tx,
            join,
            counters,
        }
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            threshold_secs = self.backup_threshold.as_secs(),
            "Expiry coordinator started"
        );
        loop {
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "Expiry sweep failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
        tracing::info!("Expiry coordinator stopped");
    }
}

/// Owner of a running coordinator.
pub struct ExpiryHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
    counters: Arc<ExpiryCounters>,
}

impl ExpiryHandle {
    pub fn stats(&self) -> ExpiryStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Signal the loop at its next wait point and wait for it to exit.
    pub async fn stop(self) -> ExpiryStats {
        let _ = self.shutdown_tx.send(());
        let _ = self.join.await;
        self.counters.snapshot()
    }
}
