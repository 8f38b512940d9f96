//! Passive expiry.
//!
//! The store honours the rules in its `ttl_indexes` registry on its own
//! schedule: a background monitor wakes every `interval` and deletes rows
//! whose timestamp column is older than the registered age. Like any
//! store-side TTL it is imprecise (up to one interval late) and never
//! cascades to rows in other tables.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::StoreHandle;

pub struct TtlMonitor {
    store: StoreHandle,
    interval: Duration,
}

impl TtlMonitor {
    pub fn new(store: StoreHandle, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// One pass over every registered rule. Returns rows removed.
    pub async fn run_once(&self) -> Result<usize> {
        let purged = self
            .store
            .call(|store| store.purge_expired(Utc::now()))
            .await?;
        let mut total = 0;
        for (index, removed) in purged {
            if removed > 0 {
                tracing::debug!(index = %index, removed, "TTL monitor expired rows");
            }
            total += removed;
        }
        Ok(total)
    }

    /// Start the monitor on the current runtime.
    pub fn spawn(self) -> TtlMonitorHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let join = tokio::spawn(self.run(shutdown_rx));
        TtlMonitorHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "TTL monitor started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!(error = %e, "TTL monitor pass failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
        tracing::info!("TTL monitor stopped");
    }
}

pub struct TtlMonitorHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl TtlMonitorHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join.await;
    }
}
