/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outbox dispatcher
//!
//! Drains the outbox in batches. After a full batch it drains again right
//! away; otherwise it sleeps until woken (admission wakes it after every
//! enqueue), the poll interval elapses, or it is shut down.
//!
//! ```rust,ignore
//! let dispatcher = Arc::new(OutboxDispatcher::new(store, DispatcherConfig::default()));
//! let admission = admission.with_dispatcher_wake(dispatcher.wake_handle());
//! let handle = tokio::spawn({
//!     let dispatcher = dispatcher.clone();
//!     async move { dispatcher.run().await }
//! });
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::models::DispatchReport;
use crate::queue::OutboxStore;

/// Dispatcher loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    poll_interval: Duration,
    batch_size: i64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfigBuilder::default().build()
    }
}

impl DispatcherConfig {
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// Upper bound on how long a pending entry waits when no wake arrives.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl Default for DispatcherConfigBuilder {
    fn default() -> Self {
        Self {
            config: DispatcherConfig {
                poll_interval: Duration::from_secs(1),
                batch_size: 100,
            },
        }
    }
}

impl DispatcherConfigBuilder {
    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    /// Values below one are raised to one.
    pub fn batch_size(mut self, value: i64) -> Self {
        self.config.batch_size = value.max(1);
        self
    }

    pub fn build(self) -> DispatcherConfig {
        self.config
    }
}

/// Performs pending outbox entries until shut down.
pub struct OutboxDispatcher {
    store: Arc<dyn OutboxStore>,
    config: DispatcherConfig,
    wake: Arc<Notify>,
    shutdown: AtomicBool,
}

impl OutboxDispatcher {
    pub fn new(store: Arc<dyn OutboxStore>, config: DispatcherConfig) -> Self {
        Self {
            store,
            config,
            wake: Arc::new(Notify::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handle producers use to wake the loop after writing to the outbox.
    pub fn wake_handle(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Drains one batch and records metrics for it.
    pub async fn run_once(&self) -> Result<DispatchReport, StoreError> {
        let report = self.store.dispatch_pending(self.config.batch_size).await?;
        record_report(&report);
        if report.entries() > 0 {
            debug!(
                "Outbox batch: {} notifications ({} id-only), {} invalidations, {} tiles purged",
                report.notifications,
                report.id_only_notifications,
                report.invalidations,
                report.purged_tiles
            );
        }
        Ok(report)
    }

    /// Drains until the outbox is empty; returns the combined report.
    pub async fn drain(&self) -> Result<DispatchReport, StoreError> {
        let mut total = DispatchReport::default();
        loop {
            let report = self.run_once().await?;
            let entries = report.entries();
            total.notifications += report.notifications;
            total.id_only_notifications += report.id_only_notifications;
            total.invalidations += report.invalidations;
            total.purged_tiles += report.purged_tiles;
            if (entries as i64) < self.config.batch_size {
                return Ok(total);
            }
        }
    }

    /// Runs until [`OutboxDispatcher::shutdown`] is called.
    ///
    /// Store failures are logged and retried after the poll interval; the
    /// entries stay pending.
    pub async fn run(&self) {
        info!(
            "Outbox dispatcher started (batch size {}, poll interval {:?})",
            self.config.batch_size, self.config.poll_interval
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            let full_batch = match self.run_once().await {
                Ok(report) => report.entries() as i64 >= self.config.batch_size,
                Err(e) => {
                    error!("Outbox dispatch failed: {}", e);
                    false
                }
            };
            if full_batch {
                continue;
            }

            tokio::select! {
                _ = self.wake.notified() => {
                    debug!("Dispatcher woken");
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Outbox dispatcher stopped");
    }

    /// Stops the loop after the batch in progress.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

fn record_report(report: &DispatchReport) {
    let full = report.notifications - report.id_only_notifications;
    if full > 0 {
        metrics::counter!("geoproc_notifications_published_total", "tier" => "full")
            .increment(full as u64);
    }
    if report.id_only_notifications > 0 {
        metrics::counter!("geoproc_notifications_published_total", "tier" => "id_only")
            .increment(report.id_only_notifications as u64);
    }
    if report.invalidations > 0 {
        metrics::counter!("geoproc_tile_cache_invalidations_total")
            .increment(report.invalidations as u64);
    }
}
