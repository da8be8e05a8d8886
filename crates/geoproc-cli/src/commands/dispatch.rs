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

//! `geoproc dispatch`
//!
//! Runs the outbox dispatcher until interrupted and sweeps expired tiles on
//! the configured interval. With `--once` the outbox is drained and the
//! command exits.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use geoproc::dispatcher::OutboxDispatcher;
use geoproc::TileCacheInvalidator;
use tracing::{error, info};

use super::Environment;

pub async fn run(env: &Environment, once: bool) -> Result<()> {
    let dal = Arc::new(env.dal()?);
    let dispatcher = Arc::new(OutboxDispatcher::new(
        dal.clone(),
        env.config().dispatcher_config(),
    ));

    if once {
        let report = dispatcher
            .drain()
            .await
            .context("Failed to drain the outbox")?;
        info!(
            "Published {} notification(s) ({} id-only), performed {} invalidation(s), purged {} tile(s)",
            report.notifications,
            report.id_only_notifications,
            report.invalidations,
            report.purged_tiles
        );
        return Ok(());
    }

    let invalidator = TileCacheInvalidator::new(dal.clone(), dal);
    let handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run().await }
    });

    let mut sweep = tokio::time::interval(env.config().sweep_interval());
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if let Err(e) = invalidator.purge_expired(Utc::now()).await {
                    error!("Expired tile sweep failed: {}", e);
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                info!("Shutting down");
                break;
            }
        }
    }

    dispatcher.shutdown();
    handle.await.context("Dispatcher task failed")?;
    Ok(())
}
