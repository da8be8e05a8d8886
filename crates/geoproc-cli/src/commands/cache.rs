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

//! `geoproc cache`

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use geoproc::TileCacheInvalidator;
use tracing::info;

use super::Environment;

fn invalidator(env: &Environment) -> Result<TileCacheInvalidator> {
    let dal = Arc::new(env.dal()?);
    Ok(TileCacheInvalidator::new(dal.clone(), dal))
}

pub async fn purge_expired(env: &Environment) -> Result<()> {
    let purged = invalidator(env)?
        .purge_expired(Utc::now())
        .await
        .context("Failed to purge expired tiles")?;
    info!("Deleted {} expired tile(s)", purged);
    Ok(())
}

pub async fn invalidate(env: &Environment, layer: &str) -> Result<()> {
    invalidator(env)?
        .invalidate_now(layer)
        .await
        .with_context(|| format!("Failed to invalidate tiles of '{}'", layer))?;
    Ok(())
}
