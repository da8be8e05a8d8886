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

//! Tile cache invalidation.
//!
//! Rendered vector tiles are cached under keys of the form
//! `mvt_<layer>_<z>_<x>_<y>...`. When the styling bindings of a layer change,
//! its cached tiles no longer match and are purged. Layers with caching
//! disabled (`cache_duration <= 0`) have nothing to purge.
//!
//! Style changes are turned into outbox entries so the purge happens only if
//! the catalog update that caused it committed. Operators can also purge a
//! layer immediately or sweep expired tiles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::queue::{OutboxStore, TileCacheStore};

/// Prefix shared by every cached tile of `layer_name`.
pub fn cache_key_prefix(layer_name: &str) -> String {
    format!("mvt_{}_", layer_name)
}

/// The class-column bindings a layer's styling is derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassColumns {
    pub fill: Option<Value>,
    pub line: Option<Value>,
    pub circle: Option<Value>,
    pub symbol: Option<Value>,
}

/// An update of a layer's catalog entry, as seen by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyleChange {
    pub layer_name: String,
    /// Cache lifetime in seconds; zero or less disables caching
    pub cache_duration: i64,
    pub before: ClassColumns,
    pub after: ClassColumns,
}

impl LayerStyleChange {
    /// Whether cached tiles of the layer are stale after this change.
    ///
    /// An update that rewrites the class columns with their current values
    /// leaves the cache alone.
    pub fn requires_invalidation(&self) -> bool {
        self.cache_duration > 0 && self.before != self.after
    }
}

/// Purges cached tiles of layers whose styling changed.
#[derive(Clone)]
pub struct TileCacheInvalidator {
    outbox: Arc<dyn OutboxStore>,
    tiles: Arc<dyn TileCacheStore>,
    dispatcher_wake: Option<Arc<Notify>>,
}

impl TileCacheInvalidator {
    pub fn new(outbox: Arc<dyn OutboxStore>, tiles: Arc<dyn TileCacheStore>) -> Self {
        Self {
            outbox,
            tiles,
            dispatcher_wake: None,
        }
    }

    /// Wakes the outbox dispatcher after recording an invalidation.
    pub fn with_dispatcher_wake(mut self, wake: Arc<Notify>) -> Self {
        self.dispatcher_wake = Some(wake);
        self
    }

    /// Records a deferred purge when `change` makes cached tiles stale.
    ///
    /// Returns whether a purge was recorded.
    pub async fn on_style_change(&self, change: &LayerStyleChange) -> Result<bool, StoreError> {
        if !change.requires_invalidation() {
            debug!(
                "Style change of '{}' leaves the tile cache valid",
                change.layer_name
            );
            return Ok(false);
        }

        self.outbox.record_invalidation(&change.layer_name).await?;
        debug!("Recorded tile cache invalidation for '{}'", change.layer_name);
        if let Some(wake) = &self.dispatcher_wake {
            wake.notify_one();
        }
        Ok(true)
    }

    /// Purges every cached tile of `layer_name` now.
    pub async fn invalidate_now(&self, layer_name: &str) -> Result<u64, StoreError> {
        let purged = self
            .tiles
            .purge_prefix(&cache_key_prefix(layer_name))
            .await?;
        metrics::counter!("geoproc_tile_cache_invalidations_total").increment(1);
        info!("Purged {} cached tiles of '{}'", purged, layer_name);
        Ok(purged)
    }

    /// Deletes tiles that expired before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let purged = self.tiles.purge_expired(now).await?;
        if purged > 0 {
            info!("Swept {} expired cached tiles", purged);
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use serde_json::json;

    fn change(cache_duration: i64, fill_after: Value) -> LayerStyleChange {
        LayerStyleChange {
            layer_name: "parcels".to_string(),
            cache_duration,
            before: ClassColumns {
                fill: Some(json!(["district"])),
                ..Default::default()
            },
            after: ClassColumns {
                fill: Some(fill_after),
                ..Default::default()
            },
        }
    }

    fn invalidator(queue: &Arc<MemoryQueue>) -> TileCacheInvalidator {
        TileCacheInvalidator::new(queue.clone(), queue.clone())
    }

    #[test]
    fn test_prefix() {
        assert_eq!(cache_key_prefix("parcels"), "mvt_parcels_");
    }

    #[tokio::test]
    async fn test_only_effective_changes_are_recorded() {
        let queue = Arc::new(MemoryQueue::default());
        let invalidator = invalidator(&queue);

        assert!(!invalidator
            .on_style_change(&change(3600, json!(["district"])))
            .await
            .unwrap());
        assert!(!invalidator
            .on_style_change(&change(0, json!(["zone"])))
            .await
            .unwrap());
        assert_eq!(queue.count_pending().await.unwrap(), 0);

        assert!(invalidator
            .on_style_change(&change(3600, json!(["zone"])))
            .await
            .unwrap());
        assert_eq!(queue.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_is_deferred_to_the_dispatcher() {
        let queue = Arc::new(MemoryQueue::default());
        queue.insert_tile("mvt_parcels_1_0_0", None);
        queue.insert_tile("mvt_parcels_2_1_1", None);
        queue.insert_tile("mvt_parcels2_1_0_0", None);
        queue.insert_tile("mvt_roads_1_0_0", None);

        invalidator(&queue)
            .on_style_change(&change(60, json!(["zone"])))
            .await
            .unwrap();
        assert_eq!(queue.tile_keys().len(), 4);

        let report = queue.dispatch_pending(10).await.unwrap();
        assert_eq!(report.invalidations, 1);
        assert_eq!(report.purged_tiles, 2);
        assert_eq!(
            queue.tile_keys(),
            vec!["mvt_parcels2_1_0_0".to_string(), "mvt_roads_1_0_0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_underscore_is_not_a_wildcard() {
        let queue = Arc::new(MemoryQueue::default());
        queue.insert_tile("mvt_aXb_1_0_0", None);
        queue.insert_tile("mvt_a_b_1_0_0", None);

        let purged = invalidator(&queue).invalidate_now("a_b").await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(queue.tile_keys(), vec!["mvt_aXb_1_0_0".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let queue = Arc::new(MemoryQueue::default());
        let now = Utc::now();
        queue.insert_tile("mvt_a_1_0_0", Some(now - chrono::Duration::minutes(5)));
        queue.insert_tile("mvt_a_2_0_0", Some(now + chrono::Duration::minutes(5)));
        queue.insert_tile("mvt_a_3_0_0", None);

        let purged = invalidator(&queue).purge_expired(now).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(queue.tile_keys().len(), 2);
    }
}
