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

//! Queue Store
//!
//! Durable storage of queued jobs plus the outbox of side effects that must
//! follow them. The traits here are implemented by the PostgreSQL
//! [`crate::dal::DAL`] and by [`MemoryQueue`].
//!
//! An enqueue writes the `queued` row and its notification entry in one unit
//! of work: either both become visible or neither does. The notification is
//! only published later, by the outbox dispatcher, once that unit committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::connection::{validate_identifier, SchemaError};
use crate::dispatcher::notification::{
    NotificationPolicy, DEFAULT_BROKER_PREFIX, DEFAULT_PAYLOAD_LIMIT,
};
use crate::envelope::JobEnvelope;
use crate::error::StoreError;
use crate::models::{DispatchReport, QueueRow, QueueRowStatus, QueueState};

pub mod memory;

pub use memory::MemoryQueue;

/// Durable job rows.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Inserts `envelope` as a `queued` row together with its enqueue notification.
    async fn enqueue(
        &self,
        envelope: &JobEnvelope,
        uploader: Option<Uuid>,
    ) -> Result<QueueRow, StoreError>;

    /// Read contract for submitters polling a job.
    async fn status(&self, message_id: Uuid) -> Result<Option<QueueRowStatus>, StoreError>;

    /// Number of rows currently in `state`.
    async fn count_by_state(&self, state: QueueState) -> Result<i64, StoreError>;
}

/// Pending side effects.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Records a tile-cache purge for `layer_name`.
    async fn record_invalidation(&self, layer_name: &str) -> Result<(), StoreError>;

    /// Performs up to `limit` pending side effects, oldest first, and removes
    /// them. Effects and removal commit together.
    async fn dispatch_pending(&self, limit: i64) -> Result<DispatchReport, StoreError>;

    async fn count_pending(&self) -> Result<i64, StoreError>;
}

/// The rendered-tile cache owned by the tile server.
#[async_trait]
pub trait TileCacheStore: Send + Sync {
    /// Deletes every cached tile whose key starts with `prefix`.
    async fn purge_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Deletes every cached tile that expired before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Queue naming, notification and cache settings.
///
/// ```rust,ignore
/// let settings = QueueSettings::builder()
///     .queue_name("exports")
///     .notify_payload_limit(4000)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    queue_name: String,
    broker_prefix: String,
    notify_payload_limit: usize,
    tile_cache_table: String,
}

impl QueueSettings {
    pub fn builder() -> QueueSettingsBuilder {
        QueueSettingsBuilder::default()
    }

    /// Queue new jobs are written to.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// First segment of the enqueue channel name.
    pub fn broker_prefix(&self) -> &str {
        &self.broker_prefix
    }

    /// Envelopes serializing to this many bytes or more are announced by id.
    pub fn notify_payload_limit(&self) -> usize {
        self.notify_payload_limit
    }

    /// Table holding rendered tiles.
    pub fn tile_cache_table(&self) -> &str {
        &self.tile_cache_table
    }

    pub fn notification_policy(&self) -> NotificationPolicy {
        NotificationPolicy::new(self.broker_prefix.clone(), self.notify_payload_limit)
    }

    /// The tile cache table name is spliced into SQL and must be a plain identifier.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_identifier(&self.tile_cache_table)?;
        Ok(())
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettingsBuilder::default().build()
    }
}

/// Builder for [`QueueSettings`].
#[derive(Debug, Clone)]
pub struct QueueSettingsBuilder {
    settings: QueueSettings,
}

impl Default for QueueSettingsBuilder {
    fn default() -> Self {
        Self {
            settings: QueueSettings {
                queue_name: "default".to_string(),
                broker_prefix: DEFAULT_BROKER_PREFIX.to_string(),
                notify_payload_limit: DEFAULT_PAYLOAD_LIMIT,
                tile_cache_table: "vector_tile_cache".to_string(),
            },
        }
    }
}

impl QueueSettingsBuilder {
    pub fn queue_name(mut self, value: impl Into<String>) -> Self {
        self.settings.queue_name = value.into();
        self
    }

    pub fn broker_prefix(mut self, value: impl Into<String>) -> Self {
        self.settings.broker_prefix = value.into();
        self
    }

    pub fn notify_payload_limit(mut self, value: usize) -> Self {
        self.settings.notify_payload_limit = value;
        self
    }

    pub fn tile_cache_table(mut self, value: impl Into<String>) -> Self {
        self.settings.tile_cache_table = value.into();
        self
    }

    pub fn build(self) -> QueueSettings {
        self.settings
    }
}
