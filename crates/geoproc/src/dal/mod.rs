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

//! Data Access Layer
//!
//! PostgreSQL implementations of the queue, outbox and tile-cache stores.
//! Blocking diesel work runs inside pooled `interact` closures; every
//! multi-statement operation runs in a single transaction.
//!
//! ```rust,ignore
//! let database = Database::try_new("postgres://localhost:5432", "geoproc", 10)?;
//! let dal = DAL::new(database);
//!
//! let pending = dal.outbox().count_pending().await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::connection::SchemaError;
use crate::database::Database;
use crate::envelope::JobEnvelope;
use crate::error::StoreError;
use crate::models::{DispatchReport, QueueRow, QueueRowStatus, QueueState};
use crate::queue::{OutboxStore, QueueSettings, QueueStore, TileCacheStore};

pub mod geoprocessing_queue;
pub mod models;
pub mod outbox;
pub mod tile_cache;

pub use geoprocessing_queue::QueueDAL;
pub use outbox::OutboxDAL;
pub use tile_cache::TileCacheDAL;

/// The Data Access Layer struct.
///
/// `DAL` is `Clone`; every clone shares the same connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
    settings: QueueSettings,
}

impl DAL {
    /// Creates a DAL with the default queue settings.
    pub fn new(database: Database) -> Self {
        DAL {
            database,
            settings: QueueSettings::default(),
        }
    }

    /// Creates a DAL with custom queue settings.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the tile cache table is not a plain identifier.
    pub fn with_settings(database: Database, settings: QueueSettings) -> Result<Self, SchemaError> {
        settings.validate()?;
        Ok(DAL { database, settings })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn queue(&self) -> QueueDAL<'_> {
        QueueDAL::new(self)
    }

    pub fn outbox(&self) -> OutboxDAL<'_> {
        OutboxDAL::new(self)
    }

    pub fn tile_cache(&self) -> TileCacheDAL<'_> {
        TileCacheDAL::new(self)
    }
}

#[async_trait]
impl QueueStore for DAL {
    async fn enqueue(
        &self,
        envelope: &JobEnvelope,
        uploader: Option<Uuid>,
    ) -> Result<QueueRow, StoreError> {
        self.queue().enqueue(envelope, uploader).await
    }

    async fn status(&self, message_id: Uuid) -> Result<Option<QueueRowStatus>, StoreError> {
        self.queue().status(message_id).await
    }

    async fn count_by_state(&self, state: QueueState) -> Result<i64, StoreError> {
        self.queue().count_by_state(state).await
    }
}

#[async_trait]
impl OutboxStore for DAL {
    async fn record_invalidation(&self, layer_name: &str) -> Result<(), StoreError> {
        self.outbox().record_invalidation(layer_name).await
    }

    async fn dispatch_pending(&self, limit: i64) -> Result<DispatchReport, StoreError> {
        self.outbox().dispatch_pending(limit).await
    }

    async fn count_pending(&self) -> Result<i64, StoreError> {
        self.outbox().count_pending().await
    }
}

#[async_trait]
impl TileCacheStore for DAL {
    async fn purge_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.tile_cache().purge_prefix(prefix).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.tile_cache().purge_expired(now).await
    }
}
