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

//! In-memory queue, outbox and tile cache.
//!
//! Behaves like the PostgreSQL stores for a single process: enqueue and its
//! outbox entry happen under one lock, and a drain publishes into an
//! in-memory log instead of `pg_notify`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{OutboxStore, QueueSettings, QueueStore, TileCacheStore};
use crate::cache::cache_key_prefix;
use crate::dispatcher::notification::NotificationPayload;
use crate::envelope::JobEnvelope;
use crate::error::StoreError;
use crate::models::{
    DispatchReport, NewOutboxEntry, OutboxEntry, OutboxKind, QueueRow, QueueRowStatus, QueueState,
};

/// A notification as it would have gone over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedNotification {
    pub channel: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<Uuid, QueueRow>,
    outbox: Vec<OutboxEntry>,
    next_outbox_id: i64,
    tiles: BTreeMap<String, Option<DateTime<Utc>>>,
    published: Vec<PublishedNotification>,
}

/// Single-process stand-in for the PostgreSQL stores.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    settings: QueueSettings,
    state: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(Inner::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Makes every subsequent operation fail, simulating a database outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every notification published so far, in order.
    pub fn published(&self) -> Vec<PublishedNotification> {
        self.state.lock().published.clone()
    }

    /// Every stored row, in no particular order.
    pub fn rows(&self) -> Vec<QueueRow> {
        self.state.lock().rows.values().cloned().collect()
    }

    pub fn row(&self, message_id: Uuid) -> Option<QueueRow> {
        self.state.lock().rows.get(&message_id).cloned()
    }

    /// Applies a worker-side state change, refusing the same transitions the
    /// database guard refuses.
    pub fn transition(
        &self,
        message_id: Uuid,
        next: QueueState,
        result: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let row = state
            .rows
            .get_mut(&message_id)
            .ok_or_else(|| StoreError::MissingRecord(format!("queue row {}", message_id)))?;
        if !row.state.can_transition_to(next) {
            return Err(StoreError::InvalidData(format!(
                "illegal geoprocessing_queue transition {} -> {} for {}",
                row.state, next, message_id
            )));
        }
        row.state = next;
        row.mtime = Utc::now();
        if result.is_some() {
            row.result = result;
        }
        Ok(())
    }

    /// Adds a cached tile.
    pub fn insert_tile(&self, key: &str, expired_at: Option<DateTime<Utc>>) {
        self.state.lock().tiles.insert(key.to_string(), expired_at);
    }

    /// Keys of every cached tile, sorted.
    pub fn tile_keys(&self) -> Vec<String> {
        self.state.lock().tiles.keys().cloned().collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("queue store is offline".to_string()));
        }
        Ok(())
    }

    fn push_outbox(state: &mut Inner, entry: NewOutboxEntry) {
        state.next_outbox_id += 1;
        let id = state.next_outbox_id;
        state.outbox.push(OutboxEntry {
            id,
            kind: entry.kind,
            target: entry.target,
            payload: entry.payload,
            created_at: Utc::now(),
        });
    }

    fn purge_prefix_locked(state: &mut Inner, prefix: &str) -> u64 {
        let before = state.tiles.len();
        state.tiles.retain(|key, _| !key.starts_with(prefix));
        (before - state.tiles.len()) as u64
    }
}

#[async_trait]
impl QueueStore for MemoryQueue {
    async fn enqueue(
        &self,
        envelope: &JobEnvelope,
        uploader: Option<Uuid>,
    ) -> Result<QueueRow, StoreError> {
        self.check_available()?;
        let policy = self.settings.notification_policy();
        let payload = policy.payload(envelope)?;
        let row = QueueRow::queued(envelope.clone(), uploader, Utc::now());

        let mut state = self.state.lock();
        if state.rows.contains_key(&row.message_id) {
            return Err(StoreError::InvalidData(format!(
                "duplicate message id {}",
                row.message_id
            )));
        }
        state.rows.insert(row.message_id, row.clone());
        Self::push_outbox(
            &mut state,
            NewOutboxEntry::notify(policy.channel(&row.queue_name), payload.into_body()),
        );
        Ok(row)
    }

    async fn status(&self, message_id: Uuid) -> Result<Option<QueueRowStatus>, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().rows.get(&message_id).map(QueueRow::status))
    }

    async fn count_by_state(&self, state: QueueState) -> Result<i64, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .rows
            .values()
            .filter(|row| row.state == state)
            .count() as i64)
    }
}

#[async_trait]
impl OutboxStore for MemoryQueue {
    async fn record_invalidation(&self, layer_name: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        Self::push_outbox(&mut state, NewOutboxEntry::invalidate_tile_cache(layer_name));
        Ok(())
    }

    async fn dispatch_pending(&self, limit: i64) -> Result<DispatchReport, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let take = (limit.max(0) as usize).min(state.outbox.len());
        let batch: Vec<OutboxEntry> = state.outbox.drain(..take).collect();

        let mut report = DispatchReport::default();
        for entry in batch {
            match entry.kind {
                OutboxKind::Notify => {
                    let payload = entry.payload.unwrap_or_default();
                    if let NotificationPayload::IdOnly(_) =
                        NotificationPayload::classify(payload.clone())
                    {
                        report.id_only_notifications += 1;
                    }
                    state.published.push(PublishedNotification {
                        channel: entry.target,
                        payload,
                    });
                    report.notifications += 1;
                }
                OutboxKind::InvalidateTileCache => {
                    let prefix = cache_key_prefix(&entry.target);
                    report.purged_tiles += Self::purge_prefix_locked(&mut state, &prefix);
                    report.invalidations += 1;
                }
            }
        }
        Ok(report)
    }

    async fn count_pending(&self) -> Result<i64, StoreError> {
        self.check_available()?;
        Ok(self.state.lock().outbox.len() as i64)
    }
}

#[async_trait]
impl TileCacheStore for MemoryQueue {
    async fn purge_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check_available()?;
        Ok(Self::purge_prefix_locked(&mut self.state.lock(), prefix))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock();
        let before = state.tiles.len();
        state
            .tiles
            .retain(|_, expired_at| !matches!(expired_at, Some(at) if *at < now));
        Ok((before - state.tiles.len()) as u64)
    }
}
