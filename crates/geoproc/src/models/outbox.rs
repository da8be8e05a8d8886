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

//! Outbox Model
//!
//! The outbox holds side effects that must happen if and only if the write
//! that caused them commits:
//! - a queue notification for every inserted queue row
//! - a tile-cache purge for every layer whose styling bindings changed
//!
//! Entries are written in the same transaction as their cause and deleted by
//! the dispatcher in the same transaction that performs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of deferred side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxKind {
    /// Publish `payload` on the channel named by `target`
    Notify,
    /// Purge cached tiles of the layer named by `target`
    InvalidateTileCache,
}

impl OutboxKind {
    /// Returns the string stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxKind::Notify => "notify",
            OutboxKind::InvalidateTileCache => "invalidate_tile_cache",
        }
    }

    /// Parses a `kind` column value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "notify" => Some(OutboxKind::Notify),
            "invalidate_tile_cache" => Some(OutboxKind::InvalidateTileCache),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a pending outbox entry (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Auto-incrementing primary key (BIGSERIAL); drain order
    pub id: i64,
    pub kind: OutboxKind,
    /// Channel name for notifications, layer name for invalidations
    pub target: String,
    /// Notification body; unused for invalidations
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Structure for creating new outbox entries (domain type).
///
/// `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOutboxEntry {
    pub kind: OutboxKind,
    pub target: String,
    pub payload: Option<String>,
}

impl NewOutboxEntry {
    pub fn notify(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: OutboxKind::Notify,
            target: channel.into(),
            payload: Some(payload.into()),
        }
    }

    pub fn invalidate_tile_cache(layer_name: impl Into<String>) -> Self {
        Self {
            kind: OutboxKind::InvalidateTileCache,
            target: layer_name.into(),
            payload: None,
        }
    }
}

/// What one drain of the outbox accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Notifications published
    pub notifications: usize,
    /// Of those, notifications that only carried the message id
    pub id_only_notifications: usize,
    /// Invalidation entries processed
    pub invalidations: usize,
    /// Tile-cache rows deleted by those invalidations
    pub purged_tiles: u64,
}

impl DispatchReport {
    /// Number of outbox entries consumed.
    pub fn entries(&self) -> usize {
        self.notifications + self.invalidations
    }
}
