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

//! PostgreSQL row models.
//!
//! Diesel structs for the tables this crate owns, converted to the domain
//! types at the DAL boundary.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::schema::{geoprocessing_outbox, geoprocessing_queue};
use crate::envelope::JobEnvelope;
use crate::error::StoreError;
use crate::models::{NewOutboxEntry, OutboxEntry, OutboxKind, QueueRow, QueueRowStatus, QueueState};

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = geoprocessing_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgQueueRow {
    pub message_id: Uuid,
    pub queue_name: String,
    pub state: String,
    pub mtime: DateTime<Utc>,
    pub message: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub result_ttl: Option<DateTime<Utc>>,
    pub uploader: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = geoprocessing_queue)]
pub struct NewPgQueueRow {
    pub message_id: Uuid,
    pub queue_name: String,
    pub state: String,
    pub mtime: DateTime<Utc>,
    pub message: serde_json::Value,
    pub uploader: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = geoprocessing_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgQueueStatus {
    pub message_id: Uuid,
    pub state: String,
    pub result: Option<serde_json::Value>,
    pub mtime: DateTime<Utc>,
    pub result_ttl: Option<DateTime<Utc>>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = geoprocessing_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgOutboxEntry {
    pub id: i64,
    pub kind: String,
    pub target: String,
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = geoprocessing_outbox)]
pub struct NewPgOutboxEntry {
    pub kind: String,
    pub target: String,
    pub payload: Option<String>,
}

fn parse_state(state: &str) -> Result<QueueState, StoreError> {
    QueueState::from_str(state)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown queue state '{}'", state)))
}

impl TryFrom<PgQueueRow> for QueueRow {
    type Error = StoreError;

    fn try_from(row: PgQueueRow) -> Result<Self, Self::Error> {
        let message: JobEnvelope = serde_json::from_value(row.message)?;
        Ok(QueueRow {
            message_id: row.message_id,
            queue_name: row.queue_name,
            state: parse_state(&row.state)?,
            mtime: row.mtime,
            message,
            result: row.result,
            result_ttl: row.result_ttl,
            uploader: row.uploader,
        })
    }
}

impl TryFrom<PgQueueStatus> for QueueRowStatus {
    type Error = StoreError;

    fn try_from(row: PgQueueStatus) -> Result<Self, Self::Error> {
        Ok(QueueRowStatus {
            message_id: row.message_id,
            state: parse_state(&row.state)?,
            result: row.result,
            mtime: row.mtime,
            result_ttl: row.result_ttl,
        })
    }
}

impl TryFrom<PgOutboxEntry> for OutboxEntry {
    type Error = StoreError;

    fn try_from(entry: PgOutboxEntry) -> Result<Self, Self::Error> {
        let kind = OutboxKind::from_str(&entry.kind)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown outbox kind '{}'", entry.kind)))?;
        Ok(OutboxEntry {
            id: entry.id,
            kind,
            target: entry.target,
            payload: entry.payload,
            created_at: entry.created_at,
        })
    }
}

impl From<NewOutboxEntry> for NewPgOutboxEntry {
    fn from(entry: NewOutboxEntry) -> Self {
        Self {
            kind: entry.kind.as_str().to_string(),
            target: entry.target,
            payload: entry.payload,
        }
    }
}
