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

//! Queue rows.
//!
//! This crate only ever inserts `queued` rows; the guard trigger installed by
//! the migrations enforces the rest of the lifecycle for the worker.

use chrono::Utc;
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::models::{NewPgOutboxEntry, NewPgQueueRow, PgQueueRow, PgQueueStatus};
use super::DAL;
use crate::database::schema::{geoprocessing_outbox, geoprocessing_queue};
use crate::envelope::JobEnvelope;
use crate::error::StoreError;
use crate::models::{NewOutboxEntry, QueueRow, QueueRowStatus, QueueState};

/// Data access for `geoprocessing_queue`.
#[derive(Clone)]
pub struct QueueDAL<'a> {
    dal: &'a DAL,
}

impl<'a> QueueDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Inserts the `queued` row and its enqueue notification in one transaction.
    pub async fn enqueue(
        &self,
        envelope: &JobEnvelope,
        uploader: Option<Uuid>,
    ) -> Result<QueueRow, StoreError> {
        let policy = self.dal.settings().notification_policy();
        let notification = NewOutboxEntry::notify(
            policy.channel(&envelope.queue_name),
            policy.payload(envelope)?.into_body(),
        );

        let row = QueueRow::queued(envelope.clone(), uploader, Utc::now());
        let new_row = NewPgQueueRow {
            message_id: row.message_id,
            queue_name: row.queue_name.clone(),
            state: QueueState::Queued.as_str().to_string(),
            mtime: row.mtime,
            message: serde_json::to_value(envelope)?,
            uploader,
        };
        let new_entry = NewPgOutboxEntry::from(notification);

        let conn = self.dal.database.get_connection().await?;
        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(geoprocessing_queue::table)
                    .values(&new_row)
                    .execute(conn)?;
                diesel::insert_into(geoprocessing_outbox::table)
                    .values(&new_entry)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        debug!("Inserted queue row {}", row.message_id);
        Ok(row)
    }

    /// Fetches a full row, envelope included.
    pub async fn get(&self, message_id: Uuid) -> Result<Option<QueueRow>, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let row: Option<PgQueueRow> = conn
            .interact(move |conn| {
                geoprocessing_queue::table
                    .find(message_id)
                    .select(PgQueueRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(QueueRow::try_from).transpose()
    }

    pub async fn status(&self, message_id: Uuid) -> Result<Option<QueueRowStatus>, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let row: Option<PgQueueStatus> = conn
            .interact(move |conn| {
                geoprocessing_queue::table
                    .find(message_id)
                    .select(PgQueueStatus::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(QueueRowStatus::try_from).transpose()
    }

    pub async fn count_by_state(&self, state: QueueState) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let state = state.as_str().to_string();
        let count = conn
            .interact(move |conn| {
                geoprocessing_queue::table
                    .filter(geoprocessing_queue::state.eq(state))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }
}
