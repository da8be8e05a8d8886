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

//! Outbox DAL
//!
//! Entries are written in the same transaction as the change that caused
//! them. A drain deletes the oldest entries with `FOR UPDATE SKIP LOCKED`
//! and performs them in the same transaction, so concurrent dispatchers never
//! perform the same entry twice and a failed drain leaves every entry pending.
//!
//! `pg_notify` inside a transaction is delivered when that transaction
//! commits, which gives the notification the same fate as the deletion.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use tracing::{debug, warn};

use super::models::{NewPgOutboxEntry, PgOutboxEntry};
use super::DAL;
use crate::cache::cache_key_prefix;
use crate::database::schema::geoprocessing_outbox;
use crate::dispatcher::notification::NotificationPayload;
use crate::error::StoreError;
use crate::models::{DispatchReport, NewOutboxEntry, OutboxEntry, OutboxKind};

/// Data access for `geoprocessing_outbox`.
#[derive(Clone)]
pub struct OutboxDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OutboxDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Records a tile-cache purge for `layer_name`.
    pub async fn record_invalidation(&self, layer_name: &str) -> Result<(), StoreError> {
        let new_entry = NewPgOutboxEntry::from(NewOutboxEntry::invalidate_tile_cache(layer_name));
        let conn = self.dal.database.get_connection().await?;
        conn.interact(move |conn| {
            diesel::insert_into(geoprocessing_outbox::table)
                .values(&new_entry)
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(())
    }

    /// Lists pending entries, oldest first, without claiming them.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<OutboxEntry>, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let rows: Vec<PgOutboxEntry> = conn
            .interact(move |conn| {
                geoprocessing_outbox::table
                    .order(geoprocessing_outbox::id.asc())
                    .limit(limit)
                    .select(PgOutboxEntry::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    pub async fn count_pending(&self) -> Result<i64, StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let count = conn
            .interact(move |conn| geoprocessing_outbox::table.count().get_result::<i64>(conn))
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(count)
    }

    /// Claims, performs and deletes up to `limit` pending entries.
    pub async fn dispatch_pending(&self, limit: i64) -> Result<DispatchReport, StoreError> {
        let purge_sql = format!(
            "DELETE FROM \"{}\" WHERE left(key, char_length($1)) = $1",
            self.dal.settings().tile_cache_table()
        );

        #[derive(Debug, QueryableByName)]
        #[diesel(check_for_backend(diesel::pg::Pg))]
        struct ClaimedEntry {
            #[diesel(sql_type = BigInt)]
            id: i64,
            #[diesel(sql_type = Text)]
            kind: String,
            #[diesel(sql_type = Text)]
            target: String,
            #[diesel(sql_type = Nullable<Text>)]
            payload: Option<String>,
        }

        let conn = self.dal.database.get_connection().await?;
        let report = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    // Claim and delete in one statement; a failed effect below
                    // rolls the deletion back and the entries stay pending.
                    let mut claimed: Vec<ClaimedEntry> = diesel::sql_query(
                        r#"
                        DELETE FROM geoprocessing_outbox
                        WHERE id IN (
                            SELECT id FROM geoprocessing_outbox
                            ORDER BY id ASC
                            LIMIT $1
                            FOR UPDATE SKIP LOCKED
                        )
                        RETURNING id, kind, target, payload
                        "#,
                    )
                    .bind::<BigInt, _>(limit)
                    .load(conn)?;
                    claimed.sort_by_key(|entry| entry.id);

                    let mut report = DispatchReport::default();
                    for entry in claimed {
                        match OutboxKind::from_str(&entry.kind) {
                            Some(OutboxKind::Notify) => {
                                let payload = entry.payload.unwrap_or_default();
                                diesel::sql_query("SELECT pg_notify($1, $2)")
                                    .bind::<Text, _>(&entry.target)
                                    .bind::<Text, _>(&payload)
                                    .execute(conn)?;
                                if let NotificationPayload::IdOnly(_) =
                                    NotificationPayload::classify(payload)
                                {
                                    report.id_only_notifications += 1;
                                }
                                report.notifications += 1;
                            }
                            Some(OutboxKind::InvalidateTileCache) => {
                                let purged = diesel::sql_query(&purge_sql)
                                    .bind::<Text, _>(cache_key_prefix(&entry.target))
                                    .execute(conn)?;
                                report.purged_tiles += purged as u64;
                                report.invalidations += 1;
                            }
                            None => {
                                warn!(
                                    "Dropping outbox entry {} of unknown kind '{}'",
                                    entry.id, entry.kind
                                );
                            }
                        }
                    }
                    Ok(report)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        if report.entries() > 0 {
            debug!(
                "Dispatched {} notifications and {} invalidations",
                report.notifications, report.invalidations
            );
        }
        Ok(report)
    }
}
