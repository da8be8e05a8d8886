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

//! Tile cache DAL
//!
//! The cache table belongs to the tile server: `key text primary key`,
//! `value bytea`, `expired_at timestamp` (UTC, without time zone).

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Text, Timestamp};

use super::DAL;
use crate::error::StoreError;

/// Data access for the rendered-tile cache.
#[derive(Clone)]
pub struct TileCacheDAL<'a> {
    dal: &'a DAL,
}

impl<'a> TileCacheDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Deletes every tile whose key starts with `prefix`. The prefix is
    /// compared literally; `_` and `%` have no special meaning.
    pub async fn purge_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE left(key, char_length($1)) = $1",
            self.dal.settings().tile_cache_table()
        );
        let prefix = prefix.to_string();

        let conn = self.dal.database.get_connection().await?;
        let purged = conn
            .interact(move |conn| {
                diesel::sql_query(sql)
                    .bind::<Text, _>(prefix)
                    .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(purged as u64)
    }

    /// Deletes every tile that expired before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE expired_at < $1",
            self.dal.settings().tile_cache_table()
        );
        let now = now.naive_utc();

        let conn = self.dal.database.get_connection().await?;
        let purged = conn
            .interact(move |conn| {
                diesel::sql_query(sql)
                    .bind::<Timestamp, _>(now)
                    .execute(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;
        Ok(purged as u64)
    }
}
