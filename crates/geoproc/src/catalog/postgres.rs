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

//! PostgreSQL catalog accessor.
//!
//! Layer and role lookups go to the host platform's registry tables; physical
//! existence and column metadata come from `information_schema`. Table and
//! schema names are spliced into SQL text only after identifier validation,
//! all values are bound.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{Array, Bool, Nullable, Text};
use tracing::debug;
use uuid::Uuid;

use super::{Catalog, CatalogTables};
use crate::database::connection::SchemaError;
use crate::database::Database;
use crate::error::StoreError;
use crate::models::{ColumnInfo, LayerInfo};

#[derive(QueryableByName)]
struct LayerRow {
    #[diesel(sql_type = Text)]
    layer_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    geometry_type: Option<String>,
}

#[derive(QueryableByName)]
struct Presence {
    #[diesel(sql_type = Bool)]
    present: bool,
}

#[derive(QueryableByName)]
struct ColumnName {
    #[diesel(sql_type = Text)]
    column_name: String,
}

#[derive(QueryableByName)]
struct ColumnRow {
    #[diesel(sql_type = Text)]
    table_name: String,
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    data_type: String,
}

#[derive(QueryableByName)]
struct RoleRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
}

/// Catalog accessor backed by the host platform's PostgreSQL database.
#[derive(Clone, Debug)]
pub struct PgCatalog {
    database: Database,
    tables: CatalogTables,
}

impl PgCatalog {
    /// Creates a catalog accessor using the default host table names.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            tables: CatalogTables::default(),
        }
    }

    /// Creates a catalog accessor with custom table names.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if any configured name is not a plain identifier.
    pub fn with_tables(database: Database, tables: CatalogTables) -> Result<Self, SchemaError> {
        tables.validate()?;
        Ok(Self { database, tables })
    }

    pub fn tables(&self) -> &CatalogTables {
        &self.tables
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn layer(&self, name: &str) -> Result<Option<LayerInfo>, StoreError> {
        let conn = self.database.get_connection().await?;
        let sql = format!(
            "SELECT layer_name::text AS layer_name, geometry_type::text AS geometry_type \
             FROM \"{}\".\"{}\" WHERE layer_name = $1 LIMIT 1",
            self.tables.schema, self.tables.layers_table
        );
        let name = name.to_string();

        let row: Option<LayerRow> = conn
            .interact(move |conn| {
                diesel::sql_query(sql)
                    .bind::<Text, _>(name)
                    .get_result::<LayerRow>(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(row.map(|row| LayerInfo::new(row.layer_name, row.geometry_type.unwrap_or_default())))
    }

    async fn physical_table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.database.get_connection().await?;
        let schema = self.tables.schema.clone();
        let name = name.to_string();

        let row: Presence = conn
            .interact(move |conn| {
                diesel::sql_query(
                    "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
                     WHERE table_schema = $1 AND table_name = $2) AS present",
                )
                .bind::<Text, _>(schema)
                .bind::<Text, _>(name)
                .get_result::<Presence>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(row.present)
    }

    async fn columns_of(
        &self,
        table: &str,
        candidates: &[String],
    ) -> Result<Vec<String>, StoreError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.database.get_connection().await?;
        let schema = self.tables.schema.clone();
        let table = table.to_string();
        let candidates = candidates.to_vec();

        let rows: Vec<ColumnName> = conn
            .interact(move |conn| {
                diesel::sql_query(
                    "SELECT column_name::text AS column_name FROM information_schema.columns \
                     WHERE table_schema = $1 AND table_name = $2 AND column_name::text = ANY($3) \
                     ORDER BY ordinal_position",
                )
                .bind::<Text, _>(schema)
                .bind::<Text, _>(table)
                .bind::<Array<Text>, _>(candidates)
                .load::<ColumnName>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(rows.into_iter().map(|row| row.column_name).collect())
    }

    async fn column_types(&self, tables: &[String]) -> Result<Vec<ColumnInfo>, StoreError> {
        if tables.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.database.get_connection().await?;
        let schema = self.tables.schema.clone();
        let tables = tables.to_vec();

        let rows: Vec<ColumnRow> = conn
            .interact(move |conn| {
                diesel::sql_query(
                    "SELECT table_name::text AS table_name, column_name::text AS column_name, \
                     data_type::text AS data_type FROM information_schema.columns \
                     WHERE table_schema = $1 AND table_name::text = ANY($2) \
                     ORDER BY array_position($2, table_name::text), ordinal_position",
                )
                .bind::<Text, _>(schema)
                .bind::<Array<Text>, _>(tables)
                .load::<ColumnRow>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        debug!("Loaded {} column definitions", rows.len());
        Ok(rows
            .into_iter()
            .map(|row| ColumnInfo::new(row.table_name, row.column_name, row.data_type))
            .collect())
    }

    async fn internal_role(&self) -> Result<Option<Uuid>, StoreError> {
        let conn = self.database.get_connection().await?;
        let sql = format!(
            "SELECT id FROM \"{}\".\"{}\" WHERE name = $1 LIMIT 1",
            self.tables.schema, self.tables.roles_table
        );
        let role_name = self.tables.internal_role_name.clone();

        let row: Option<RoleRow> = conn
            .interact(move |conn| {
                diesel::sql_query(sql)
                    .bind::<Text, _>(role_name)
                    .get_result::<RoleRow>(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(row.map(|row| row.id))
    }

    async fn can_read(&self, role: Option<Uuid>, collection: &str) -> Result<bool, StoreError> {
        let conn = self.database.get_connection().await?;
        // A NULL role row is the public role's permission.
        let sql = format!(
            "SELECT EXISTS( \
                SELECT 1 FROM \"{}\".\"{}\" \
                WHERE role IS NOT DISTINCT FROM $1 AND collection = $2 AND action = 'read' \
             ) AS present",
            self.tables.schema, self.tables.permissions_table
        );
        let collection = collection.to_string();

        let row: Presence = conn
            .interact(move |conn| {
                diesel::sql_query(sql)
                    .bind::<Nullable<diesel::sql_types::Uuid>, _>(role)
                    .bind::<Text, _>(collection)
                    .get_result::<Presence>(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(row.present)
    }
}
