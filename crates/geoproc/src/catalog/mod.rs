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

//! Catalog Accessor
//!
//! Read-only access to the host platform's layer registry and to the physical
//! schema behind it. Admission consults both because they can drift: a layer
//! may be registered while its table has been dropped, and a table may exist
//! without ever having been registered.
//!
//! Every method is side-effect free. Any I/O failure is returned as a
//! [`StoreError`]; the admission service turns it into
//! [`crate::AdmissionError::CatalogUnavailable`] before anything is queued.

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::connection::{validate_identifier, validate_schema_name, SchemaError};
use crate::error::StoreError;
use crate::models::{ColumnInfo, LayerInfo};

pub mod memory;
pub mod postgres;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

/// Read contract consumed from the host catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a registered layer by table name.
    async fn layer(&self, name: &str) -> Result<Option<LayerInfo>, StoreError>;

    /// Whether a physical table with this name exists in the catalog schema.
    async fn physical_table_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Returns the subset of `candidates` that are columns of `table`.
    async fn columns_of(&self, table: &str, candidates: &[String])
        -> Result<Vec<String>, StoreError>;

    /// Returns every column of the given tables, ordered by the position of
    /// the table in `tables` and then by column position.
    async fn column_types(&self, tables: &[String]) -> Result<Vec<ColumnInfo>, StoreError>;

    /// Identifier of the role allowed to submit geoprocessing jobs.
    async fn internal_role(&self) -> Result<Option<Uuid>, StoreError>;

    /// Whether `role` holds `read` permission on the collection `collection`.
    /// `None` stands for the public role.
    async fn can_read(&self, role: Option<Uuid>, collection: &str) -> Result<bool, StoreError>;
}

/// Names of the host catalog objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTables {
    /// Schema holding both the catalog tables and the layer tables
    pub schema: String,
    /// Layer registry, keyed by `layer_name`
    pub layers_table: String,
    /// Role registry, keyed by `name`
    pub roles_table: String,
    /// Per-role collection permissions
    pub permissions_table: String,
    /// Name of the role allowed to submit jobs
    pub internal_role_name: String,
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            layers_table: "vector_tiles".to_string(),
            roles_table: "directus_roles".to_string(),
            permissions_table: "directus_permissions".to_string(),
            internal_role_name: "Internal".to_string(),
        }
    }
}

impl CatalogTables {
    /// Checks every configurable SQL identifier before it is spliced into a
    /// statement. `internal_role_name` is a bound value and is not checked.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_schema_name(&self.schema)?;
        validate_identifier(&self.layers_table)?;
        validate_identifier(&self.roles_table)?;
        validate_identifier(&self.permissions_table)?;
        Ok(())
    }
}
