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

//! In-memory catalog.
//!
//! Lets the admission pipeline run without a database. Layers (registry
//! entries) and physical tables are tracked separately so drift between the
//! two can be reproduced.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::Catalog;
use crate::error::StoreError;
use crate::models::{ColumnInfo, LayerInfo};

#[derive(Debug, Default)]
struct CatalogState {
    layers: HashMap<String, LayerInfo>,
    /// Physical tables with their columns in ordinal order.
    tables: HashMap<String, Vec<(String, String)>>,
    internal_role: Option<Uuid>,
    /// `(role, collection)` pairs holding read permission.
    readable: HashSet<(Option<Uuid>, String)>,
}

/// Builder-style catalog fixture.
///
/// ```
/// use geoproc::catalog::MemoryCatalog;
///
/// let catalog = MemoryCatalog::new()
///     .with_layer_table("parcels", "POLYGON", &[("district", "text")]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    unavailable: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer without creating its physical table.
    pub fn with_layer(self, name: &str, geometry_type: &str) -> Self {
        self.add_layer(name, geometry_type);
        self
    }

    /// Creates a physical table without registering it as a layer.
    pub fn with_table(self, name: &str, columns: &[(&str, &str)]) -> Self {
        self.add_table(name, columns);
        self
    }

    /// Registers a layer and creates its physical table.
    pub fn with_layer_table(self, name: &str, geometry_type: &str, columns: &[(&str, &str)]) -> Self {
        self.with_layer(name, geometry_type).with_table(name, columns)
    }

    pub fn with_internal_role(self, role: Uuid) -> Self {
        self.state.write().internal_role = Some(role);
        self
    }

    /// Grants `role` read permission on `collection`.
    pub fn with_read_permission(self, role: Option<Uuid>, collection: &str) -> Self {
        self.state
            .write()
            .readable
            .insert((role, collection.to_string()));
        self
    }

    pub fn add_layer(&self, name: &str, geometry_type: &str) {
        self.state
            .write()
            .layers
            .insert(name.to_string(), LayerInfo::new(name, geometry_type));
    }

    /// Adds a physical table. Every table gets `ogc_fid` and `geom` first, the
    /// way loaded layers do.
    pub fn add_table(&self, name: &str, columns: &[(&str, &str)]) {
        let mut all = vec![
            ("ogc_fid".to_string(), "integer".to_string()),
            ("geom".to_string(), "USER-DEFINED".to_string()),
        ];
        all.extend(
            columns
                .iter()
                .map(|(column, data_type)| (column.to_string(), data_type.to_string())),
        );
        self.state.write().tables.insert(name.to_string(), all);
    }

    pub fn drop_table(&self, name: &str) {
        self.state.write().tables.remove(name);
    }

    pub fn remove_layer(&self, name: &str) {
        self.state.write().layers.remove(name);
    }

    /// Makes every subsequent read fail, simulating a catalog outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn layer(&self, name: &str) -> Result<Option<LayerInfo>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().layers.get(name).cloned())
    }

    async fn physical_table_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.state.read().tables.contains_key(name))
    }

    async fn columns_of(
        &self,
        table: &str,
        candidates: &[String],
    ) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let state = self.state.read();
        let Some(columns) = state.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(columns
            .iter()
            .filter(|(column, _)| candidates.contains(column))
            .map(|(column, _)| column.clone())
            .collect())
    }

    async fn column_types(&self, tables: &[String]) -> Result<Vec<ColumnInfo>, StoreError> {
        self.check_available()?;
        let state = self.state.read();
        let mut out = Vec::new();
        for table in tables {
            if let Some(columns) = state.tables.get(table) {
                out.extend(
                    columns
                        .iter()
                        .map(|(column, data_type)| ColumnInfo::new(table, column, data_type)),
                );
            }
        }
        Ok(out)
    }

    async fn internal_role(&self) -> Result<Option<Uuid>, StoreError> {
        self.check_available()?;
        Ok(self.state.read().internal_role)
    }

    async fn can_read(&self, role: Option<Uuid>, collection: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .readable
            .contains(&(role, collection.to_string())))
    }
}
