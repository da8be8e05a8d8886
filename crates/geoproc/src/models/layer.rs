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

//! Catalog-side views of layers and their columns.
//!
//! These are read-only projections of the host catalog; nothing in this crate
//! writes catalog rows.

use serde::{Deserialize, Serialize};

use super::geometry::GeometryType;

/// A registered geometry layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    /// Unique table name the layer is registered under
    pub table_name: String,
    /// Raw geometry type string as stored in the catalog
    pub geometry_type: String,
}

impl LayerInfo {
    pub fn new(table_name: impl Into<String>, geometry_type: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            geometry_type: geometry_type.into(),
        }
    }

    /// The parsed geometry type, `None` when the catalog holds a non-standard type.
    pub fn geometry(&self) -> Option<GeometryType> {
        GeometryType::from_catalog(&self.geometry_type)
    }
}

/// One column of a physical table, as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }
}
