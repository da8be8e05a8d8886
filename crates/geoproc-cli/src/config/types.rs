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

use serde::{Deserialize, Serialize};
use std::time::Duration;

use geoproc::dispatcher::DispatcherConfig;
use geoproc::{CatalogTables, QueueSettings};

/// Everything `geoproc` reads from its configuration file. Every section
/// and field is optional; missing values take the deployed defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoprocConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub catalog: CatalogConfig,
    pub tile_cache: TileCacheConfig,
    pub dispatcher: DispatcherSection,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub pool_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 4,
            schema: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub name: String,
    pub broker_prefix: String,
    pub notify_payload_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let settings = QueueSettings::default();
        Self {
            name: settings.queue_name().to_string(),
            broker_prefix: settings.broker_prefix().to_string(),
            notify_payload_limit: settings.notify_payload_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub schema: String,
    pub layers_table: String,
    pub roles_table: String,
    pub permissions_table: String,
    pub internal_role_name: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let tables = CatalogTables::default();
        Self {
            schema: tables.schema,
            layers_table: tables.layers_table,
            roles_table: tables.roles_table,
            permissions_table: tables.permissions_table,
            internal_role_name: tables.internal_role_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileCacheConfig {
    pub table: String,
    /// How often `dispatch` sweeps expired tiles
    pub sweep_interval_secs: u64,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            table: QueueSettings::default().tile_cache_table().to_string(),
            sweep_interval_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSection {
    pub poll_interval_ms: u64,
    pub batch_size: i64,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        let config = DispatcherConfig::default();
        Self {
            poll_interval_ms: config.poll_interval().as_millis() as u64,
            batch_size: config.batch_size(),
        }
    }
}

impl GeoprocConfig {
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings::builder()
            .queue_name(&self.queue.name)
            .broker_prefix(&self.queue.broker_prefix)
            .notify_payload_limit(self.queue.notify_payload_limit)
            .tile_cache_table(&self.tile_cache.table)
            .build()
    }

    pub fn catalog_tables(&self) -> CatalogTables {
        CatalogTables {
            schema: self.catalog.schema.clone(),
            layers_table: self.catalog.layers_table.clone(),
            roles_table: self.catalog.roles_table.clone(),
            permissions_table: self.catalog.permissions_table.clone(),
            internal_role_name: self.catalog.internal_role_name.clone(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::builder()
            .poll_interval(Duration::from_millis(self.dispatcher.poll_interval_ms))
            .batch_size(self.dispatcher.batch_size)
            .build()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.tile_cache.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let config = GeoprocConfig::default();
        assert_eq!(config.queue_settings(), QueueSettings::default());
        assert_eq!(config.catalog_tables(), CatalogTables::default());
        assert_eq!(config.dispatcher_config(), DispatcherConfig::default());
        assert_eq!(config.sweep_interval(), Duration::from_secs(1800));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: GeoprocConfig = toml::from_str(
            r#"
            [queue]
            name = "exports"

            [dispatcher]
            batch_size = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.name, "exports");
        assert_eq!(config.queue.broker_prefix, "dramatiq");
        assert_eq!(config.dispatcher.batch_size, 10);
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(
            config.queue_settings().notification_policy().channel("exports"),
            "dramatiq.exports.enqueue"
        );
    }
}
