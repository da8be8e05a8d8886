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

//! Command implementations.

use anyhow::{Context, Result};
use geoproc::{Database, PgCatalog, DAL};

use crate::config::GeoprocConfig;

pub mod cache;
pub mod dispatch;
pub mod migrate;
pub mod status;
pub mod submit;
pub mod watch;

/// Configuration and connection details shared by every command.
pub struct Environment {
    config: GeoprocConfig,
    database_url: Option<String>,
}

impl Environment {
    /// `database_url` from the command line wins over the configuration file.
    pub fn new(config: GeoprocConfig, database_url: Option<String>) -> Self {
        let database_url = database_url.or_else(|| config.database.url.clone());
        Self {
            config,
            database_url,
        }
    }

    pub fn config(&self) -> &GeoprocConfig {
        &self.config
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().context(
            "Database URL is required. Set --database-url, DATABASE_URL, or database.url in the configuration file",
        )
    }

    pub fn connect(&self) -> Result<Database> {
        Database::try_new_with_schema(
            self.database_url()?,
            "",
            self.config.database.pool_size,
            self.config.database.schema.as_deref(),
        )
        .context("Failed to create database pool")
    }

    pub fn dal(&self) -> Result<DAL> {
        DAL::with_settings(self.connect()?, self.config.queue_settings())
            .context("Invalid queue settings")
    }

    pub fn catalog(&self) -> Result<PgCatalog> {
        PgCatalog::with_tables(self.connect()?, self.config.catalog_tables())
            .context("Invalid catalog settings")
    }
}
