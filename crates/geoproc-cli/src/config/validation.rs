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

use crate::config::{types::*, ValidationError};
use geoproc::database::validate_identifier;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for GeoprocConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors: Vec<ValidationError> = [
            self.database.validate(),
            self.queue.validate(),
            self.catalog_tables().validate().map_err(ValidationError::from),
            self.tile_cache.validate(),
            self.dispatcher.validate(),
            validate_log_level(self.log_level.as_deref()),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(ValidationError::InvalidDatabaseUrl { url: url.clone() });
            }
        }
        if self.pool_size == 0 || self.pool_size > 100 {
            return Err(ValidationError::InvalidPoolSize {
                size: self.pool_size,
            });
        }
        Ok(())
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // Queue names end up in channel names and row values, never in SQL text.
        if self.name.trim().is_empty() || self.name.contains('"') {
            return Err(ValidationError::InvalidQueueName {
                name: self.name.clone(),
            });
        }
        if self.notify_payload_limit == 0 {
            return Err(ValidationError::InvalidInterval {
                name: "queue.notify_payload_limit".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for TileCacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.table)?;
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidInterval {
                name: "tile_cache.sweep_interval_secs".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for DispatcherSection {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidInterval {
                name: "dispatcher.poll_interval_ms".to_string(),
            });
        }
        if self.batch_size <= 0 {
            return Err(ValidationError::InvalidInterval {
                name: "dispatcher.batch_size".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), ValidationError> {
    match level.map(str::to_lowercase).as_deref() {
        None | Some("error" | "warn" | "info" | "debug" | "trace") => Ok(()),
        Some(_) => Err(ValidationError::InvalidLogLevel {
            level: level.unwrap_or_default().to_string(),
        }),
    }
}
