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

//! Error types for admission and storage.
//!
//! [`AdmissionError::InvalidSubmission`] and [`AdmissionError::Forbidden`] are
//! client-caused and deterministic, while [`AdmissionError::CatalogUnavailable`]
//! and [`AdmissionError::QueueWriteFailure`] wrap a [`StoreError`] and may
//! succeed on a later attempt.

use thiserror::Error;

/// Infrastructure faults raised by the Postgres layer and the in-memory stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A pooled connection could not be obtained or the blocking task failed.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The database rejected a statement.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A JSON document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value does not match what the schema promises.
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    /// A record the system depends on is missing.
    #[error("Missing record: {0}")]
    MissingRecord(String),

    /// Running embedded migrations failed.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The backing store refused service (used by the in-memory stores).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a rejected admission.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The submission breaks one of the operation's rules.
    #[error("Invalid submission: {reason}")]
    InvalidSubmission { reason: String },

    /// The submitter is not allowed to queue this kind of job.
    #[error("Submitter is not allowed to queue this job")]
    Forbidden,

    /// Catalog or physical-schema state could not be read.
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(#[source] StoreError),

    /// The envelope was built but could not be durably queued.
    #[error("Failed to queue job: {0}")]
    QueueWriteFailure(#[source] StoreError),
}

impl AdmissionError {
    /// Shorthand for an [`AdmissionError::InvalidSubmission`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        AdmissionError::InvalidSubmission {
            reason: reason.into(),
        }
    }

    /// Whether the caller may usefully retry the whole admission.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdmissionError::CatalogUnavailable(_) | AdmissionError::QueueWriteFailure(_)
        )
    }

    /// The human readable rejection reason, if this is a rule failure.
    pub fn reason(&self) -> Option<&str> {
        match self {
            AdmissionError::InvalidSubmission { reason } => Some(reason),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            AdmissionError::InvalidSubmission { .. } => "invalid",
            AdmissionError::Forbidden => "forbidden",
            AdmissionError::CatalogUnavailable(_) => "catalog_unavailable",
            AdmissionError::QueueWriteFailure(_) => "queue_write_failure",
        }
    }
}
