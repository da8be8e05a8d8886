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

//! # geoproc
//!
//! Admission, validation and durable queueing of asynchronous geoprocessing
//! jobs (clip, dissolve, merge, union, intersect, spatial join, difference)
//! plus the export and import producers that share the same queue.
//!
//! A submission flows through:
//!
//! 1. [`Admission::authorize`]: administrators and holders of the catalog's
//!    internal role may queue geoprocessing jobs.
//! 2. [`admission::validator::validate`]: the operation's rules, checked in a
//!    fixed order against the layer catalog and the physical schema. The first
//!    failing rule is reported.
//! 3. [`EnvelopeBuilder`]: the validated request becomes a [`JobEnvelope`]
//!    addressed to the operation's worker actor.
//! 4. [`QueueStore::enqueue`]: the envelope is written as a `queued` row and
//!    its enqueue notification is recorded in the outbox, in one transaction.
//! 5. [`OutboxDispatcher`]: publishes notifications on
//!    `<prefix>.<queue>.enqueue` (the full envelope below 8000 bytes, the
//!    message id otherwise) and performs pending tile-cache purges.
//!
//! Workers consume rows outside this crate; the queue table's trigger only
//! lets them move a row `queued → consumed → done | rejected`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use geoproc::{Admission, Database, DAL, PgCatalog, OperationKind, Submitter};
//!
//! let database = Database::try_new(&url, "gis", 10)?;
//! database.run_migrations().await?;
//! let dal = Arc::new(DAL::new(database.clone()));
//! let catalog = Arc::new(PgCatalog::new(database));
//! let admission = Admission::new(catalog, dal.clone(), dal.settings());
//!
//! let job = admission
//!     .submit_body(&Submitter::admin(user_id), OperationKind::Dissolve, &body)
//!     .await?;
//! ```
//!
//! In-memory stores ([`MemoryCatalog`], [`MemoryQueue`]) implement the same
//! traits for tests and local runs.

pub mod admission;
pub mod cache;
pub mod catalog;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod models;
pub mod queue;

pub use admission::{Admission, AdmittedJob, JobRequest, OperationKind, ValidatedJob};
pub use cache::{cache_key_prefix, ClassColumns, LayerStyleChange, TileCacheInvalidator};
pub use catalog::{Catalog, CatalogTables, MemoryCatalog, PgCatalog};
pub use dal::DAL;
pub use database::{Database, SchemaError};
pub use dispatcher::{
    DispatcherConfig, EnqueueNotification, NotificationPolicy, OutboxDispatcher, QueueListener,
};
pub use envelope::{ActorName, EnvelopeBuilder, JobEnvelope};
pub use error::{AdmissionError, StoreError};
pub use logging::init_logging;
pub use models::{QueueRow, QueueRowStatus, QueueState, Submitter};
pub use queue::{MemoryQueue, OutboxStore, QueueSettings, QueueStore, TileCacheStore};
