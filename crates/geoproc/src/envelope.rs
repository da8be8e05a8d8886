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

//! Job Envelope Builder
//!
//! The envelope is the message stored in the queue row and delivered to
//! workers:
//!
//! ```json
//! {
//!   "args": [],
//!   "kwargs": { "input_table": "parcels", "user_id": "..." },
//!   "options": {},
//!   "actor_name": "dissolve",
//!   "message_id": "5f0c...",
//!   "queue_name": "default",
//!   "message_timestamp": "1730419200000"
//! }
//! ```
//!
//! The message id is also the queue row's primary key, which is what lets an
//! oversized notification shrink to just the id.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::admission::request::{ImportArgs, JobRequest};
use crate::admission::validator::ValidatedJob;

/// Worker behaviors a job can be addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorName {
    Clip,
    Dissolve,
    Merge,
    Union,
    Intersect,
    SpatialJoin,
    Difference,
    Export,
    /// Raster uploads
    Tiling,
    /// Vector uploads
    Transform,
}

impl ActorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorName::Clip => "clip",
            ActorName::Dissolve => "dissolve",
            ActorName::Merge => "merge",
            ActorName::Union => "union",
            ActorName::Intersect => "intersect",
            ActorName::SpatialJoin => "spatial_join",
            ActorName::Difference => "difference",
            ActorName::Export => "export",
            ActorName::Tiling => "tiling",
            ActorName::Transform => "transform",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "clip" => Some(ActorName::Clip),
            "dissolve" => Some(ActorName::Dissolve),
            "merge" => Some(ActorName::Merge),
            "union" => Some(ActorName::Union),
            "intersect" => Some(ActorName::Intersect),
            "spatial_join" => Some(ActorName::SpatialJoin),
            "difference" => Some(ActorName::Difference),
            "export" => Some(ActorName::Export),
            "tiling" => Some(ActorName::Tiling),
            "transform" => Some(ActorName::Transform),
            _ => None,
        }
    }

    /// The actor a request is addressed to.
    pub fn for_request(request: &JobRequest) -> Self {
        match request {
            JobRequest::Clip(_) => ActorName::Clip,
            JobRequest::Dissolve(_) => ActorName::Dissolve,
            JobRequest::Merge(_) => ActorName::Merge,
            JobRequest::Union(_) => ActorName::Union,
            JobRequest::Intersect(_) => ActorName::Intersect,
            JobRequest::SpatialJoin(_) => ActorName::SpatialJoin,
            JobRequest::Difference(_) => ActorName::Difference,
            JobRequest::Export(_) => ActorName::Export,
            JobRequest::Import(ImportArgs { format_file, .. }) if format_file == "tif" => {
                ActorName::Tiling
            }
            JobRequest::Import(_) => ActorName::Transform,
        }
    }
}

impl std::fmt::Display for ActorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ActorName> for String {
    fn from(actor: ActorName) -> Self {
        actor.as_str().to_string()
    }
}

/// The canonical queue message.
///
/// `actor_name` is kept as a plain string: the queue is shared with producers
/// outside this crate and rows may name actors unknown here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub options: Map<String, Value>,
    pub actor_name: String,
    pub message_id: Uuid,
    pub queue_name: String,
    /// Milliseconds since the Unix epoch, as a decimal string
    pub message_timestamp: String,
}

impl JobEnvelope {
    /// The actor, when it is one this crate knows.
    pub fn actor(&self) -> Option<ActorName> {
        ActorName::from_str(&self.actor_name)
    }

    /// Parses `message_timestamp` back into a point in time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.message_timestamp
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Turns validated jobs into envelopes for one queue.
///
/// Timestamps handed out by a builder and its clones never decrease, even
/// when the wall clock steps back.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    queue_name: String,
    last_millis: Arc<AtomicI64>,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new("default")
    }
}

impl EnvelopeBuilder {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            last_millis: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Builds the envelope with a fresh message id and the current time.
    pub fn build(&self, job: &ValidatedJob) -> JobEnvelope {
        self.build_with(job, Uuid::new_v4(), Utc::now())
    }

    /// Builds the envelope with an explicit message id and timestamp. `at` is
    /// raised to the latest timestamp this builder has issued.
    pub fn build_with(&self, job: &ValidatedJob, message_id: Uuid, at: DateTime<Utc>) -> JobEnvelope {
        let at_millis = at.timestamp_millis();
        let millis = self
            .last_millis
            .fetch_max(at_millis, Ordering::SeqCst)
            .max(at_millis);
        JobEnvelope {
            args: Vec::new(),
            kwargs: kwargs(job),
            options: Map::new(),
            actor_name: ActorName::for_request(job.request()).into(),
            message_id,
            queue_name: self.queue_name.clone(),
            message_timestamp: millis.to_string(),
        }
    }
}

fn kwargs(job: &ValidatedJob) -> Map<String, Value> {
    let user_id = json!(job.user_id());
    let value = match job.request() {
        JobRequest::Clip(args) => json!({
            "input_table": args.input_table,
            "clip_table": args.clip_table,
            "output_table": args.output_table,
            "user_id": user_id,
            "filter": args.filter,
        }),
        JobRequest::Dissolve(args) => json!({
            "input_table": args.input_table,
            "fields": args.fields,
            "output_table": args.output_table,
            "user_id": user_id,
            "filter": args.filter,
        }),
        JobRequest::Merge(args)
        | JobRequest::Union(args)
        | JobRequest::Intersect(args)
        | JobRequest::Difference(args) => json!({
            "input_table": args.input_table,
            "output_table": args.output_table,
            "user_id": user_id,
        }),
        JobRequest::SpatialJoin(args) => json!({
            "target_table": args.target_table,
            "join_table": args.join_table,
            "output_table": args.output_table,
            "user_id": user_id,
            "filter": args.filter,
        }),
        JobRequest::Export(args) => json!({
            "table_name": args.table_name,
            "format_file": args.format,
            "downloader": user_id,
        }),
        JobRequest::Import(args) => json!({
            "object_key": args.object_key,
            "table_name": args.table_name,
            "uploader": user_id,
            "format_file": args.format_file,
            "is_zipped": args.is_zipped,
            "raster_alias": args.raster_alias,
            "minzoom": args.minzoom,
            "maxzoom": args.maxzoom,
        }),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
