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

//! Admission
//!
//! The entry point for submissions. A submission is authorized, validated
//! against the catalog, turned into an envelope and queued, in that order.
//! Nothing is written until every rule passed, and a failed queue write is
//! reported as such: the caller can retry the whole submission.
//!
//! ```rust,ignore
//! let admission = Admission::new(catalog, queue, &QueueSettings::default());
//! let job = admission
//!     .submit_body(&submitter, OperationKind::Dissolve, &body)
//!     .await?;
//! println!("queued {}", job.message_id);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::envelope::{EnvelopeBuilder, JobEnvelope};
use crate::error::{AdmissionError, StoreError};
use crate::models::{QueueRowStatus, Submitter};
use crate::queue::{QueueSettings, QueueStore};

pub mod request;
pub mod rules;
pub mod validator;

pub use request::{
    ClipArgs, DissolveArgs, ExportArgs, ExportFormat, ImportArgs, JobRequest, MultiInputArgs,
    OperationKind, SpatialJoinArgs,
};
pub use validator::ValidatedJob;

/// What the submitter gets back for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedJob {
    pub message_id: Uuid,
    pub actor_name: String,
    pub queue_name: String,
}

impl From<&JobEnvelope> for AdmittedJob {
    fn from(envelope: &JobEnvelope) -> Self {
        Self {
            message_id: envelope.message_id,
            actor_name: envelope.actor_name.clone(),
            queue_name: envelope.queue_name.clone(),
        }
    }
}

/// Authorizes, validates and queues job submissions.
#[derive(Clone)]
pub struct Admission {
    catalog: Arc<dyn Catalog>,
    queue: Arc<dyn QueueStore>,
    envelopes: EnvelopeBuilder,
    dispatcher_wake: Option<Arc<Notify>>,
}

impl Admission {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        queue: Arc<dyn QueueStore>,
        settings: &QueueSettings,
    ) -> Self {
        Self {
            catalog,
            queue,
            envelopes: EnvelopeBuilder::new(settings.queue_name()),
            dispatcher_wake: None,
        }
    }

    /// Wakes the outbox dispatcher after every successful enqueue.
    pub fn with_dispatcher_wake(mut self, wake: Arc<Notify>) -> Self {
        self.dispatcher_wake = Some(wake);
        self
    }

    /// Checks that `submitter` may queue jobs of `kind`.
    ///
    /// Geoprocessing jobs need an administrator or a holder of the internal
    /// role. A catalog without that role cannot authorize anyone and is
    /// reported as unavailable rather than as a refusal.
    pub async fn authorize(
        &self,
        submitter: &Submitter,
        kind: OperationKind,
    ) -> Result<(), AdmissionError> {
        if !kind.requires_internal_role() || submitter.admin {
            return Ok(());
        }

        let internal_role = self
            .catalog
            .internal_role()
            .await
            .map_err(AdmissionError::CatalogUnavailable)?
            .ok_or_else(|| {
                AdmissionError::CatalogUnavailable(StoreError::MissingRecord(
                    "internal role is not defined in the catalog".to_string(),
                ))
            })?;

        if submitter.role != Some(internal_role) {
            return Err(AdmissionError::Forbidden);
        }
        Ok(())
    }

    /// Checks that `submitter` may export `layer_name`.
    ///
    /// Non-administrators need read permission on the layer's collection.
    /// The check runs before the layer lookup, so a refusal does not reveal
    /// whether the layer exists.
    pub async fn authorize_export(
        &self,
        submitter: &Submitter,
        layer_name: &str,
    ) -> Result<(), AdmissionError> {
        if submitter.admin {
            return Ok(());
        }
        let readable = self
            .catalog
            .can_read(submitter.role, layer_name)
            .await
            .map_err(AdmissionError::CatalogUnavailable)?;
        if !readable {
            return Err(AdmissionError::Forbidden);
        }
        Ok(())
    }

    /// Authorizes and validates without queueing anything.
    pub async fn validate(
        &self,
        submitter: &Submitter,
        request: JobRequest,
    ) -> Result<ValidatedJob, AdmissionError> {
        let kind = request.kind();
        let result = self.authorize_and_validate(submitter, request).await;

        if let Err(err) = &result {
            record_outcome(kind, err.outcome());
            match err {
                AdmissionError::InvalidSubmission { reason } => {
                    debug!("Rejected {} submission: {}", kind, reason)
                }
                AdmissionError::Forbidden => {
                    debug!("Refused {} submission from {}", kind, submitter.user_id)
                }
                other => warn!("Could not validate {} submission: {}", kind, other),
            }
        }
        result
    }

    async fn authorize_and_validate(
        &self,
        submitter: &Submitter,
        request: JobRequest,
    ) -> Result<ValidatedJob, AdmissionError> {
        self.authorize(submitter, request.kind()).await?;
        if let JobRequest::Export(args) = &request {
            self.authorize_export(submitter, &args.table_name).await?;
        }
        validator::validate(self.catalog.as_ref(), submitter, request).await
    }

    /// Validates `request` and queues it.
    pub async fn submit(
        &self,
        submitter: &Submitter,
        request: JobRequest,
    ) -> Result<AdmittedJob, AdmissionError> {
        let kind = request.kind();
        let job = self.validate(submitter, request).await?;
        let envelope = self.envelopes.build(&job);

        if let Err(err) = self.queue.enqueue(&envelope, job.user_id()).await {
            record_outcome(kind, "queue_write_failure");
            warn!("Failed to queue {} job: {}", kind, err);
            return Err(AdmissionError::QueueWriteFailure(err));
        }

        if let Some(wake) = &self.dispatcher_wake {
            wake.notify_one();
        }
        record_outcome(kind, "admitted");
        info!(
            "Queued {} job {} on '{}'",
            envelope.actor_name, envelope.message_id, envelope.queue_name
        );
        Ok(AdmittedJob::from(&envelope))
    }

    /// Types a JSON request body and submits it.
    pub async fn submit_body(
        &self,
        submitter: &Submitter,
        kind: OperationKind,
        body: &Value,
    ) -> Result<AdmittedJob, AdmissionError> {
        let request = match JobRequest::from_body(kind, body) {
            Ok(request) => request,
            Err(err) => {
                record_outcome(kind, err.outcome());
                debug!("Rejected {} submission: {}", kind, err);
                return Err(err);
            }
        };
        self.submit(submitter, request).await
    }

    /// Polls a queued job.
    pub async fn status(&self, message_id: Uuid) -> Result<Option<QueueRowStatus>, StoreError> {
        self.queue.status(message_id).await
    }
}

fn record_outcome(kind: OperationKind, outcome: &'static str) {
    metrics::counter!(
        "geoproc_admissions_total",
        "operation" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}
