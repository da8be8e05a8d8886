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

//! Two-tier enqueue notifications.
//!
//! Every queued job is announced on `<prefix>.<queue_name>.enqueue`. Small
//! envelopes travel in full so a worker can start without a read; envelopes
//! whose serialized form reaches the payload limit are announced as
//! `{"message_id": "..."}` and the worker fetches the row by primary key.
//! PostgreSQL refuses NOTIFY payloads of 8000 bytes or more, hence the default.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::JobEnvelope;

/// Default broker prefix of the enqueue channel.
pub const DEFAULT_BROKER_PREFIX: &str = "dramatiq";

/// Serialized envelopes of this many bytes or more are sent id-only.
pub const DEFAULT_PAYLOAD_LIMIT: usize = 8000;

/// Channel naming and payload tiering for one broker prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    broker_prefix: String,
    payload_limit: usize,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BROKER_PREFIX, DEFAULT_PAYLOAD_LIMIT)
    }
}

impl NotificationPolicy {
    pub fn new(broker_prefix: impl Into<String>, payload_limit: usize) -> Self {
        Self {
            broker_prefix: broker_prefix.into(),
            payload_limit,
        }
    }

    pub fn payload_limit(&self) -> usize {
        self.payload_limit
    }

    /// Channel jobs of `queue_name` are announced on.
    pub fn channel(&self, queue_name: &str) -> String {
        format!("{}.{}.enqueue", self.broker_prefix, queue_name)
    }

    /// Chooses the payload for `envelope`.
    pub fn payload(&self, envelope: &JobEnvelope) -> Result<NotificationPayload, serde_json::Error> {
        let full = envelope.to_json()?;
        if full.len() < self.payload_limit {
            return Ok(NotificationPayload::Full(full));
        }
        let id_only = serde_json::to_string(&MessageIdOnly {
            message_id: envelope.message_id,
        })?;
        Ok(NotificationPayload::IdOnly(id_only))
    }
}

#[derive(Serialize, Deserialize)]
struct MessageIdOnly {
    message_id: Uuid,
}

/// The body published for one queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPayload {
    /// The serialized envelope
    Full(String),
    /// `{"message_id": "..."}`
    IdOnly(String),
}

impl NotificationPayload {
    pub fn body(&self) -> &str {
        match self {
            NotificationPayload::Full(body) | NotificationPayload::IdOnly(body) => body,
        }
    }

    pub fn into_body(self) -> String {
        match self {
            NotificationPayload::Full(body) | NotificationPayload::IdOnly(body) => body,
        }
    }

    /// Recovers the tier of a stored notification body.
    pub fn classify(body: String) -> Self {
        match EnqueueNotification::decode(&body) {
            Ok(EnqueueNotification::MessageId(_)) => NotificationPayload::IdOnly(body),
            _ => NotificationPayload::Full(body),
        }
    }

    /// Metric label of the tier.
    pub fn tier(&self) -> &'static str {
        match self {
            NotificationPayload::Full(_) => "full",
            NotificationPayload::IdOnly(_) => "id_only",
        }
    }
}

/// A received enqueue notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueNotification {
    Envelope(Box<JobEnvelope>),
    /// The envelope was too large to publish; fetch the row by this id
    MessageId(Uuid),
}

impl EnqueueNotification {
    /// Decodes a notification body of either tier.
    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        match JobEnvelope::from_json(body) {
            Ok(envelope) => Ok(EnqueueNotification::Envelope(Box::new(envelope))),
            Err(_) => {
                let id: MessageIdOnly = serde_json::from_str(body)?;
                Ok(EnqueueNotification::MessageId(id.message_id))
            }
        }
    }

    pub fn message_id(&self) -> Uuid {
        match self {
            EnqueueNotification::Envelope(envelope) => envelope.message_id,
            EnqueueNotification::MessageId(id) => *id,
        }
    }
}
