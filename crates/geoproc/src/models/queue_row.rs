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

//! Queue Row Model
//!
//! A queue row is the durable form of one job: the envelope it was admitted
//! with, its lifecycle state and whatever result the worker left behind.
//!
//! The lifecycle is linear:
//!
//! ```text
//! queued -> consumed -> done
//!                    \-> rejected
//! ```
//!
//! This crate only ever writes `queued` rows. Later transitions belong to the
//! worker; [`QueueState::can_transition_to`] mirrors the guard trigger the
//! migrations install so both sides agree on the rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::JobEnvelope;

/// Lifecycle state of a queue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    /// Inserted, not yet claimed by any worker
    Queued,
    /// Claimed by a worker
    Consumed,
    /// Worker finished; result populated
    Done,
    /// Worker determined the job cannot complete
    Rejected,
}

impl QueueState {
    /// Returns the string stored in the `state` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Queued => "queued",
            QueueState::Consumed => "consumed",
            QueueState::Done => "done",
            QueueState::Rejected => "rejected",
        }
    }

    /// Parses a `state` column value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(QueueState::Queued),
            "consumed" => Some(QueueState::Consumed),
            "done" => Some(QueueState::Done),
            "rejected" => Some(QueueState::Rejected),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: QueueState) -> bool {
        matches!(
            (self, next),
            (QueueState::Queued, QueueState::Consumed)
                | (QueueState::Consumed, QueueState::Done)
                | (QueueState::Consumed, QueueState::Rejected)
        )
    }

    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueState::Done | QueueState::Rejected)
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a queue row (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRow {
    /// Primary key; identical to the envelope's message id
    pub message_id: Uuid,
    /// Logical partition the job was queued on
    pub queue_name: String,
    /// Lifecycle state
    pub state: QueueState,
    /// Last modification time
    pub mtime: DateTime<Utc>,
    /// The envelope the job was admitted with
    pub message: JobEnvelope,
    /// Result payload written by the worker
    pub result: Option<serde_json::Value>,
    /// How long the result stays fetchable
    pub result_ttl: Option<DateTime<Utc>>,
    /// Identity of the submitter
    pub uploader: Option<Uuid>,
}

impl QueueRow {
    /// Builds the `queued` row for a freshly admitted envelope.
    pub fn queued(message: JobEnvelope, uploader: Option<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            message_id: message.message_id,
            queue_name: message.queue_name.clone(),
            state: QueueState::Queued,
            mtime: now,
            message,
            result: None,
            result_ttl: None,
            uploader,
        }
    }

    /// Projects the row onto the submitter-facing read contract.
    pub fn status(&self) -> QueueRowStatus {
        QueueRowStatus {
            message_id: self.message_id,
            state: self.state,
            result: self.result.clone(),
            mtime: self.mtime,
            result_ttl: self.result_ttl,
        }
    }
}

/// What a submitter sees when polling a job by message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRowStatus {
    pub message_id: Uuid,
    pub state: QueueState,
    pub result: Option<serde_json::Value>,
    pub mtime: DateTime<Utc>,
    pub result_ttl: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_is_linear() {
        use QueueState::*;

        assert!(Queued.can_transition_to(Consumed));
        assert!(Consumed.can_transition_to(Done));
        assert!(Consumed.can_transition_to(Rejected));

        // no skipping consumed, no going back
        assert!(!Queued.can_transition_to(Done));
        assert!(!Queued.can_transition_to(Rejected));
        assert!(!Consumed.can_transition_to(Queued));
        assert!(!Done.can_transition_to(Queued));
        assert!(!Rejected.can_transition_to(Consumed));
        assert!(!Done.can_transition_to(Rejected));
        for state in [Queued, Consumed, Done, Rejected] {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(QueueState::Done.is_terminal());
        assert!(QueueState::Rejected.is_terminal());
        assert!(!QueueState::Queued.is_terminal());
        assert!(!QueueState::Consumed.is_terminal());
    }

    #[test]
    fn test_state_strings_round_trip() {
        for state in [
            QueueState::Queued,
            QueueState::Consumed,
            QueueState::Done,
            QueueState::Rejected,
        ] {
            assert_eq!(QueueState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(QueueState::from_str("QUEUED"), None);
        assert_eq!(
            serde_json::to_string(&QueueState::Consumed).unwrap(),
            "\"consumed\""
        );
    }
}
