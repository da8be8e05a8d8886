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

use geoproc::models::QueueState;
use geoproc::{JobEnvelope, OutboxStore, QueueStore};
use serde_json::{json, Map};
use serial_test::serial;
use uuid::Uuid;

use super::pg_fixture;

pub(crate) fn merge_envelope() -> JobEnvelope {
    let mut kwargs = Map::new();
    kwargs.insert("input_table".to_string(), json!(["roads_a", "roads_b"]));
    kwargs.insert("output_table".to_string(), json!("roads"));
    kwargs.insert("user_id".to_string(), json!(Uuid::new_v4()));
    JobEnvelope {
        args: Vec::new(),
        kwargs,
        options: Map::new(),
        actor_name: "merge".to_string(),
        message_id: Uuid::new_v4(),
        queue_name: "default".to_string(),
        message_timestamp: "1730419200000".to_string(),
    }
}

#[tokio::test]
#[serial]
async fn test_enqueue_writes_row_and_notification_together() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    let dal = guard.get_dal();

    let envelope = merge_envelope();
    let uploader = Uuid::new_v4();
    dal.enqueue(&envelope, Some(uploader)).await.unwrap();

    let row = dal.queue().get(envelope.message_id).await.unwrap().unwrap();
    assert_eq!(row.state, QueueState::Queued);
    assert_eq!(row.queue_name, "default");
    assert_eq!(row.message, envelope);
    assert_eq!(row.uploader, Some(uploader));

    let status = dal.status(envelope.message_id).await.unwrap().unwrap();
    assert_eq!(status.state, QueueState::Queued);
    assert!(status.result.is_none());
    assert!(status.result_ttl.is_none());

    assert_eq!(dal.count_by_state(QueueState::Queued).await.unwrap(), 1);
    let pending = dal.outbox().list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].target, "dramatiq.default.enqueue");
    assert_eq!(
        pending[0].payload.as_deref(),
        Some(envelope.to_json().unwrap().as_str())
    );
}

#[tokio::test]
#[serial]
async fn test_failed_enqueue_leaves_no_notification() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    let dal = guard.get_dal();

    let envelope = merge_envelope();
    dal.enqueue(&envelope, None).await.unwrap();
    // Same message id: the primary key rejects the row and the outbox
    // insert rolls back with it.
    assert!(dal.enqueue(&envelope, None).await.is_err());

    assert_eq!(dal.count_by_state(QueueState::Queued).await.unwrap(), 1);
    assert_eq!(dal.count_pending().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_trigger_enforces_lifecycle() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    let dal = guard.get_dal();

    let envelope = merge_envelope();
    dal.enqueue(&envelope, None).await.unwrap();
    let id = envelope.message_id;
    let set_state = |state: &str| {
        format!(
            "UPDATE geoprocessing_queue SET state = '{}' WHERE message_id = '{}'",
            state, id
        )
    };

    // queued cannot skip consumed
    assert!(guard.execute(&set_state("done")).is_err());
    assert_eq!(guard.execute(&set_state("consumed")).unwrap(), 1);
    // nothing goes back to queued
    assert!(guard.execute(&set_state("queued")).is_err());
    assert_eq!(guard.execute(&set_state("rejected")).unwrap(), 1);
    // terminal
    assert!(guard.execute(&set_state("done")).is_err());
    // values outside the machine are refused by the check constraint
    assert!(guard.execute(&set_state("running")).is_err());

    let status = dal.status(id).await.unwrap().unwrap();
    assert_eq!(status.state, QueueState::Rejected);
}

#[tokio::test]
#[serial]
async fn test_status_of_unknown_message() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    let dal = guard.get_dal();

    assert!(dal.status(Uuid::new_v4()).await.unwrap().is_none());
}
