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

//! Admission through queueing and dispatch, over the in-memory stores.

use geoproc::admission::OperationKind;
use geoproc::models::QueueState;
use geoproc::{AdmissionError, EnqueueNotification, OutboxStore, Submitter};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::fixtures::MemoryPipeline;

#[tokio::test]
async fn test_dissolve_is_queued_and_announced() {
    let pipeline = MemoryPipeline::new();
    let body = json!({
        "input_table": "parcels",
        "fields": ["district"],
        "output_table": "parcels_by_district"
    });

    let job = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Dissolve, &body)
        .await
        .expect("dissolve should be admitted");
    assert_eq!(job.actor_name, "dissolve");
    assert_eq!(job.queue_name, "default");

    let row = pipeline.queue.row(job.message_id).expect("row is stored");
    assert_eq!(row.state, QueueState::Queued);
    assert_eq!(row.message.actor_name, "dissolve");
    assert_eq!(row.message.kwargs["input_table"], json!("parcels"));
    assert_eq!(row.message.kwargs["fields"], json!(["district"]));
    assert_eq!(
        row.message.kwargs["user_id"],
        json!(pipeline.operator.user_id)
    );

    // Nothing is published until the outbox is drained.
    assert!(pipeline.queue.published().is_empty());
    let report = pipeline.dispatcher.run_once().await.unwrap();
    assert_eq!(report.notifications, 1);

    let published = pipeline.queue.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].channel, "dramatiq.default.enqueue");
    match EnqueueNotification::decode(&published[0].payload).unwrap() {
        EnqueueNotification::Envelope(envelope) => {
            assert_eq!(envelope.message_id, job.message_id);
            assert_eq!(envelope.actor_name, "dissolve");
        }
        other => panic!("expected a full envelope, got {:?}", other),
    }

    let status = pipeline
        .admission
        .status(job.message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.state, QueueState::Queued);
    assert!(status.result.is_none());
}

#[tokio::test]
async fn test_self_referential_inputs_never_reach_the_queue() {
    let pipeline = MemoryPipeline::new();
    let cases: Vec<(OperationKind, Value, &str)> = vec![
        (
            OperationKind::Clip,
            json!({"input_table": "parcels", "clip_table": "parcels", "output_table": "out"}),
            "clip_table must be different than input_table",
        ),
        (
            OperationKind::Dissolve,
            json!({"input_table": "parcels", "fields": ["district"], "output_table": "parcels"}),
            "Output table already exists in vector_tiles",
        ),
        (
            OperationKind::Merge,
            json!({"input_table": ["roads_a", "roads_a"], "output_table": "out"}),
            "input_table must not have duplicate value",
        ),
        (
            OperationKind::Union,
            json!({"input_table": ["parcels", "parcels"], "output_table": "out"}),
            "input_table must not have duplicate value",
        ),
        (
            OperationKind::Intersect,
            json!({"input_table": ["district", "district"], "output_table": "out"}),
            "input_table must not have duplicate value",
        ),
        (
            OperationKind::SpatialJoin,
            json!({"target_table": "wells", "join_table": "wells", "output_table": "out"}),
            "join_table must be different than target_table",
        ),
        (
            OperationKind::Difference,
            json!({"input_table": ["parcels", "district", "parcels"], "output_table": "out"}),
            "input_table must not have duplicate value",
        ),
    ];

    for (kind, body, reason) in cases {
        let err = pipeline
            .admission
            .submit_body(&pipeline.operator, kind, &body)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(reason), "operation {}", kind);
    }

    assert!(pipeline.queue.rows().is_empty());
    assert_eq!(pipeline.queue.count_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_every_operation_can_be_admitted() {
    let pipeline = MemoryPipeline::new();
    let cases: Vec<(OperationKind, Value)> = vec![
        (
            OperationKind::Clip,
            json!({"input_table": "wells", "clip_table": "district", "output_table": "wells_in_district"}),
        ),
        (
            OperationKind::Dissolve,
            json!({"input_table": "parcels", "fields": ["district"], "output_table": "by_district"}),
        ),
        (
            OperationKind::Merge,
            json!({"input_table": ["roads_a", "roads_b"], "output_table": "roads"}),
        ),
        (
            OperationKind::Union,
            json!({"input_table": ["parcels", "district"], "output_table": "parcel_union"}),
        ),
        (
            OperationKind::Intersect,
            json!({"input_table": ["parcels", "district"], "output_table": "parcel_overlap"}),
        ),
        (
            OperationKind::SpatialJoin,
            json!({"target_table": "wells", "join_table": "parcels", "output_table": "wells_joined"}),
        ),
        (
            OperationKind::Difference,
            json!({"input_table": ["parcels", "wells"], "output_table": "parcel_rest"}),
        ),
    ];

    for (kind, body) in &cases {
        let job = pipeline
            .admission
            .submit_body(&pipeline.operator, *kind, body)
            .await
            .unwrap_or_else(|e| panic!("{} rejected: {}", kind, e));
        assert_eq!(job.actor_name, kind.as_str());
    }

    assert_eq!(pipeline.queue.rows().len(), cases.len());
    let report = pipeline.dispatcher.drain().await.unwrap();
    assert_eq!(report.notifications, cases.len());
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    let pipeline = MemoryPipeline::new();
    let accepted = json!({"input_table": ["roads_a", "roads_b"], "output_table": "roads"});
    let rejected = json!({"input_table": ["roads_a", "wells"], "output_table": "roads"});

    for body in [&accepted, &rejected] {
        let first = validate_body(&pipeline, OperationKind::Merge, body).await;
        let second = validate_body(&pipeline, OperationKind::Merge, body).await;
        assert_eq!(first, second);
    }
    assert!(pipeline.queue.rows().is_empty());
}

async fn validate_body(
    pipeline: &MemoryPipeline,
    kind: OperationKind,
    body: &Value,
) -> Result<(), String> {
    let request = geoproc::JobRequest::from_body(kind, body).map_err(|e| e.to_string())?;
    pipeline
        .admission
        .validate(&pipeline.operator, request)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[tokio::test]
async fn test_output_name_pattern() {
    let pipeline = MemoryPipeline::new();
    let too_long = "a".repeat(51);
    let longest = format!("_{}", "b".repeat(49));

    for name in ["1roads", "a", "road-names", "roads.v2", "", too_long.as_str()] {
        let body = json!({"input_table": ["roads_a", "roads_b"], "output_table": name});
        let err = pipeline
            .admission
            .submit_body(&pipeline.operator, OperationKind::Merge, &body)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AdmissionError::InvalidSubmission { .. }),
            "'{}' should be rejected",
            name
        );
    }

    for name in ["_x", "roads_2024", longest.as_str()] {
        let body = json!({"input_table": ["roads_a", "roads_b"], "output_table": name});
        pipeline
            .admission
            .submit_body(&pipeline.operator, OperationKind::Merge, &body)
            .await
            .unwrap_or_else(|e| panic!("'{}' should be admitted: {}", name, e));
    }
}

#[tokio::test]
async fn test_submitter_without_internal_role_is_forbidden() {
    let pipeline = MemoryPipeline::new();
    let outsider = Submitter::new(Uuid::new_v4(), Some(Uuid::new_v4()));
    let body = json!({"input_table": ["roads_a", "roads_b"], "output_table": "roads"});

    let err = pipeline
        .admission
        .submit_body(&outsider, OperationKind::Merge, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::Forbidden));
    assert!(!err.is_retryable());

    let admin = Submitter::admin(Uuid::new_v4());
    assert!(pipeline
        .admission
        .submit_body(&admin, OperationKind::Merge, &body)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_infrastructure_faults_leave_nothing_behind() {
    let pipeline = MemoryPipeline::new();
    let body = json!({"input_table": "parcels", "fields": ["district"], "output_table": "out"});

    pipeline.catalog.set_unavailable(true);
    let err = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Dissolve, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::CatalogUnavailable(_)));
    assert!(err.is_retryable());
    pipeline.catalog.set_unavailable(false);

    pipeline.queue.set_unavailable(true);
    let err = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Dissolve, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::QueueWriteFailure(_)));
    pipeline.queue.set_unavailable(false);

    assert!(pipeline.queue.rows().is_empty());
    assert_eq!(pipeline.queue.count_pending().await.unwrap(), 0);

    // The same submission succeeds once the stores are back.
    assert!(pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Dissolve, &body)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_output_collides_with_unregistered_physical_table() {
    let pipeline = MemoryPipeline::new();
    let body = json!({"input_table": ["roads_a", "roads_b"], "output_table": "zoning"});

    let err = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Merge, &body)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("Output table name already exists"));
}

#[tokio::test]
async fn test_catalog_drift_is_rejected() {
    let pipeline = MemoryPipeline::new();
    pipeline.catalog.drop_table("roads_b");
    let body = json!({"input_table": ["roads_a", "roads_b"], "output_table": "roads"});

    let err = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Merge, &body)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("Table named roads_b does not exist"));
}
