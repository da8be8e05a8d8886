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

//! Outbox dispatch and tile-cache invalidation over the in-memory stores.

use std::sync::Arc;

use chrono::{Duration, Utc};
use geoproc::admission::OperationKind;
use geoproc::cache::{ClassColumns, LayerStyleChange, TileCacheInvalidator};
use geoproc::{EnqueueNotification, OutboxStore};
use serde_json::json;

use crate::fixtures::MemoryPipeline;

#[tokio::test]
async fn test_large_envelopes_are_announced_by_id() {
    let pipeline = MemoryPipeline::new();
    let filter: Vec<_> = (0..400)
        .map(|i| json!({"field": "district", "op": "eq", "value": format!("district-{:04}", i)}))
        .collect();
    let body = json!({
        "input_table": "wells",
        "clip_table": "district",
        "output_table": "filtered_wells",
        "filter": filter
    });

    let job = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Clip, &body)
        .await
        .unwrap();
    let stored = pipeline.queue.row(job.message_id).unwrap();
    assert!(stored.message.to_json().unwrap().len() >= 8000);

    let report = pipeline.dispatcher.run_once().await.unwrap();
    assert_eq!(report.notifications, 1);
    assert_eq!(report.id_only_notifications, 1);

    let published = pipeline.queue.published();
    assert_eq!(
        EnqueueNotification::decode(&published[0].payload).unwrap(),
        EnqueueNotification::MessageId(job.message_id)
    );
    // The worker can still fetch the full envelope by id.
    assert_eq!(
        pipeline.queue.row(job.message_id).unwrap().message.kwargs["filter"]
            .as_array()
            .map(Vec::len),
        Some(400)
    );
}

fn style_change(layer: &str, cache_duration: i64, fill_after: &str) -> LayerStyleChange {
    LayerStyleChange {
        layer_name: layer.to_string(),
        cache_duration,
        before: ClassColumns {
            fill: Some(json!(["district"])),
            ..ClassColumns::default()
        },
        after: ClassColumns {
            fill: Some(json!([fill_after])),
            ..ClassColumns::default()
        },
    }
}

#[tokio::test]
async fn test_style_change_purges_only_that_layer() {
    let pipeline = MemoryPipeline::new();
    let queue = pipeline.queue.clone();
    for key in [
        "mvt_parcels_1_0_0",
        "mvt_parcels_2_1_1",
        "mvt_parcels2_1_0_0",
        "mvt_parcelsx_1_0_0",
        "mvt_district_1_0_0",
    ] {
        queue.insert_tile(key, None);
    }
    let invalidator = TileCacheInvalidator::new(queue.clone(), queue.clone())
        .with_dispatcher_wake(pipeline.dispatcher.wake_handle());

    // Caching disabled: nothing to invalidate.
    assert!(!invalidator
        .on_style_change(&style_change("parcels", 0, "area"))
        .await
        .unwrap());
    // Unchanged class columns.
    assert!(!invalidator
        .on_style_change(&style_change("parcels", 3600, "district"))
        .await
        .unwrap());
    assert_eq!(queue.count_pending().await.unwrap(), 0);

    assert!(invalidator
        .on_style_change(&style_change("parcels", 3600, "area"))
        .await
        .unwrap());
    assert_eq!(queue.tile_keys().len(), 5);

    let report = pipeline.dispatcher.run_once().await.unwrap();
    assert_eq!(report.invalidations, 1);
    assert_eq!(report.purged_tiles, 2);
    assert_eq!(
        queue.tile_keys(),
        vec![
            "mvt_district_1_0_0".to_string(),
            "mvt_parcels2_1_0_0".to_string(),
            "mvt_parcelsx_1_0_0".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_expired_tiles_are_swept() {
    let pipeline = MemoryPipeline::new();
    let queue = pipeline.queue.clone();
    let now = Utc::now();
    queue.insert_tile("mvt_parcels_1_0_0", Some(now - Duration::minutes(5)));
    queue.insert_tile("mvt_parcels_1_0_1", Some(now + Duration::minutes(5)));
    queue.insert_tile("mvt_wells_1_0_0", None);

    let invalidator = TileCacheInvalidator::new(queue.clone(), queue.clone());
    assert_eq!(invalidator.purge_expired(now).await.unwrap(), 1);
    assert_eq!(
        queue.tile_keys(),
        vec![
            "mvt_parcels_1_0_1".to_string(),
            "mvt_wells_1_0_0".to_string()
        ]
    );
}

#[tokio::test]
async fn test_running_dispatcher_delivers_admitted_jobs() {
    let pipeline = Arc::new(MemoryPipeline::new());
    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.dispatcher.run().await }
    });

    let body = json!({"input_table": ["roads_a", "roads_b"], "output_table": "roads"});
    let job = pipeline
        .admission
        .submit_body(&pipeline.operator, OperationKind::Merge, &body)
        .await
        .unwrap();

    let delivered = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            if let Some(note) = pipeline.queue.published().first() {
                break EnqueueNotification::decode(&note.payload).unwrap();
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("notification was not published");
    assert_eq!(delivered.message_id(), job.message_id);

    pipeline.dispatcher.shutdown();
    handle.await.unwrap();
}
