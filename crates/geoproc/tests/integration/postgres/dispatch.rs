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

use std::time::Duration;

use chrono::Utc;
use geoproc::dispatcher::{DispatcherConfig, OutboxDispatcher, QueueListener};
use geoproc::{EnqueueNotification, OutboxStore, QueueStore, TileCacheStore};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;

use super::pg_fixture;
use super::queue::merge_envelope;

#[tokio::test]
#[serial]
async fn test_dispatch_notifies_listeners_on_commit() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    let dal = Arc::new(guard.get_dal());

    let mut listener = QueueListener::connect(guard.database_url(), "dramatiq.default.enqueue")
        .await
        .expect("listener connects");

    let small = merge_envelope();
    let mut large = merge_envelope();
    large
        .kwargs
        .insert("filter".to_string(), json!(vec!["x".repeat(100); 100]));
    dal.enqueue(&small, None).await.unwrap();
    dal.enqueue(&large, None).await.unwrap();

    let dispatcher = OutboxDispatcher::new(dal.clone(), DispatcherConfig::default());
    let report = dispatcher.run_once().await.unwrap();
    assert_eq!(report.notifications, 2);
    assert_eq!(report.id_only_notifications, 1);
    assert_eq!(dal.count_pending().await.unwrap(), 0);

    let mut received = Vec::new();
    for _ in 0..2 {
        let note = tokio::time::timeout(Duration::from_secs(5), listener.next())
            .await
            .expect("notification arrives")
            .expect("listener is open");
        assert_eq!(note.channel, "dramatiq.default.enqueue");
        received.push(note.notification);
    }

    // Outbox order is insertion order.
    match &received[0] {
        EnqueueNotification::Envelope(envelope) => assert_eq!(**envelope, small),
        other => panic!("expected the full envelope, got {:?}", other),
    }
    assert_eq!(
        received[1],
        EnqueueNotification::MessageId(large.message_id)
    );

    listener.shutdown();
}

#[tokio::test]
#[serial]
async fn test_concurrent_dispatchers_publish_each_entry_once() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    let dal = Arc::new(guard.get_dal());

    const JOBS: usize = 30;
    for _ in 0..JOBS {
        dal.enqueue(&merge_envelope(), None).await.unwrap();
    }

    let config = DispatcherConfig::builder().batch_size(4).build();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let dispatcher = OutboxDispatcher::new(dal.clone(), config.clone());
        handles.push(tokio::spawn(async move { dispatcher.drain().await }));
    }

    let mut published = 0;
    for handle in handles {
        published += handle.await.unwrap().unwrap().notifications;
    }
    assert_eq!(published, JOBS);
    assert_eq!(dal.count_pending().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_invalidation_purges_exact_prefix() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    guard.execute_batch(&[
        "INSERT INTO vector_tile_cache (key, expired_at) VALUES
            ('mvt_parcels_1_0_0', NULL),
            ('mvt_parcels_2_1_1', NULL),
            ('mvt_parcels2_1_0_0', NULL),
            ('mvt_parcelsx_1_0_0', NULL),
            ('mvt_district_1_0_0', NULL)",
    ]);
    let dal = Arc::new(guard.get_dal());

    dal.record_invalidation("parcels").await.unwrap();
    let dispatcher = OutboxDispatcher::new(dal.clone(), DispatcherConfig::default());
    let report = dispatcher.run_once().await.unwrap();
    assert_eq!(report.invalidations, 1);
    assert_eq!(report.purged_tiles, 2);

    // Direct purge with a literal underscore does not act as a wildcard.
    assert_eq!(dal.purge_prefix("mvt_parcels_").await.unwrap(), 0);
    assert_eq!(dal.purge_prefix("mvt_district_").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_expired_tiles_are_swept() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    guard.execute_batch(&[
        "INSERT INTO vector_tile_cache (key, expired_at) VALUES
            ('mvt_a_1_0_0', (NOW() AT TIME ZONE 'utc') - INTERVAL '1 hour'),
            ('mvt_a_1_0_1', (NOW() AT TIME ZONE 'utc') + INTERVAL '1 hour'),
            ('mvt_b_1_0_0', NULL)",
    ]);
    let dal = guard.get_dal();

    assert_eq!(dal.purge_expired(Utc::now()).await.unwrap(), 1);
    assert_eq!(dal.purge_expired(Utc::now()).await.unwrap(), 0);
}
