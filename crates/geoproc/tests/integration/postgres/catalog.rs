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

use geoproc::admission::OperationKind;
use geoproc::catalog::{Catalog, CatalogTables, PgCatalog};
use geoproc::{Admission, AdmissionError, Submitter};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;

use super::pg_fixture;

const CATALOG_SETUP: &[&str] = &[
    "CREATE TABLE it_parcels (ogc_fid SERIAL PRIMARY KEY, district TEXT, area NUMERIC, geom BYTEA)",
    "CREATE TABLE it_district (ogc_fid SERIAL PRIMARY KEY, name TEXT, geom BYTEA)",
    "CREATE TABLE it_roads_a (ogc_fid SERIAL PRIMARY KEY, region_name TEXT, geom BYTEA)",
    "CREATE TABLE it_roads_b (ogc_fid SERIAL PRIMARY KEY, region_name INTEGER, geom BYTEA)",
    "INSERT INTO vector_tiles (layer_name, geometry_type) VALUES
        ('it_parcels', 'POLYGON'),
        ('it_district', 'MULTIPOLYGON'),
        ('it_roads_a', 'LINESTRING'),
        ('it_roads_b', 'LINESTRING'),
        ('it_ghost', 'POLYGON')",
];

#[tokio::test]
#[serial]
async fn test_catalog_reads() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    guard.execute_batch(CATALOG_SETUP);
    let catalog = PgCatalog::new(guard.get_database());

    let layer = catalog.layer("it_parcels").await.unwrap().unwrap();
    assert_eq!(layer.geometry_type, "POLYGON");
    assert!(catalog.layer("it_missing").await.unwrap().is_none());

    assert!(catalog.physical_table_exists("it_parcels").await.unwrap());
    assert!(!catalog.physical_table_exists("it_ghost").await.unwrap());

    let candidates = vec!["district".to_string(), "zone".to_string()];
    assert_eq!(
        catalog.columns_of("it_parcels", &candidates).await.unwrap(),
        vec!["district".to_string()]
    );

    let tables = vec!["it_roads_b".to_string(), "it_roads_a".to_string()];
    let columns = catalog.column_types(&tables).await.unwrap();
    let described: Vec<(&str, &str, &str)> = columns
        .iter()
        .map(|c| (c.table_name.as_str(), c.column_name.as_str(), c.data_type.as_str()))
        .collect();
    assert_eq!(
        described,
        vec![
            ("it_roads_b", "ogc_fid", "integer"),
            ("it_roads_b", "region_name", "integer"),
            ("it_roads_b", "geom", "bytea"),
            ("it_roads_a", "ogc_fid", "integer"),
            ("it_roads_a", "region_name", "text"),
            ("it_roads_a", "geom", "bytea"),
        ]
    );

    assert!(catalog.internal_role().await.unwrap().is_none());
    let role = Uuid::new_v4();
    guard.execute_batch(&[format!(
        "INSERT INTO directus_roles (id, name) VALUES ('{}', 'Internal')",
        role
    )
    .as_str()]);
    assert_eq!(catalog.internal_role().await.unwrap(), Some(role));

    assert!(!catalog.can_read(Some(role), "it_parcels").await.unwrap());
    guard.execute_batch(&[
        format!(
            "INSERT INTO directus_permissions (role, collection, action) \
             VALUES ('{}', 'it_parcels', 'read'), ('{}', 'it_roads_a', 'update')",
            role, role
        )
        .as_str(),
        "INSERT INTO directus_permissions (role, collection, action) \
         VALUES (NULL, 'it_district', 'read')",
    ]);
    assert!(catalog.can_read(Some(role), "it_parcels").await.unwrap());
    assert!(!catalog.can_read(Some(role), "it_roads_a").await.unwrap());
    assert!(!catalog.can_read(Some(role), "it_district").await.unwrap());
    assert!(catalog.can_read(None, "it_district").await.unwrap());
    assert!(!catalog.can_read(None, "it_parcels").await.unwrap());
}

#[test]
fn test_catalog_table_names_are_validated() {
    let tables = CatalogTables {
        layers_table: "vector_tiles; DROP TABLE x".to_string(),
        ..CatalogTables::default()
    };
    assert!(tables.validate().is_err());
}

#[tokio::test]
#[serial]
async fn test_admission_against_postgres() {
    let fixture = pg_fixture!();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.initialize().await;
    guard.reset_database().await;
    guard.execute_batch(CATALOG_SETUP);
    let dal = Arc::new(guard.get_dal());
    let catalog = Arc::new(PgCatalog::new(guard.get_database()));
    let admission = Admission::new(catalog, dal.clone(), dal.settings());
    let admin = Submitter::admin(Uuid::new_v4());

    let job = admission
        .submit_body(
            &admin,
            OperationKind::Dissolve,
            &json!({
                "input_table": "it_parcels",
                "fields": ["district"],
                "output_table": "it_parcels_by_district"
            }),
        )
        .await
        .unwrap();
    assert_eq!(job.actor_name, "dissolve");
    assert!(admission.status(job.message_id).await.unwrap().is_some());

    let err = admission
        .submit_body(
            &admin,
            OperationKind::Merge,
            &json!({"input_table": ["it_roads_a", "it_roads_b"], "output_table": "it_roads"}),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.reason(),
        Some("One of the merged column has same name but different type: it_roads_b.region_name is integer, but it_roads_a.region_name is text")
    );

    let err = admission
        .submit_body(
            &admin,
            OperationKind::Union,
            &json!({"input_table": ["it_parcels", "it_ghost"], "output_table": "it_union"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("Table named it_ghost does not exist"));

    // Without an internal role nobody but an administrator can be authorized.
    let member = Submitter::new(Uuid::new_v4(), Some(Uuid::new_v4()));
    let err = admission
        .submit_body(
            &member,
            OperationKind::Dissolve,
            &json!({
                "input_table": "it_parcels",
                "fields": ["district"],
                "output_table": "it_other"
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdmissionError::CatalogUnavailable(_)));
}
