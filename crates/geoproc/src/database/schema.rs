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

//! Diesel table definitions for the tables created by this crate's migrations.
//!
//! Catalog tables (`vector_tiles`, roles) and the tile cache belong to the
//! host platform and are only reached through parameterized raw SQL.

diesel::table! {
    geoprocessing_queue (message_id) {
        message_id -> Uuid,
        queue_name -> Text,
        state -> Text,
        mtime -> Timestamptz,
        message -> Jsonb,
        result -> Nullable<Jsonb>,
        result_ttl -> Nullable<Timestamptz>,
        uploader -> Nullable<Uuid>,
    }
}

diesel::table! {
    geoprocessing_outbox (id) {
        id -> Int8,
        kind -> Text,
        target -> Text,
        payload -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(geoprocessing_queue, geoprocessing_outbox);
