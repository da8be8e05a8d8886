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

//! Tests against a real PostgreSQL database (`GEOPROC_TEST_DATABASE_URL`).

/// Yields the shared fixture, or returns from the test when no database is
/// configured.
macro_rules! pg_fixture {
    () => {
        match crate::fixtures::get_or_init_fixture().await {
            Some(fixture) => fixture,
            None => {
                eprintln!(
                    "skipping: {} is not set",
                    crate::fixtures::DATABASE_URL_VAR
                );
                return;
            }
        }
    };
}

pub(crate) use pg_fixture;

pub mod catalog;
pub mod dispatch;
pub mod queue;
