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

//! The identity a job is submitted under.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated submitter, supplied by the host platform with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    /// User identifier, copied into the envelope kwargs
    pub user_id: Uuid,
    /// Administrators bypass the internal-role check
    pub admin: bool,
    /// Role the user acts under, if any
    pub role: Option<Uuid>,
}

impl Submitter {
    /// A regular user acting under `role`.
    pub fn new(user_id: Uuid, role: Option<Uuid>) -> Self {
        Self {
            user_id,
            admin: false,
            role,
        }
    }

    /// An administrator.
    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            admin: true,
            role: None,
        }
    }
}
