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

//! Domain models shared by the admission pipeline and the stores.

pub mod geometry;
pub mod layer;
pub mod outbox;
pub mod queue_row;
pub mod submitter;

pub use geometry::{Dimension, GeometryType};
pub use layer::{ColumnInfo, LayerInfo};
pub use outbox::{DispatchReport, NewOutboxEntry, OutboxEntry, OutboxKind};
pub use queue_row::{QueueRow, QueueRowStatus, QueueState};
pub use submitter::Submitter;
