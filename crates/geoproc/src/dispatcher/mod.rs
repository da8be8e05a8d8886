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

//! Notification dispatch.
//!
//! Enqueue notifications and tile-cache purges are recorded in the outbox by
//! the transaction that caused them and performed by [`OutboxDispatcher`].
//! [`QueueListener`] is the receiving end of the enqueue channel.

pub mod listener;
pub mod notification;
pub mod outbox_dispatcher;

pub use listener::{ListenerError, QueueListener, ReceivedNotification};
pub use notification::{
    EnqueueNotification, NotificationPayload, NotificationPolicy, DEFAULT_BROKER_PREFIX,
    DEFAULT_PAYLOAD_LIMIT,
};
pub use outbox_dispatcher::{DispatcherConfig, DispatcherConfigBuilder, OutboxDispatcher};
