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

//! `geoproc watch`

use anyhow::{Context, Result};
use geoproc::{EnqueueNotification, QueueListener};
use serde_json::json;
use tracing::warn;

use super::Environment;

pub async fn run(env: &Environment, queue: Option<&str>) -> Result<()> {
    let settings = env.config().queue_settings();
    let queue = queue.unwrap_or(settings.queue_name());
    let channel = settings.notification_policy().channel(queue);

    let mut listener = QueueListener::connect(env.database_url()?, &channel)
        .await
        .with_context(|| format!("Failed to listen on '{}'", channel))?;

    loop {
        tokio::select! {
            received = listener.next() => {
                let Some(received) = received else {
                    warn!("Listen connection closed");
                    break;
                };
                let line = match &received.notification {
                    EnqueueNotification::Envelope(envelope) => json!({
                        "channel": received.channel,
                        "message_id": envelope.message_id,
                        "actor_name": envelope.actor_name,
                        "tier": "full",
                    }),
                    EnqueueNotification::MessageId(id) => json!({
                        "channel": received.channel,
                        "message_id": id,
                        "tier": "id_only",
                    }),
                };
                println!("{}", line);
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                break;
            }
        }
    }

    listener.shutdown();
    Ok(())
}
