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

//! LISTEN side of the enqueue channel.
//!
//! Opens a dedicated `tokio-postgres` connection, listens on one enqueue
//! channel and decodes every payload into an [`EnqueueNotification`]. Workers
//! live outside this crate; the listener serves the CLI `watch` command and
//! the integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::notification::EnqueueNotification;

/// Failure to establish the listen connection.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Listen connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),
}

/// A decoded notification together with its channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedNotification {
    pub channel: String,
    pub notification: EnqueueNotification,
}

/// Receives enqueue notifications for one channel.
pub struct QueueListener {
    channel: String,
    receiver: mpsc::UnboundedReceiver<ReceivedNotification>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl QueueListener {
    /// Connects to `database_url` and starts listening on `channel`.
    pub async fn connect(database_url: &str, channel: &str) -> Result<Self, ListenerError> {
        let (client, mut connection) =
            tokio_postgres::connect(database_url, tokio_postgres::NoTls).await?;

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let conn_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let stream = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
            futures::pin_mut!(stream);

            while !conn_shutdown.load(Ordering::SeqCst) {
                match stream.next().await {
                    Some(Ok(msg)) => {
                        if raw_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Listen connection error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        });

        // Channel names carry dots, so they must be quoted.
        let listen = format!("LISTEN \"{}\"", channel.replace('"', "\"\""));
        client.batch_execute(&listen).await?;
        info!("Listening for enqueue notifications on '{}'", channel);

        let (tx, receiver) = mpsc::unbounded_channel();
        let task_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            // Dropping the client closes the connection.
            let _client = client;

            while let Some(message) = raw_rx.recv().await {
                if task_shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let tokio_postgres::AsyncMessage::Notification(note) = message else {
                    continue;
                };
                match EnqueueNotification::decode(note.payload()) {
                    Ok(notification) => {
                        debug!(
                            "Received notification for {} on '{}'",
                            notification.message_id(),
                            note.channel()
                        );
                        let received = ReceivedNotification {
                            channel: note.channel().to_string(),
                            notification,
                        };
                        if tx.send(received).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Ignoring undecodable payload on '{}': {}",
                            note.channel(),
                            e
                        );
                    }
                }
            }
            debug!("Queue listener stopped");
        });

        Ok(Self {
            channel: channel.to_string(),
            receiver,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next decoded notification; `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<ReceivedNotification> {
        self.receiver.recv().await
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for QueueListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}
