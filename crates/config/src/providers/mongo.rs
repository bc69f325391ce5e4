//! MongoDB document as a byte provider
//!
//! The document is served as BSON bytes; pair it with
//! [`BsonParser`](crate::parsers::BsonParser). Watching opens a change stream
//! filtered on the document id, which needs a replica set or sharded cluster.

use crate::core::{ConfigError, ConfigResult, Provider, Watchable};
use crate::watchers::{
    WatchCallback, WatchEvent, WatchEventKind, WatchLatch, WatchNotification, WatchState,
};
use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::{Document, doc};
use mongodb::change_stream::event::OperationType;
use mongodb::{Client, Collection};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::DEFAULT_SYNC_TIMEOUT;

/// Reads one document by `_id` and watches it through a change stream
pub struct MongoProvider {
    collection: Collection<Document>,
    database: String,
    document_id: String,
    sync_timeout: Duration,
    latch: Arc<WatchLatch>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for MongoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoProvider")
            .field("database", &self.database)
            .field("collection", &self.collection.name())
            .field("document_id", &self.document_id)
            .field("state", &self.latch.state())
            .finish_non_exhaustive()
    }
}

impl MongoProvider {
    /// Create a provider for the document with `_id == document_id`
    pub fn new(
        client: &Client,
        database: impl Into<String>,
        collection: &str,
        document_id: impl Into<String>,
    ) -> Self {
        let database = database.into();
        Self {
            collection: client.database(&database).collection(collection),
            database,
            document_id: document_id.into(),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            latch: Arc::new(WatchLatch::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Deadline for opening the change stream in `watch`
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    fn filter(&self) -> Document {
        let id = self.document_id.as_str();
        doc! { "_id": id }
    }
}

/// Map a change stream operation to a notification
fn classify(
    provider: &str,
    document_id: &str,
    operation: &OperationType,
) -> Option<WatchNotification> {
    let event = |kind| Some(Ok(WatchEvent::new(kind, provider).with_key(document_id)));

    match operation {
        OperationType::Insert => event(WatchEventKind::Created),
        OperationType::Update | OperationType::Replace => event(WatchEventKind::Modified),
        OperationType::Delete => Some(Err(ConfigError::removed(provider, document_id))),
        OperationType::Invalidate => Some(Err(ConfigError::watch(
            provider,
            "change stream invalidated",
        ))),
        OperationType::Other(other) => event(WatchEventKind::Other(other.clone())),
        _ => None,
    }
}

#[async_trait]
impl Provider for MongoProvider {
    fn name(&self) -> String {
        format!(
            "mongodb:{}.{}/{}",
            self.database,
            self.collection.name(),
            self.document_id
        )
    }

    async fn read_bytes(&self) -> ConfigResult<Vec<u8>> {
        let document = self
            .collection
            .find_one(self.filter())
            .await
            .map_err(|e| ConfigError::fetch(self.name(), e))?
            .ok_or_else(|| {
                ConfigError::fetch(
                    self.name(),
                    format!("document '{}' not found", self.document_id),
                )
            })?;

        mongodb::bson::to_vec(&document).map_err(|e| ConfigError::fetch(self.name(), e))
    }

    fn as_watchable(&self) -> Option<&dyn Watchable> {
        Some(self)
    }

    async fn close(&self) -> ConfigResult<()> {
        self.cancel.cancel();
        if self.latch.state() != WatchState::Unarmed {
            self.latch.terminate();
        }
        Ok(())
    }
}

#[async_trait]
impl Watchable for MongoProvider {
    async fn watch(&self, callback: WatchCallback) -> ConfigResult<()> {
        let name = self.name();
        self.latch.arm(&name)?;

        let id = self.document_id.as_str();
        let pipeline = [doc! { "$match": { "documentKey._id": id } }];
        let open = async { self.collection.watch().pipeline(pipeline).await };

        let stream = match tokio::time::timeout(self.sync_timeout, open).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.latch.terminate();
                return Err(ConfigError::activation_failed(&name, e));
            }
            Err(_) => {
                self.latch.terminate();
                return Err(ConfigError::sync_timeout(&name, self.sync_timeout));
            }
        };
        strata_log::debug!(provider = %name, "change stream opened");

        let document_id = self.document_id.clone();
        let latch = Arc::clone(&self.latch);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    next = stream.next() => next,
                };

                match next {
                    Some(Ok(change)) => {
                        let invalidated = matches!(change.operation_type, OperationType::Invalidate);
                        if let Some(notification) =
                            classify(&name, &document_id, &change.operation_type)
                        {
                            callback(notification).await;
                        }
                        if invalidated {
                            break;
                        }
                    }
                    // Resumable errors are retried by the driver; anything
                    // surfacing here has killed the cursor.
                    Some(Err(e)) => {
                        callback(Err(ConfigError::watch(&name, e))).await;
                        break;
                    }
                    None => {
                        callback(Err(ConfigError::watch(&name, "change stream closed"))).await;
                        break;
                    }
                }
            }
            latch.terminate();
            strata_log::debug!(provider = %name, "mongodb watch stopped");
        });

        Ok(())
    }

    fn watch_state(&self) -> WatchState {
        self.latch.state()
    }
}

impl Drop for MongoProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
