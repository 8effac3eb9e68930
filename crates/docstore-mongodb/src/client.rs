//! Client facade
//!
//! Every operation forwards to the [`DocumentStore`] and translates only two
//! things: payloads to and from BSON, and "nothing matched" on reads into
//! `Ok(None)`. Driver errors come back unchanged as [`Error::MongoDB`].

use bson::Document as BsonDocument;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::store::{DocumentCursor, DocumentStore, MongoStore};
use crate::{Error, Result};

/// Handle to an established connection
///
/// Created by [`crate::connect`]. The handle is immutable and cheap to clone
/// (for [`MongoStore`]), so it can be shared across tasks without locking.
#[derive(Clone, Debug)]
pub struct DocumentClient<S = MongoStore> {
    store: S,
    operation_timeout: Option<Duration>,
}

impl<S: DocumentStore> DocumentClient<S> {
    /// Wrap a store that is already known to be reachable
    pub fn new(store: S) -> Self {
        Self {
            store,
            operation_timeout: None,
        }
    }

    /// Apply a deadline to every CRUD call (`None` disables it)
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Deadline applied to each CRUD call, if any
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-run the liveness probe
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await.map_err(Error::Ping)
    }

    /// Insert a single document
    pub async fn create_one<T>(&self, collection: &str, document: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let document = bson::to_document(document)?;
        debug!(collection, "insert_one");
        let insert = self.store.insert_one(collection, document);
        self.deadline("insert_one", collection, async { insert.await.map_err(Error::from) })
            .await
    }

    /// Find the first document matching `filter`
    ///
    /// Returns `Ok(None)` when nothing matches.
    pub async fn read_one<T>(&self, collection: &str, filter: BsonDocument) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        debug!(collection, ?filter, "find_one");
        self.deadline("find_one", collection, self.fetch_one(collection, filter))
            .await
    }

    /// Find all documents matching `filter`
    ///
    /// An empty result is returned as `Ok(None)`.
    pub async fn read<T>(&self, collection: &str, filter: BsonDocument) -> Result<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        debug!(collection, ?filter, "find");
        self.collect(collection, filter, None).await
    }

    /// Like [`read`](Self::read), returning only the fields selected by `projection`
    pub async fn read_with_projection<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        projection: BsonDocument,
    ) -> Result<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        debug!(collection, ?filter, ?projection, "find with projection");
        self.collect(collection, filter, Some(projection)).await
    }

    /// Apply `update` to the first document matching `filter`
    ///
    /// Does not report whether anything matched.
    pub async fn update_one(&self, collection: &str, filter: BsonDocument, update: BsonDocument) -> Result<()> {
        debug!(collection, ?filter, "update_one");
        let update = self.store.update_one(collection, filter, update);
        self.deadline("update_one", collection, async { update.await.map_err(Error::from) })
            .await
    }

    /// Delete the first document matching `filter`
    ///
    /// Returns the number of deleted documents; 0 when nothing matched.
    pub async fn delete_one(&self, collection: &str, filter: BsonDocument) -> Result<u64> {
        debug!(collection, ?filter, "delete_one");
        let delete = self.store.delete_one(collection, filter);
        self.deadline("delete_one", collection, async { delete.await.map_err(Error::from) })
            .await
    }

    async fn collect<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        projection: Option<BsonDocument>,
    ) -> Result<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        self.deadline("find", collection, self.drain(collection, filter, projection))
            .await
    }

    async fn fetch_one<T>(&self, collection: &str, filter: BsonDocument) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.store.find_one(collection, filter).await? {
            Some(raw) => Ok(Some(bson::from_document(raw)?)),
            None => Ok(None),
        }
    }

    /// The cursor is owned by this call and dropped on every exit path,
    /// decode failures included, before the result reaches the caller.
    async fn drain<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        projection: Option<BsonDocument>,
    ) -> Result<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        let mut cursor = self.store.find(collection, filter, projection).await?;
        let mut documents = Vec::new();
        while let Some(raw) = cursor.next_document().await? {
            documents.push(bson::from_document(raw)?);
        }
        Ok((!documents.is_empty()).then_some(documents))
    }

    async fn deadline<T, F>(&self, op: &str, collection: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                Error::Timeout(format!("{} on '{}' exceeded {:?}", op, collection, limit))
            })?,
            None => fut.await,
        }
    }
}
