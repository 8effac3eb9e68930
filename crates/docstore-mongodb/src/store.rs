//! Driver seam
//!
//! [`DocumentStore`] is the narrow set of driver calls the client facade
//! delegates to. [`MongoStore`] implements it over a `mongodb::Database`;
//! tests provide in-memory stores. Cursors are released when dropped.

use async_trait::async_trait;
use bson::{doc, Document as BsonDocument};
use mongodb::{
    options::{FindOptions, ReadPreference, SelectionCriteria},
    Collection, Cursor, Database,
};

/// Result of a raw driver call
pub type DriverResult<T> = std::result::Result<T, mongodb::error::Error>;

/// Forward-only stream of raw documents returned by [`DocumentStore::find`]
///
/// The server-side cursor is released when the value is dropped.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Next document, or `None` once the cursor is exhausted
    async fn next_document(&mut self) -> DriverResult<Option<BsonDocument>>;
}

/// Outbound driver operations used by [`crate::DocumentClient`]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    type Cursor: DocumentCursor;

    /// Liveness probe against a primary-preferred member
    async fn ping(&self) -> DriverResult<()>;

    async fn insert_one(&self, collection: &str, document: BsonDocument) -> DriverResult<()>;

    /// First matching document; `None` when nothing matches
    async fn find_one(&self, collection: &str, filter: BsonDocument) -> DriverResult<Option<BsonDocument>>;

    async fn find(
        &self,
        collection: &str,
        filter: BsonDocument,
        projection: Option<BsonDocument>,
    ) -> DriverResult<Self::Cursor>;

    async fn update_one(&self, collection: &str, filter: BsonDocument, update: BsonDocument) -> DriverResult<()>;

    /// Number of deleted documents (0 or 1)
    async fn delete_one(&self, collection: &str, filter: BsonDocument) -> DriverResult<u64>;
}

/// [`DocumentStore`] backed by a MongoDB database handle
#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Get a reference to the database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Get the database name
    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    type Cursor = MongoCursor;

    async fn ping(&self) -> DriverResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(
                ReadPreference::PrimaryPreferred { options: None },
            ))
            .await?;
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: BsonDocument) -> DriverResult<()> {
        self.collection(collection).insert_one(document).await?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: BsonDocument) -> DriverResult<Option<BsonDocument>> {
        self.collection(collection).find_one(filter).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: BsonDocument,
        projection: Option<BsonDocument>,
    ) -> DriverResult<MongoCursor> {
        let mut options = FindOptions::default();
        options.projection = projection;
        let cursor = self
            .collection(collection)
            .find(filter)
            .with_options(options)
            .await?;
        Ok(MongoCursor { inner: cursor })
    }

    async fn update_one(&self, collection: &str, filter: BsonDocument, update: BsonDocument) -> DriverResult<()> {
        self.collection(collection).update_one(filter, update).await?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: BsonDocument) -> DriverResult<u64> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(result.deleted_count)
    }
}

/// Driver cursor over raw documents
pub struct MongoCursor {
    inner: Cursor<BsonDocument>,
}

#[async_trait]
impl DocumentCursor for MongoCursor {
    async fn next_document(&mut self) -> DriverResult<Option<BsonDocument>> {
        if self.inner.advance().await? {
            Ok(Some(self.inner.deserialize_current()?))
        } else {
            Ok(None)
        }
    }
}
