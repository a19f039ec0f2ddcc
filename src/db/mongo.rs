//! MongoDB client and collection wrapper
//!
//! Reads through [`MongoCollection`] skip soft-deleted documents, so
//! inactive members never leak into scope or statistics. Only
//! [`MongoCollection::find_one_any`] sees them.

use bson::{doc, DateTime, Document};
use futures::{Stream, TryStreamExt};
use mongodb::{
    options::{FindOptions, IndexOptions, ReturnDocument, UpdateModifications},
    results::UpdateResult,
    Client, ClientSession, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::AliancaError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, AliancaError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on unreachable servers
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| AliancaError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AliancaError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, AliancaError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Start a client session for multi-document transactions
    pub async fn start_session(&self) -> Result<ClientSession, AliancaError> {
        self.client
            .start_session()
            .await
            .map_err(|e| AliancaError::Database(format!("Failed to start session: {}", e)))
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Filter clause that hides soft-deleted documents
fn with_active(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

fn stamp_insert<T: MutMetadata>(item: &mut T) {
    let metadata = item.mut_metadata();
    let now = DateTime::now();
    metadata.is_deleted = false;
    metadata.created_at = Some(now);
    metadata.updated_at = Some(now);
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, AliancaError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), AliancaError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| AliancaError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    ///
    /// Unique index violations surface as `AliancaError::Conflict`.
    pub async fn insert_one(&self, mut item: T) -> Result<(), AliancaError> {
        stamp_insert(&mut item);
        self.inner.insert_one(item).await?;
        Ok(())
    }

    /// Insert a document inside a transaction
    pub async fn insert_one_in(
        &self,
        mut item: T,
        session: &mut ClientSession,
    ) -> Result<(), AliancaError> {
        stamp_insert(&mut item);
        self.inner.insert_one(item).session(&mut *session).await?;
        Ok(())
    }

    /// Find one non-deleted document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, AliancaError> {
        self.inner
            .find_one(with_active(filter))
            .await
            .map_err(|e| AliancaError::Database(format!("Find failed: {}", e)))
    }

    /// Find one non-deleted document inside a transaction
    pub async fn find_one_in(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Option<T>, AliancaError> {
        self.inner
            .find_one(with_active(filter))
            .session(&mut *session)
            .await
            .map_err(|e| AliancaError::Database(format!("Find failed: {}", e)))
    }

    /// Find many non-deleted documents by filter
    ///
    /// A document that fails to decode fails the whole read.
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, AliancaError> {
        let cursor = self
            .inner
            .find(with_active(filter))
            .with_options(options)
            .await
            .map_err(|e| AliancaError::Database(format!("Find failed: {}", e)))?;

        collect_documents(cursor).await
    }

    /// Find one document by filter, soft-deleted or not
    pub async fn find_one_any(&self, filter: Document) -> Result<Option<T>, AliancaError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| AliancaError::Database(format!("Find failed: {}", e)))
    }

    /// Count non-deleted documents matching the filter
    pub async fn count(&self, filter: Document) -> Result<u64, AliancaError> {
        self.inner
            .count_documents(with_active(filter))
            .await
            .map_err(|e| AliancaError::Database(format!("Count failed: {}", e)))
    }

    /// Update one non-deleted document, bumping `updated_at`
    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, AliancaError> {
        self.inner
            .update_one(with_active(filter), touch(update))
            .await
            .map_err(Into::into)
    }

    /// Update one non-deleted document inside a transaction, returning it as
    /// it was before the update
    pub async fn find_one_and_update_in(
        &self,
        filter: Document,
        update: Document,
        session: &mut ClientSession,
    ) -> Result<Option<T>, AliancaError> {
        self.inner
            .find_one_and_update(with_active(filter), touch(update))
            .return_document(ReturnDocument::Before)
            .session(&mut *session)
            .await
            .map_err(Into::into)
    }

    /// Soft delete a document
    pub async fn soft_delete(&self, filter: Document) -> Result<UpdateResult, AliancaError> {
        let update = doc! {
            "$set": {
                "metadata.is_deleted": true,
                "metadata.deleted_at": DateTime::now(),
            }
        };

        self.update_one(filter, update).await
    }
}

/// Drain a cursor, stopping at the first document that fails to read
async fn collect_documents<T, E, S>(cursor: S) -> Result<Vec<T>, AliancaError>
where
    E: std::fmt::Display,
    S: Stream<Item = Result<T, E>>,
{
    cursor
        .map_err(|e| {
            error!("Error reading document: {}", e);
            AliancaError::Database(format!("Failed to read document: {}", e))
        })
        .try_collect()
        .await
}

/// Add `metadata.updated_at` to a `$set` update document
fn touch(mut update: Document) -> UpdateModifications {
    let now = DateTime::now();
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("metadata.updated_at", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "metadata.updated_at": now });
        }
    }
    UpdateModifications::Document(update)
}
