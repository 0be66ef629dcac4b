use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, Uuid, doc};
use mongodb::{
    Client, Collection as MongoCollection, Cursor,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::ClientOptions,
};
use std::time::Duration;
use tracing::{debug, info};
use docmodel_core::{
    backend::{BoxedCursor, DocumentCursor, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    config::StoreConfig,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult, ModelError, ModelResult},
    query::Expr,
    store::StoreHandle,
};

use crate::query::MongoQueryTranslator;

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;


#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// Connects with `config` and binds a store handle for `model_name`.
    ///
    /// The database is `config.db_name`, or `model_name` in lower case.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Connection`] if the configuration is incomplete, the
    /// client cannot be created, or the server does not answer a ping.
    pub async fn bind(config: &StoreConfig, model_name: &str) -> ModelResult<StoreHandle> {
        let settings = config.resolve(model_name)?;
        let dsn = format!("mongodb://{}:{}", settings.host, settings.port);

        let mut builder = MongoDbStoreBuilder::new(&dsn, &settings.database);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        let store = builder
            .build()
            .await
            .map_err(|e| ModelError::Connection(e.to_string()))?;

        info!(model = model_name, host = %settings.host, port = settings.port, database = %settings.database, "connecting to mongodb");

        StoreHandle::bind(model_name, store).await
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

fn backend_error(e: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}

/// Maps a duplicate key rejection to `DocumentAlreadyExists`.
fn write_error(e: MongoError, id: &Bson, collection: &str) -> DocumentStoreError {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY => {
            DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string())
        }
        _ => backend_error(e),
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => Bson::from(Uuid::new()),
        };

        let document = std::iter::once((ID_FIELD.to_string(), id.clone()))
            .chain(document.into_iter().filter(|(key, _)| key != ID_FIELD))
            .collect::<Document>();

        self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| write_error(e, &id, collection))?;

        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(backend_error)
    }

    async fn find(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<BoxedCursor> {
        let cursor = self.get_collection(collection)
            .find(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(backend_error)?;

        Ok(Box::new(MongoDocumentCursor { cursor }))
    }

    async fn update_one(&self, collection: &str, filter: &Expr, set: Document) -> DocumentStoreResult<UpdateOutcome> {
        let filter = MongoQueryTranslator::translate(filter)?;
        let collection = self.get_collection(collection);

        // `$set` refuses an empty document; an empty update only counts the match.
        if set.is_empty() {
            let matched = collection
                .count_documents(filter)
                .limit(1)
                .await
                .map_err(backend_error)?;

            return Ok(UpdateOutcome { matched, modified: 0 });
        }

        let result = collection
            .update_one(filter, doc! { "$set": set })
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(&self, collection: &str, filter: &Expr, set: Document) -> DocumentStoreResult<UpdateOutcome> {
        let filter = MongoQueryTranslator::translate(filter)?;
        let collection = self.get_collection(collection);

        if set.is_empty() {
            let matched = collection
                .count_documents(filter)
                .await
                .map_err(backend_error)?;

            return Ok(UpdateOutcome { matched, modified: 0 });
        }

        let result = collection
            .update_many(filter, doc! { "$set": set })
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(MongoQueryTranslator::translate(filter)?)
                .await
                .map_err(backend_error)?
                .deleted_count
        )
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(MongoQueryTranslator::translate(filter)?)
                .await
                .map_err(backend_error)?
                .deleted_count
        )
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        debug!(database = %self.database, "shutting down mongodb client");
        self.client.clone().shutdown().await;

        Ok(())
    }
}


/// Server-side cursor pulled one batch at a time.
#[derive(Debug)]
pub struct MongoDocumentCursor {
    cursor: Cursor<Document>,
}

#[async_trait]
impl DocumentCursor for MongoDocumentCursor {
    async fn next_batch(&mut self, size: usize) -> DocumentStoreResult<Vec<Document>> {
        let mut batch = Vec::with_capacity(size);

        while batch.len() < size {
            match self.cursor.try_next().await.map_err(backend_error)? {
                Some(document) => batch.push(document),
                None => break,
            }
        }

        Ok(batch)
    }
}


pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    timeout: Option<Duration>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            timeout: None,
        }
    }

    /// Bounds server selection and connection attempts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if let Some(timeout) = self.timeout {
            options.server_selection_timeout = Some(timeout);
            options.connect_timeout = Some(timeout);
        }

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_rejects_incomplete_configuration_before_connecting() {
        let config = StoreConfig::from_yaml_str("port: 27017\n").unwrap();

        let err = MongoDbStore::bind(&config, "Example").await.unwrap_err();
        assert!(matches!(err, ModelError::Connection(_)), "{err:?}");
    }
}
