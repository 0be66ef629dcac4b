//! Models: a validated schema bound to a store, plus the collection-level
//! operations over its documents.
//!
//! A [`Model`] is created once per model kind, either from a [`Schema`] directly
//! or from a type implementing [`ModelDefinition`]. It is cheap to clone; every
//! [`ModelInstance`] it produces carries a clone.
//!
//! ```ignore
//! struct Example;
//!
//! impl ModelDefinition for Example {
//!     const NAME: &'static str = "Example";
//!
//!     fn collection_name() -> &'static str {
//!         "example"
//!     }
//!
//!     fn fields() -> Vec<FieldSpec> {
//!         vec![FieldSpec::new("foo", false), FieldSpec::new("bar", true)]
//!     }
//! }
//!
//! let model = Model::define::<Example>(store)?;
//! let created = model.create(doc! { "foo": "Foo", "bar": "Bar1" }).await?;
//! let all = model.read_all(Filter::all(), 10).try_collect().await?;
//! ```

use bson::{Bson, Document, Uuid};
use futures::{Stream, TryStreamExt, stream};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    backend::{BoxedCursor, UpdateOutcome},
    collection::Collection,
    document::{DocumentExt, ID_FIELD, to_document},
    error::{DocumentStoreError, ModelError, ModelResult, SchemaError},
    instance::ModelInstance,
    query::{Expr, Filter},
    registry::UniquenessRegistry,
    schema::{FieldSpec, Schema},
    store::StoreHandle,
};

/// Static declaration of a model kind.
pub trait ModelDefinition {
    /// Name of the model kind. Used in logs and as the default database name.
    const NAME: &'static str;

    fn collection_name() -> &'static str;

    fn fields() -> Vec<FieldSpec>;

    /// Validates the declaration.
    fn schema() -> Result<Schema, SchemaError> {
        Schema::validate(Self::collection_name(), Self::fields())
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    name: Arc<str>,
    schema: Arc<Schema>,
    store: StoreHandle,
    registry: UniquenessRegistry,
}

impl Model {
    pub fn new(name: &str, schema: Schema, store: StoreHandle) -> Self {
        let schema = Arc::new(schema);
        let registry = UniquenessRegistry::new(Arc::clone(&schema), store.clone());

        Self {
            name: Arc::from(name),
            schema,
            store,
            registry,
        }
    }

    /// Builds the model declared by `M`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] if the declaration is invalid.
    pub fn define<M: ModelDefinition>(store: StoreHandle) -> ModelResult<Self> {
        Ok(Self::new(M::NAME, M::schema()?, store))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn registry(&self) -> &UniquenessRegistry {
        &self.registry
    }

    /// The underlying collection, for operations the model does not cover.
    ///
    /// Writes made through it bypass uniqueness enforcement.
    pub fn raw_collection(&self) -> Collection {
        self.store.collection(self.schema.collection())
    }

    /// Builds an unsaved instance from `values`.
    ///
    /// An `_id` among the values makes the instance persisted.
    pub fn instance(&self, values: Document) -> ModelResult<ModelInstance> {
        ModelInstance::new(self.clone(), values)
    }

    /// Reserves the unique values of `values` and inserts a new document.
    ///
    /// The stored document holds every declared field, null where `values` has
    /// none, and a newly generated `_id`. An `_id` among `values` is ignored.
    ///
    /// # Errors
    ///
    /// - [`ModelError::Schema`] for a key the model does not declare.
    /// - [`ModelError::DuplicateValue`] if a unique value is held by another document.
    ///   Nothing is inserted, reservations made before the failing one are kept.
    pub async fn create(&self, values: Document) -> ModelResult<ModelInstance> {
        self.schema.check_keys(&values)?;

        let id = Uuid::new();
        self.registry.reserve_all(&values, id).await?;

        let fields = self.schema.normalize(&values);
        let document = std::iter::once((ID_FIELD.to_string(), Bson::from(id)))
            .chain(fields.clone())
            .collect::<Document>();

        self.raw_collection().insert_one(document).await?;
        info!(model = %self.name, %id, "document created");

        Ok(ModelInstance::persisted(self.clone(), id, fields))
    }

    /// Like [`Model::create`], taking the values from a serializable type.
    pub async fn create_from<T: Serialize>(&self, value: &T) -> ModelResult<ModelInstance> {
        let values = to_document(value)?;

        self.create(values.without_identity()).await
    }

    /// Returns the first document matching `filter`.
    pub async fn read_one(&self, filter: &Expr) -> ModelResult<Option<ModelInstance>> {
        match self.raw_collection().find_one(filter).await? {
            Some(document) => Ok(Some(self.hydrate(document)?)),
            None => Ok(None),
        }
    }

    /// Returns every document matching `filter`, fetched `page_size` at a time.
    ///
    /// Nothing is read until the first batch is requested. A `page_size` of 0 is
    /// treated as 1.
    pub fn read_all(&self, filter: Expr, page_size: usize) -> ReadAll {
        ReadAll {
            model: self.clone(),
            filter,
            page_size: page_size.max(1),
            cursor: None,
            exhausted: false,
        }
    }

    /// Sets `values` on the first document matching `filter`.
    ///
    /// Unique values are reserved for that document before it is written. With no
    /// matching document nothing is reserved and the outcome is all zeros.
    ///
    /// # Errors
    ///
    /// - [`ModelError::Schema`] for a key the model does not declare, `_id` included.
    /// - [`ModelError::DuplicateValue`] if a unique value is held by another document.
    pub async fn update_one(&self, filter: &Expr, values: Document) -> ModelResult<UpdateOutcome> {
        self.schema.check_fields(&values)?;

        let collection = self.raw_collection();
        let Some(target) = collection.find_one(filter).await? else {
            debug!(model = %self.name, ?filter, "update_one matched nothing");
            return Ok(UpdateOutcome::default());
        };

        let id = identity_of(&target)?;
        self.update_by_id(&collection, id, values).await
    }

    /// Sets `values` on every document matching `filter`.
    ///
    /// A unique value cannot be written to two documents, so when `values` holds a
    /// non-null unique field the update may touch at most one document.
    ///
    /// # Errors
    ///
    /// - [`ModelError::Schema`] for a key the model does not declare, `_id` included.
    /// - [`ModelError::DuplicateValue`] if a unique value is held by another
    ///   document, or if it would be written to more than one document.
    pub async fn update_many(&self, filter: &Expr, values: Document) -> ModelResult<UpdateOutcome> {
        self.schema.check_fields(&values)?;

        let collection = self.raw_collection();
        let unique = self.schema.unique_fields().find_map(|spec| {
            values
                .get(spec.name())
                .filter(|value| !matches!(value, Bson::Null))
                .map(|value| (spec.name(), value))
        });

        let Some((field, value)) = unique else {
            return Ok(collection.update_many(filter, values).await?);
        };

        let mut cursor = collection.find(filter).await?;
        let mut targets = cursor.next_batch(2).await?;

        match targets.len() {
            0 => Ok(UpdateOutcome::default()),
            1 => {
                let id = identity_of(&targets.remove(0))?;
                self.update_by_id(&collection, id, values).await
            }
            _ => {
                warn!(model = %self.name, field, %value, "unique value would be written to several documents");
                Err(ModelError::DuplicateValue {
                    field: field.to_string(),
                    value: value.clone(),
                })
            }
        }
    }

    /// Deletes the first document matching `filter`. Returns the number deleted.
    pub async fn destroy(&self, filter: &Expr) -> ModelResult<u64> {
        let deleted = self.raw_collection().delete_one(filter).await?;
        debug!(model = %self.name, deleted, "destroy");

        Ok(deleted)
    }

    /// Deletes every document matching `filter`. Returns the number deleted.
    pub async fn destroy_many(&self, filter: &Expr) -> ModelResult<u64> {
        let deleted = self.raw_collection().delete_many(filter).await?;
        debug!(model = %self.name, deleted, "destroy_many");

        Ok(deleted)
    }

    async fn update_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
        values: Document,
    ) -> ModelResult<UpdateOutcome> {
        self.registry.reserve_all(&values, id).await?;

        let outcome = collection.update_one(&Filter::id(id), values).await?;
        debug!(model = %self.name, %id, matched = outcome.matched, modified = outcome.modified, "document updated");

        Ok(outcome)
    }

    pub(crate) fn hydrate(&self, document: Document) -> ModelResult<ModelInstance> {
        let id = identity_of(&document)?;

        Ok(ModelInstance::persisted(
            self.clone(),
            id,
            self.schema.normalize(&document),
        ))
    }
}

fn identity_of(document: &Document) -> ModelResult<Uuid> {
    document.identity()?.ok_or_else(|| {
        DocumentStoreError::InvalidDocument("stored document has no _id".into()).into()
    })
}

/// Batched reader returned by [`Model::read_all`].
///
/// Each call to [`ReadAll::next_batch`] fetches at most `page_size` documents.
/// Calling [`Model::read_all`] again starts over from the beginning.
#[derive(Debug)]
pub struct ReadAll {
    model: Model,
    filter: Expr,
    page_size: usize,
    cursor: Option<BoxedCursor>,
    exhausted: bool,
}

impl ReadAll {
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetches the next batch. Returns `None` once every match has been returned.
    pub async fn next_batch(&mut self) -> ModelResult<Option<Vec<ModelInstance>>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.cursor.is_none() {
            let cursor = self.model.raw_collection().find(&self.filter).await?;
            self.cursor = Some(cursor);
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let batch = cursor.next_batch(self.page_size).await?;

        if batch.is_empty() {
            self.exhausted = true;
            self.cursor = None;
            return Ok(None);
        }

        batch
            .into_iter()
            .map(|document| self.model.hydrate(document))
            .collect::<ModelResult<Vec<_>>>()
            .map(Some)
    }

    /// Reads every remaining batch.
    pub async fn try_collect(mut self) -> ModelResult<Vec<ModelInstance>> {
        let mut instances = Vec::new();

        while let Some(batch) = self.next_batch().await? {
            instances.extend(batch);
        }

        Ok(instances)
    }

    /// Turns the reader into a stream of instances.
    pub fn into_stream(self) -> impl Stream<Item = ModelResult<ModelInstance>> {
        let batches = stream::try_unfold(self, |mut reader| async move {
            let batch = reader.next_batch().await?;

            Ok::<_, ModelError>(batch.map(|instances| {
                (
                    stream::iter(instances.into_iter().map(Ok::<_, ModelError>)),
                    reader,
                )
            }))
        });

        batches.try_flatten()
    }
}
