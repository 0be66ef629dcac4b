//! Instances of a model: one document's field values plus its lifecycle.
//!
//! ```text
//! Unpersisted --save--> Persisted --delete--> Deleted
//!                          |  ^
//!                          save/update
//! ```
//!
//! A deleted instance refuses every further operation with
//! [`ModelError::Deleted`].

use bson::{Bson, Document, Uuid, de::deserialize_from_bson};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    backend::UpdateOutcome,
    document::{DocumentExt, ID_FIELD, from_document},
    error::{ModelError, ModelResult, SchemaError},
    model::Model,
    query::Filter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Never written to the store.
    Unpersisted,
    /// Has an identity in the store.
    Persisted,
    /// Removed through [`ModelInstance::delete`].
    Deleted,
}

#[derive(Debug, Clone)]
pub struct ModelInstance {
    model: Model,
    identity: Option<Uuid>,
    values: Document,
    state: InstanceState,
}

impl ModelInstance {
    /// Validates `values` against the model and builds an instance from them.
    ///
    /// Declared fields missing from `values` are set to null. A UUID `_id` makes
    /// the instance persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Schema`] for an undeclared key and
    /// [`ModelError::Store`] for an `_id` that is not a UUID.
    pub(crate) fn new(model: Model, values: Document) -> ModelResult<Self> {
        model.schema().check_keys(&values)?;

        let identity = values.identity()?;
        let state = match identity {
            Some(_) => InstanceState::Persisted,
            None => InstanceState::Unpersisted,
        };
        let values = model.schema().normalize(&values);

        Ok(Self {
            model,
            identity,
            values,
            state,
        })
    }

    pub(crate) fn persisted(model: Model, identity: Uuid, values: Document) -> Self {
        Self {
            model,
            identity: Some(identity),
            values,
            state: InstanceState::Persisted,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn identity(&self) -> Option<Uuid> {
        self.identity
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Declared fields and their current values, without `_id`.
    pub fn values(&self) -> &Document {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.values.get(field)
    }

    /// Reads a field as a typed value. Null reads as `None`.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> ModelResult<Option<T>> {
        match self.values.get(field) {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => Ok(Some(deserialize_from_bson(value.clone())?)),
        }
    }

    /// Changes a field locally. Nothing is written until [`ModelInstance::save`].
    pub fn set(&mut self, field: &str, value: impl Into<Bson>) -> ModelResult<()> {
        self.ensure_live()?;

        if self.model.schema().field(field).is_none() {
            return Err(SchemaError::UnknownField(
                field.to_string(),
                self.model.schema().collection().to_string(),
            )
            .into());
        }

        self.values.insert(field, value.into());
        Ok(())
    }

    /// The instance as a document, `_id` first when there is one.
    pub fn to_document(&self) -> Document {
        self.identity
            .map(|id| (ID_FIELD.to_string(), Bson::from(id)))
            .into_iter()
            .chain(self.values.clone())
            .collect()
    }

    /// Deserializes the instance, `_id` included, into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ModelResult<T> {
        Ok(from_document(self.to_document())?)
    }

    /// Writes the instance.
    ///
    /// An unpersisted instance is created and takes the new identity. A
    /// persisted one has all of its values written back to its document.
    ///
    /// # Errors
    ///
    /// - [`ModelError::DuplicateValue`] if a unique value is held by another document.
    /// - [`ModelError::NotFound`] if the instance's document no longer exists.
    /// - [`ModelError::Deleted`] after [`ModelInstance::delete`].
    pub async fn save(&mut self) -> ModelResult<()> {
        self.ensure_live()?;

        match self.identity {
            None => {
                let created = self.model.create(self.values.clone()).await?;
                self.identity = created.identity;
                self.values = created.values;
                self.state = InstanceState::Persisted;
            }
            Some(id) => {
                let outcome = self
                    .model
                    .update_one(&Filter::id(id), self.values.clone())
                    .await?;

                if outcome.matched == 0 {
                    return Err(self.not_found(id));
                }
                debug!(model = self.model.name(), %id, "instance saved");
            }
        }

        Ok(())
    }

    /// Sets `values` on the instance's document, then on the instance itself.
    ///
    /// # Errors
    ///
    /// - [`ModelError::Schema`] for a key the model does not declare, `_id` included.
    /// - [`ModelError::NotFound`] if the instance has no document in the store.
    /// - [`ModelError::DuplicateValue`] if a unique value is held by another document.
    pub async fn update(&mut self, values: Document) -> ModelResult<UpdateOutcome> {
        self.ensure_live()?;
        self.model.schema().check_fields(&values)?;

        let Some(id) = self.identity else {
            return Err(ModelError::NotFound(format!(
                "unsaved instance of {} has no document",
                self.model.name()
            )));
        };

        if self.model.read_one(&Filter::id(id)).await?.is_none() {
            return Err(self.not_found(id));
        }

        let outcome = self.model.update_one(&Filter::id(id), values.clone()).await?;
        for (field, value) in values {
            self.values.insert(field, value);
        }

        Ok(outcome)
    }

    /// Deletes the document holding exactly this instance's identity and values.
    ///
    /// A persisted instance is unusable afterwards, whether or not a document
    /// was found.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no such document exists, for example
    /// because it was changed in the store since the instance was read.
    pub async fn delete(&mut self) -> ModelResult<()> {
        self.ensure_live()?;

        let Some(id) = self.identity else {
            return Err(ModelError::NotFound(format!(
                "unsaved instance of {} has no document",
                self.model.name()
            )));
        };

        let filter = Filter::id(id).and(Filter::matching(&self.values));
        let deleted = self.model.destroy(&filter).await?;
        self.state = InstanceState::Deleted;

        if deleted == 0 {
            return Err(self.not_found(id));
        }

        info!(model = self.model.name(), %id, "instance deleted");
        Ok(())
    }

    fn ensure_live(&self) -> ModelResult<()> {
        match self.state {
            InstanceState::Deleted => Err(ModelError::Deleted),
            _ => Ok(()),
        }
    }

    fn not_found(&self, id: Uuid) -> ModelError {
        ModelError::NotFound(format!(
            "document {id} in collection {}",
            self.model.schema().collection()
        ))
    }
}
