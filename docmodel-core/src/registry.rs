//! Unique-field enforcement through reservation ("proxy") collections.
//!
//! Every unique field of a model has its own registry collection, named
//! `<field>_<collection>_proxy`. Reserving a value inserts a document whose
//! `_id` *is* that value:
//!
//! ```text
//! bar_example_proxy: { _id: "Bar1", owner: <uuid of the example document> }
//! ```
//!
//! The store refuses a second document with the same `_id`, so of any number of
//! concurrent reservations for one value exactly one insert succeeds. That
//! insert is the only synchronization point; no locks are taken in-process.
//!
//! A rejected insert is not necessarily a conflict: the reservation may belong to
//! the same document (a re-save of an unchanged unique value). The registry then
//! reads the reservation back and accepts it when the owner matches.
//!
//! Reservations are never released. Values freed by an update or a delete stay
//! taken, and reservations made by a create or update that failed part-way
//! are left in place.

use bson::{Bson, Document, Uuid, doc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    collection::Collection,
    document::{ID_FIELD, bson_to_identity},
    error::{DocumentStoreError, ModelError, ModelResult},
    query::Filter,
    schema::Schema,
    store::StoreHandle,
};

/// Key holding the identity of the document a reservation was made for.
pub const OWNER_FIELD: &str = "owner";

/// Name of the registry collection for `field` of `model_collection`.
pub fn registry_collection_name(field: &str, model_collection: &str) -> String {
    format!("{field}_{model_collection}_proxy")
}

/// The `_id` a reservation of `value` is stored under.
///
/// Scalars are used as is. Arrays cannot be document identities, so arrays and
/// documents are both wrapped in a document tagged with their kind, which keeps
/// an array and a document shaped like its wrapper apart.
pub fn reservation_key(value: &Bson) -> Bson {
    match value {
        Bson::Array(items) => Bson::Document(doc! { "array": items.clone() }),
        Bson::Document(fields) => Bson::Document(doc! { "document": fields.clone() }),
        other => other.clone(),
    }
}

/// A value held in a registry on behalf of `owner`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub field: String,
    pub value: Bson,
    pub owner: Uuid,
}

#[derive(Debug, Clone)]
pub struct UniquenessRegistry {
    schema: Arc<Schema>,
    store: StoreHandle,
}

impl UniquenessRegistry {
    pub fn new(schema: Arc<Schema>, store: StoreHandle) -> Self {
        Self { schema, store }
    }

    /// The registry collection for `field`.
    pub fn collection_for(&self, field: &str) -> Collection {
        self.store
            .collection(&registry_collection_name(field, self.schema.collection()))
    }

    /// Reserves `value` of `field` for the document identified by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateValue`] if the value is held by another
    /// document, or [`ModelError::Store`] if the registry cannot be written.
    pub async fn reserve(&self, field: &str, value: &Bson, owner: Uuid) -> ModelResult<Reservation> {
        let registry = self.collection_for(field);
        let key = reservation_key(value);
        let reservation = Reservation {
            field: field.to_string(),
            value: value.clone(),
            owner,
        };

        match registry
            .insert_one(doc! { ID_FIELD: key.clone(), OWNER_FIELD: owner })
            .await
        {
            Ok(_) => {
                debug!(registry = registry.name(), %value, %owner, "value reserved");
                Ok(reservation)
            }
            Err(DocumentStoreError::DocumentAlreadyExists(..)) => {
                if Self::holder_of(&registry, &key).await? == Some(owner) {
                    debug!(registry = registry.name(), %value, %owner, "value already held by owner");
                    return Ok(reservation);
                }

                warn!(registry = registry.name(), field, %value, "unique value already taken");
                Err(ModelError::DuplicateValue {
                    field: field.to_string(),
                    value: value.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reserves every non-null unique field present in `values`, in declaration order.
    ///
    /// Stops at the first failure; earlier reservations of the same call are kept.
    pub async fn reserve_all(&self, values: &Document, owner: Uuid) -> ModelResult<Vec<Reservation>> {
        let mut reservations = Vec::new();

        for spec in self.schema.unique_fields() {
            match values.get(spec.name()) {
                None | Some(Bson::Null) => continue,
                Some(value) => reservations.push(self.reserve(spec.name(), value, owner).await?),
            }
        }

        Ok(reservations)
    }

    /// Returns the identity currently holding `value` of `field`, if any.
    pub async fn holder(&self, field: &str, value: &Bson) -> ModelResult<Option<Uuid>> {
        Self::holder_of(&self.collection_for(field), &reservation_key(value)).await
    }

    async fn holder_of(registry: &Collection, key: &Bson) -> ModelResult<Option<Uuid>> {
        let Some(reservation) = registry
            .find_one(&Filter::eq(ID_FIELD, key.clone()))
            .await?
        else {
            return Ok(None);
        };

        match reservation.get(OWNER_FIELD) {
            Some(owner) => Ok(Some(bson_to_identity(owner)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::bson;

    #[test]
    fn registry_names_follow_field_and_collection() {
        assert_eq!(registry_collection_name("bar", "example"), "bar_example_proxy");
    }

    #[test]
    fn scalar_values_are_their_own_key() {
        assert_eq!(reservation_key(&bson!("Bar1")), bson!("Bar1"));
        assert_eq!(reservation_key(&bson!(42)), bson!(42));
    }

    #[test]
    fn arrays_and_documents_are_wrapped_by_kind() {
        assert_eq!(
            reservation_key(&bson!(["a", "b"])),
            bson!({ "array": ["a", "b"] })
        );
        assert_eq!(
            reservation_key(&bson!({ "a": 1 })),
            bson!({ "document": { "a": 1 } })
        );
    }

    #[test]
    fn wrapped_arrays_never_collide_with_documents() {
        let array = bson!(["x", "y"]);
        let lookalike = bson!({ "array": ["x", "y"] });

        assert_ne!(reservation_key(&array), reservation_key(&lookalike));
    }
}
