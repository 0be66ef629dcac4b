//! Main docmodel crate: models with unique fields over a schemaless document store.
//!
//! This crate is the primary entry point for users of docmodel. It re-exports the
//! core types and functionality from the sub-crates and provides access to the
//! storage backends.
//!
//! # Features
//!
//! - **Validated models** - A collection name and ordered fields, checked once at definition
//! - **Unique fields** - Enforced through reservation collections, safe under concurrent writers
//! - **Instance lifecycle** - Save, update and delete single documents
//! - **Batched reads** - Read every match a page at a time, or as a stream
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! struct Example;
//!
//! impl ModelDefinition for Example {
//!     const NAME: &'static str = "Example";
//!     fn collection_name() -> &'static str { "example" }
//!     fn fields() -> Vec<FieldSpec> {
//!         vec![FieldSpec::new("foo", false), FieldSpec::new("bar", true)]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StoreHandle::bind(Example::NAME, InMemoryStore::new()).await?;
//!     let model = Model::define::<Example>(store)?;
//!
//!     let mut instance = model.instance(doc! { "foo": "Foo", "bar": "Bar1" })?;
//!     instance.save().await?;
//!
//!     // A second document may not take the same `bar`.
//!     let err = model.create(doc! { "foo": "Other", "bar": "Bar1" }).await.unwrap_err();
//!     assert!(err.is_duplicate_of("bar"));
//!
//!     let everything = model.read_all(Filter::all(), 10).try_collect().await?;
//!     println!("{} documents", everything.len());
//!
//!     instance.delete().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, collection, config, document, error, instance, model, query, registry, schema, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
