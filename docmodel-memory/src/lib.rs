//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Identity enforcement** - Inserts with an existing `_id` are refused atomically
//! - **Full filter support** - Every filter expression is evaluated in process
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{model::Model, schema::Schema, store::StoreHandle, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StoreHandle::bind("Example", InMemoryStore::new()).await?;
//!     let schema = Schema::builder("example").field("foo").unique_field("bar").build()?;
//!     let model = Model::new("Example", schema, store);
//!
//!     model.create(doc! { "foo": "Foo", "bar": "Bar1" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod store;
mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder, SnapshotCursor};
