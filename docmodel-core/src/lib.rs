//! A minimal object-document mapper over a schemaless document store.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Schemas** ([`schema`]) - Validated model declarations: a collection name and ordered, optionally unique fields
//! - **Models** ([`model`]) - Collection-level create, read, update and delete with uniqueness enforcement
//! - **Instances** ([`instance`]) - Single documents with a save/update/delete lifecycle
//! - **Uniqueness registry** ([`registry`]) - Reservation collections that make unique fields race-free
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Store handle** ([`store`]) - A probed, shareable connection to a backend
//! - **Filters** ([`query`]) - Criteria for reads, updates and deletes
//! - **Configuration** ([`config`]) - YAML connection settings
//! - **Error handling** ([`error`]) - Store, schema and model error types
//!
//! # Example
//!
//! ```ignore
//! use docmodel_core::{model::Model, query::Filter, schema::Schema};
//! use bson::doc;
//!
//! let schema = Schema::builder("example").field("foo").unique_field("bar").build()?;
//! let model = Model::new("Example", schema, store);
//!
//! model.create(doc! { "foo": "Foo", "bar": "Bar1" }).await?;
//! let found = model.read_one(&Filter::eq("bar", "Bar1")).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod instance;
pub mod model;
pub mod query;
pub mod registry;
pub mod schema;
pub mod store;
