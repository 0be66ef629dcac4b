//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, DocumentCursor, UpdateOutcome},
    collection::Collection,
    config::StoreConfig,
    document::{DocumentExt, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult, ModelError, ModelResult, SchemaError},
    instance::{InstanceState, ModelInstance},
    model::{Model, ModelDefinition, ReadAll},
    query::{Expr, FieldOp, Filter, QueryVisitor},
    registry::UniquenessRegistry,
    schema::{FieldSpec, Schema},
    store::StoreHandle,
};
