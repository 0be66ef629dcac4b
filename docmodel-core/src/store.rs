//! The store handle shared by a model, its instances and its collection operations.
//!
//! A [`StoreHandle`] only exists for a backend that answered a liveness probe:
//! [`StoreHandle::bind`] pings first and refuses to produce a handle otherwise.
//! Handles are cheap to clone and safe to use from many tasks at once.
//!
//! ```ignore
//! use docmodel::{store::StoreHandle, memory::InMemoryStore};
//!
//! let store = StoreHandle::bind("example", InMemoryStore::new()).await?;
//! let raw = store.collection("example");
//! // ...
//! store.shutdown().await?;
//! ```

use std::sync::Arc;
use tracing::{error, info};

use crate::{
    backend::StoreBackend,
    collection::Collection,
    error::{DocumentStoreResult, ModelError, ModelResult},
};

#[derive(Debug, Clone)]
pub struct StoreHandle {
    backend: Arc<dyn StoreBackend>,
}

impl StoreHandle {
    /// Probes `backend` and wraps it in a handle.
    ///
    /// `model_name` identifies the model the handle is bound for in logs and errors.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Connection`] if the probe fails.
    pub async fn bind<B>(model_name: &str, backend: B) -> ModelResult<Self>
    where
        B: StoreBackend + 'static,
    {
        Self::bind_shared(model_name, Arc::new(backend)).await
    }

    /// Like [`StoreHandle::bind`], for a backend that is already shared.
    pub async fn bind_shared(
        model_name: &str,
        backend: Arc<dyn StoreBackend>,
    ) -> ModelResult<Self> {
        if let Err(e) = backend.ping().await {
            error!(model = model_name, error = %e, "store liveness probe failed");
            return Err(ModelError::Connection(format!(
                "no connection to the store for model {model_name}: {e}"
            )));
        }

        info!(model = model_name, "store bound");

        Ok(Self { backend })
    }

    /// Returns a handle to the named collection.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(name.to_string(), Arc::clone(&self.backend))
    }

    /// Re-runs the liveness probe.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    /// Releases backend resources. Further calls through any clone of this
    /// handle fail with a backend error or are unspecified, depending on the backend.
    pub async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}
