//! Shared handler state.

use std::sync::Arc;
use std::time::Instant;

use alma_core::AlmaConfig;
use alma_resolver::Resolver;
use alma_source::ExternalSourceClient;
use alma_storage::{DocumentBackend, LmdbDocumentBackend, PersistentStore};

use crate::error::ApiResult;

#[derive(Debug, Clone)]
pub struct AppState {
    pub resolver: Resolver,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            start_time: Instant::now(),
        }
    }

    /// Wire a resolver over an arbitrary document backend.
    pub fn with_backend(config: &AlmaConfig, backend: Arc<dyn DocumentBackend>) -> Self {
        let resolver = Resolver::with_defaults(
            config.resolver.clone(),
            PersistentStore::new(backend),
            ExternalSourceClient::from_config(&config.source),
        );
        Self::new(resolver)
    }

    /// Validate `config`, open the LMDB store and wire the resolver.
    pub fn from_config(config: &AlmaConfig) -> ApiResult<Self> {
        config.validate()?;
        let backend = LmdbDocumentBackend::new(&config.store.path, config.store.max_size_mb)?;
        tracing::info!(
            path = %config.store.path.display(),
            max_size_mb = config.store.max_size_mb,
            "Persistent store opened"
        );
        Ok(Self::with_backend(config, Arc::new(backend)))
    }
}
