//! Shared state injected into the multiplexer and every session.

use crate::config::ServerConfig;
use pagelog_core::{PageStore, Stores, ValueStore};

/// Configuration plus the stores commands run against.
pub struct ServerContext {
    /// Server configuration.
    pub config: ServerConfig,
    stores: Stores,
}

impl ServerContext {
    /// Creates a new context.
    pub fn new(config: ServerConfig, stores: Stores) -> Self {
        Self { config, stores }
    }

    /// Pages and page lines.
    pub fn pages(&self) -> &PageStore {
        &self.stores.pages
    }

    /// Saved values.
    pub fn values(&self) -> &ValueStore {
        &self.stores.values
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
