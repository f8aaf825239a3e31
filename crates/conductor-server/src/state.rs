//! Shared application state.

use std::sync::Arc;

use conductor_core::{ConductorConfig, Error, Result, StoreBackend};
use conductor_runtime::Orchestrator;
use conductor_store::{JobStore, MemoryJobStore, SqliteJobStore};
use conductor_tools::{builtin_registry, MemoryBank, SshPolicy};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ConductorConfig,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(config: ConductorConfig, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Builtin catalogue on top of `store`.
    pub fn with_builtin_tools(config: ConductorConfig, store: Arc<dyn JobStore>) -> Result<Self> {
        let registry = builtin_registry(Arc::new(MemoryBank::new()), Arc::new(SshPolicy::from_env()));
        let orchestrator = Orchestrator::new(&config, store, Arc::new(registry))?;
        Ok(Self::new(config, orchestrator))
    }

    pub fn store_name(&self) -> &'static str {
        self.orchestrator.store().backend_name()
    }
}

/// The job store selected by the configuration.
pub fn open_store(config: &ConductorConfig) -> Result<Arc<dyn JobStore>> {
    match config.store_backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryJobStore::new())),
        StoreBackend::Sqlite => {
            let paths = config
                .data_paths
                .as_ref()
                .ok_or_else(|| Error::Config("sqlite store needs a data directory".into()))?;
            Ok(Arc::new(SqliteJobStore::open(&paths.jobs_db)?))
        }
    }
}
