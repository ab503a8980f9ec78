use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigError, ServerConfig};
use crate::core::call::CallRegistry;
use crate::core::state::BackendProvider;
use crate::core::CoreState;
use crate::utils::req_manager::ReqManager;

pub mod sessions;

pub use sessions::{SessionStore, SessionTicket};

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Core layer state that holds shared resources, such as the HTTP pool
    pub core_state: Arc<CoreState>,
    /// Pending single-use tokens for `/ws`
    pub sessions: SessionStore,
    /// Live calls
    pub calls: Arc<CallRegistry>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, ConfigError> {
        let core_state = CoreState::new(&config)?;
        Ok(Self::assemble(config, core_state))
    }

    /// State whose calls use the given backends instead of the configured providers
    pub fn with_backends(
        config: ServerConfig,
        backends: Arc<dyn BackendProvider>,
    ) -> Result<Arc<Self>, ConfigError> {
        let http = ReqManager::new(1).map_err(|e| ConfigError::Validation(e.to_string()))?;
        let core_state = CoreState::with_backends(Arc::new(http), backends);
        Ok(Self::assemble(config, core_state))
    }

    fn assemble(config: ServerConfig, core_state: Arc<CoreState>) -> Arc<Self> {
        let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_seconds));
        Arc::new(Self {
            config,
            core_state,
            sessions,
            calls: Arc::new(CallRegistry::new()),
        })
    }
}
