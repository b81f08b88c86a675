//! Collaborators handed to every service at construction time.

use std::sync::Arc;

use nexus_config::Config;

use crate::security::TokenGuard;

/// Shared, read-only state passed to each worker.
///
/// The orchestrator builds one context before forking; children inherit a
/// copy, so no state is shared between processes afterwards.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    config: Arc<Config>,
    guard: Arc<TokenGuard>,
}

impl ServiceContext {
    /// Bundles the loaded configuration and token guard.
    #[must_use]
    pub const fn new(config: Arc<Config>, guard: Arc<TokenGuard>) -> Self {
        Self { config, guard }
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared token guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<TokenGuard> {
        &self.guard
    }
}
