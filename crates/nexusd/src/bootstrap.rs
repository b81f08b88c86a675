//! Orchestrator bootstrap: configuration, telemetry, token and routes.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use nexus_config::{Config, SocketLayoutError};

use crate::app::{default_handlers, default_manifest};
use crate::context::ServiceContext;
use crate::routing::{RouteManifest, RouteTable, RouteTableError, Router, ValidatorRegistry};
use crate::security::{TokenError, TokenGuard};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Source of the orchestrator configuration.
pub trait ConfigLoader {
    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error raised while merging layers.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration that was built in memory.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The shared token could not be loaded or created.
    #[error("failed to prepare the shared token: {source}")]
    Token {
        /// Underlying token error.
        #[source]
        source: TokenError,
    },
    /// The route table could not be built.
    #[error("failed to build the route table: {source}")]
    Routes {
        /// Underlying route error.
        #[source]
        source: RouteTableError,
    },
    /// The socket directory could not be prepared.
    #[error("failed to prepare the socket directory: {source}")]
    Socket {
        /// Underlying filesystem error.
        #[source]
        source: SocketLayoutError,
    },
}

/// Everything the supervisor needs before it forks.
#[derive(Debug)]
pub struct Runtime {
    context: ServiceContext,
    router: Router,
    telemetry: TelemetryHandle,
}

impl Runtime {
    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.context.config()
    }

    /// Context handed to each service.
    #[must_use]
    pub const fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Router shared by every worker.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Splits the runtime into its context and router.
    #[must_use]
    pub fn into_parts(self) -> (ServiceContext, Router) {
        (self.context, self.router)
    }
}

/// Bootstraps the orchestrator from `loader`.
///
/// # Errors
///
/// Returns [`BootstrapError`] for the first step that fails.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Runtime, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let guard = TokenGuard::load_or_create(config.auth_token_path())
        .map_err(|source| BootstrapError::Token { source })?;
    let router = build_router(&config).map_err(|source| BootstrapError::Routes { source })?;
    config
        .socket_layout()
        .prepare_directory()
        .map_err(|source| BootstrapError::Socket { source })?;

    info!(
        target: BOOTSTRAP_TARGET,
        socket_dir = %config.socket_dir(),
        routes = router.table().len(),
        "bootstrap complete"
    );
    Ok(Runtime {
        context: ServiceContext::new(Arc::new(config), Arc::new(guard)),
        router,
        telemetry,
    })
}

/// Compiles the configured route manifest, or the built-in one.
///
/// # Errors
///
/// Returns [`RouteTableError`] when the manifest cannot be read or compiled.
pub fn build_router(config: &Config) -> Result<Router, RouteTableError> {
    let manifest = match config.routes_path() {
        Some(path) => RouteManifest::load(path)?,
        None => default_manifest(),
    };
    let table = RouteTable::build(
        &manifest,
        &default_handlers(),
        &ValidatorRegistry::standard(),
    )?;
    Ok(Router::new(Arc::new(table)))
}
