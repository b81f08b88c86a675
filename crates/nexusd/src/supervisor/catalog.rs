//! Service classes the supervisor can instantiate inside a worker.

use std::collections::BTreeMap;
use std::fmt;

use nix::errno::Errno;
use thiserror::Error;

use crate::context::ServiceContext;
use crate::routing::Router;
use crate::signals::WorkerSignals;
use crate::transport::{ListenerError, ServiceWorker};

/// Class name of the Unix socket service.
pub const SOCKET_SERVICE: &str = "socket";

/// A long-running unit executed inside a forked worker.
pub trait Service {
    /// Serves requests until the worker is asked to stop.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service cannot continue; the worker
    /// then exits with status 1.
    fn listen(&mut self, router: &Router) -> Result<(), ServiceError>;
}

/// Builds a service from its name and the shared context.
pub type ServiceFactory = fn(&str, &ServiceContext) -> Result<Box<dyn Service>, ServiceError>;

/// Failures raised while constructing or running a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The class is not registered.
    #[error("unknown service class '{class}'")]
    UnknownClass {
        /// Requested class.
        class: String,
    },
    /// The worker's signal handlers could not be installed.
    #[error("failed to install worker signal handlers: {0}")]
    Signals(#[source] Errno),
    /// The socket listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Registry of service classes.
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    factories: BTreeMap<String, ServiceFactory>,
}

impl fmt::Debug for ServiceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl ServiceCatalog {
    /// Empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue holding the built-in [`SOCKET_SERVICE`] class.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(SOCKET_SERVICE, SocketService::create);
        catalog
    }

    /// Adds or replaces a class.
    pub fn register(&mut self, class: impl Into<String>, factory: ServiceFactory) -> &mut Self {
        self.factories.insert(class.into(), factory);
        self
    }

    /// Reports whether `class` is registered.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    /// Instantiates `class` for the service `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownClass`] for unregistered classes, or the
    /// factory's own error.
    pub fn create(
        &self,
        class: &str,
        name: &str,
        context: &ServiceContext,
    ) -> Result<Box<dyn Service>, ServiceError> {
        let factory = self
            .factories
            .get(class)
            .ok_or_else(|| ServiceError::UnknownClass {
                class: class.to_owned(),
            })?;
        factory(name, context)
    }
}

/// Socket transport service running in a forked worker.
struct SocketService {
    worker: ServiceWorker<WorkerSignals>,
}

impl SocketService {
    fn create(name: &str, context: &ServiceContext) -> Result<Box<dyn Service>, ServiceError> {
        let signals = WorkerSignals::install().map_err(ServiceError::Signals)?;
        let worker = ServiceWorker::bind(name, context, signals)?;
        Ok(Box::new(Self { worker }))
    }
}

impl Service for SocketService {
    fn listen(&mut self, router: &Router) -> Result<(), ServiceError> {
        self.worker.listen(router)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::TokenGuard;
    use nexus_config::Config;
    use std::sync::Arc;

    struct Idle;

    impl Service for Idle {
        fn listen(&mut self, _router: &Router) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    fn idle(_name: &str, _context: &ServiceContext) -> Result<Box<dyn Service>, ServiceError> {
        Ok(Box::new(Idle))
    }

    fn context() -> ServiceContext {
        ServiceContext::new(
            Arc::new(Config::default()),
            Arc::new(TokenGuard::from_token("t")),
        )
    }

    #[test]
    fn standard_catalogue_offers_socket_service() {
        let catalog = ServiceCatalog::standard();
        assert!(catalog.contains(SOCKET_SERVICE));
        assert!(!catalog.contains("queue"));
    }

    #[test]
    fn creates_registered_classes() {
        let mut catalog = ServiceCatalog::new();
        catalog.register("idle", idle);
        assert!(catalog.create("idle", "one", &context()).is_ok());
    }

    #[test]
    fn rejects_unknown_classes() {
        let catalog = ServiceCatalog::new();
        let error = catalog
            .create("missing", "one", &context())
            .err()
            .expect("unknown class");
        assert!(matches!(error, ServiceError::UnknownClass { class } if class == "missing"));
    }
}
