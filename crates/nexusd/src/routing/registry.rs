//! Controllers and the registry that resolves them by key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::errors::HandlerError;

/// Optional capability for controllers that render through a template.
pub trait Templated {
    /// Selects the template declared on the matched route.
    fn set_template(&mut self, template: &str);
}

/// Request handler constructed fresh for every dispatched request.
pub trait Controller {
    /// Receives the request payload before the action runs.
    fn set_data(&mut self, data: Map<String, Value>);

    /// Exposes the template capability when the controller has one.
    fn templated(&mut self) -> Option<&mut dyn Templated> {
        None
    }

    /// Runs `action` with the route's path variables as positional
    /// arguments. The returned value is the response body.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the action is unknown or fails.
    fn call(&mut self, action: &str, args: &[String]) -> Result<Value, HandlerError>;
}

/// Builds a controller instance.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    actions: Vec<String>,
    factory: ControllerFactory,
}

/// Maps controller keys to factories and their declared actions.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    controllers: HashMap<String, Registration>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller under `key` exposing `actions`.
    pub fn register<F, C>(&mut self, key: impl Into<String>, actions: &[&str], factory: F) -> &mut Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        let factory: ControllerFactory =
            Arc::new(move || -> Box<dyn Controller> { Box::new(factory()) });
        self.controllers.insert(
            key.into(),
            Registration {
                actions: actions.iter().map(|action| (*action).to_owned()).collect(),
                factory,
            },
        );
        self
    }

    /// Returns true when `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.controllers.contains_key(key)
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<(&[String], &ControllerFactory)> {
        self.controllers
            .get(key)
            .map(|registration| (registration.actions.as_slice(), &registration.factory))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("controllers", &keys)
            .finish()
    }
}
