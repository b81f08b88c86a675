//! Built-in application routes served when no manifest is configured.

use serde_json::{Map, Value, json};

use crate::routing::{
    Controller, HandlerError, HandlerRegistry, RouteDeclaration, RouteManifest, Templated,
};

/// Registry key of [`HomeController`].
pub const HOME_CONTROLLER: &str = "Home";

/// Landing controller answering `GET /`.
#[derive(Debug, Default)]
pub struct HomeController {
    data: Map<String, Value>,
    template: Option<String>,
}

impl HomeController {
    /// Payload injected for the current request.
    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Template selected by the matched route, if any.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    fn index() -> Value {
        json!({ "message": "Hello World!" })
    }
}

impl Templated for HomeController {
    fn set_template(&mut self, template: &str) {
        self.template = Some(template.to_owned());
    }
}

impl Controller for HomeController {
    fn set_data(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    fn templated(&mut self) -> Option<&mut dyn Templated> {
        Some(self)
    }

    fn call(&mut self, action: &str, args: &[String]) -> Result<Value, HandlerError> {
        match action {
            "index" if args.is_empty() => Ok(Self::index()),
            "index" => Err(HandlerError::Arity {
                action: action.to_owned(),
                expected: 0,
                actual: args.len(),
            }),
            other => Err(HandlerError::UnknownAction {
                action: other.to_owned(),
            }),
        }
    }
}

/// Controllers shipped with the daemon.
#[must_use]
pub fn default_handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(HOME_CONTROLLER, &["index"], HomeController::default);
    registry
}

/// Route table used when `routes_path` is not configured.
#[must_use]
pub fn default_manifest() -> RouteManifest {
    RouteManifest::new().route(
        "/",
        RouteDeclaration::new(HOME_CONTROLLER, "index", "get", "/")
            .with_template("dashboard")
            .public(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_greets() {
        let mut controller = HomeController::default();
        let body = controller.call("index", &[]).expect("index succeeds");
        assert_eq!(body, json!({"message": "Hello World!"}));
    }

    #[test]
    fn rejects_unknown_actions() {
        let mut controller = HomeController::default();
        assert!(matches!(
            controller.call("destroy", &[]),
            Err(HandlerError::UnknownAction { .. })
        ));
    }

    #[test]
    fn template_capability_is_exposed() {
        let mut controller = HomeController::default();
        controller
            .templated()
            .expect("home controller is templated")
            .set_template("dashboard");
        assert_eq!(controller.template(), Some("dashboard"));
    }
}
