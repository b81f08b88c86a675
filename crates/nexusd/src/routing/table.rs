//! Compiled route table.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::declaration::{DEFAULT_RULE_MESSAGE, RouteDeclaration, RouteManifest};
use super::errors::RouteTableError;
use super::pattern::PathPattern;
use super::registry::{Controller, ControllerFactory, HandlerRegistry};
use super::validation::{CompiledRule, ValidatorRegistry};

/// A compiled route with its controller factory and validators resolved.
pub struct RouteEntry {
    method: String,
    pattern: PathPattern,
    controller: String,
    action: String,
    template: Option<String>,
    is_public: bool,
    accept: Vec<String>,
    rules: BTreeMap<String, Vec<CompiledRule>>,
    factory: ControllerFactory,
}

impl RouteEntry {
    /// Upper-cased method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Full path pattern, prefix included.
    #[must_use]
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    /// Controller key.
    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Action invoked on the controller.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Template applied to template-capable controllers.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Whether anonymous callers may reach the route.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.is_public
    }

    /// Fields eligible for validation, in evaluation order.
    #[must_use]
    pub fn accept(&self) -> &[String] {
        &self.accept
    }

    /// Returns true when at least one field carries rules.
    #[must_use]
    pub fn has_validations(&self) -> bool {
        !self.rules.is_empty()
    }

    pub(crate) const fn rules(&self) -> &BTreeMap<String, Vec<CompiledRule>> {
        &self.rules
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Controller> {
        (self.factory)()
    }

    fn compile(
        path: &str,
        declaration: &RouteDeclaration,
        handlers: &HandlerRegistry,
        validators: &ValidatorRegistry,
    ) -> Result<Self, RouteTableError> {
        let method = normalise_method(&declaration.method, path)?;
        let pattern = PathPattern::parse(path)?;

        let Some((actions, factory)) = handlers.lookup(&declaration.controller) else {
            return Err(RouteTableError::UnknownController {
                method,
                path: path.to_owned(),
                controller: declaration.controller.clone(),
            });
        };
        if !actions.iter().any(|action| action == &declaration.action) {
            return Err(RouteTableError::UnknownAction {
                method,
                path: path.to_owned(),
                controller: declaration.controller.clone(),
                action: declaration.action.clone(),
            });
        }

        let mut rules = BTreeMap::new();
        for (field, declared) in &declaration.validations {
            let mut compiled = Vec::with_capacity(declared.len());
            for rule in declared {
                let Some(validator) = validators.get(&rule.rule) else {
                    return Err(RouteTableError::UnknownRule {
                        method,
                        path: path.to_owned(),
                        field: field.clone(),
                        rule: rule.rule.clone(),
                    });
                };
                compiled.push(CompiledRule {
                    name: rule.rule.clone(),
                    validator,
                    params: rule.params.clone(),
                    message: rule
                        .message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_RULE_MESSAGE.to_owned()),
                });
            }
            if !compiled.is_empty() {
                rules.insert(field.clone(), compiled);
            }
        }

        Ok(Self {
            method,
            pattern,
            controller: declaration.controller.clone(),
            action: declaration.action.clone(),
            template: declaration.template.clone(),
            is_public: declaration.is_public,
            accept: declaration.accept.clone(),
            rules,
            factory: Arc::clone(factory),
        })
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.pattern.as_str())
            .field("controller", &self.controller)
            .field("action", &self.action)
            .field("template", &self.template)
            .field("is_public", &self.is_public)
            .field("accept", &self.accept)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

fn normalise_method(method: &str, path: &str) -> Result<String, RouteTableError> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() || !upper.bytes().all(|byte| byte.is_ascii_uppercase()) {
        return Err(RouteTableError::InvalidMethod {
            method: method.to_owned(),
            path: path.to_owned(),
        });
    }
    Ok(upper)
}

/// Outcome of matching a method and path against a [`RouteTable`].
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// A route matched; `vars` holds the path variables in pattern order.
    Found {
        /// Matched route.
        entry: &'a RouteEntry,
        /// Captured `(name, value)` pairs.
        vars: Vec<(String, String)>,
    },
    /// The path matched under other methods only.
    MethodNotAllowed {
        /// Methods registered for the path, in registration order.
        allowed: Vec<String>,
    },
    /// Nothing matched the path.
    NotFound,
}

/// Method and path lookup structure built once from a [`RouteManifest`].
///
/// Static paths are checked before patterns with variables; `HEAD` requests
/// fall back to `GET` routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    static_routes: HashMap<String, Vec<RouteEntry>>,
    variable_routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compiles every declaration in `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteTableError`] when a declaration names an unknown
    /// controller, action or rule, carries a malformed method or pattern, or
    /// duplicates an earlier method and pattern.
    pub fn build(
        manifest: &RouteManifest,
        handlers: &HandlerRegistry,
        validators: &ValidatorRegistry,
    ) -> Result<Self, RouteTableError> {
        let mut table = Self::default();
        for (path, declaration) in manifest.routes() {
            let entry = RouteEntry::compile(&path, declaration, handlers, validators)?;
            table.insert(entry)?;
        }
        Ok(table)
    }

    fn insert(&mut self, entry: RouteEntry) -> Result<(), RouteTableError> {
        let duplicate = |existing: &RouteEntry| {
            existing.method == entry.method && existing.path() == entry.path()
        };
        let bucket = if entry.pattern.is_static() {
            self.static_routes.entry(entry.path().to_owned()).or_default()
        } else {
            &mut self.variable_routes
        };
        if bucket.iter().any(duplicate) {
            return Err(RouteTableError::DuplicateRoute {
                method: entry.method,
                path: entry.pattern.as_str().to_owned(),
            });
        }
        bucket.push(entry);
        Ok(())
    }

    /// Number of compiled routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.static_routes.values().map(Vec::len).sum::<usize>() + self.variable_routes.len()
    }

    /// Returns true when the table holds no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matches an already normalised `path` for `method`.
    #[must_use]
    pub fn lookup(&self, method: &str, path: &str) -> RouteMatch<'_> {
        let method = method.to_ascii_uppercase();
        if let Some(found) = self.find(&method, path) {
            return found;
        }
        if method == "HEAD"
            && let Some(found) = self.find("GET", path)
        {
            return found;
        }

        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allowed }
        }
    }

    fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let static_hit = self
            .static_routes
            .get(path)
            .and_then(|entries| entries.iter().find(|entry| entry.method == method));
        if let Some(entry) = static_hit {
            return Some(RouteMatch::Found {
                entry,
                vars: Vec::new(),
            });
        }

        self.variable_routes
            .iter()
            .filter(|entry| entry.method == method)
            .find_map(|entry| {
                entry
                    .pattern
                    .captures(path)
                    .map(|vars| RouteMatch::Found { entry, vars })
            })
    }

    fn allowed_methods(&self, path: &str) -> Vec<String> {
        let mut allowed: Vec<String> = self
            .static_routes
            .get(path)
            .map(|entries| entries.iter().map(|entry| entry.method.clone()).collect())
            .unwrap_or_default();
        for entry in &self.variable_routes {
            if !allowed.contains(&entry.method) && entry.pattern.captures(path).is_some() {
                allowed.push(entry.method.clone());
            }
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{HandlerError, RouteDeclaration, RuleDeclaration};
    use rstest::{fixture, rstest};
    use serde_json::{Map, Value, json};

    struct Echo;

    impl Controller for Echo {
        fn set_data(&mut self, _data: Map<String, Value>) {}

        fn call(&mut self, action: &str, args: &[String]) -> Result<Value, HandlerError> {
            Ok(json!({ "action": action, "args": args }))
        }
    }

    #[fixture]
    fn handlers() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register("Echo", &["index", "show", "store"], || Echo);
        registry
    }

    fn build(manifest: &RouteManifest, handlers: &HandlerRegistry) -> Result<RouteTable, RouteTableError> {
        RouteTable::build(manifest, handlers, &ValidatorRegistry::standard())
    }

    #[rstest]
    fn static_routes_take_precedence(handlers: HandlerRegistry) {
        let manifest = RouteManifest::new()
            .route("/user", RouteDeclaration::new("Echo", "show", "GET", "/{id}"))
            .route("/user", RouteDeclaration::new("Echo", "index", "GET", "/me"));
        let table = build(&manifest, &handlers).expect("table builds");

        match table.lookup("GET", "/user/me") {
            RouteMatch::Found { entry, vars } => {
                assert_eq!(entry.action(), "index");
                assert!(vars.is_empty());
            }
            other => panic!("expected static match, got {other:?}"),
        }
        match table.lookup("get", "/user/42") {
            RouteMatch::Found { entry, vars } => {
                assert_eq!(entry.action(), "show");
                assert_eq!(vars, vec![("id".to_owned(), "42".to_owned())]);
            }
            other => panic!("expected variable match, got {other:?}"),
        }
    }

    #[rstest]
    fn head_falls_back_to_get(handlers: HandlerRegistry) {
        let manifest =
            RouteManifest::new().route("/", RouteDeclaration::new("Echo", "index", "get", "/"));
        let table = build(&manifest, &handlers).expect("table builds");
        assert!(matches!(table.lookup("HEAD", "/"), RouteMatch::Found { .. }));
    }

    #[rstest]
    fn reports_allowed_methods_in_registration_order(handlers: HandlerRegistry) {
        let manifest = RouteManifest::new()
            .route("/", RouteDeclaration::new("Echo", "index", "GET", "/items"))
            .route("/", RouteDeclaration::new("Echo", "store", "POST", "/items"))
            .route("/", RouteDeclaration::new("Echo", "show", "PUT", "/{collection}"));
        let table = build(&manifest, &handlers).expect("table builds");

        match table.lookup("DELETE", "/items") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec!["GET", "POST", "PUT"]);
            }
            other => panic!("expected method not allowed, got {other:?}"),
        }
        assert!(matches!(table.lookup("GET", "/nowhere/else"), RouteMatch::NotFound));
    }

    #[rstest]
    fn overlapping_variable_routes_follow_manifest_order(handlers: HandlerRegistry) {
        let manifest = RouteManifest::from_json(
            r#"{
                "/z": [{"controller": "Echo", "action": "show", "method": "GET", "uri": "/{id}"}],
                "/": [
                    {"controller": "Echo", "action": "index", "method": "GET", "uri": "/{section}/{page}"},
                    {"controller": "Echo", "action": "store", "method": "POST", "uri": "/{section}/{page}"}
                ]
            }"#,
        )
        .expect("manifest parses");
        let table = build(&manifest, &handlers).expect("table builds");

        match table.lookup("GET", "/z/7") {
            RouteMatch::Found { entry, .. } => assert_eq!(entry.action(), "show"),
            other => panic!("expected the first group to win, got {other:?}"),
        }
        match table.lookup("DELETE", "/z/7") {
            RouteMatch::MethodNotAllowed { allowed } => assert_eq!(allowed, vec!["GET", "POST"]),
            other => panic!("expected method not allowed, got {other:?}"),
        }
    }

    #[rstest]
    #[case(RouteDeclaration::new("Missing", "index", "GET", "/"))]
    #[case(RouteDeclaration::new("Echo", "destroy", "GET", "/"))]
    #[case(RouteDeclaration::new("Echo", "index", "G3T", "/"))]
    #[case(RouteDeclaration::new("Echo", "index", "GET", "/").accepting(
        "name",
        vec![RuleDeclaration::new("shouting")]
    ))]
    fn rejects_unresolvable_declarations(
        handlers: HandlerRegistry,
        #[case] declaration: RouteDeclaration,
    ) {
        let manifest = RouteManifest::new().route("/", declaration);
        let error = build(&manifest, &handlers).expect_err("build should fail");
        assert!(matches!(
            error,
            RouteTableError::UnknownController { .. }
                | RouteTableError::UnknownAction { .. }
                | RouteTableError::InvalidMethod { .. }
                | RouteTableError::UnknownRule { .. }
        ));
    }

    #[rstest]
    fn rejects_duplicate_routes(handlers: HandlerRegistry) {
        let manifest = RouteManifest::new()
            .route("/", RouteDeclaration::new("Echo", "index", "GET", "/"))
            .route("/", RouteDeclaration::new("Echo", "show", "get", "/"));
        let error = build(&manifest, &handlers).expect_err("duplicate should fail");
        assert!(matches!(error, RouteTableError::DuplicateRoute { .. }));
    }
}
