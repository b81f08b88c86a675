//! Request dispatch over a compiled [`RouteTable`].

use std::borrow::Cow;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::ROUTER_TARGET;
use super::errors::DispatchHalt;
use super::table::{RouteEntry, RouteMatch, RouteTable};
use super::validation::validate_fields;

/// Identity of the party issuing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// No valid credentials were presented.
    Anonymous,
    /// The request carried the shared token.
    Authenticated,
}

/// Dispatches requests against a shared route table.
///
/// Routing outcomes (404, 405) are ordinary response bodies. Only requests
/// that matched a route can halt, through the access gate, validation or a
/// failing handler.
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<RouteTable>,
}

impl Router {
    /// Wraps a compiled table.
    #[must_use]
    pub const fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Compiled table used for lookups.
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Routes one request and returns the response body.
    ///
    /// The query string is dropped and the path percent-decoded before
    /// matching.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchHalt`] when the matched route rejects the caller,
    /// the payload fails validation, or the handler fails.
    pub fn dispatch(
        &self,
        method: &str,
        path: &str,
        data: Map<String, Value>,
        caller: Caller,
    ) -> Result<Value, DispatchHalt> {
        let path = normalise_path(path);
        debug!(target: ROUTER_TARGET, method, path = %path, "routing request");

        match self.table.lookup(method, &path) {
            RouteMatch::NotFound => Ok(not_found()),
            RouteMatch::MethodNotAllowed { allowed } => Ok(method_not_allowed(&allowed)),
            RouteMatch::Found { entry, vars } => Self::handle_found(entry, vars, data, caller),
        }
    }

    fn handle_found(
        entry: &RouteEntry,
        vars: Vec<(String, String)>,
        data: Map<String, Value>,
        caller: Caller,
    ) -> Result<Value, DispatchHalt> {
        if !entry.is_public() && caller == Caller::Anonymous {
            debug!(
                target: ROUTER_TARGET,
                path = entry.path(),
                "anonymous caller rejected by private route"
            );
            return Err(DispatchHalt::Unauthenticated);
        }

        if !data.is_empty() && entry.has_validations() {
            let errors = validate_fields(entry.accept(), entry.rules(), &data);
            if !errors.is_empty() {
                return Err(DispatchHalt::Validation(errors));
            }
        }

        let mut controller = entry.instantiate();
        controller.set_data(data);
        if let Some(template) = entry.template()
            && let Some(templated) = controller.templated()
        {
            templated.set_template(template);
        }

        let args: Vec<String> = vars.into_iter().map(|(_, value)| value).collect();
        debug!(
            target: ROUTER_TARGET,
            controller = entry.controller(),
            action = entry.action(),
            "invoking handler"
        );
        controller
            .call(entry.action(), &args)
            .map_err(DispatchHalt::Handler)
    }
}

fn normalise_path(path: &str) -> Cow<'_, str> {
    let without_query = path.split_once('?').map_or(path, |(head, _)| head);
    percent_decode_str(without_query).decode_utf8_lossy()
}

fn not_found() -> Value {
    json!({ "code": 404, "message": "Not found!" })
}

fn method_not_allowed(allowed: &[String]) -> Value {
    json!({
        "code": 405,
        "message": "Method not allowed",
        "detail": format!("Allowed methods: {}", allowed.join(", ")),
    })
}
