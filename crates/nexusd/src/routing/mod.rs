//! Method and path routing for service requests.
//!
//! Route declarations are grouped under path prefixes and compiled once into a
//! [`RouteTable`]. Controllers and validation rules are resolved by symbolic
//! key at build time, so a table that builds successfully can only fail at
//! dispatch time through validation, the access gate or the handler itself.

mod declaration;
mod errors;
mod pattern;
mod registry;
mod router;
mod table;
mod validation;

pub use declaration::{RouteDeclaration, RouteManifest, RuleDeclaration};
pub use errors::{DispatchHalt, HandlerError, RouteTableError};
pub use registry::{Controller, ControllerFactory, HandlerRegistry, Templated};
pub use router::{Caller, Router};
pub use table::{RouteEntry, RouteMatch, RouteTable};
pub use validation::{ValidationErrors, Validator, ValidatorRegistry};

/// Tracing target for routing operations.
pub(crate) const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");
