//! Shared-secret authentication for service requests.
//!
//! One token is generated per installation and persisted to an owner-only
//! file. The orchestrator, every worker and the bundled client read the same
//! file; workers compare inbound tokens in constant time.

mod errors;
mod files;
mod token;

pub use errors::TokenError;
pub use token::{TOKEN_BYTES, TokenGuard};

pub(crate) const SECURITY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::security");
