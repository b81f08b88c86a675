//! Argument definitions for the `nexus` client.

use clap::Parser;

/// Sends one request to a Nexus service and prints the JSON response.
#[derive(Parser, Debug)]
#[command(name = "nexus", version)]
pub(crate) struct Cli {
    /// Service whose socket receives the request.
    #[arg(long, default_value = "home")]
    pub(crate) service: String,
    /// JSON object sent as the request payload.
    #[arg(long, value_name = "JSON")]
    pub(crate) data: Option<String>,
    /// Sends the request without the shared token.
    #[arg(long)]
    pub(crate) anonymous: bool,
    /// Request method.
    #[arg(value_name = "METHOD", default_value = "GET")]
    pub(crate) method: String,
    /// Request path, optionally with a query string.
    #[arg(value_name = "PATH", default_value = "/")]
    pub(crate) path: String,
}
