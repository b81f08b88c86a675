//! Error types for the client runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use nexusd::client::ClientError;
use nexusd::security::TokenError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("--data must be a JSON object: {0}")]
    ParseData(serde_json::Error),
    #[error("--data must be a JSON object, got {found}")]
    DataNotObject { found: &'static str },
    #[error("failed to read the shared token: {0}")]
    Token(#[from] TokenError),
    #[error("request failed: {0}")]
    Client(#[from] ClientError),
    #[error("failed to serialise the response: {0}")]
    Render(serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
