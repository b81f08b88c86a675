//! Runtime for the `nexus` client.
//!
//! Parses the request from the command line, loads the shared configuration
//! to locate the service socket and token, sends one request and prints the
//! response. The exit status reflects the response: any body with
//! `"status": "error"` or a `code` of 400 or above is a failure.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use serde_json::{Map, Value};

use nexus_config::Config;
use nexusd::client::ServiceClient;
use nexusd::security::TokenGuard;
use nexusd::transport::Message;

mod cli;
mod config;
mod errors;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, command_arguments, split_config_arguments};
pub(crate) use errors::AppError;

/// Runs the client with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

fn run_with_loader<I, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    let outcome = loader
        .load(&split.config_arguments)
        .and_then(|config| execute(&cli, &config))
        .and_then(|response| {
            let rendered = serde_json::to_string_pretty(&response).map_err(AppError::Render)?;
            writeln!(stdout, "{rendered}")?;
            Ok(response)
        });

    match outcome {
        Ok(response) if is_failure(&response) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn execute(cli: &Cli, config: &Config) -> Result<Value, AppError> {
    let data = parse_data(cli.data.as_deref())?;
    let mut message = Message::new(cli.method.to_uppercase(), cli.path.clone()).with_data(data);
    if !cli.anonymous
        && let Some(token) = TokenGuard::read_existing(config.auth_token_path())?
    {
        message = message.with_token(token);
    }
    let client = ServiceClient::for_service(&config.socket_layout(), &cli.service)?;
    Ok(client.send(message)?)
}

fn parse_data(raw: Option<&str>) -> Result<Map<String, Value>, AppError> {
    let Some(text) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str(text).map_err(AppError::ParseData)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::DataNotObject {
            found: json_kind(&other),
        }),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_failure(response: &Value) -> bool {
    let errored = response.get("status").and_then(Value::as_str) == Some("error");
    let code = response.get("code").and_then(Value::as_u64);
    errored || code.is_some_and(|value| value >= 400)
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    if writeln!(stderr, "nexus: {error}").is_err() {
        return ExitCode::from(2);
    }
    ExitCode::FAILURE
}
