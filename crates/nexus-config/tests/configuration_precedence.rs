//! Behavioural checks of configuration layer precedence.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::Utf8PathBuf;
use once_cell::sync::Lazy;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use ortho_config::OrthoConfig;

use nexus_config::{
    Config, DEFAULT_MAX_CONNECTIONS, DEFAULT_SERVICE_TIMEOUT_SECS, DEFAULT_SOCKET_PERMISSIONS,
    default_log_filter, default_log_format, default_socket_dir,
};

// Scenarios share the process environment, so each harness holds this lock.
static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("nexusd")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_guard: env_guard,
        }
    }

    fn write_config(&self, socket_dir: &str) {
        self.write_config_text(&format!("socket_dir = \"{socket_dir}\"\n"));
    }

    fn write_config_text(&self, toml: &str) {
        let path = self.temp_dir.path().join("nexus.toml");

        if let Err(error) = fs::write(&path, toml) {
            panic!("failed to write configuration: {error}");
        }

        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on edition 2024. Overrides are
        // restored in `Drop` while the harness still holds the env lock.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_string(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => {
                *self.loaded.borrow_mut() = Some(config);
            }
            Err(error) => {
                *self.error.borrow_mut() = Some(error.to_string());
            }
        }
    }

    fn loaded_config(&self) -> Config {
        self.load();

        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }

        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            if let Some(os_value) = value {
                unsafe { std::env::set_var(&key, os_value) };
            } else {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the socket directory to \"{dir}\"")]
fn given_configuration_file(harness: &Harness, dir: String) {
    harness.write_config(&dir);
}

#[given("the environment overrides the socket directory to \"{dir}\"")]
fn given_environment_override(harness: &Harness, dir: String) {
    harness.set_env("NEXUS_SOCKET_DIR", &dir);
}

#[given("a configuration file setting the socket permissions to {mode}")]
fn given_configuration_mode(harness: &Harness, mode: String) {
    harness.write_config_text(&format!("socket_permissions = {mode}\n"));
}

#[given("the environment overrides the socket permissions to \"{mode}\"")]
fn given_environment_mode(harness: &Harness, mode: String) {
    harness.set_env("NEXUS_SOCKET_PERMISSIONS", &mode);
}

#[when("the CLI sets the socket directory to \"{dir}\"")]
fn when_cli_override(harness: &Harness, dir: String) {
    harness.push_cli_arg("--socket-dir");
    harness.push_cli_arg(OsString::from(&dir));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the socket directory to \"{dir}\"")]
fn then_resolved_socket_dir(harness: &Harness, dir: String) {
    let config = harness.loaded_config();
    assert_eq!(config.socket_dir(), Utf8PathBuf::from(dir).as_path());
}

#[then("loading the configuration resolves the socket permissions to octal {mode}")]
fn then_resolved_mode(harness: &Harness, mode: String) {
    let config = harness.loaded_config();
    let expected = u32::from_str_radix(&mode, 8).expect("octal expectation");
    assert_eq!(config.socket_permissions.bits(), expected);
    assert_eq!(config.socket_layout().permissions(), expected);
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded_config();

    assert_eq!(config.socket_dir(), default_socket_dir().as_path());
    assert_eq!(config.socket_permissions.bits(), DEFAULT_SOCKET_PERMISSIONS);
    assert_eq!(config.service_timeout_secs, DEFAULT_SERVICE_TIMEOUT_SECS);
    assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert_eq!(config.service_names(), vec![String::from("home")]);
    assert!(!config.require_auth);
    assert!(config.routes_path().is_none());
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn configuration_defaults(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Environment overrides the configuration file"
)]
fn environment_overrides_file(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "CLI flags override every other layer"
)]
fn cli_overrides_every_layer(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Socket permissions in the configuration file are octal digits"
)]
fn file_mode_is_octal(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Socket permissions from the environment are octal digits"
)]
fn environment_mode_is_octal(#[from(harness)] harness: Harness) {
    let _ = harness;
}
