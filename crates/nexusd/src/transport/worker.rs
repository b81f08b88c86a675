//! Per-service socket worker: bind, accept, serve one request per connection.

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::{debug, info, warn};

use nexus_config::Config;

use super::TRANSPORT_TARGET;
use super::errors::{ListenerError, TransportError};
use super::framing::{read_message, write_message};
use super::message::Message;
use super::metrics::Metrics;
use super::responses::error_body;
use crate::context::ServiceContext;
use crate::routing::{Caller, Router};
use crate::security::TokenGuard;
use crate::signals::{ControlSignal, SignalSource};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(1);

/// Connection-level knobs taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Budget for receiving one complete message.
    pub service_timeout: Duration,
    /// Write timeout applied to accepted connections.
    pub send_timeout: Duration,
    /// Rejects requests without the shared token.
    pub require_auth: bool,
    /// Listen backlog.
    pub max_connections: i32,
}

impl WorkerSettings {
    /// Extracts the worker settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            service_timeout: config.service_timeout(),
            send_timeout: config.send_timeout(),
            require_auth: config.require_auth,
            max_connections: i32::try_from(config.max_connections).unwrap_or(i32::MAX),
        }
    }
}

/// Owns one service socket and serves requests on it until told to stop.
///
/// Requests are handled strictly sequentially. Failures on one connection are
/// answered, logged and counted, and never end the loop.
pub struct ServiceWorker<S> {
    name: String,
    socket_path: Utf8PathBuf,
    listener: UnixListener,
    guard: Arc<TokenGuard>,
    settings: WorkerSettings,
    signals: S,
    metrics: Metrics,
    running: bool,
}

impl<S: SignalSource> ServiceWorker<S> {
    /// Creates the listening socket for `name`.
    ///
    /// The socket directory is created when missing and a stale socket file
    /// left by a previous worker is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the path cannot be derived, a non-socket
    /// file occupies it, or any socket call fails.
    pub fn bind(name: &str, context: &ServiceContext, signals: S) -> Result<Self, ListenerError> {
        let config = context.config();
        let layout = config.socket_layout();
        let socket_path = layout.socket_path(name)?;
        layout.prepare_directory()?;
        remove_stale_socket(&socket_path)?;

        let listener = open_listener(
            &socket_path,
            WorkerSettings::from_config(config).max_connections,
        )?;
        fs::set_permissions(&socket_path, Permissions::from_mode(layout.permissions())).map_err(
            |source| ListenerError::Permissions {
                path: socket_path.clone(),
                mode: layout.permissions(),
                source,
            },
        )?;

        info!(
            target: TRANSPORT_TARGET,
            service = name,
            socket = %socket_path,
            "service socket bound"
        );
        Ok(Self {
            name: name.to_owned(),
            socket_path,
            listener,
            guard: Arc::clone(context.guard()),
            settings: WorkerSettings::from_config(config),
            signals,
            metrics: Metrics::new(),
            running: false,
        })
    }

    /// Path of the listening socket.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket_path
    }

    /// Request accounting for this worker.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Runs the accept loop until a terminate signal arrives, then removes
    /// the socket file.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Cleanup`] when the socket file cannot be
    /// removed.
    pub fn listen(&mut self, router: &Router) -> Result<(), ListenerError> {
        self.running = true;
        info!(target: TRANSPORT_TARGET, service = %self.name, "worker listening");
        let mut last_error = None::<io::ErrorKind>;

        while self.running {
            self.drain_signals();
            if !self.running {
                break;
            }
            match self.listener.accept() {
                Ok((stream, _)) => {
                    last_error = None;
                    self.handle_connection(stream, router);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: TRANSPORT_TARGET,
                            service = %self.name,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    last_error = Some(kind);
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }

        info!(
            target: TRANSPORT_TARGET,
            service = %self.name,
            metrics = ?self.metrics.snapshot(),
            "worker stopped"
        );
        match fs::remove_file(&self.socket_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ListenerError::Cleanup {
                path: self.socket_path.clone(),
                source,
            }),
        }
    }

    fn drain_signals(&mut self) {
        for signal in self.signals.pending() {
            match signal {
                ControlSignal::Terminate => {
                    info!(target: TRANSPORT_TARGET, service = %self.name, "terminate requested");
                    self.running = false;
                }
                ControlSignal::Reload => self.reload(),
            }
        }
    }

    fn reload(&self) {
        info!(target: TRANSPORT_TARGET, service = %self.name, "reload requested");
    }

    fn handle_connection(&mut self, mut stream: UnixStream, router: &Router) {
        let started = Instant::now();
        let received = self.receive(&mut stream);
        let was_received = received.is_ok();
        if was_received {
            self.metrics.record_request();
        }

        let mut failed = false;
        let body = match received.and_then(|message| self.process(message, router)) {
            Ok(body) => body,
            Err(error) => {
                failed = true;
                warn!(
                    target: TRANSPORT_TARGET,
                    service = %self.name,
                    error = %error,
                    "request failed"
                );
                error_body(&error)
            }
        };

        match self.respond(&mut stream, &body) {
            Ok(()) if was_received => self.metrics.record_response(started.elapsed()),
            Ok(()) => {}
            Err(error) => {
                failed = true;
                warn!(
                    target: TRANSPORT_TARGET,
                    service = %self.name,
                    error = %error,
                    "failed to write response"
                );
            }
        }

        if failed {
            self.metrics.record_error();
        }
    }

    fn receive(&self, stream: &mut UnixStream) -> Result<Message, TransportError> {
        stream.set_nonblocking(true)?;
        let bytes = read_message(stream, self.settings.service_timeout)?;
        Message::parse(&bytes)
    }

    fn process(&self, message: Message, router: &Router) -> Result<Value, TransportError> {
        let caller = self.authenticate(&message)?;
        debug!(
            target: TRANSPORT_TARGET,
            service = %self.name,
            method = %message.method,
            path = %message.path,
            "dispatching request"
        );
        let body = router.dispatch(&message.method, &message.path, message.data, caller)?;
        Ok(body)
    }

    fn authenticate(&self, message: &Message) -> Result<Caller, TransportError> {
        let presented = message
            .auth_token
            .as_deref()
            .is_some_and(|token| self.guard.verify(token));
        if presented {
            Ok(Caller::Authenticated)
        } else if self.settings.require_auth {
            Err(TransportError::Unauthenticated)
        } else {
            Ok(Caller::Anonymous)
        }
    }

    fn respond(&self, stream: &mut UnixStream, body: &Value) -> Result<(), TransportError> {
        let bytes = serde_json::to_vec(body).map_err(TransportError::Serialize)?;
        stream.set_nonblocking(false)?;
        let timeout = (!self.settings.send_timeout.is_zero()).then_some(self.settings.send_timeout);
        stream.set_write_timeout(timeout)?;
        write_message(stream, &bytes)?;
        Ok(())
    }
}

fn remove_stale_socket(path: &Utf8Path) -> Result<(), ListenerError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ListenerError::RemoveStale {
                path: path.to_owned(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::NotASocket {
            path: path.to_owned(),
        });
    }
    debug!(target: TRANSPORT_TARGET, socket = %path, "removing stale socket");
    fs::remove_file(path).map_err(|source| ListenerError::RemoveStale {
        path: path.to_owned(),
        source,
    })
}

fn open_listener(path: &Utf8Path, backlog: i32) -> Result<UnixListener, ListenerError> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)
        .map_err(|source| ListenerError::socket("create", path, source))?;
    let address =
        SockAddr::unix(path).map_err(|source| ListenerError::socket("bind", path, source))?;
    socket
        .bind(&address)
        .map_err(|source| ListenerError::socket("bind", path, source))?;
    socket
        .listen(backlog)
        .map_err(|source| ListenerError::socket("listen", path, source))?;
    socket
        .set_nonblocking(true)
        .map_err(|source| ListenerError::socket("configure", path, source))?;
    Ok(socket.into())
}
