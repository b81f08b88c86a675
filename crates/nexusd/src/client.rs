//! Caller side of the worker socket protocol.
//!
//! A request is written in full, the write half is shut down so the worker
//! sees end of stream even when the payload length is a multiple of
//! [`crate::transport::CHUNK_SIZE`], and the response is read until the worker
//! closes the connection.

use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use socket2::{Domain, SockAddr, Socket, Type};
use thiserror::Error;

use nexus_config::{ServiceSocketLayout, SocketLayoutError};

use crate::transport::{Message, TransportError, write_message};

/// Budget for connecting and for each read or write.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while talking to a worker.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service socket path could not be derived.
    #[error(transparent)]
    Layout(#[from] SocketLayoutError),
    /// Connecting to the socket failed.
    #[error("failed to connect to '{path}': {source}")]
    Connect {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Sending the request or reading the response failed.
    #[error("socket IO failed: {0}")]
    Io(#[from] io::Error),
    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] TransportError),
    /// The worker closed the connection without responding.
    #[error("worker closed the connection without a response")]
    EmptyResponse,
    /// The response is not JSON.
    #[error("response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Sends requests to one service socket.
#[derive(Clone)]
pub struct ServiceClient {
    socket_path: Utf8PathBuf,
    token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("socket_path", &self.socket_path)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServiceClient {
    /// Client for the socket at `socket_path`.
    #[must_use]
    pub fn new(socket_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            token: None,
            timeout: CLIENT_TIMEOUT,
        }
    }

    /// Client for the service `name` under `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Layout`] when the name cannot form a socket path.
    pub fn for_service(layout: &ServiceSocketLayout, name: &str) -> Result<Self, ClientError> {
        Ok(Self::new(layout.socket_path(name)?))
    }

    /// Presents `token` with every request that does not carry its own.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides the connect and IO timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target socket.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket_path
    }

    /// Sends `method path` with `data` and returns the decoded response.
    ///
    /// # Errors
    ///
    /// See [`ServiceClient::send`].
    pub fn request(
        &self,
        method: &str,
        path: &str,
        data: Map<String, Value>,
    ) -> Result<Value, ClientError> {
        self.send(Message::new(method, path).with_data(data))
    }

    /// Sends one message and returns the decoded response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when connecting, writing, reading or decoding
    /// fails.
    pub fn send(&self, mut message: Message) -> Result<Value, ClientError> {
        if message.auth_token.is_none() {
            message.auth_token.clone_from(&self.token);
        }
        let payload = message.to_bytes().map_err(ClientError::Encode)?;

        let mut stream = self.connect()?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_read_timeout(Some(self.timeout))?;
        write_message(&mut stream, &payload)?;
        stream.shutdown(Shutdown::Write)?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response)?;
        if response.is_empty() {
            return Err(ClientError::EmptyResponse);
        }
        serde_json::from_slice(&response).map_err(ClientError::Decode)
    }

    fn connect(&self) -> Result<UnixStream, ClientError> {
        let connect_error = |source| ClientError::Connect {
            path: self.socket_path.clone(),
            source,
        };
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(connect_error)?;
        let address = SockAddr::unix(&self.socket_path).map_err(connect_error)?;
        socket
            .connect_timeout(&address, self.timeout)
            .map_err(connect_error)?;
        Ok(socket.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::read_message;
    use serde_json::json;
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn socket_in(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("service_echo.sock")).expect("utf8 path")
    }

    #[test]
    fn sends_token_and_decodes_response() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = socket_in(&dir);
        let listener = UnixListener::bind(&path).expect("bind");
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_message(&mut stream, Duration::from_secs(1)).expect("read");
            let message = Message::parse(&request).expect("parse");
            let reply = json!({ "token": message.auth_token, "path": message.path });
            stream
                .write_all(reply.to_string().as_bytes())
                .expect("reply");
        });

        let response = ServiceClient::new(path)
            .with_token("abc")
            .request("GET", "/ping", Map::new())
            .expect("request");
        server.join().expect("server thread");
        assert_eq!(response, json!({ "token": "abc", "path": "/ping" }));
    }

    #[test]
    fn exact_chunk_multiple_requests_are_delivered() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = socket_in(&dir);
        let listener = UnixListener::bind(&path).expect("bind");
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_message(&mut stream, Duration::from_secs(1)).expect("read");
            stream
                .write_all(request.len().to_string().as_bytes())
                .expect("reply");
        });

        // Pad the request so its encoded form is exactly two chunks long.
        let probe = Message::new("POST", "/").with_token("t");
        let mut data = Map::new();
        data.insert("pad".to_owned(), json!(""));
        let base = probe.clone().with_data(data).to_bytes().expect("encode").len();
        let mut padded = Map::new();
        padded.insert("pad".to_owned(), json!("x".repeat(8192 - base)));
        let message = probe.with_data(padded);
        assert_eq!(message.to_bytes().expect("encode").len(), 8192);

        let response = ServiceClient::new(path).send(message).expect("request");
        server.join().expect("server thread");
        assert_eq!(response, json!(8192));
    }

    #[test]
    fn reports_missing_sockets() {
        let dir = tempfile::tempdir().expect("temp dir");
        let error = ServiceClient::new(socket_in(&dir))
            .request("GET", "/", Map::new())
            .expect_err("nothing listening");
        assert!(matches!(error, ClientError::Connect { .. }));
    }

    #[test]
    fn debug_output_redacts_token() {
        let client = ServiceClient::new("/tmp/service_home.sock").with_token("secret");
        assert!(!format!("{client:?}").contains("secret"));
    }
}
