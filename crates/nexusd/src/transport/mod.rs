//! Worker-side Unix socket transport.
//!
//! Each worker owns one listening socket at
//! `<socket_dir>/service_<name>.sock` and serves one request per connection:
//! read a framed JSON message, dispatch it through the router, write the JSON
//! response and close.

mod errors;
mod framing;
mod message;
mod metrics;
mod responses;
mod worker;

pub use errors::{ListenerError, TransportError};
pub use framing::{CHUNK_SIZE, read_message, write_message};
pub use message::Message;
pub use metrics::{Metrics, MetricsSnapshot};
pub use worker::{ServiceWorker, WorkerSettings};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
