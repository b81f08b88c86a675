//! Chunked message framing.
//!
//! Messages carry no length prefix. The receiver reads `CHUNK_SIZE`-byte
//! chunks and treats a short chunk, or end of stream, as the end of the
//! message. A message whose length is an exact multiple of `CHUNK_SIZE` is
//! only terminated by end of stream, so senders shut down their write half
//! once the request is written.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use super::errors::TransportError;

/// Size of each read issued by the receiver.
pub const CHUNK_SIZE: usize = 4096;

const READ_BACKOFF: Duration = Duration::from_millis(1);

/// Reads one message from a non-blocking `reader`.
///
/// # Errors
///
/// Returns [`TransportError::Timeout`] when the reader keeps reporting
/// `WouldBlock` for longer than `timeout`, [`TransportError::EmptyMessage`]
/// when the stream ends before any byte arrives, and
/// [`TransportError::Io`] for other read failures.
pub fn read_message<R: Read>(reader: &mut R, timeout: Duration) -> Result<Vec<u8>, TransportError> {
    let started = Instant::now();
    let mut message = Vec::new();
    let mut chunk = [0_u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => {
                message.extend_from_slice(chunk.get(..read).unwrap_or_default());
                if read < CHUNK_SIZE {
                    break;
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                if started.elapsed() >= timeout {
                    return Err(TransportError::Timeout { timeout });
                }
                thread::sleep(READ_BACKOFF);
            }
            Err(error) => return Err(TransportError::Io(error)),
        }
    }

    if message.is_empty() {
        Err(TransportError::EmptyMessage)
    } else {
        Ok(message)
    }
}

/// Writes all of `payload`, re-issuing partial writes.
///
/// # Errors
///
/// Returns the underlying IO error, or `WriteZero` when the writer accepts
/// no bytes.
pub fn write_message<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < payload.len() {
        let remaining = payload.get(sent..).unwrap_or_default();
        match writer.write(remaining) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection accepted no bytes",
                ));
            }
            Ok(written) => sent += written,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
    writer.flush()
}
