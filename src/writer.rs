//! Reliable full-buffer writes over client output sinks.
//!
//! Client connections hand the engine a [`Sink`]: a shared, lock-guarded
//! writer. The acquisition worker writes sample payloads through it from its
//! own thread while the connection keeps ownership and remains responsible for
//! flushing and closing it.

use std::io::{ErrorKind, Write};
use std::sync::Arc;

use daq_core::{DaqError, DaqResult};
use parking_lot::Mutex;

/// Output stream of one client connection.
pub type Sink = Arc<Mutex<dyn Write + Send>>;

/// Wrap a writer into a [`Sink`].
pub fn sink<W: Write + Send + 'static>(writer: W) -> Sink {
    Arc::new(Mutex::new(writer))
}

/// Write all of `buf` to `sink`.
///
/// Partial writes are retried from where they stopped. A write that accepts
/// zero bytes of a non-empty remainder is a transport failure and yields
/// [`DaqError::Io`]; nothing further is attempted. Returns the number of bytes
/// written, which on success is always `buf.len()`.
pub fn write_all<W: Write + ?Sized>(sink: &mut W, buf: &[u8]) -> DaqResult<usize> {
    let mut written = 0;
    while written < buf.len() {
        match sink.write(&buf[written..]) {
            Ok(0) => return Err(DaqError::Io),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(written)
}
