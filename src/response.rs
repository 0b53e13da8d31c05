//! Status-line framing shared by every client-facing operation.
//!
//! Each operation answers with one status line: `ERROR: <message>` for a
//! failure on a verbose connection, otherwise a bare signed integer (a byte
//! count on success, a negative errno on failure).

use std::io::Write;

use daq_core::{DaqError, DaqResult};

use crate::writer::write_all;

/// Render the status line for `status`, including the trailing newline.
pub fn status_line(verbose: bool, status: Result<usize, DaqError>) -> String {
    match status {
        Ok(count) => format!("{count}\n"),
        Err(err) if verbose => format!("ERROR: {}\n", err.description()),
        Err(err) => format!("{}\n", err.code()),
    }
}

/// Write the status line for `status` to `sink`.
pub fn write_status<W: Write + ?Sized>(
    sink: &mut W,
    verbose: bool,
    status: Result<usize, DaqError>,
) -> DaqResult<()> {
    write_all(sink, status_line(verbose, status).as_bytes()).map(|_| ())
}
