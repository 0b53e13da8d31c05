//! Stateless attribute read/write.
//!
//! Attribute operations resolve the device and call straight into the
//! hardware abstraction. They never touch the session registry, so they run
//! concurrently with any active stream on the same device; whether that is
//! safe is up to the hardware layer.

use std::io::Write;

use daq_core::limits::DEFAULT_ATTR_BUFFER_SIZE;
use daq_core::{DaqError, DaqResult};
use tracing::debug;

use crate::directory::DeviceDirectory;
use crate::response::write_status;
use crate::writer::write_all;

/// Attribute reads and writes with status-line framing.
#[derive(Debug, Clone, Copy)]
pub struct AttributeAccess {
    buffer_size: usize,
}

impl Default for AttributeAccess {
    fn default() -> Self {
        Self::new(DEFAULT_ATTR_BUFFER_SIZE)
    }
}

impl AttributeAccess {
    /// Attribute reads use a buffer of `buffer_size` bytes.
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Size of the attribute read buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Read `attr` of `device` and write it to `sink`.
    ///
    /// Writes the status line, then on success the value followed by a
    /// newline. Returns the value length.
    pub fn read<W: Write + ?Sized>(
        &self,
        directory: &DeviceDirectory,
        sink: &mut W,
        verbose: bool,
        device: &str,
        attr: &str,
    ) -> DaqResult<usize> {
        let mut buf = vec![0u8; self.buffer_size];
        let capacity = buf.len();
        let status = directory
            .resolve(device)
            .and_then(|dev| dev.attr_read(attr, &mut buf))
            .map(|len| len.min(capacity));
        debug!(device, attr, ?status, "Attribute read");

        write_status(sink, verbose, status)?;
        let len = status?;
        write_all(sink, &buf[..len])?;
        write_all(sink, b"\n")?;
        Ok(len)
    }

    /// Write `value` to `attr` of `device` and report the status on `sink`.
    ///
    /// Returns the number of bytes the hardware accepted.
    pub fn write<W: Write + ?Sized>(
        &self,
        directory: &DeviceDirectory,
        sink: &mut W,
        verbose: bool,
        device: &str,
        attr: &str,
        value: &str,
    ) -> DaqResult<usize> {
        let status = directory
            .resolve(device)
            .and_then(|dev| dev.attr_write(attr, value));
        debug!(device, attr, ?status, "Attribute write");

        write_status(sink, verbose, status)?;
        status
    }
}
