//! Command surface exposed to the external dispatcher.
//!
//! A [`Connection`] carries the per-client state: the output sink and the
//! verbosity flag, plus handles to the shared hardware context and session
//! registry. Each method implements one logical command and returns either a
//! byte count or a [`DaqError`] whose `code()` is the negative errno.

use std::sync::Arc;

use daq_core::{DaqResult, DeviceInfo, HardwareContext};

use crate::attributes::AttributeAccess;
use crate::client::{self, ReadRequest};
use crate::directory::DeviceDirectory;
use crate::session::SessionRegistry;
use crate::writer::Sink;

/// Per-client command context.
pub struct Connection {
    directory: DeviceDirectory,
    registry: SessionRegistry,
    attributes: AttributeAccess,
    sink: Sink,
    verbose: bool,
}

impl Connection {
    /// Create a non-verbose connection writing to `sink`.
    pub fn new(ctx: Arc<dyn HardwareContext>, registry: SessionRegistry, sink: Sink) -> Self {
        Self {
            directory: DeviceDirectory::new(ctx),
            registry,
            attributes: AttributeAccess::default(),
            sink,
            verbose: false,
        }
    }

    /// Report failures as `ERROR: <message>` lines instead of bare codes.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Use `attributes` for attribute commands.
    pub fn with_attribute_access(mut self, attributes: AttributeAccess) -> Self {
        self.attributes = attributes;
        self
    }

    /// The output sink of this connection.
    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Devices of the hardware context.
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.directory.list()
    }

    /// Stream `samples` samples of `sample_size` bytes from `device`.
    ///
    /// Blocks until the samples were written to the sink. Returns
    /// `samples * sample_size`.
    pub fn read_dev(&self, device: &str, samples: usize, sample_size: usize) -> DaqResult<usize> {
        let request = ReadRequest::new(device, samples, sample_size);
        client::attach_and_wait(
            &self.directory,
            &self.registry,
            &request,
            &self.sink,
            self.verbose,
        )
    }

    /// Read attribute `attr` of `device`.
    pub fn read_dev_attr(&self, device: &str, attr: &str) -> DaqResult<usize> {
        let mut sink = self.sink.lock();
        self.attributes
            .read(&self.directory, &mut *sink, self.verbose, device, attr)
    }

    /// Write `value` to attribute `attr` of `device`.
    pub fn write_dev_attr(&self, device: &str, attr: &str, value: &str) -> DaqResult<usize> {
        let mut sink = self.sink.lock();
        self.attributes
            .write(&self.directory, &mut *sink, self.verbose, device, attr, value)
    }
}
