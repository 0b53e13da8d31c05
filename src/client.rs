//! Streaming reads: the blocking entry point used by client threads.

use std::io::Write;
use std::sync::Arc;

use daq_core::{DaqError, DaqResult, HardwareDevice};
use tracing::{debug, instrument};

use crate::directory::DeviceDirectory;
use crate::response::write_status;
use crate::session::{Completion, SessionRegistry, Waiter};
use crate::writer::Sink;

/// A streaming read of `samples` samples of `sample_size` bytes each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Device id or name
    pub device: String,
    /// Number of samples wanted
    pub samples: usize,
    /// Bytes per sample
    pub sample_size: usize,
}

impl ReadRequest {
    /// Create a request.
    pub fn new(device: impl Into<String>, samples: usize, sample_size: usize) -> Self {
        Self {
            device: device.into(),
            samples,
            sample_size,
        }
    }

    /// Bytes the request delivers on success.
    pub fn total_bytes(&self) -> DaqResult<usize> {
        self.samples
            .checked_mul(self.sample_size)
            .ok_or(DaqError::InvalidArgument)
    }
}

/// Resolve the device, join (or start) its session and block until the
/// request has received all its samples or the session failed.
///
/// An unknown device is reported on `sink` per `verbose`. Other setup errors
/// (sample size mismatch, open failure) are only returned. Returns the number
/// of payload bytes written to `sink`.
#[instrument(skip(directory, registry, sink), fields(device = %request.device))]
pub fn attach_and_wait(
    directory: &DeviceDirectory,
    registry: &SessionRegistry,
    request: &ReadRequest,
    sink: &Sink,
    verbose: bool,
) -> DaqResult<usize> {
    let device = match directory.resolve(&request.device) {
        Ok(device) => device,
        Err(err) => {
            write_status(&mut *sink.lock(), verbose, Err(err))?;
            return Err(err);
        }
    };
    wait_for_samples(&device, registry, request, sink, verbose)
}

fn wait_for_samples(
    device: &Arc<dyn HardwareDevice>,
    registry: &SessionRegistry,
    request: &ReadRequest,
    sink: &Sink,
    verbose: bool,
) -> DaqResult<usize> {
    if request.sample_size == 0 {
        return Err(DaqError::InvalidArgument);
    }
    let total = request.total_bytes()?;
    if request.samples == 0 {
        return Ok(0);
    }

    let completion = Arc::new(Completion::new());
    let waiter = Waiter::new(
        request.samples,
        Arc::clone(sink),
        verbose,
        Arc::clone(&completion),
    );
    let created = registry.attach(device, request.sample_size, waiter)?;
    debug!(created, "Waiting for completion");

    let outcome = completion.wait();
    let flushed = sink.lock().flush();
    outcome?;
    flushed?;
    Ok(total)
}
