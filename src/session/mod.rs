//! Device-session multiplexer.
//!
//! One [`DeviceSession`] exists per physically open device that has at least
//! one attached client. Each session runs a dedicated acquisition worker
//! thread that reads from the hardware and broadcasts every round to all
//! attached waiters.
//!
//! # Architecture
//!
//! ```text
//!   client threads                 SessionRegistry (registry lock)
//!   ──────────────                 ───────────────────────────────
//!   attach_and_wait ──attach──▶    device id ─▶ DeviceSession
//!        │                                        │ waiters (waiter lock)
//!        │ block on Completion                    │
//!        ▼                                        ▼
//!   wake, flush sink   ◀──finish──   AcquisitionWorker ──read_raw──▶ hardware
//! ```
//!
//! # Locking
//!
//! Locks are always taken in this order:
//!
//! 1. the registry lock (session table),
//! 2. a session's waiter lock,
//! 3. a client sink or a per-request completion lock.
//!
//! The blocking hardware read runs with neither of the first two held.

mod registry;
mod waiter;
mod worker;

pub use registry::SessionRegistry;
pub(crate) use waiter::{Completion, Waiter};

use daq_core::limits::DEFAULT_MAX_READ_BYTES;
use daq_core::{DaqResult, StreamHandle};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How streamed payloads are framed on the client sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Rounds are written without status lines; only failures are reported.
    #[default]
    Silent,
    /// Non-verbose clients get each round's byte count before its payload.
    PerRound,
}

/// Tuning shared by every session of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Upper bound on bytes moved by one hardware read.
    pub max_read_bytes: usize,
    /// Payload framing.
    pub framing: Framing,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            framing: Framing::Silent,
        }
    }
}

/// A registered device with its attached waiters.
pub(crate) struct DeviceSession {
    device_id: String,
    sample_size: usize,
    waiters: Mutex<Vec<Waiter>>,
}

impl DeviceSession {
    fn new(device_id: &str, sample_size: usize) -> Self {
        Self {
            device_id: device_id.to_string(),
            sample_size,
            waiters: Mutex::new(Vec::new()),
        }
    }
}

/// Exclusively owned stream handle that is closed exactly once.
///
/// Dropping an unclosed handle closes it, so a worker that never started still
/// releases the device.
struct OpenDevice {
    device_id: String,
    handle: Option<Box<dyn StreamHandle>>,
}

impl OpenDevice {
    fn new(device_id: &str, handle: Box<dyn StreamHandle>) -> Self {
        Self {
            device_id: device_id.to_string(),
            handle: Some(handle),
        }
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> DaqResult<usize> {
        match self.handle.as_mut() {
            Some(handle) => handle.read_raw(buf),
            None => Err(daq_core::DaqError::System(nix::errno::Errno::EBADF)),
        }
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(device = %self.device_id, "Closing device");
            handle.close();
        }
    }
}

impl Drop for OpenDevice {
    fn drop(&mut self) {
        self.close();
    }
}
