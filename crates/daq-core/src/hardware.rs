//! Hardware abstraction contract.
//!
//! The data plane never talks to hardware directly. It consumes a
//! [`HardwareContext`] that enumerates [`HardwareDevice`]s, and opens a
//! device into an exclusively owned [`StreamHandle`] for the lifetime of one
//! acquisition session.
//!
//! # Thread Safety
//!
//! Contexts and devices are shared between every client thread and every
//! acquisition worker, so both are `Send + Sync`. A `StreamHandle` is owned by
//! exactly one worker thread and only needs `Send`.
//!
//! Attribute access goes through the device, not the stream handle, and may run
//! concurrently with an active stream on the same device. Any exclusion that
//! requires is the implementation's responsibility.

use std::sync::Arc;

use crate::error::DaqResult;

/// Identity of one device as reported by [`HardwareContext::devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable identifier, unique within the context (e.g. `iio:device0`).
    pub id: String,
    /// Human-readable name, if the device reports one.
    pub name: Option<String>,
}

/// A set of devices the daemon serves.
pub trait HardwareContext: Send + Sync {
    /// All devices of this context, in enumeration order.
    fn devices(&self) -> Vec<Arc<dyn HardwareDevice>>;
}

/// One acquisition device.
pub trait HardwareDevice: Send + Sync {
    /// Stable identifier of the device.
    fn id(&self) -> &str;

    /// Human-readable name, if any.
    fn name(&self) -> Option<&str>;

    /// Open the device for streaming.
    ///
    /// The returned handle is exclusively owned; opening a device that is
    /// already open may fail with a pass-through errno such as `EBUSY`.
    fn open(&self) -> DaqResult<Box<dyn StreamHandle>>;

    /// Read attribute `name` into `buf`, returning the number of bytes stored.
    fn attr_read(&self, name: &str, buf: &mut [u8]) -> DaqResult<usize>;

    /// Write `value` to attribute `name`, returning the number of bytes written.
    fn attr_write(&self, name: &str, value: &str) -> DaqResult<usize>;

    /// Identity pair for listings.
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.id().to_string(),
            name: self.name().map(str::to_string),
        }
    }
}

/// An open device, owned by one acquisition worker from open to close.
pub trait StreamHandle: Send {
    /// Blocking read of raw sample bytes into `buf`.
    ///
    /// May return fewer bytes than `buf.len()`.
    fn read_raw(&mut self, buf: &mut [u8]) -> DaqResult<usize>;

    /// Release the device.
    fn close(self: Box<Self>);
}
