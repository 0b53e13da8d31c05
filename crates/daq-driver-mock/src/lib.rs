//! Mock hardware backend for rust-daqd.
//!
//! This crate provides an in-memory implementation of the `daq-core` hardware
//! contract so the data plane can be exercised without physical devices.
//!
//! # Available Types
//!
//! - [`MockContext`] - A fixed set of devices implementing `HardwareContext`
//! - [`MockDevice`] - A streaming device with an attribute table
//! - [`ReadGate`] / [`ReadStep`] - Scripted control over blocking reads
//!
//! # Behaviour
//!
//! - Reads produce a deterministic byte stream (see [`pattern_byte`]), so
//!   consumers can check exactly which stream positions they received.
//! - A device can be open at most once at a time; a second open fails with
//!   `EBUSY`.
//! - Opens can be made to fail once with an injected errno.
//! - A gated device blocks every read until a [`ReadStep`] is pushed, letting
//!   tests decide when each acquisition round completes and how many bytes it
//!   returns.
//!
//! ```rust
//! use std::sync::Arc;
//! use daq_core::HardwareContext;
//! use daq_driver_mock::{MockContext, MockDevice};
//!
//! let adc = Arc::new(MockDevice::new("iio:device0").with_name("ad7476"));
//! let ctx = MockContext::new().with_device(adc);
//! assert_eq!(ctx.devices().len(), 1);
//! ```

mod gate;
mod mock_device;
mod pattern;

pub use gate::{ReadGate, ReadStep};
pub use mock_device::{MockContext, MockDevice, MockDeviceConfig};
pub use pattern::{fill_pattern, pattern_byte};
