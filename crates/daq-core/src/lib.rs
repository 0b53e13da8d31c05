//! `daq-core`
//!
//! Core type definitions shared by the rust-daqd data plane and its hardware
//! backends.
//!
//! ## Modules
//!
//! - [`error`]: the negative-errno error taxonomy reported to clients
//! - [`hardware`]: the contract the engine requires from a hardware abstraction
//!   (device enumeration, exclusive open, blocking raw reads, attributes)
//! - [`limits`]: shared size limits
//!
//! ## Example
//!
//! ```rust
//! use daq_core::DaqError;
//!
//! let err = DaqError::DeviceNotFound;
//! assert_eq!(err.code(), -19);
//! ```

pub mod error;
pub mod hardware;
pub mod limits;

pub use error::{DaqError, DaqResult};
pub use hardware::{DeviceInfo, HardwareContext, HardwareDevice, StreamHandle};
