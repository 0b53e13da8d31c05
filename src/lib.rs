//! # rust-daqd
//!
//! The data-plane engine of a hardware-device daemon: any number of client
//! requests consume sample streams and attribute values from a shared set of
//! acquisition devices without owning the hardware themselves.
//!
//! ## Crate Structure
//!
//! - **`session`**: the device-session multiplexer. [`SessionRegistry`] keeps
//!   one session per open device; each session runs an acquisition worker
//!   thread that reads the hardware in rounds and broadcasts every round to
//!   all attached clients.
//! - **`client`**: [`client::attach_and_wait`], the blocking streaming-read
//!   entry point used by client threads.
//! - **`attributes`**: stateless attribute get/set.
//! - **`directory`**: device lookup by id or name.
//! - **`writer`** / **`response`**: full-buffer writes and status-line framing.
//! - **`ops`**: [`Connection`], the command surface for a dispatcher.
//! - **`config`** / **`logging`**: Figment configuration and tracing setup.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use daq_driver_mock::{MockContext, MockDevice};
//! use rust_daqd::{writer, Connection, SessionRegistry};
//!
//! let ctx = MockContext::new().with_device(Arc::new(MockDevice::new("iio:device0")));
//! let conn = Connection::new(Arc::new(ctx), SessionRegistry::default(), writer::sink(std::io::stdout()));
//!
//! // 256 samples of 4 bytes each
//! let bytes = conn.read_dev("iio:device0", 256, 4)?;
//! assert_eq!(bytes, 1024);
//! # Ok::<(), daq_core::DaqError>(())
//! ```

pub mod attributes;
pub mod client;
pub mod config;
pub mod directory;
pub mod logging;
pub mod ops;
pub mod response;
pub mod session;
pub mod writer;

pub use attributes::AttributeAccess;
pub use client::ReadRequest;
pub use daq_core::{DaqError, DaqResult};
pub use directory::DeviceDirectory;
pub use ops::Connection;
pub use session::{Framing, SessionRegistry, SessionSettings};
pub use writer::Sink;
