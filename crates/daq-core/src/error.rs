//! Error taxonomy for the acquisition data plane.
//!
//! Every failure a client can observe is reported as a negative errno on the
//! wire, so `DaqError` is a closed set of variants that each map onto exactly
//! one errno value:
//!
//! - **`DeviceNotFound`** (`-ENODEV`): the identifier matched neither a device
//!   id nor a device name in the hardware context.
//! - **`SampleSizeMismatch`** (`-EINVAL`): a streaming request disagreed with
//!   the sample size of the session already active on that device.
//! - **`InvalidArgument`** (`-EINVAL`): a request that can never be served,
//!   such as a zero sample size.
//! - **`OutOfMemory`** (`-ENOMEM`): a round buffer could not be allocated.
//! - **`Io`** (`-EIO`): an output sink stopped accepting bytes.
//! - **`System`**: pass-through errno from the hardware abstraction or the
//!   operating system.
//!
//! Human-readable text (used by verbose clients) is the platform `strerror`
//! description of the errno.

use nix::errno::Errno;
use thiserror::Error;

/// Convenience alias for results carrying a [`DaqError`].
pub type DaqResult<T> = std::result::Result<T, DaqError>;

/// Primary error type for the data plane.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaqError {
    /// No device in the context matches the requested id or name.
    #[error("{}", Errno::ENODEV.desc())]
    DeviceNotFound,

    /// A session for the device is already active with another sample size.
    #[error("sample size {requested} conflicts with active session sample size {active}")]
    SampleSizeMismatch {
        /// Sample size of the running session
        active: usize,
        /// Sample size the rejected request asked for
        requested: usize,
    },

    /// The request is malformed.
    #[error("{}", Errno::EINVAL.desc())]
    InvalidArgument,

    /// A transfer buffer could not be allocated.
    #[error("{}", Errno::ENOMEM.desc())]
    OutOfMemory,

    /// An output sink accepted zero bytes.
    #[error("{}", Errno::EIO.desc())]
    Io,

    /// Errno reported by the hardware abstraction or the OS.
    #[error("{}", .0.desc())]
    System(Errno),
}

impl DaqError {
    /// The errno this error is reported as.
    pub fn errno(&self) -> Errno {
        match self {
            Self::DeviceNotFound => Errno::ENODEV,
            Self::SampleSizeMismatch { .. } | Self::InvalidArgument => Errno::EINVAL,
            Self::OutOfMemory => Errno::ENOMEM,
            Self::Io => Errno::EIO,
            Self::System(errno) => *errno,
        }
    }

    /// Negative integer code written to non-verbose clients.
    pub fn code(&self) -> i32 {
        -(self.errno() as i32)
    }

    /// `strerror` text of the errno, as written after `ERROR: ` for verbose
    /// clients.
    pub fn description(&self) -> &'static str {
        self.errno().desc()
    }
}

impl From<Errno> for DaqError {
    fn from(errno: Errno) -> Self {
        Self::System(errno)
    }
}

impl From<std::io::Error> for DaqError {
    fn from(err: std::io::Error) -> Self {
        match err.raw_os_error() {
            Some(raw) => Self::System(Errno::from_raw(raw)),
            None => match err.kind() {
                std::io::ErrorKind::OutOfMemory => Self::OutOfMemory,
                std::io::ErrorKind::InvalidInput => Self::InvalidArgument,
                _ => Self::Io,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_errno() {
        assert_eq!(DaqError::DeviceNotFound.code(), -19);
        assert_eq!(DaqError::OutOfMemory.code(), -12);
        assert_eq!(DaqError::Io.code(), -5);
        assert_eq!(DaqError::InvalidArgument.code(), -22);
        assert_eq!(
            DaqError::SampleSizeMismatch {
                active: 4,
                requested: 8
            }
            .code(),
            -22
        );
        assert_eq!(DaqError::System(Errno::EBUSY).code(), -(Errno::EBUSY as i32));
    }

    #[test]
    fn test_description_matches_strerror() {
        assert_eq!(DaqError::DeviceNotFound.description(), "No such device");
        assert_eq!(DaqError::DeviceNotFound.to_string(), "No such device");
        let mismatch = DaqError::SampleSizeMismatch {
            active: 4,
            requested: 8,
        };
        assert!(mismatch.to_string().contains('8'));
        assert_eq!(mismatch.description(), Errno::EINVAL.desc());
    }

    #[test]
    fn test_from_io_error() {
        let os = std::io::Error::from_raw_os_error(Errno::EPIPE as i32);
        assert_eq!(DaqError::from(os), DaqError::System(Errno::EPIPE));

        let zero = std::io::Error::from(std::io::ErrorKind::WriteZero);
        assert_eq!(DaqError::from(zero), DaqError::Io);
    }
}
