//! Shared hard limits for the acquisition data plane.
//!
//! Centralizing these keeps the per-round transfer bound and the attribute
//! buffer consistent between the engine, the configuration defaults, and the
//! hardware backends.

/// Default upper bound on bytes moved by a single hardware read (1 KiB).
///
/// The acquisition worker converts this to a sample count per session, so the
/// bound is independent of how many clients are attached.
pub const DEFAULT_MAX_READ_BYTES: usize = 1024;

/// Default size of the buffer handed to an attribute read (1 KiB).
pub const DEFAULT_ATTR_BUFFER_SIZE: usize = 1024;

/// Number of whole samples that fit in one round.
///
/// Never returns zero: a session whose sample is wider than the byte cap still
/// moves one sample per round instead of spinning on empty reads.
pub fn samples_per_round(max_read_bytes: usize, sample_size: usize) -> usize {
    if sample_size == 0 {
        return 0;
    }
    (max_read_bytes / sample_size).max(1)
}
