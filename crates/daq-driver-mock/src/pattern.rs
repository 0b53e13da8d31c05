//! Deterministic sample stream for mock devices.

/// Simple pseudo-random number generator (LCG) for reproducible data.
/// Uses the same constants as glibc for predictable cross-platform behavior.
#[inline]
fn prng(seed: u64) -> u64 {
    seed.wrapping_mul(1103515245).wrapping_add(12345) & 0x7fffffff
}

/// Byte found at absolute `position` of a device stream seeded with `seed`.
///
/// Every byte depends only on its position, so a consumer that knows where
/// its data started can verify it independently of round boundaries.
#[inline]
pub fn pattern_byte(seed: u64, position: u64) -> u8 {
    (prng(seed ^ position.wrapping_mul(2654435761)) >> 16) as u8
}

/// Fill `buf` with the stream bytes starting at `position`.
pub fn fill_pattern(seed: u64, position: u64, buf: &mut [u8]) {
    for (offset, byte) in buf.iter_mut().enumerate() {
        *byte = pattern_byte(seed, position + offset as u64);
    }
}
