//! Scripted control over blocking reads.

use std::collections::VecDeque;

use nix::errno::Errno;
use parking_lot::{Condvar, Mutex};

/// Outcome of one gated read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStep {
    /// Fill the whole requested buffer.
    Full,
    /// Return at most this many bytes (a short read).
    Bytes(usize),
    /// Fail the read with this errno.
    Fail(Errno),
}

/// Queue of read steps consumed by a gated device.
///
/// Each read on the device blocks until a step is available, then completes
/// according to that step.
#[derive(Debug, Default)]
pub struct ReadGate {
    steps: Mutex<VecDeque<ReadStep>>,
    ready: Condvar,
}

impl ReadGate {
    /// Create an empty gate; reads block until [`ReadGate::push`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Release one read.
    pub fn push(&self, step: ReadStep) {
        self.steps.lock().push_back(step);
        self.ready.notify_all();
    }

    /// Number of steps not yet consumed.
    pub fn pending(&self) -> usize {
        self.steps.lock().len()
    }

    pub(crate) fn next_step(&self) -> ReadStep {
        let mut steps = self.steps.lock();
        loop {
            if let Some(step) = steps.pop_front() {
                return step;
            }
            self.ready.wait(&mut steps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_steps_are_consumed_in_order() {
        let gate = ReadGate::new();
        gate.push(ReadStep::Bytes(8));
        gate.push(ReadStep::Fail(Errno::EIO));
        assert_eq!(gate.pending(), 2);
        assert_eq!(gate.next_step(), ReadStep::Bytes(8));
        assert_eq!(gate.next_step(), ReadStep::Fail(Errno::EIO));
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_next_step_blocks_until_push() {
        let gate = Arc::new(ReadGate::new());
        let reader = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.next_step())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!reader.is_finished());
        gate.push(ReadStep::Full);
        assert_eq!(reader.join().unwrap(), ReadStep::Full);
    }
}
