//! Per-request wait records.
//!
//! A [`Waiter`] is owned by its session's waiter collection from attach until
//! the worker removes it. Removal hands the record back by value, and
//! [`Waiter::finish`] consumes it, so a record leaves the collection and
//! receives its outcome exactly once.
//!
//! The client thread keeps only the [`Completion`] half, which it blocks on.

use std::sync::Arc;

use daq_core::{DaqError, DaqResult};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::response::write_status;
use crate::session::Framing;
use crate::writer::{write_all, Sink};

/// One-shot outcome hand-off between a worker and a blocked client thread.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    outcome: Mutex<Option<DaqResult<()>>>,
    ready: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn deliver(&self, outcome: DaqResult<()>) {
        let mut slot = self.outcome.lock();
        debug_assert!(slot.is_none(), "outcome delivered twice");
        *slot = Some(outcome);
        self.ready.notify_one();
    }

    /// Block until the outcome is set.
    pub(crate) fn wait(&self) -> DaqResult<()> {
        let mut slot = self.outcome.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.ready.wait(&mut slot);
        }
    }
}

/// Bookkeeping for one in-flight streaming read.
pub(crate) struct Waiter {
    remaining: usize,
    sink: Sink,
    verbose: bool,
    completion: Arc<Completion>,
}

impl Waiter {
    pub(crate) fn new(remaining: usize, sink: Sink, verbose: bool, completion: Arc<Completion>) -> Self {
        Self {
            remaining,
            sink,
            verbose,
            completion,
        }
    }

    /// Samples still owed to this request.
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    /// Write one round's payload holding `samples` samples.
    ///
    /// `remaining` only drops once the whole payload reached the sink.
    pub(crate) fn deliver_round(
        &mut self,
        payload: &[u8],
        samples: usize,
        framing: Framing,
    ) -> DaqResult<()> {
        debug_assert!(samples <= self.remaining);
        let mut sink = self.sink.lock();
        if framing == Framing::PerRound && !self.verbose {
            write_status(&mut *sink, false, Ok(payload.len()))?;
        }
        write_all(&mut *sink, payload)?;
        self.remaining -= samples;
        Ok(())
    }

    /// Tell the client about a session-terminating failure.
    pub(crate) fn report(&self, err: DaqError) {
        if let Err(write_err) = write_status(&mut *self.sink.lock(), self.verbose, Err(err)) {
            debug!(error = %write_err, "Could not report failure to client");
        }
    }

    /// Hand the outcome to the waiting client thread.
    pub(crate) fn finish(self, outcome: DaqResult<()>) {
        let Self {
            sink, completion, ..
        } = self;
        drop(sink);
        completion.deliver(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;
    use std::thread;

    fn waiter(remaining: usize, verbose: bool) -> (Waiter, Arc<Completion>, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let completion = Arc::new(Completion::new());
        let waiter = Waiter::new(remaining, buffer.clone(), verbose, Arc::clone(&completion));
        (waiter, completion, buffer)
    }

    #[test]
    fn test_completion_wakes_waiting_thread() {
        let (waiter, completion, _) = waiter(1, false);
        let client = thread::spawn(move || completion.wait());
        thread::sleep(std::time::Duration::from_millis(10));
        waiter.finish(Err(DaqError::Io));
        assert_eq!(client.join().unwrap(), Err(DaqError::Io));
    }

    #[test]
    fn test_outcome_set_before_wait_is_kept() {
        let (waiter, completion, _) = waiter(1, false);
        waiter.finish(Ok(()));
        assert_eq!(completion.wait(), Ok(()));
    }

    #[test]
    fn test_deliver_round_counts_down() {
        let (mut waiter, _, buffer) = waiter(10, false);
        waiter.deliver_round(&[1, 2, 3, 4], 2, Framing::Silent).unwrap();
        assert_eq!(waiter.remaining(), 8);
        assert_eq!(buffer.lock().as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_per_round_framing() {
        let (mut quiet, _, quiet_buf) = waiter(10, false);
        quiet.deliver_round(b"ab", 2, Framing::PerRound).unwrap();
        assert_eq!(quiet_buf.lock().as_slice(), b"2\nab");

        // Verbose connections never get per-round counts.
        let (mut loud, _, loud_buf) = waiter(10, true);
        loud.deliver_round(b"ab", 2, Framing::PerRound).unwrap();
        assert_eq!(loud_buf.lock().as_slice(), b"ab");
    }

    struct Closed;

    impl std::io::Write for Closed {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_keeps_remaining() {
        let completion = Arc::new(Completion::new());
        let mut waiter = Waiter::new(4, writer::sink(Closed), false, completion);
        assert_eq!(waiter.deliver_round(&[0; 4], 4, Framing::Silent), Err(DaqError::Io));
        assert_eq!(waiter.remaining(), 4);
    }

    #[test]
    fn test_report() {
        let (waiter, _, buffer) = waiter(1, true);
        waiter.report(DaqError::System(nix::errno::Errno::ETIMEDOUT));
        assert_eq!(
            buffer.lock().as_slice(),
            format!("ERROR: {}\n", nix::errno::Errno::ETIMEDOUT.desc()).as_bytes()
        );
    }
}
