//! Acquisition worker: one thread per session.
//!
//! The worker is an explicit state machine:
//!
//! ```text
//!   Running ──(no waiters | previous round failed)──▶ Draining ──▶ Terminated
//!      ▲  │
//!      └──┘ one round: size, read, broadcast
//! ```
//!
//! `Running` evaluates its exit conditions under the registry lock and, when
//! leaving, carries that guard into `Draining`. Draining therefore always
//! starts with the registry lock held and the waiter lock released, whichever
//! condition ended the loop.
//!
//! No client sink is written while the registry lock is held. A failed round
//! reports to its waiters under the waiter lock only; draining just detaches
//! the leftovers and hands them their outcome after the lock is released.

use std::mem;
use std::sync::Arc;
use std::thread;

use daq_core::limits::samples_per_round;
use daq_core::{DaqError, DaqResult};
use parking_lot::MutexGuard;
use tracing::{debug, info_span, trace, warn};

use super::registry::{self, RegistryShared, Sessions};
use super::{DeviceSession, Framing, OpenDevice, Waiter};

enum WorkerState<'r> {
    Running { failure: Option<DaqError> },
    Draining {
        sessions: MutexGuard<'r, Sessions>,
        cause: Option<DaqError>,
    },
    Terminated,
}

pub(super) struct AcquisitionWorker {
    session: Arc<DeviceSession>,
    registry: Arc<RegistryShared>,
    device: OpenDevice,
    max_samples: usize,
    framing: Framing,
}

impl AcquisitionWorker {
    /// Start the worker thread for `session`. The thread is detached; it
    /// retires on its own once the session has no waiters.
    ///
    /// If the thread cannot be started, `device` is closed on the way out.
    pub(super) fn spawn(
        session: Arc<DeviceSession>,
        registry: Arc<RegistryShared>,
        device: OpenDevice,
    ) -> DaqResult<()> {
        let settings = registry.settings;
        let worker = Self {
            max_samples: samples_per_round(settings.max_read_bytes, session.sample_size),
            framing: settings.framing,
            session,
            registry,
            device,
        };
        thread::Builder::new()
            .name(format!("daq-read:{}", worker.session.device_id))
            .spawn(move || worker.run())
            .map(|_detached| ())
            .map_err(DaqError::from)
    }

    fn run(mut self) {
        let span = info_span!(
            "acquisition",
            device = %self.session.device_id,
            sample_size = self.session.sample_size
        );
        let _enter = span.enter();

        let registry = Arc::clone(&self.registry);
        let mut state = WorkerState::Running { failure: None };
        loop {
            state = match state {
                WorkerState::Running { failure } => {
                    let sessions = registry.sessions.lock();
                    if failure.is_some() {
                        WorkerState::Draining {
                            sessions,
                            cause: failure,
                        }
                    } else {
                        match self.plan_round() {
                            None => WorkerState::Draining {
                                sessions,
                                cause: None,
                            },
                            Some(batch) => {
                                drop(sessions);
                                WorkerState::Running {
                                    failure: self.run_round(batch).err(),
                                }
                            }
                        }
                    }
                }
                WorkerState::Draining { mut sessions, cause } => {
                    let leftover = self.detach_all();
                    registry::remove(&mut sessions, &self.session);
                    drop(sessions);
                    self.device.close();
                    retire(leftover, cause);
                    WorkerState::Terminated
                }
                WorkerState::Terminated => break,
            };
        }
        debug!("Worker terminated");
    }

    /// Samples to read this round: the smallest outstanding need of any
    /// attached waiter, capped by the per-round bound. `None` when nobody is
    /// attached.
    fn plan_round(&self) -> Option<usize> {
        let waiters = self.session.waiters.lock();
        waiters
            .iter()
            .map(Waiter::remaining)
            .min()
            .map(|least| least.min(self.max_samples))
    }

    /// Read one batch and broadcast it. Called with no lock held.
    ///
    /// A failed round is reported to every attached waiter before the error
    /// is returned.
    fn run_round(&mut self, batch_samples: usize) -> DaqResult<()> {
        let sample_size = self.session.sample_size;
        let (buf, read) = match self.read_batch(batch_samples) {
            Ok(round) => round,
            Err(err) => {
                self.fail_waiters(err);
                return Err(err);
            }
        };

        let got_samples = read / sample_size;
        if read % sample_size != 0 {
            debug!(
                read,
                dropped = read % sample_size,
                "Short read ended mid-sample; keeping whole samples"
            );
        }
        let payload = &buf[..got_samples * sample_size];

        let mut waiters = self.session.waiters.lock();
        self.broadcast(&mut waiters, payload, got_samples);
        Ok(())
    }

    /// Allocate the round buffer and fill it from the device.
    fn read_batch(&mut self, batch_samples: usize) -> DaqResult<(Vec<u8>, usize)> {
        let len = batch_samples
            .checked_mul(self.session.sample_size)
            .ok_or(DaqError::OutOfMemory)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| DaqError::OutOfMemory)?;
        buf.resize(len, 0u8);

        trace!(len, "Reading from device");
        match self.device.read_raw(&mut buf) {
            Ok(read) => Ok((buf, read.min(len))),
            Err(err) => {
                warn!(error = %err, code = err.code(), "Hardware read failed");
                Err(err)
            }
        }
    }

    /// Report `err` to every attached waiter and retire them.
    fn fail_waiters(&self, err: DaqError) {
        let mut waiters = self.session.waiters.lock();
        debug!(count = waiters.len(), error = %err, "Round failed");
        for waiter in waiters.drain(..) {
            waiter.report(err);
            waiter.finish(Err(err));
        }
    }

    /// Hand `payload` to every attached waiter that still needs at least
    /// `got_samples`, retiring the ones that are satisfied or whose sink broke.
    fn broadcast(&self, waiters: &mut Vec<Waiter>, payload: &[u8], got_samples: usize) {
        for mut waiter in mem::take(waiters) {
            if got_samples > waiter.remaining() {
                // Joined after this round was sized; it takes part in the next.
                trace!(
                    remaining = waiter.remaining(),
                    got_samples,
                    "Round exceeds waiter's outstanding samples; deferring"
                );
                waiters.push(waiter);
                continue;
            }

            match waiter.deliver_round(payload, got_samples, self.framing) {
                Err(err) => {
                    debug!(error = %err, "Client sink failed; detaching waiter");
                    waiter.finish(Err(err));
                }
                Ok(()) if waiter.remaining() == 0 => waiter.finish(Ok(())),
                Ok(()) => waiters.push(waiter),
            }
        }
    }

    /// Take every waiter still attached. Called with the registry lock held.
    fn detach_all(&self) -> Vec<Waiter> {
        mem::take(&mut *self.session.waiters.lock())
    }
}

/// Hand detached waiters their outcome. Only waiters that joined after a
/// failed round are left here with a `cause`; they get the same report.
fn retire(waiters: Vec<Waiter>, cause: Option<DaqError>) {
    if !waiters.is_empty() {
        debug!(count = waiters.len(), ?cause, "Retiring late waiters");
    }
    for waiter in waiters {
        match cause {
            Some(err) => {
                waiter.report(err);
                waiter.finish(Err(err));
            }
            None => waiter.finish(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Completion, SessionSettings};
    use crate::writer::Sink;
    use parking_lot::Mutex;

    fn worker_for(sample_size: usize, settings: SessionSettings) -> AcquisitionWorker {
        let device = daq_driver_mock::MockDevice::new("iio:device0");
        let handle = daq_core::HardwareDevice::open(&device).unwrap();
        let registry = crate::session::SessionRegistry::new(settings);
        AcquisitionWorker {
            session: Arc::new(DeviceSession::new("iio:device0", sample_size)),
            registry: Arc::clone(&registry.shared),
            device: OpenDevice::new("iio:device0", handle),
            max_samples: samples_per_round(settings.max_read_bytes, sample_size),
            framing: settings.framing,
        }
    }

    fn attach(worker: &AcquisitionWorker, remaining: usize) -> (Arc<Completion>, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink: Sink = buffer.clone();
        let completion = Arc::new(Completion::new());
        worker
            .session
            .waiters
            .lock()
            .push(Waiter::new(remaining, sink, false, Arc::clone(&completion)));
        (completion, buffer)
    }

    #[test]
    fn test_plan_round_takes_min_of_remaining_and_cap() {
        let worker = worker_for(4, SessionSettings::default());
        assert_eq!(worker.plan_round(), None);

        attach(&worker, 1000);
        assert_eq!(worker.plan_round(), Some(256));

        attach(&worker, 30);
        assert_eq!(worker.plan_round(), Some(30));
    }

    #[test]
    fn test_broadcast_sends_identical_bytes() {
        let worker = worker_for(2, SessionSettings::default());
        let (done_a, buf_a) = attach(&worker, 2);
        let (_, buf_b) = attach(&worker, 5);

        let mut waiters = worker.session.waiters.lock();
        worker.broadcast(&mut waiters, &[9, 8, 7, 6], 2);

        assert_eq!(waiters.len(), 1);
        assert_eq!(waiters[0].remaining(), 3);
        drop(waiters);

        assert_eq!(buf_a.lock().as_slice(), &[9, 8, 7, 6]);
        assert_eq!(buf_b.lock().as_slice(), &[9, 8, 7, 6]);
        assert_eq!(done_a.wait(), Ok(()));
    }

    #[test]
    fn test_broadcast_defers_oversized_round() {
        let worker = worker_for(1, SessionSettings::default());
        let (_, buf) = attach(&worker, 2);

        let mut waiters = worker.session.waiters.lock();
        worker.broadcast(&mut waiters, &[1, 2, 3], 3);
        assert_eq!(waiters.len(), 1);
        assert_eq!(waiters[0].remaining(), 2);
        assert!(buf.lock().is_empty());
    }

    #[test]
    fn test_failed_round_reports_to_every_waiter() {
        let worker = worker_for(4, SessionSettings::default());
        let (done_a, buf_a) = attach(&worker, 8);
        let (done_b, buf_b) = attach(&worker, 2);
        let timeout = DaqError::System(nix::errno::Errno::ETIMEDOUT);

        worker.fail_waiters(timeout);

        assert!(worker.session.waiters.lock().is_empty());
        let line = format!("-{}\n", nix::errno::Errno::ETIMEDOUT as i32);
        for (done, buf) in [(done_a, buf_a), (done_b, buf_b)] {
            assert_eq!(done.wait(), Err(timeout));
            assert_eq!(buf.lock().as_slice(), line.as_bytes());
        }
    }

    #[test]
    fn test_retire_late_waiters() {
        let worker = worker_for(4, SessionSettings::default());
        let (done, buf) = attach(&worker, 8);

        let leftover = worker.detach_all();
        assert!(worker.session.waiters.lock().is_empty());
        retire(leftover, Some(DaqError::Io));

        assert_eq!(done.wait(), Err(DaqError::Io));
        assert_eq!(buf.lock().as_slice(), b"-5\n");
    }

    #[test]
    fn test_unallocatable_round_fails_waiters() {
        let mut worker = worker_for(usize::MAX, SessionSettings::default());
        let (done, buf) = attach(&worker, 1);

        assert_eq!(worker.run_round(1), Err(DaqError::OutOfMemory));
        assert_eq!(done.wait(), Err(DaqError::OutOfMemory));
        assert_eq!(buf.lock().as_slice(), b"-12\n");
    }
}
