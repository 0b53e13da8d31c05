//! Process-wide table of active device sessions.

use std::collections::HashMap;
use std::sync::Arc;

use daq_core::{DaqError, DaqResult, HardwareDevice};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::worker::AcquisitionWorker;
use super::{DeviceSession, OpenDevice, SessionSettings, Waiter};

pub(super) type Sessions = HashMap<String, Arc<DeviceSession>>;

pub(super) struct RegistryShared {
    pub(super) sessions: Mutex<Sessions>,
    pub(super) settings: SessionSettings,
}

/// Table of active sessions keyed by device id, guarded by one lock.
///
/// Cloning yields another handle to the same table. A daemon creates one
/// registry at startup and shares it with every connection.
#[derive(Clone)]
pub struct SessionRegistry {
    pub(super) shared: Arc<RegistryShared>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                sessions: Mutex::new(HashMap::new()),
                settings,
            }),
        }
    }

    /// Settings applied to new sessions.
    pub fn settings(&self) -> SessionSettings {
        self.shared.settings
    }

    /// Ids of devices with an active session, sorted.
    pub fn active_devices(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether a session for `device_id` is registered.
    pub fn is_active(&self, device_id: &str) -> bool {
        self.shared.sessions.lock().contains_key(device_id)
    }

    /// Number of waiters attached to the session for `device_id`, if any.
    pub fn waiter_count(&self, device_id: &str) -> Option<usize> {
        let sessions = self.shared.sessions.lock();
        sessions
            .get(device_id)
            .map(|session| session.waiters.lock().len())
    }

    /// Join `waiter` to the session for `device`, creating it if needed.
    ///
    /// Lookup, creation and attachment happen under one hold of the registry
    /// lock, so a worker can never observe an empty collection and retire
    /// between a client finding its session and joining it. Returns whether a
    /// new session was created.
    pub(crate) fn attach(
        &self,
        device: &Arc<dyn HardwareDevice>,
        sample_size: usize,
        waiter: Waiter,
    ) -> DaqResult<bool> {
        let mut sessions = self.shared.sessions.lock();
        let (session, created) = self.find_or_create(&mut sessions, device, sample_size)?;
        session.waiters.lock().push(waiter);
        debug!(device = %session.device_id, "Added waiter to session");
        Ok(created)
    }

    /// Session for `device`, opening the device and starting a worker when
    /// none exists. Must be called with the registry lock held.
    fn find_or_create(
        &self,
        sessions: &mut Sessions,
        device: &Arc<dyn HardwareDevice>,
        sample_size: usize,
    ) -> DaqResult<(Arc<DeviceSession>, bool)> {
        if let Some(session) = sessions.get(device.id()) {
            if session.sample_size != sample_size {
                return Err(DaqError::SampleSizeMismatch {
                    active: session.sample_size,
                    requested: sample_size,
                });
            }
            return Ok((Arc::clone(session), false));
        }

        debug!(device = %device.id(), sample_size, "Creating session");
        let open = OpenDevice::new(device.id(), device.open()?);
        let session = Arc::new(DeviceSession::new(device.id(), sample_size));
        AcquisitionWorker::spawn(Arc::clone(&session), Arc::clone(&self.shared), open)?;

        sessions.insert(device.id().to_string(), Arc::clone(&session));
        info!(device = %device.id(), sample_size, "Session started");
        Ok((session, true))
    }
}

/// Unregister `session`. Only its own worker calls this, with the registry
/// lock held.
pub(super) fn remove(sessions: &mut Sessions, session: &Arc<DeviceSession>) {
    match sessions.get(&session.device_id) {
        Some(registered) if Arc::ptr_eq(registered, session) => {
            sessions.remove(&session.device_id);
            info!(device = %session.device_id, "Session removed");
        }
        _ => debug!(device = %session.device_id, "Session already unregistered"),
    }
}
