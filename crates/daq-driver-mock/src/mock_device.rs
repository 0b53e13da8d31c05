//! Mock streaming device and context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use daq_core::{DaqError, DaqResult, HardwareContext, HardwareDevice, StreamHandle};
use nix::errno::Errno;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::gate::{ReadGate, ReadStep};
use crate::pattern::fill_pattern;

/// Configuration for a simulated device, as found in the daemon config file.
///
/// ```toml
/// [[devices]]
/// id = "iio:device0"
/// name = "ad7476"
/// read_delay_ms = 5
///
/// [devices.attributes]
/// sampling_frequency = "1000000"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MockDeviceConfig {
    /// Stable device identifier
    pub id: String,
    /// Optional human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Initial attribute table
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Simulated latency of every read, in milliseconds
    #[serde(default)]
    pub read_delay_ms: Option<u64>,
}

/// Open/close and read bookkeeping shared by a device and its stream handle.
#[derive(Debug, Default)]
struct StreamState {
    open: bool,
    opens: u32,
    closes: u32,
    position: u64,
    read_requests: Vec<usize>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<StreamState>,
    changed: Condvar,
}

/// Simulated acquisition device.
///
/// Reads return the deterministic pattern for the device's seed, continuing
/// from where the previous read stopped (the position survives close/reopen,
/// as a free-running converter would).
#[derive(Debug)]
pub struct MockDevice {
    id: String,
    name: Option<String>,
    seed: u64,
    attributes: RwLock<HashMap<String, String>>,
    read_delay: Option<Duration>,
    short_reads: Option<usize>,
    gate: Option<Arc<ReadGate>>,
    open_error: Mutex<Option<Errno>>,
    shared: Arc<Shared>,
}

impl MockDevice {
    /// Create a free-running device with no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let seed = id
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x100_0000_01b3));
        Self {
            id,
            name: None,
            seed,
            attributes: RwLock::new(HashMap::new()),
            read_delay: None,
            short_reads: None,
            gate: None,
            open_error: Mutex::new(None),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Build a device from its config entry.
    pub fn from_config(config: &MockDeviceConfig) -> Self {
        let mut device = config
            .attributes
            .iter()
            .fold(Self::new(config.id.clone()), |device, (name, value)| {
                device.with_attribute(name.clone(), value.clone())
            });
        device.name = config.name.clone();
        match config.read_delay_ms {
            Some(ms) => device.with_read_delay(Duration::from_millis(ms)),
            None => device,
        }
    }

    /// Set the human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an attribute.
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.write().insert(name.into(), value.into());
        self
    }

    /// Sleep this long inside every read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Never return more than `max_bytes` from one read.
    pub fn with_short_reads(mut self, max_bytes: usize) -> Self {
        self.short_reads = Some(max_bytes);
        self
    }

    /// Gate every read on `gate`.
    pub fn with_gate(mut self, gate: Arc<ReadGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Seed of this device's data stream.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Make the next [`HardwareDevice::open`] fail with `errno`.
    pub fn fail_next_open(&self, errno: Errno) {
        *self.open_error.lock() = Some(errno);
    }

    /// Whether a stream handle is currently open.
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().open
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> u32 {
        self.shared.state.lock().opens
    }

    /// Number of closes so far.
    pub fn close_count(&self) -> u32 {
        self.shared.state.lock().closes
    }

    /// Byte length requested by every read so far, in order.
    pub fn read_requests(&self) -> Vec<usize> {
        self.shared.state.lock().read_requests.clone()
    }

    /// Current value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(name).cloned()
    }

    /// Block until at least `count` reads have been issued.
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_reads(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.read_requests.len() < count {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return state.read_requests.len() >= count;
            }
        }
        true
    }

    /// Block until the device has been closed at least `count` times.
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_closes(&self, count: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.closes < count {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return state.closes >= count;
            }
        }
        true
    }
}

impl HardwareDevice for MockDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn open(&self) -> DaqResult<Box<dyn StreamHandle>> {
        if let Some(errno) = self.open_error.lock().take() {
            debug!(device = %self.id, %errno, "Injected open failure");
            return Err(DaqError::System(errno));
        }

        let mut state = self.shared.state.lock();
        if state.open {
            return Err(DaqError::System(Errno::EBUSY));
        }
        state.open = true;
        state.opens += 1;
        debug!(device = %self.id, "Opened mock device");

        Ok(Box::new(MockStream {
            device_id: self.id.clone(),
            seed: self.seed,
            read_delay: self.read_delay,
            short_reads: self.short_reads,
            gate: self.gate.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn attr_read(&self, name: &str, buf: &mut [u8]) -> DaqResult<usize> {
        let attributes = self.attributes.read();
        let value = attributes
            .get(name)
            .ok_or(DaqError::System(Errno::ENOENT))?;
        let len = value.len().min(buf.len());
        buf[..len].copy_from_slice(&value.as_bytes()[..len]);
        Ok(len)
    }

    fn attr_write(&self, name: &str, value: &str) -> DaqResult<usize> {
        let mut attributes = self.attributes.write();
        let slot = attributes
            .get_mut(name)
            .ok_or(DaqError::System(Errno::ENOENT))?;
        *slot = value.to_string();
        Ok(value.len())
    }
}

/// Open handle of a [`MockDevice`].
struct MockStream {
    device_id: String,
    seed: u64,
    read_delay: Option<Duration>,
    short_reads: Option<usize>,
    gate: Option<Arc<ReadGate>>,
    shared: Arc<Shared>,
}

impl StreamHandle for MockStream {
    fn read_raw(&mut self, buf: &mut [u8]) -> DaqResult<usize> {
        {
            let mut state = self.shared.state.lock();
            state.read_requests.push(buf.len());
        }
        self.shared.changed.notify_all();

        let mut len = buf.len();
        if let Some(gate) = &self.gate {
            match gate.next_step() {
                ReadStep::Full => {}
                ReadStep::Bytes(limit) => len = len.min(limit),
                ReadStep::Fail(errno) => return Err(DaqError::System(errno)),
            }
        } else if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        if let Some(limit) = self.short_reads {
            len = len.min(limit);
        }

        let mut state = self.shared.state.lock();
        fill_pattern(self.seed, state.position, &mut buf[..len]);
        state.position += len as u64;
        trace!(device = %self.device_id, len, "Mock read");
        Ok(len)
    }

    fn close(self: Box<Self>) {
        {
            let mut state = self.shared.state.lock();
            state.open = false;
            state.closes += 1;
        }
        self.shared.changed.notify_all();
        debug!(device = %self.device_id, "Closed mock device");
    }
}

/// A fixed set of mock devices.
#[derive(Default)]
pub struct MockContext {
    devices: Vec<Arc<dyn HardwareDevice>>,
}

impl MockContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from device config entries.
    pub fn from_configs(configs: &[MockDeviceConfig]) -> Self {
        configs.iter().fold(Self::new(), |ctx, config| {
            ctx.with_device(Arc::new(MockDevice::from_config(config)))
        })
    }

    /// Append a device.
    pub fn with_device(mut self, device: Arc<dyn HardwareDevice>) -> Self {
        self.devices.push(device);
        self
    }
}

impl HardwareContext for MockContext {
    fn devices(&self) -> Vec<Arc<dyn HardwareDevice>> {
        self.devices.clone()
    }
}
