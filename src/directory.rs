//! Device lookup by identifier or name.

use std::sync::Arc;

use daq_core::{DaqError, DaqResult, DeviceInfo, HardwareContext, HardwareDevice};

/// Resolves textual device references against a hardware context.
#[derive(Clone)]
pub struct DeviceDirectory {
    ctx: Arc<dyn HardwareContext>,
}

impl DeviceDirectory {
    /// Create a directory over `ctx`.
    pub fn new(ctx: Arc<dyn HardwareContext>) -> Self {
        Self { ctx }
    }

    /// Find the first device whose id or name equals `id_or_name`.
    pub fn resolve(&self, id_or_name: &str) -> DaqResult<Arc<dyn HardwareDevice>> {
        self.ctx
            .devices()
            .into_iter()
            .find(|dev| dev.id() == id_or_name || dev.name() == Some(id_or_name))
            .ok_or(DaqError::DeviceNotFound)
    }

    /// `(id, name)` of every device in enumeration order.
    pub fn list(&self) -> Vec<DeviceInfo> {
        self.ctx.devices().iter().map(|dev| dev.info()).collect()
    }
}
