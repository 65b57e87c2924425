//! Receiver devices currently visible to discovery.
//!
//! Reflects transport-supplied facts only; every add and every effective
//! removal publishes `DeviceListChanged`.

use std::collections::BTreeMap;
use std::sync::Arc;

use handoff_types::Device;

use crate::events::EventBus;

#[derive(Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Arc<Device>>,
    device_category: Option<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device keyed by its id.
    pub fn on_device_found(&mut self, device: Device, events: &mut EventBus) -> Arc<Device> {
        let device = Arc::new(device);
        let replaced = self
            .devices
            .insert(device.id.clone(), device.clone())
            .is_some();
        tracing::info!(
            device_id = %device.id,
            name = %device.friendly_name,
            replaced,
            count = self.devices.len(),
            "discovery: device found"
        );
        events.device_list_changed(self.devices.len());
        device
    }

    /// Remove a device. Unknown ids are ignored without notification.
    pub fn on_device_lost(&mut self, device_id: &str, events: &mut EventBus) -> Option<Arc<Device>> {
        let removed = self.devices.remove(device_id)?;
        tracing::info!(
            device_id = %device_id,
            count = self.devices.len(),
            "discovery: device lost"
        );
        events.device_list_changed(self.devices.len());
        Some(removed)
    }

    /// Snapshot of the visible devices, ordered by id.
    pub fn list_devices(&self) -> Vec<Arc<Device>> {
        self.devices.values().cloned().collect()
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<Device>> {
        self.devices.get(device_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Record the device category reported when discovery started.
    pub fn set_device_category(&mut self, category: String) {
        self.device_category = Some(category);
    }

    pub fn device_category(&self) -> Option<&str> {
        self.device_category.as_deref()
    }
}
