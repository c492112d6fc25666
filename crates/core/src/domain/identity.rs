//! Correspondence between hardware devices and engine devices
//!
//! The OS and the engine number their devices independently, so the only join
//! key they reliably share is the device name. Where the engine also reports a
//! hardware uid, that is tried first, and a name match is rejected when the
//! engine device names a different uid.
//!
//! The map is keyed by `(uid, capability)`. A duplex device can therefore map
//! to one engine device for input and a different one for output, and neither
//! overwrites the other.

use crate::domain::audio::{Capability, DeviceUid, EngineDevice, HardwareDevice, Role};
use crate::domain::catalog::{DeviceCatalog, EngineDeviceCatalog};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Hardware → engine device map for one reconciliation cycle
///
/// Never exhaustive: any device, including the selected one, may be unmapped.
#[derive(Debug, Clone, Default)]
pub struct DeviceIdentityMap {
    map: HashMap<(DeviceUid, Capability), EngineDevice>,
}

impl DeviceIdentityMap {
    /// Match every hardware device against the capability-appropriate engine view
    pub fn build(hardware: &DeviceCatalog, engine: &EngineDeviceCatalog) -> Self {
        let mut map = HashMap::new();

        for device in hardware.all() {
            if device.has_input {
                let found = engine
                    .input_with_uid(&device.uid)
                    .or_else(|| same_device_by_name(engine.input_named(&device.name), device));
                if let Some(engine_device) = found {
                    trace!(name = %device.name, engine_id = %engine_device.id, "Mapped input");
                    map.insert((device.uid.clone(), Capability::Input), engine_device.clone());
                }
            }

            if device.has_output {
                let found = engine
                    .output_with_uid(&device.uid)
                    .or_else(|| same_device_by_name(engine.output_named(&device.name), device));
                if let Some(engine_device) = found {
                    trace!(name = %device.name, engine_id = %engine_device.id, "Mapped output");
                    map.insert((device.uid.clone(), Capability::Output), engine_device.clone());
                }
            }
        }

        debug!(
            hardware = hardware.all().len(),
            engine = engine.all().len(),
            mapped = map.len(),
            "Built device identity map"
        );

        Self { map }
    }

    /// Engine device for `device` used with `capability`, if any
    pub fn engine_device(
        &self,
        device: &HardwareDevice,
        capability: Capability,
    ) -> Option<&EngineDevice> {
        self.map.get(&(device.uid.clone(), capability))
    }

    /// Engine device for `device` when it fills `role`
    pub fn engine_device_for_role(
        &self,
        device: &HardwareDevice,
        role: Role,
    ) -> Option<&EngineDevice> {
        self.engine_device(device, role.capability())
    }

    pub fn contains(&self, device: &HardwareDevice, capability: Capability) -> bool {
        self.engine_device(device, capability).is_some()
    }

    /// Number of `(device, capability)` pairs that found a match
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A name match only stands when the engine device does not claim another uid
fn same_device_by_name<'a>(
    candidate: Option<&'a EngineDevice>,
    device: &HardwareDevice,
) -> Option<&'a EngineDevice> {
    candidate.filter(|engine_device| {
        engine_device
            .uid
            .as_ref()
            .map_or(true, |uid| uid == &device.uid)
    })
}
