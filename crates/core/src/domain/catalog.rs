//! Device catalogs: immutable snapshots of an enumeration
//!
//! A catalog is built once from a flat device list and never mutated. Each
//! reconciliation cycle builds fresh catalogs for both identity spaces.

use crate::domain::audio::{
    CatalogDevice, DeviceEnumerationError, DeviceUid, EngineDevice, EngineDeviceId,
    EngineEnumerationError, HardwareDevice, SoundEngine, SystemDeviceRepository,
};
use std::collections::HashMap;
use tracing::debug;

/// Snapshot of one enumeration, split by capability and indexed by name
///
/// Name lookup is an exact, case-sensitive match. When several devices share a
/// name, the one enumerated last wins.
#[derive(Debug, Clone)]
pub struct Catalog<D> {
    all: Vec<D>,
    inputs: Vec<D>,
    outputs: Vec<D>,
    input_by_name: HashMap<String, D>,
    output_by_name: HashMap<String, D>,
    input_by_uid: HashMap<DeviceUid, D>,
    output_by_uid: HashMap<DeviceUid, D>,
}

impl<D: CatalogDevice> Catalog<D> {
    pub fn new(devices: Vec<D>) -> Self {
        let inputs: Vec<D> = devices.iter().filter(|d| d.has_input()).cloned().collect();
        let outputs: Vec<D> = devices.iter().filter(|d| d.has_output()).cloned().collect();

        Self {
            input_by_name: index_by_name(&inputs),
            output_by_name: index_by_name(&outputs),
            input_by_uid: index_by_uid(&inputs),
            output_by_uid: index_by_uid(&outputs),
            all: devices,
            inputs,
            outputs,
        }
    }

    pub fn all(&self) -> &[D] {
        &self.all
    }

    pub fn inputs(&self) -> &[D] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[D] {
        &self.outputs
    }

    pub fn input_named(&self, name: &str) -> Option<&D> {
        self.input_by_name.get(name)
    }

    pub fn output_named(&self, name: &str) -> Option<&D> {
        self.output_by_name.get(name)
    }

    pub fn input_with_uid(&self, uid: &DeviceUid) -> Option<&D> {
        self.input_by_uid.get(uid)
    }

    pub fn output_with_uid(&self, uid: &DeviceUid) -> Option<&D> {
        self.output_by_uid.get(uid)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

// Later entries overwrite earlier ones, which gives last-write-wins.
fn index_by_name<D: CatalogDevice>(devices: &[D]) -> HashMap<String, D> {
    devices
        .iter()
        .map(|d| (d.name().to_string(), d.clone()))
        .collect()
}

fn index_by_uid<D: CatalogDevice>(devices: &[D]) -> HashMap<DeviceUid, D> {
    devices
        .iter()
        .filter_map(|d| d.uid().map(|uid| (uid.clone(), d.clone())))
        .collect()
}

/// Hardware devices known to the OS, plus the defaults read in the same refresh
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    devices: Catalog<HardwareDevice>,
    default_input: Option<HardwareDevice>,
    default_output: Option<HardwareDevice>,
}

impl DeviceCatalog {
    pub fn new(devices: Vec<HardwareDevice>) -> Self {
        Self {
            devices: Catalog::new(devices),
            default_input: None,
            default_output: None,
        }
    }

    pub fn with_defaults(
        mut self,
        default_input: Option<HardwareDevice>,
        default_output: Option<HardwareDevice>,
    ) -> Self {
        self.default_input = default_input;
        self.default_output = default_output;
        self
    }

    /// Enumerate the OS devices and defaults
    pub fn load(repository: &dyn SystemDeviceRepository) -> Result<Self, DeviceEnumerationError> {
        let devices = repository.devices()?;
        debug!(count = devices.len(), "Loaded hardware device catalog");

        Ok(Self::new(devices).with_defaults(
            repository.default_input_device(),
            repository.default_output_device(),
        ))
    }

    pub fn all(&self) -> &[HardwareDevice] {
        self.devices.all()
    }

    pub fn inputs(&self) -> &[HardwareDevice] {
        self.devices.inputs()
    }

    pub fn outputs(&self) -> &[HardwareDevice] {
        self.devices.outputs()
    }

    pub fn input_named(&self, name: &str) -> Option<&HardwareDevice> {
        self.devices.input_named(name)
    }

    pub fn output_named(&self, name: &str) -> Option<&HardwareDevice> {
        self.devices.output_named(name)
    }

    pub fn by_uid(&self, uid: &DeviceUid) -> Option<&HardwareDevice> {
        self.devices.all().iter().find(|d| &d.uid == uid)
    }

    /// OS default input, preferring this snapshot's copy of the device
    pub fn default_input(&self) -> Option<&HardwareDevice> {
        self.default_input
            .as_ref()
            .map(|d| self.devices.input_with_uid(&d.uid).unwrap_or(d))
    }

    /// OS default output, preferring this snapshot's copy of the device
    pub fn default_output(&self) -> Option<&HardwareDevice> {
        self.default_output
            .as_ref()
            .map(|d| self.devices.output_with_uid(&d.uid).unwrap_or(d))
    }

    pub fn devices(&self) -> &Catalog<HardwareDevice> {
        &self.devices
    }
}

/// Devices the engine currently exposes
pub type EngineDeviceCatalog = Catalog<EngineDevice>;

impl Catalog<EngineDevice> {
    /// Enumerate the engine's devices; failure must abort the cycle
    pub fn load(engine: &dyn SoundEngine) -> Result<Self, EngineEnumerationError> {
        let devices = engine.devices()?;
        debug!(count = devices.len(), "Loaded engine device catalog");
        Ok(Self::new(devices))
    }

    pub fn device(&self, id: EngineDeviceId) -> Option<&EngineDevice> {
        self.all.iter().find(|d| d.id == id)
    }
}
