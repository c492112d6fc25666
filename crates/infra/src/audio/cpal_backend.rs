//! CPAL-based system device repository
//!
//! Provides the OS device list through CPAL, which abstracts the
//! platform-specific APIs.

use cpal::traits::{DeviceTrait, HostTrait};
use soundroute_core::domain::audio::{
    DeviceEnumerationError, HardwareDevice, SystemDeviceRepository,
};
use tracing::{debug, info};

/// Display name of a cpal device
///
/// Tries `description()` first, falling back to the deprecated `name()`.
fn device_name(device: &cpal::Device) -> String {
    if let Ok(desc) = device.description() {
        desc.name().to_string()
    } else {
        #[allow(deprecated)]
        device.name().unwrap_or_else(|_| "Unknown Device".into())
    }
}

/// Stable identifier; survives replugs where the backend supports it
///
/// Falls back to the name when the backend has no persistent id.
fn device_uid(device: &cpal::Device, name: &str) -> String {
    device
        .id()
        .ok()
        .map(|id| id.to_string())
        .unwrap_or_else(|| name.to_string())
}

fn has_input(device: &cpal::Device) -> bool {
    device
        .supported_input_configs()
        .map(|mut configs| configs.next().is_some())
        .unwrap_or(false)
}

fn has_output(device: &cpal::Device) -> bool {
    device
        .supported_output_configs()
        .map(|mut configs| configs.next().is_some())
        .unwrap_or(false)
}

fn to_hardware_device(index: u32, device: &cpal::Device) -> HardwareDevice {
    let name = device_name(device);
    let uid = device_uid(device, &name);
    let mut hardware = HardwareDevice::new(index, uid, name);
    hardware.has_input = has_input(device);
    hardware.has_output = has_output(device);
    hardware
}

/// `SystemDeviceRepository` backed by the default CPAL host
pub struct CpalDeviceRepository {
    host: cpal::Host,
}

impl Default for CpalDeviceRepository {
    fn default() -> Self {
        info!("Initializing CPAL device repository");
        Self::new()
    }
}

impl CpalDeviceRepository {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }
}

impl SystemDeviceRepository for CpalDeviceRepository {
    fn devices(&self) -> Result<Vec<HardwareDevice>, DeviceEnumerationError> {
        debug!("Enumerating all audio devices");

        let cpal_devices = self
            .host
            .devices()
            .map_err(|e| DeviceEnumerationError::Backend(e.to_string()))?;

        let devices: Vec<HardwareDevice> = cpal_devices
            .enumerate()
            .map(|(index, device)| to_hardware_device(index as u32, &device))
            .filter(|device| {
                let usable = device.has_input || device.has_output;
                if !usable {
                    debug!(name = %device.name, "Skipping device with no inputs or outputs");
                }
                usable
            })
            .collect();

        for device in &devices {
            debug!(
                name = %device.name,
                uid = %device.uid,
                input = device.has_input,
                output = device.has_output,
                "Found device"
            );
        }
        debug!(count = devices.len(), "Enumerated audio devices");
        Ok(devices)
    }

    // Defaults carry index 0; `DeviceCatalog` swaps in the enumerated copy by uid.
    fn default_input_device(&self) -> Option<HardwareDevice> {
        self.host
            .default_input_device()
            .map(|device| to_hardware_device(0, &device))
    }

    fn default_output_device(&self) -> Option<HardwareDevice> {
        self.host
            .default_output_device()
            .map(|device| to_hardware_device(0, &device))
    }
}
