//! Sound IO triples, preferred-device resolution and per-slot fallback
//!
//! "No device" is an empty slot. Every consumer queries `is_null` (or matches
//! on the `Option`) before touching a slot's device.

use crate::domain::audio::{HardwareDevice, Role};
use crate::domain::catalog::DeviceCatalog;
use crate::domain::settings::KeyValueSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Devices for the three roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundIo<D> {
    pub input: Option<D>,
    pub output: Option<D>,
    pub ringtone_output: Option<D>,
}

impl<D> Default for SoundIo<D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<D> SoundIo<D> {
    pub fn new(input: Option<D>, output: Option<D>, ringtone_output: Option<D>) -> Self {
        Self {
            input,
            output,
            ringtone_output,
        }
    }

    /// Triple with every slot empty
    pub fn null() -> Self {
        Self::new(None, None, None)
    }

    pub fn get(&self, role: Role) -> Option<&D> {
        match role {
            Role::Input => self.input.as_ref(),
            Role::Output => self.output.as_ref(),
            Role::RingtoneOutput => self.ringtone_output.as_ref(),
        }
    }

    pub fn is_null(&self, role: Role) -> bool {
        self.get(role).is_none()
    }

    /// First role whose slot is empty, in input/output/ringtone order
    pub fn first_null(&self) -> Option<Role> {
        Role::ALL.into_iter().find(|role| self.is_null(*role))
    }

    /// Per-slot fallback: keep each slot of `self` unless it is null
    pub fn or(self, fallback: SoundIo<D>) -> SoundIo<D> {
        SoundIo {
            input: self.input.or(fallback.input),
            output: self.output.or(fallback.output),
            ringtone_output: self.ringtone_output.or(fallback.ringtone_output),
        }
    }

    /// Transform every slot with its role
    pub fn map_with_role<T, F>(self, mut f: F) -> SoundIo<T>
    where
        F: FnMut(Role, D) -> Option<T>,
    {
        SoundIo {
            input: self.input.and_then(|d| f(Role::Input, d)),
            output: self.output.and_then(|d| f(Role::Output, d)),
            ringtone_output: self.ringtone_output.and_then(|d| f(Role::RingtoneOutput, d)),
        }
    }

    pub fn as_ref(&self) -> SoundIo<&D> {
        SoundIo {
            input: self.input.as_ref(),
            output: self.output.as_ref(),
            ringtone_output: self.ringtone_output.as_ref(),
        }
    }
}

impl SoundIo<HardwareDevice> {
    /// The OS defaults for every role; ringtone follows the default output
    pub fn system_defaults(catalog: &DeviceCatalog) -> Self {
        Self::new(
            catalog.default_input().cloned(),
            catalog.default_output().cloned(),
            catalog.default_output().cloned(),
        )
    }

    /// Device names, for presentation
    pub fn names(&self) -> SoundIo<String> {
        self.as_ref().map_with_role(|_, d| Some(d.name.clone()))
    }
}

/// Resolves stored device names into hardware devices
///
/// Pure given the catalog and the stored names: resolving twice without
/// changes yields the same triple.
pub struct PreferredSelection<'a> {
    settings: &'a dyn KeyValueSettings,
}

impl<'a> PreferredSelection<'a> {
    pub fn new(settings: &'a dyn KeyValueSettings) -> Self {
        Self { settings }
    }

    /// Preferred devices, each falling back to the OS default for its role
    pub fn resolve(&self, catalog: &DeviceCatalog) -> SoundIo<HardwareDevice> {
        self.preferred(catalog).or(SoundIo::system_defaults(catalog))
    }

    /// Only the devices that the stored names resolve to, no defaults
    pub fn preferred(&self, catalog: &DeviceCatalog) -> SoundIo<HardwareDevice> {
        SoundIo::new(
            self.lookup(catalog, Role::Input),
            self.lookup(catalog, Role::Output),
            self.lookup(catalog, Role::RingtoneOutput),
        )
    }

    fn lookup(&self, catalog: &DeviceCatalog, role: Role) -> Option<HardwareDevice> {
        let name = self
            .settings
            .preferred_device_name(role)
            .filter(|name| !name.is_empty())?;

        let device = match role {
            Role::Input => catalog.input_named(&name),
            Role::Output | Role::RingtoneOutput => catalog.output_named(&name),
        };

        if device.is_none() {
            debug!(%role, name = %name, "Preferred device not connected, using default");
        }
        device.cloned()
    }
}
