//! Audio device abstractions and domain models
//!
//! This module defines the two device identity spaces the reconciliation engine
//! works with: hardware devices reported by the operating system and devices
//! exposed by the communications engine. It also declares the collaborator
//! traits the OS layer and the engine must implement. Implementations live in
//! the `infra` crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// The OS device list could not be read
#[derive(Debug, Error)]
pub enum DeviceEnumerationError {
    /// Querying the size of the device list failed
    #[error("Device list size query failed (OS status {status})")]
    SizeQuery { status: i32 },

    /// Reading the device list itself failed
    #[error("Device list query failed (OS status {status})")]
    ListQuery { status: i32 },

    /// Audio backend reported an error
    #[error("Audio backend error: {0}")]
    Backend(String),
}

/// The engine device list is unavailable
#[derive(Debug, Error)]
pub enum EngineEnumerationError {
    #[error("Sound engine is not running")]
    NotRunning,

    #[error("Engine device list unavailable: {0}")]
    Unavailable(String),
}

/// The engine refused the requested sound devices
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Engine rejected sound devices (input {input}, output {output}): {reason}")]
    Rejected {
        input: EngineDeviceId,
        output: EngineDeviceId,
        reason: String,
    },

    #[error("Sound engine is not running")]
    NotRunning,
}

/// Any failure that ends a reconciliation cycle
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    DeviceEnumeration(#[from] DeviceEnumerationError),

    #[error(transparent)]
    EngineEnumeration(#[from] EngineEnumerationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Stable, hardware-persistent identifier of an OS audio device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceUid(String);

impl DeviceUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine-assigned device identifier, stable only within one engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineDeviceId(i32);

impl EngineDeviceId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for EngineDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction a device can be used in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Input,
    Output,
}

/// One of the three independently configurable audio slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Input,
    Output,
    RingtoneOutput,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Input, Role::Output, Role::RingtoneOutput];

    /// Capability a device needs to fill this role
    pub fn capability(self) -> Capability {
        match self {
            Role::Input => Capability::Input,
            Role::Output | Role::RingtoneOutput => Capability::Output,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Input => "input",
            Role::Output => "output",
            Role::RingtoneOutput => "ringtone output",
        };
        f.write_str(label)
    }
}

/// Audio endpoint as reported by the operating system
///
/// Snapshot value, recreated on every enumeration. Two snapshots of the same
/// physical device compare equal through `uid`; the volatile `id` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareDevice {
    /// OS-assigned identifier, changes across reboots and replugs
    pub id: u32,
    pub uid: DeviceUid,
    pub name: String,
    pub has_input: bool,
    pub has_output: bool,
}

impl HardwareDevice {
    pub fn new(id: u32, uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            uid: DeviceUid::new(uid),
            name: name.into(),
            has_input: false,
            has_output: false,
        }
    }

    pub fn with_input(mut self) -> Self {
        self.has_input = true;
        self
    }

    pub fn with_output(mut self) -> Self {
        self.has_output = true;
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Input => self.has_input,
            Capability::Output => self.has_output,
        }
    }
}

impl PartialEq for HardwareDevice {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for HardwareDevice {}

impl Hash for HardwareDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

/// Audio endpoint as enumerated by the communications engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDevice {
    pub id: EngineDeviceId,
    pub name: String,
    pub has_input: bool,
    pub has_output: bool,
    /// Hardware uid, when the engine exposes it
    #[serde(default)]
    pub uid: Option<DeviceUid>,
}

impl EngineDevice {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id: EngineDeviceId::new(id),
            name: name.into(),
            has_input: false,
            has_output: false,
            uid: None,
        }
    }

    pub fn with_input(mut self) -> Self {
        self.has_input = true;
        self
    }

    pub fn with_output(mut self) -> Self {
        self.has_output = true;
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(DeviceUid::new(uid));
        self
    }
}

/// Common view over both device kinds, used to build catalogs
pub trait CatalogDevice: Clone {
    fn name(&self) -> &str;
    fn has_input(&self) -> bool;
    fn has_output(&self) -> bool;
    fn uid(&self) -> Option<&DeviceUid>;
}

impl CatalogDevice for HardwareDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_input(&self) -> bool {
        self.has_input
    }

    fn has_output(&self) -> bool {
        self.has_output
    }

    fn uid(&self) -> Option<&DeviceUid> {
        Some(&self.uid)
    }
}

impl CatalogDevice for EngineDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_input(&self) -> bool {
        self.has_input
    }

    fn has_output(&self) -> bool {
        self.has_output
    }

    fn uid(&self) -> Option<&DeviceUid> {
        self.uid.as_ref()
    }
}

/// Handle returned by subscription APIs, passed back to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Operating system audio device layer
///
/// Calls may block on system calls; only invoke them from the background
/// queue.
pub trait SystemDeviceRepository: Send + Sync {
    /// All hardware devices currently known to the OS, in enumeration order
    fn devices(&self) -> Result<Vec<HardwareDevice>, DeviceEnumerationError>;

    /// OS default input device, `None` when there is none
    fn default_input_device(&self) -> Option<HardwareDevice>;

    /// OS default output device, `None` when there is none
    fn default_output_device(&self) -> Option<HardwareDevice>;
}

/// Device enumeration and selection entry points of the communications engine
pub trait SoundEngine: Send + Sync {
    /// Devices in the engine's own numbering space
    fn devices(&self) -> Result<Vec<EngineDevice>, EngineEnumerationError>;

    /// Ask the engine to re-enumerate its device list
    fn refresh_devices(&self);

    /// Route engine audio through the given devices
    fn select_sound_devices(
        &self,
        input: EngineDeviceId,
        output: EngineDeviceId,
    ) -> Result<(), SelectionError>;
}
