//! Persisted sound preferences, seen as an opaque key-value store
//!
//! Stores are read from the background queue and written from the foreground,
//! so every implementation must be safe to share across threads.

use crate::domain::audio::Role;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Keys the reconciliation engine reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    SoundInput,
    SoundOutput,
    RingtoneOutput,
    RingtoneSound,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::SoundInput => "SoundInput",
            SettingKey::SoundOutput => "SoundOutput",
            SettingKey::RingtoneOutput => "RingtoneOutput",
            SettingKey::RingtoneSound => "RingingSound",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Role {
    /// Settings key holding the preferred device name for this role
    pub fn setting_key(self) -> SettingKey {
        match self {
            Role::Input => SettingKey::SoundInput,
            Role::Output => SettingKey::SoundOutput,
            Role::RingtoneOutput => SettingKey::RingtoneOutput,
        }
    }
}

/// Get/set access to persisted preferences
pub trait KeyValueSettings: Send + Sync {
    fn get(&self, key: SettingKey) -> Option<String>;

    fn set(&self, key: SettingKey, value: String);

    /// Stored device name for `role`
    fn preferred_device_name(&self, role: Role) -> Option<String> {
        self.get(role.setting_key())
    }
}

/// Non-persistent store, for tests and for running without a config file
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: Mutex<HashMap<SettingKey, String>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: SettingKey, value: impl Into<String>) -> Self {
        self.set(key, value.into());
        self
    }
}

impl KeyValueSettings for InMemorySettings {
    fn get(&self, key: SettingKey) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(&key).cloned()
    }

    fn set(&self, key: SettingKey, value: String) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key, value);
    }
}
