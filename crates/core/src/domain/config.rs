//! Configuration management for soundroute
//!
//! This module provides:
//! - The `config.toml` layout (`[app]` and `[sound]` tables)
//! - `FileSettings`, the file-backed `KeyValueSettings` store
//! - Hot-reload support via file system watcher

use crate::domain::settings::{KeyValueSettings, SettingKey};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interval between OS device topology polls, in milliseconds
    pub poll_interval_ms: u64,

    /// Reload settings and reselect when the config file changes
    pub watch_config: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            watch_config: true,
        }
    }
}

/// Persisted sound preferences; device entries are names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub input: Option<String>,
    pub output: Option<String>,
    pub ringtone_output: Option<String>,
    pub ringtone_sound: Option<String>,
}

impl SoundSettings {
    pub fn get(&self, key: SettingKey) -> Option<&String> {
        match key {
            SettingKey::SoundInput => self.input.as_ref(),
            SettingKey::SoundOutput => self.output.as_ref(),
            SettingKey::RingtoneOutput => self.ringtone_output.as_ref(),
            SettingKey::RingtoneSound => self.ringtone_sound.as_ref(),
        }
    }

    pub fn set(&mut self, key: SettingKey, value: String) {
        let slot = match key {
            SettingKey::SoundInput => &mut self.input,
            SettingKey::SoundOutput => &mut self.output,
            SettingKey::RingtoneOutput => &mut self.ringtone_output,
            SettingKey::RingtoneSound => &mut self.ringtone_sound,
        };
        *slot = Some(value);
    }
}

/// Complete soundroute configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundrouteConfig {
    pub app: AppConfig,
    pub sound: SoundSettings,
}

impl SoundrouteConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::parse(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "app.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Create factory default configuration
    ///
    /// No device preferences: selection follows the system defaults until the
    /// user picks something.
    pub fn factory_default() -> Self {
        Self::default()
    }
}

/// `KeyValueSettings` persisted to `config.toml`
///
/// Reads are served from memory. Every `set` rewrites the file synchronously,
/// since settings writes happen on the foreground thread before dependent work
/// is queued.
pub struct FileSettings {
    path: PathBuf,
    config: RwLock<SoundrouteConfig>,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>, config: SoundrouteConfig) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> SoundrouteConfig {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Re-read the file, replacing the in-memory configuration
    ///
    /// On error the previous configuration stays in effect.
    pub fn reload(&self) -> Result<()> {
        let contents = std::fs::read_to_string(&self.path)?;
        let config = SoundrouteConfig::parse(&contents)?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        info!(path = %self.path.display(), "Settings reloaded");
        Ok(())
    }

    fn persist(&self, config: &SoundrouteConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(config)?)?;
        Ok(())
    }
}

impl KeyValueSettings for FileSettings {
    fn get(&self, key: SettingKey) -> Option<String> {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .sound
            .get(key)
            .cloned()
    }

    fn set(&self, key: SettingKey, value: String) {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        config.sound.set(key, value);
        if let Err(e) = self.persist(&config) {
            error!(
                path = %self.path.display(),
                %key,
                error = %e,
                "Failed to persist setting"
            );
        }
    }
}

/// File system watcher for hot-reload of the config file
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
    config_tx: broadcast::Sender<PathBuf>,
}

impl ConfigWatcher {
    /// Watch `config_path`; events for other files in its directory are ignored
    pub async fn new(config_path: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let config_dir = match config_path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_path_buf(),
            None => {
                return Err(ConfigError::Invalid(
                    "Config path has no parent directory".to_string(),
                ))
            }
        };
        let file_name = config_path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| ConfigError::Invalid("Config path has no file name".to_string()))?;

        let (config_tx, _config_rx) = broadcast::channel(32);

        fs::create_dir_all(&config_dir).await?;

        let tx_clone = config_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path.file_name() == Some(file_name.as_os_str()) {
                            // No receivers is fine; nobody is listening yet.
                            let _ = tx_clone.send(path);
                        }
                    }
                }
            }
        })?;

        watcher.watch(&config_dir, notify::RecursiveMode::NonRecursive)?;

        info!(
            path = %config_path.display(),
            "Config watcher started"
        );

        Ok(Self {
            _watcher: watcher,
            config_tx,
        })
    }

    /// Subscribe to config change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.config_tx.subscribe()
    }
}

/// Configuration manager for the main soundroute config
///
/// Manages the main configuration file at `~/.config/soundroute/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        Self {
            config_dir,
            config_path,
        }
    }

    /// Manage an explicit config file instead of the default location
    pub fn with_path(config_path: PathBuf) -> Self {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/soundroute` on Linux
    /// Returns `%APPDATA%\soundroute` on Windows
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("soundroute"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, returns factory default.
    /// If the config file is corrupt, logs an error and returns factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SoundrouteConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = SoundrouteConfig::factory_default();

            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match SoundrouteConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                SoundrouteConfig::factory_default()
            }
        }
    }

    /// Load the config and wrap it in a file-backed settings store
    pub async fn open_settings(&self) -> FileSettings {
        FileSettings::new(self.config_path.clone(), self.load().await)
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &SoundrouteConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;

        config.save_to_file(&self.config_path).await
    }

    /// Clear configuration (delete config file)
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(
                path = %self.config_path.display(),
                "Configuration cleared"
            );
        }

        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
