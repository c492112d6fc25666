//! Platform-specific audio adapters
//!
//! OS device access goes through CPAL, which abstracts platform-specific APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod cpal_backend;
pub mod engine;
pub mod topology;

pub use cpal_backend::CpalDeviceRepository;
pub use engine::{LocalRingtonePlayer, LocalSoundEngine};
pub use topology::{PollingTopologySource, TopologySnapshot};
