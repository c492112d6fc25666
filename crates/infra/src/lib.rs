//! Adapters binding the soundroute domain to the host audio system

pub mod audio;
