//! Soundroute core: audio device reconciliation and selection for a softphone
//!
//! Everything here is platform-agnostic. OS and engine adapters live in the
//! `infra` crate.

pub mod domain;
